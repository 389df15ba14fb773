use std::collections::HashSet;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use quarry_ops::authz::Role;
use quarry_ops::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "quarry-ops admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Seed a demo company plus one user per role (idempotent)
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The binary may run from a different CWD (containers); fall back to the
    // crate-local .env.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::Seed => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            seed(&pool).await?;
        }
    }

    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    let local = std::path::Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let table_exists = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?
    .is_some();

    let applied: HashSet<i64> = if table_exists {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

/// Seed two companies and one user per role. Existing usernames are left
/// untouched so the command can run against a populated database.
async fn seed(pool: &SqlitePool) -> anyhow::Result<()> {
    let password = std::env::var("SEED_PASSWORD").unwrap_or_else(|_| "changeme123".to_string());
    let password_hash = hash_password(&password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let primary = ensure_company(pool, "Khairat Al-Ard Quarries", Some("Khairat Al-Ard")).await?;
    let secondary = ensure_company(pool, "Silica Sands Co", None).await?;

    let users: [(&str, &str, Role); 7] = [
        ("superadmin", "Platform Admin", Role::Superadmin),
        ("owner_fahad", "Fahad Al-Harbi", Role::Owner),
        ("manager_sami", "Sami Qasem", Role::Manager),
        ("accountant_leen", "Leen Haddad", Role::Accountant),
        ("foreman_omar", "Omar Nassar", Role::Foreman),
        ("driver_khalid", "Khalid Al-Omari", Role::Driver),
        ("guard_yousef", "Yousef Saleh", Role::Guard),
    ];

    for (username, full_name, role) in users {
        let home = if role == Role::Superadmin { None } else { Some(primary) };
        let user_id = ensure_user(pool, username, full_name, role, home, &password_hash).await?;

        // The owner also gets membership in the second company so tenant
        // switching can be exercised out of the box.
        if role == Role::Owner {
            ensure_membership(pool, user_id, secondary).await?;
        }
    }

    println!("Seed complete (password: {password})");
    Ok(())
}

async fn ensure_company(pool: &SqlitePool, name: &str, name_en: Option<&str>) -> anyhow::Result<Uuid> {
    if let Some(row) = sqlx::query("SELECT id FROM companies WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
    {
        println!("Company already exists: {name}");
        return Ok(row.try_get("id")?);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO companies (id, name, name_en, status, created_at, updated_at) VALUES (?, ?, ?, 'ACTIVE', ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(name_en)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    println!("Created company: {name}");
    Ok(id)
}

async fn ensure_user(
    pool: &SqlitePool,
    username: &str,
    full_name: &str,
    role: Role,
    company_id: Option<Uuid>,
    password_hash: &str,
) -> anyhow::Result<Uuid> {
    if let Some(row) = sqlx::query("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
    {
        println!("User already exists: {username}");
        return Ok(row.try_get("id")?);
    }

    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO users (id, username, email, full_name, password_hash, role, company_id, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(id)
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(full_name)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(company_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    println!("Created user: {username} ({role})");
    Ok(id)
}

async fn ensure_membership(pool: &SqlitePool, user_id: Uuid, company_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO user_companies (user_id, company_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(company_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}
