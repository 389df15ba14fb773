use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;

use quarry_ops::create_app;

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    sqlx::migrate!().run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((app, pool, dir))
}

async fn post_json(app: &Router, uri: &str, token: Option<&str>, body: Value) -> Result<Response> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    Ok(app.clone().oneshot(builder.body(Body::from(body.to_string()))?).await?)
}

async fn get(app: &Router, uri: &str, token: &str) -> Result<Response> {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    Ok(app.clone().oneshot(req).await?)
}

async fn json_body(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Seeds a company with an owner, a driver, and a guard; returns
/// (company_id, owner token, driver token, guard token).
async fn seed_crew(app: &Router) -> Result<(String, String, String, String)> {
    let resp = post_json(
        app,
        "/auth/register",
        None,
        json!({
            "username": "superadmin",
            "email": "admin@example.com",
            "full_name": "Platform Admin",
            "password": "password123",
            "role": "superadmin"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let admin = json_body(resp).await?;
    let admin_token = admin["token"].as_str().unwrap();

    let resp = post_json(app, "/companies", Some(admin_token), json!({"name": "Quarry A"})).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let company = json_body(resp).await?;
    let company_id = company["id"].as_str().unwrap().to_string();

    let mut tokens = Vec::new();
    for (username, role) in [("owner_fahad", "owner"), ("driver_khalid", "driver"), ("guard_yousef", "guard")] {
        let resp = post_json(
            app,
            "/auth/register",
            None,
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "full_name": username,
                "password": "password123",
                "role": role,
                "company_id": company_id
            }),
        )
        .await?;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json_body(resp).await?;
        tokens.push(body["token"].as_str().unwrap().to_string());
    }

    let mut tokens = tokens.into_iter();
    Ok((
        company_id,
        tokens.next().unwrap(),
        tokens.next().unwrap(),
        tokens.next().unwrap(),
    ))
}

#[tokio::test]
async fn owner_sees_whole_crew() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, owner_token, _driver, _guard) = seed_crew(&app).await?;

    let resp = get(&app, "/users", &owner_token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let users = json_body(resp).await?;
    assert_eq!(users.as_array().unwrap().len(), 3);

    Ok(())
}

#[tokio::test]
async fn driver_listing_narrows_to_self() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, _owner, driver_token, _guard) = seed_crew(&app).await?;

    // Drivers only hold `read_own` on users, so the same endpoint that lists a
    // whole crew for an owner collapses to the caller's own record.
    let resp = get(&app, "/users", &driver_token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let users = json_body(resp).await?;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "driver_khalid");

    Ok(())
}

#[tokio::test]
async fn narrowed_caller_cannot_probe_other_ids() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, owner_token, driver_token, _guard) = seed_crew(&app).await?;

    let resp = get(&app, "/users", &owner_token).await?;
    let users = json_body(resp).await?;
    let other_id = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "owner_fahad")
        .and_then(|u| u["id"].as_str())
        .unwrap()
        .to_string();

    let resp = get(&app, &format!("/users/{other_id}"), &driver_token).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn driver_can_fetch_own_record() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, _owner, driver_token, _guard) = seed_crew(&app).await?;

    let resp = get(&app, "/auth/me", &driver_token).await?;
    let me = json_body(resp).await?;
    let own_id = me["user"]["id"].as_str().unwrap().to_string();

    let resp = get(&app, &format!("/users/{own_id}"), &driver_token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let user = json_body(resp).await?;
    assert_eq!(user["username"], "driver_khalid");

    Ok(())
}

#[tokio::test]
async fn ungranted_action_is_forbidden() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, _owner, driver_token, guard_token) = seed_crew(&app).await?;

    // Neither drivers nor guards may create companies.
    for token in [&driver_token, &guard_token] {
        let resp = post_json(&app, "/companies", Some(token), json!({"name": "Rogue Co"})).await?;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let err = json_body(resp).await?;
        assert_eq!(err["error"], "forbidden");
    }

    Ok(())
}

#[tokio::test]
async fn guard_listing_also_narrows_to_self() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;
    let (_company, _owner, _driver, guard_token) = seed_crew(&app).await?;

    // Guards hold plain `read` on attendance but only `read_own` on users.
    let resp = get(&app, "/users", &guard_token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let users = json_body(resp).await?;
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["username"], "guard_yousef");

    Ok(())
}
