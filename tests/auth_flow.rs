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

async fn post_json(app: &Router, uri: &str, body: Value) -> Result<Response> {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))?;
    Ok(app.clone().oneshot(req).await?)
}

async fn json_body(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn register_login_me_round_trip() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let resp = post_json(
        &app,
        "/auth/register",
        json!({
            "username": "driver_khalid",
            "email": "khalid@example.com",
            "full_name": "Khalid Al-Omari",
            "password": "password123"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered = json_body(resp).await?;
    assert_eq!(registered["user"]["role"], "driver");
    // Advisory permission map is present for client-side gating.
    assert!(registered["permissions"]["vehicle_locations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|a| a == "update"));

    let resp = post_json(
        &app,
        "/auth/login",
        json!({"username": "driver_khalid", "password": "password123"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let login = json_body(resp).await?;
    let token = login["token"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await?;
    assert_eq!(me["user"]["username"], "driver_khalid");

    Ok(())
}

#[tokio::test]
async fn short_password_is_rejected() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let resp = post_json(
        &app,
        "/auth/register",
        json!({
            "username": "short",
            "email": "short@example.com",
            "full_name": "Short Pass",
            "password": "short"
        }),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn duplicate_username_conflicts() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let payload = json!({
        "username": "guard_yousef",
        "email": "yousef@example.com",
        "full_name": "Yousef Saleh",
        "password": "password123"
    });
    let resp = post_json(&app, "/auth/register", payload.clone()).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = post_json(&app, "/auth/register", payload).await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_unauthorized() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    post_json(
        &app,
        "/auth/register",
        json!({
            "username": "owner_fahad",
            "email": "fahad@example.com",
            "full_name": "Fahad Al-Harbi",
            "password": "password123",
            "role": "owner"
        }),
    )
    .await?;

    let resp = post_json(
        &app,
        "/auth/login",
        json!({"username": "owner_fahad", "password": "wrongpassword"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = post_json(
        &app,
        "/auth/login",
        json!({"username": "nobody", "password": "password123"}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn protected_route_rejects_missing_and_garbage_tokens() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let req = Request::builder().method("GET").uri("/auth/me").body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err = json_body(resp).await?;
    assert_eq!(err["error"], "missing_credentials");

    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", "Bearer not.a.token")
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err = json_body(resp).await?;
    assert_eq!(err["error"], "invalid_token");

    Ok(())
}

#[tokio::test]
async fn deactivated_user_token_stops_working() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let resp = post_json(
        &app,
        "/auth/register",
        json!({
            "username": "manager_sami",
            "email": "sami@example.com",
            "full_name": "Sami Qasem",
            "password": "password123",
            "role": "manager"
        }),
    )
    .await?;
    let registered = json_body(resp).await?;
    let token = registered["token"].as_str().unwrap().to_string();

    sqlx::query("UPDATE users SET is_active = 0 WHERE username = 'manager_sami'")
        .execute(&pool)
        .await?;

    let req = Request::builder()
        .method("GET")
        .uri("/auth/me")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    // Indistinguishable from a bad token on the wire.
    let err = json_body(resp).await?;
    assert_eq!(err["error"], "invalid_token");

    Ok(())
}

#[tokio::test]
async fn login_records_audit_trail() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    post_json(
        &app,
        "/auth/register",
        json!({
            "username": "foreman_omar",
            "email": "omar@example.com",
            "full_name": "Omar Nassar",
            "password": "password123",
            "role": "foreman"
        }),
    )
    .await?;
    post_json(
        &app,
        "/auth/login",
        json!({"username": "foreman_omar", "password": "password123"}),
    )
    .await?;

    // The audit listener is async; give it a moment to project the events.
    for _ in 0..50 {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM audit_log WHERE event_name = 'auth.login'")
                .fetch_one(&pool)
                .await?;
        if count > 0 {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    anyhow::bail!("auth.login audit entry never appeared");
}
