mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::dec;
use copydesk::api::router::create_router;
use copydesk::config::AppConfig;
use copydesk::AppState;

fn test_config(api_token: Option<&str>) -> AppConfig {
    let url = std::env::var("TEST_DATABASE_URL").unwrap_or_default();
    let mut config = AppConfig::for_database(url);
    config.api_token = api_token.map(str::to_string);
    config
}

async fn build_test_app(api_token: Option<&str>) -> Option<(axum::Router, sqlx::PgPool)> {
    let pool = common::setup_test_db().await?;
    let state = AppState::new(pool.clone(), test_config(api_token));
    Some((create_router(state), pool))
}

async fn call(
    app: &axum::Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        req = req.header("x-user-id", id.to_string());
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&b).unwrap()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn trade_body(trader_id: Uuid, status: &str, pct: &str) -> Value {
    json!({
        "trader_id": trader_id,
        "market": "BTC/USD",
        "direction": "buy",
        "duration": "1 hour",
        "amount": "1000",
        "entry_price": "50000",
        "exit_price": "55000",
        "profit_loss_percent": pct,
        "status": status,
    })
}

#[tokio::test]
async fn test_health_check() {
    let Some((app, _pool)) = build_test_app(None).await else { return };

    let (status, json) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let Some((app, _pool)) = build_test_app(None).await else { return };

    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("copy_joins_total"));
}

#[tokio::test]
async fn test_missing_or_unknown_user_is_unauthorized() {
    let Some((app, _pool)) = build_test_app(None).await else { return };

    let (status, json) = call(&app, "GET", "/api/traders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    let (status, _) = call(&app, "GET", "/api/traders", Some(Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_token_enforced_when_configured() {
    let Some((app, pool)) = build_test_app(Some("gateway-secret")).await else { return };
    let user = common::seed_user(&pool, dec("10"), false).await;

    let (status, _) = call(&app, "GET", "/api/notifications", Some(user.id), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/notifications")
                .header("authorization", "Bearer gateway-secret")
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_routes_forbidden_for_non_staff_without_side_effects() {
    let Some((app, pool)) = build_test_app(None).await else { return };
    let user = common::seed_user(&pool, dec("1000"), false).await;
    let trader = common::seed_trader(&pool, dec("0")).await;

    let (status, json) = call(
        &app,
        "POST",
        "/api/admin/trades",
        Some(user.id),
        Some(trade_body(trader.id, "closed", "10")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "Admin access required");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades WHERE trader_id = $1")
        .bind(trader.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_unknown_trader_and_bad_input() {
    let Some((app, pool)) = build_test_app(None).await else { return };
    let admin = common::seed_user(&pool, dec("0"), true).await;
    let trader = common::seed_trader(&pool, dec("0")).await;

    let uri = format!("/api/traders/{}", Uuid::new_v4());
    let (status, _) = call(&app, "GET", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = call(
        &app,
        "POST",
        "/api/copy",
        Some(admin.id),
        Some(json!({ "trader_id": trader.id, "action": "follow" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let mut body = trade_body(trader.id, "closed", "10");
    body["direction"] = json!("short");
    let (status, json) = call(&app, "POST", "/api/admin/trades", Some(admin.id), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("direction"));
}

#[tokio::test]
async fn test_insufficient_balance_message() {
    let Some((app, pool)) = build_test_app(None).await else { return };
    let user = common::seed_user(&pool, dec("100"), false).await;
    let trader = common::seed_trader(&pool, dec("500")).await;

    let (status, json) = call(
        &app,
        "POST",
        "/api/copy",
        Some(user.id),
        Some(json!({ "trader_id": trader.id, "action": "copy" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let msg = json["error"].as_str().unwrap();
    assert!(msg.starts_with("Insufficient balance."));
    assert!(msg.contains(&trader.name));
}

/// Join, settle, request leave, reject, unlink.
#[tokio::test]
async fn test_copy_lifecycle_end_to_end() {
    let Some((app, pool)) = build_test_app(None).await else { return };
    let admin = common::seed_user(&pool, dec("0"), true).await;
    let user = common::seed_user(&pool, dec("1000"), false).await;
    let trader = common::seed_trader(&pool, dec("500")).await;

    // join
    let (status, json) = call(
        &app,
        "POST",
        "/api/copy",
        Some(user.id),
        Some(json!({ "trader_id": trader.id, "action": "copy" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["message"], format!("You are now copying {}", trader.name));
    let copy_id = json["data"]["relationship"]["id"].as_str().unwrap().to_string();
    let snapshot: rust_decimal::Decimal = json["data"]["relationship"]["initial_investment_amount"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(snapshot, dec("1000"));
    assert_eq!(common::reload_trader(&pool, trader.id).await.copiers, 1);

    // settle a closed +10% trade
    let (status, json) = call(
        &app,
        "POST",
        "/api/admin/trades",
        Some(admin.id),
        Some(trade_body(trader.id, "closed", "10")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["settlement"], "settled");
    let after = common::reload_user(&pool, user.id).await;
    assert_eq!(after.balance, dec("1100"));
    assert_eq!(after.profit, dec("100"));

    // request leave
    let (status, _) = call(
        &app,
        "POST",
        "/api/copy",
        Some(user.id),
        Some(json!({ "trader_id": trader.id, "action": "cancel" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/copy/status/{}", trader.id);
    let (_, json) = call(&app, "GET", &uri, Some(user.id), None).await;
    assert_eq!(json["data"]["is_copying"], true);
    assert_eq!(json["data"]["cancel_requested"], true);

    // admin rejects
    let uri = format!("/api/admin/copies/{copy_id}/resolve");
    let (status, json) = call(&app, "POST", &uri, Some(admin.id), Some(json!({ "action": "reject" }))).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["relationship"]["cancel_requested"], false);
    assert_eq!(json["data"]["relationship"]["is_actively_copying"], true);

    // admin unlinks directly
    let uri = format!("/api/admin/copies/{copy_id}/unlink");
    let (status, json) = call(&app, "POST", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["relationship"]["is_actively_copying"], false);
    assert_eq!(json["data"]["trader"]["copiers"], 0);

    // unlinking again is rejected
    let (status, json) = call(&app, "POST", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Relationship is not active");

    let (_, json) = call(&app, "GET", "/api/notifications", Some(user.id), None).await;
    let titles: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["title"].as_str())
        .collect();
    assert!(titles.contains(&"Trader Unlinked"));
    assert!(titles.contains(&"Cancel Request Rejected"));
    assert!(titles.iter().any(|t| t.starts_with("Trade Profit from")));

    // history shows the trade with the user's result
    let (_, json) = call(&app, "GET", "/api/copy/trades", Some(user.id), None).await;
    assert_eq!(json["data"]["total"], 1);
    let pl: rust_decimal::Decimal = json["data"]["items"][0]["user_profit_loss"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(pl, dec("100"));
}

#[tokio::test]
async fn test_admin_trade_edit_reports_already_settled() {
    let Some((app, pool)) = build_test_app(None).await else { return };
    let admin = common::seed_user(&pool, dec("0"), true).await;
    let trader = common::seed_trader(&pool, dec("0")).await;

    let (_, json) = call(
        &app,
        "POST",
        "/api/admin/trades",
        Some(admin.id),
        Some(trade_body(trader.id, "closed", "4")),
    )
    .await;
    let trade_id = json["data"]["trade"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/trades/{trade_id}");
    let mut edit = trade_body(trader.id, "closed", "9");
    edit.as_object_mut().unwrap().remove("trader_id");
    let (status, json) = call(&app, "PUT", &uri, Some(admin.id), Some(edit)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["settlement"], "already_settled");

    let (status, json) = call(&app, "GET", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["affected_users_count"], 0);

    let (status, _) = call(&app, "DELETE", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, "GET", &uri, Some(admin.id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
