use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use copydesk::ledger::TradeInput;
use copydesk::models::{CopyRelationship, Trader, User};
use copydesk::services::notifier::Notifier;

/// Connect to the test database and run all migrations.
///
/// Returns `None` when `TEST_DATABASE_URL` is not set so the suite can run
/// without Postgres; callers return early in that case.
#[allow(dead_code)]
pub async fn setup_test_db() -> Option<PgPool> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    Some(pool)
}

#[allow(dead_code)]
pub fn notifier(pool: &PgPool) -> Notifier {
    Notifier::new(pool.clone(), true)
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Seed a user with a unique email.
#[allow(dead_code)]
pub async fn seed_user(pool: &PgPool, balance: Decimal, is_staff: bool) -> User {
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, first_name, last_name, balance, is_staff)
        VALUES ($1, 'Test', 'User', $2, $3)
        RETURNING *
        "#,
    )
    .bind(format!("{}@example.com", unique("user")))
    .bind(balance)
    .bind(is_staff)
    .fetch_one(pool)
    .await
    .expect("Failed to seed user")
}

/// Seed an active trader with a unique username.
#[allow(dead_code)]
pub async fn seed_trader(pool: &PgPool, min_account_threshold: Decimal) -> Trader {
    let username = unique("trader");
    sqlx::query_as::<_, Trader>(
        r#"
        INSERT INTO traders (name, username, category, min_account_threshold)
        VALUES ($1, $2, 'crypto', $3)
        RETURNING *
        "#,
    )
    .bind(format!("Trader {}", &username[7..15]))
    .bind(&username)
    .bind(min_account_threshold)
    .fetch_one(pool)
    .await
    .expect("Failed to seed trader")
}

#[allow(dead_code)]
pub async fn reload_user(pool: &PgPool, id: Uuid) -> User {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("user row")
}

#[allow(dead_code)]
pub async fn reload_trader(pool: &PgPool, id: Uuid) -> Trader {
    sqlx::query_as::<_, Trader>("SELECT * FROM traders WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("trader row")
}

#[allow(dead_code)]
pub async fn relationship(pool: &PgPool, user_id: Uuid, trader_id: Uuid) -> Option<CopyRelationship> {
    sqlx::query_as::<_, CopyRelationship>(
        "SELECT * FROM copy_relationships WHERE user_id = $1 AND trader_id = $2",
    )
    .bind(user_id)
    .bind(trader_id)
    .fetch_optional(pool)
    .await
    .expect("relationship query")
}

#[allow(dead_code)]
pub async fn notification_titles(pool: &PgPool, user_id: Uuid) -> Vec<String> {
    sqlx::query_scalar::<_, String>(
        "SELECT title FROM notifications WHERE user_id = $1 ORDER BY created_at",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .expect("notification query")
}

#[allow(dead_code)]
pub async fn set_balance(pool: &PgPool, user_id: Uuid, balance: Decimal) {
    sqlx::query("UPDATE users SET balance = $2 WHERE id = $1")
        .bind(user_id)
        .bind(balance)
        .execute(pool)
        .await
        .expect("set balance");
}

/// A valid trade input; tweak fields per test.
#[allow(dead_code)]
pub fn trade_input(status: &str, profit_loss_percent: Decimal) -> TradeInput {
    TradeInput {
        market: "BTC/USD".into(),
        direction: "buy".into(),
        duration: "1 hour".into(),
        amount: Decimal::from(1_000),
        entry_price: Decimal::from(50_000),
        exit_price: None,
        profit_loss_percent,
        status: status.into(),
        closed_at: None,
        notes: None,
        investment_amount: None,
    }
}

#[allow(dead_code)]
pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}
