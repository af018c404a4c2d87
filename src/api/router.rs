use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{require_auth, require_staff};
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes: no authentication required
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // User routes: gateway token + X-User-Id
    let user = Router::new()
        .route("/api/traders", get(handlers::traders::list))
        .route("/api/traders/:id", get(handlers::traders::detail))
        .route("/api/copy", post(handlers::copy::copy_action))
        .route("/api/copy/status/:trader_id", get(handlers::copy::status))
        .route("/api/copy/following", get(handlers::copy::following))
        .route("/api/copy/trades", get(handlers::copy::trades))
        .route("/api/notifications", get(handlers::notifications::list));

    // Admin routes: staff only; the capability check runs before any handler
    let admin = Router::new()
        // Copy relationships
        .route("/api/admin/traders/:id/copiers", get(handlers::admin_copies::trader_copiers))
        .route("/api/admin/traders/:id/copiers/recount", post(handlers::admin_copies::recount))
        .route("/api/admin/copies", get(handlers::admin_copies::overview))
        .route("/api/admin/copies/:id/resolve", post(handlers::admin_copies::resolve))
        .route("/api/admin/copies/:id/unlink", post(handlers::admin_copies::unlink))
        // Trader trades
        .route(
            "/api/admin/trades",
            get(handlers::admin_trades::list).post(handlers::admin_trades::create),
        )
        .route(
            "/api/admin/trades/:id",
            get(handlers::admin_trades::detail)
                .put(handlers::admin_trades::update)
                .delete(handlers::admin_trades::delete),
        )
        // Direct user trades
        .route(
            "/api/admin/users/:id/trades",
            get(handlers::direct_trades::list_for_user).post(handlers::direct_trades::create_for_user),
        )
        .route("/api/admin/direct-trades/bulk", post(handlers::direct_trades::bulk))
        .layer(middleware::from_fn(require_staff));

    // Layers run outside-in: auth first, then the staff gate on admin routes.
    let protected = user
        .merge(admin)
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
