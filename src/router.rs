use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;

use crate::{
    AppState,
    middleware::{auth_middleware, log_errors},
    routes,
};

pub const API_BASE_URI: &str = "/api";

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/qrcode", get(routes::auth::qr_code))
        .route("/auth/callback", get(routes::auth::callback));

    let protected_routes = Router::new()
        .route("/auth/status", get(routes::auth::status))
        .route("/messages/send-all", post(routes::message::send_to_all))
        .route("/messages/send-user", post(routes::message::send_to_user))
        .route("/messages/logs", get(routes::message::list_logs))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let router = Router::new()
        .nest(
            API_BASE_URI,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .layer(from_fn(log_errors));

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    router.with_state(state)
}
