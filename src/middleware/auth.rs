use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::{AppState, error::AppError, utils::verify_token};

/// 校验 `Authorization: Bearer <jwt>`，通过后把 `Claims` 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("Rejected session token: {}", e);
        AppError::Unauthorized
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
