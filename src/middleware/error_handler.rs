use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::error;

const MAX_LOGGED_BODY: usize = 4096;

/// 记录所有 5xx 响应的请求路径和响应体，日志中只保留响应体开头部分
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!("{} {} failed with {}, body unreadable: {}", method, path, parts.status, e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
    error!(
        "{} {} failed with {} ({} bytes): {}",
        method,
        path,
        parts.status,
        bytes.len(),
        String::from_utf8_lossy(logged)
    );

    // body 已被读出，重新放回
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
