use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn, info};

use crate::config::Config;
use crate::error::AppError;

/// Paths reachable without a bearer token.
pub const PUBLIC_PATHS: &[&str] = &["/health", "/ready"];

pub async fn auth_middleware(headers: HeaderMap, request: Request, next: Next) -> Result<Response, AppError> {
    let path = request.uri().path();
    let method = request.method();

    if PUBLIC_PATHS.contains(&path) {
        debug!("Skipping auth for {}", path);
        return Ok(next.run(request).await);
    }

    debug!("Authenticating request: {} {}", method, path);

    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            warn!("Missing or malformed Authorization header for {} {}", method, path);
            return Err(AppError::InvalidApiKey);
        }
    };

    if !Config::validate_api_key(token) {
        let prefix: String = token.chars().take(8).collect();
        warn!("Invalid API key attempted for {} {}: {}", method, path, prefix);
        return Err(AppError::InvalidApiKey);
    }

    info!("Valid API key authenticated for {} {}", method, path);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
