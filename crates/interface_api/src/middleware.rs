//! API middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::{info, warn};

use domain_billing::Actor;

use crate::auth::validate_token;
use crate::error::ApiError;
use crate::AppState;

/// Authentication middleware
///
/// Validates the bearer token and stores the caller's [`Actor`] in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(token) = token else {
        warn!("Missing or invalid Authorization header");
        return ApiError::Unauthorized("missing bearer token".to_string()).into_response();
    };

    let config = &state.config;
    let claims = validate_token(token, &config.jwt_secret, config.jwt_max_lifetime_secs);
    let actor = match claims.and_then(|c| c.actor()) {
        Ok(actor) => actor,
        Err(e) => {
            warn!(error = %e, "Token rejected");
            return ApiError::from(e).into_response();
        }
    };

    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Audit logging middleware
///
/// Logs every API request with the acting user and outcome
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let actor = request.extensions().get::<Actor>().copied();
    let start = Instant::now();

    let response = next.run(request).await;

    let user = actor.map_or_else(|| "anonymous".to_string(), |a| a.user_id.to_string());
    let role = actor.map_or("none", |a| a.role.as_str());
    info!(
        method = %method,
        uri = %uri,
        user = %user,
        role,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "API request"
    );

    response
}
