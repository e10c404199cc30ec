use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use dishwatch_auth::decode_session_token;

use crate::auth::AppState;
use crate::error::ApiError;

/// Extract and validate the session JWT from the Authorization header,
/// then check the session still exists server-side (logout and restarts
/// both invalidate otherwise-valid tokens).
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    let claims =
        decode_session_token(&state.jwt_secret, token).map_err(|_| ApiError::Unauthorized)?;

    if !state.sessions.contains(claims.sub)? {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
