use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{info, warn};

use dishwatch_auth::{OAuthConfig, create_session_token, oauth};
use dishwatch_db::Database;
use dishwatch_menu::MenuClient;
use dishwatch_sync::SyncClient;
use dishwatch_types::api::{CallbackQuery, Claims, LoginUrlResponse, SessionTokenResponse};

use crate::error::ApiError;
use crate::session::SessionStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub db_path: PathBuf,
    pub http: reqwest::Client,
    pub menu: MenuClient,
    pub oauth: OAuthConfig,
    pub sync: Option<SyncClient>,
    pub sessions: SessionStore,
    pub jwt_secret: String,
}

/// Start the login flow: returns the provider authorize URL with a
/// fresh CSRF state the callback must echo back.
pub async fn login_url(State(state): State<AppState>) -> Result<Json<LoginUrlResponse>, ApiError> {
    let csrf = oauth::new_state();
    state.sessions.register_state(csrf.clone())?;

    let authorize_url = state
        .oauth
        .authorize_url(&csrf)
        .map_err(|e| ApiError::Login(e.to_string()))?;

    Ok(Json(LoginUrlResponse { authorize_url }))
}

/// OAuth callback: verify the state, exchange the code for an access
/// token, and hand back a session JWT. The pending state is consumed
/// up front, so a failed exchange leaves nothing to replay.
pub async fn callback(
    State(state): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Json<SessionTokenResponse>, ApiError> {
    if !state.sessions.take_state(&q.state)? {
        warn!("OAuth callback with unknown state");
        return Err(ApiError::Login("unknown or expired login attempt".into()));
    }

    let access_token = state
        .oauth
        .exchange_code(&state.http, &q.code)
        .await
        .map_err(|e| ApiError::Login(e.to_string()))?;

    let session_id = state.sessions.create(access_token)?;
    let token = create_session_token(&state.jwt_secret, session_id)?;

    info!(%session_id, "login complete");
    Ok(Json(SessionTokenResponse { session_id, token }))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove(claims.sub)?;
    info!(session_id = %claims.sub, "logged out");
    Ok(StatusCode::NO_CONTENT)
}
