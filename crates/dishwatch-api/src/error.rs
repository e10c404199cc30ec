use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// The errors handlers surface to the client. Each maps to a status
/// plus a JSON `{"error": …}` body the UI can show verbatim.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in")]
    Unauthorized,
    /// OAuth exchange failed; pending state has already been cleared.
    #[error("login failed: {0}")]
    Login(String),
    /// Missing/blank required fields block submission.
    #[error("{0}")]
    Validation(String),
    #[error("select a dining hall and meal first")]
    SelectionMissing,
    #[error("unknown hall or meal: {0}")]
    UnknownSelection(String),
    /// Menu provider failure. Aborts the operation, no retries.
    #[error("menu unavailable: {0}")]
    Provider(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<dishwatch_menu::MenuError> for ApiError {
    fn from(e: dishwatch_menu::MenuError) -> Self {
        ApiError::Provider(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized | ApiError::Login(_) => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SelectionMissing => StatusCode::CONFLICT,
            ApiError::UnknownSelection(_) => StatusCode::BAD_REQUEST,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(e) => {
                error!("internal error: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_classes() {
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Validation("name required".into())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::SelectionMissing.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Provider("503".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_detail_stays_out_of_the_body() {
        let err = ApiError::Internal(anyhow::anyhow!("db path exploded"));
        assert_eq!(err.to_string(), "internal error");
    }
}
