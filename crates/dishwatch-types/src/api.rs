use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Session JWT claims shared between the auth helpers (encoding) and the
/// API middleware (decoding). `sub` is the server-side session id, not a
/// provider identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize)]
pub struct LoginUrlResponse {
    pub authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct SessionTokenResponse {
    pub session_id: Uuid,
    pub token: String,
}

// -- Session flow --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectHallRequest {
    pub hall: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectMealRequest {
    pub meal: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckDishRequest {
    pub dish_id: i64,
    pub missing: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub hall: Option<String>,
    pub meal: Option<String>,
    pub checked: Vec<i64>,
    pub username: Option<String>,
}

// -- Menu --

#[derive(Debug, Serialize)]
pub struct MenuItemResponse {
    pub id: i64,
    pub name: String,
    pub station_name: String,
    pub missing: bool,
}

// -- Reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitReportRequest {
    pub username: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitReportResponse {
    pub summary_id: i64,
    pub saved: usize,
    pub synced: bool,
}

#[derive(Debug, Serialize)]
pub struct ReportSummaryResponse {
    pub id: i64,
    pub timestamp: String,
    pub total_missing: i64,
    pub comment: Option<String>,
    pub username: String,
}
