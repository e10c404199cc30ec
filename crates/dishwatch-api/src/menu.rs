use axum::{Extension, Json, extract::State};
use chrono::Local;
use tracing::debug;

use dishwatch_menu::todays_items;
use dishwatch_types::api::{CheckDishRequest, Claims, MenuItemResponse, SessionResponse};
use dishwatch_types::models;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn list_halls() -> Json<Vec<&'static str>> {
    Json(models::halls())
}

pub async fn list_meals() -> Json<Vec<&'static str>> {
    Json(models::meals())
}

/// Today's menu for the session's hall+meal, each dish carrying its
/// current missing flag. The provider returns the whole week; we keep
/// today only and drop duplicate dish ids.
pub async fn get_menu(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MenuItemResponse>>, ApiError> {
    let (hall, meal, checked) = state
        .sessions
        .with(claims.sub, |s| (s.hall.clone(), s.meal.clone(), s.checked.clone()))?;

    let (hall, meal) = hall.zip(meal).ok_or(ApiError::SelectionMissing)?;
    let (location_id, meal_id) = models::provider_ids(&hall, &meal)
        .ok_or_else(|| ApiError::UnknownSelection(format!("{hall}/{meal}")))?;

    let today = Local::now().date_naive();
    let week = state.menu.week_menu(today, location_id, meal_id).await?;
    let items = todays_items(week, today);
    debug!(%hall, %meal, count = items.len(), "menu for today");

    let body = items
        .into_iter()
        .map(|item| MenuItemResponse {
            missing: checked.contains(&item.id),
            id: item.id,
            name: item.name,
            station_name: item.station_name,
        })
        .collect();

    Ok(Json(body))
}

/// Flag or unflag a dish as missing for the current hall+meal.
pub async fn check_dish(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CheckDishRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let snapshot = state.sessions.with(claims.sub, |s| {
        if s.hall.is_none() || s.meal.is_none() {
            return None;
        }
        s.set_missing(req.dish_id, req.missing);
        Some(s.snapshot())
    })?;

    snapshot.map(Json).ok_or(ApiError::SelectionMissing)
}
