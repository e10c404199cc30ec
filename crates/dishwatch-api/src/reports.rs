use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::Local;
use serde::Deserialize;
use tracing::{error, info, warn};

use dishwatch_db::models::NewReport;
use dishwatch_types::api::{
    Claims, ReportSummaryResponse, SubmitReportRequest, SubmitReportResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Persist the session's flagged dishes as one summary plus N dish
/// rows, then push the database snapshot to the remote store. The push
/// is best-effort: a failure is logged and reported via `synced`, the
/// local write stands either way.
pub async fn submit_report(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitReportRequest>,
) -> Result<(StatusCode, Json<SubmitReportResponse>), ApiError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Validation(
            "please enter your name or initials".into(),
        ));
    }

    let (hall, meal, checked) = state
        .sessions
        .with(claims.sub, |s| (s.hall.clone(), s.meal.clone(), s.checked.clone()))?;
    let (hall, meal) = hall.zip(meal).ok_or(ApiError::SelectionMissing)?;

    let mut dish_ids: Vec<i64> = checked.into_iter().collect();
    dish_ids.sort_unstable();
    if dish_ids.is_empty() {
        return Err(ApiError::Validation(
            "no items were marked as missing".into(),
        ));
    }

    let now = Local::now();
    let date = now.date_naive().to_string();
    let timestamp = now.format("%Y-%m-%dT%H:%M:%S").to_string();
    let comment = req.comment.trim().to_string();

    // Blocking SQLite write off the async runtime
    let db_state = state.clone();
    let saved = dish_ids.len();
    let report_username = username.clone();
    let summary_id = tokio::task::spawn_blocking(move || {
        db_state.db.insert_report(&NewReport {
            username: &report_username,
            dish_ids: &dish_ids,
            date: &date,
            dining_hall: &hall,
            meal: &meal,
            comment: (!comment.is_empty()).then_some(comment.as_str()),
            timestamp: &timestamp,
        })
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("report write task failed"))
    })??;

    // Remember the name for pre-filling and clear the flags now that
    // they're persisted.
    state.sessions.with(claims.sub, |s| {
        s.username = Some(username.clone());
        s.checked.clear();
    })?;

    let synced = match &state.sync {
        Some(client) => {
            // Fold the WAL into the main file first; the upload reads
            // those bytes directly and would otherwise miss everything
            // written since the last checkpoint.
            let db_state = state.clone();
            match tokio::task::spawn_blocking(move || db_state.db.checkpoint()).await {
                Ok(Ok(())) => dishwatch_sync::push_after_write(client, &state.db_path).await,
                Ok(Err(e)) => {
                    warn!("WAL checkpoint failed, skipping snapshot upload: {:#}", e);
                    false
                }
                Err(e) => {
                    error!("spawn_blocking join error: {}", e);
                    false
                }
            }
        }
        None => false,
    };

    info!(summary_id, saved, synced, "report saved for {}", username);
    Ok((
        StatusCode::CREATED,
        Json(SubmitReportResponse {
            summary_id,
            saved,
            synced,
        }),
    ))
}

/// Recent submissions, newest first.
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Vec<ReportSummaryResponse>>, ApiError> {
    let limit = query.limit.min(200);

    let db_state = state.clone();
    let rows = tokio::task::spawn_blocking(move || db_state.db.list_summaries(limit))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("report list task failed"))
        })??;

    let body = rows
        .into_iter()
        .map(|row| ReportSummaryResponse {
            id: row.id,
            timestamp: row.timestamp,
            total_missing: row.total_missing,
            comment: row.comment,
            username: row.username,
        })
        .collect();

    Ok(Json(body))
}
