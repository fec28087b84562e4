// handlers/calendar.rs - /api/calendar

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use url::Url;

use super::Required;
use crate::app::AppState;
use crate::authz::WriteAccess;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ReadScope};
use crate::store::CalendarLink;

#[derive(Debug, Deserialize)]
pub struct CalendarBody {
    pub url: Option<String>,
}

fn no_calendar() -> Response {
    ApiResponse::success(json!({ "url": null })).into_response()
}

/// GET /api/calendar - the classroom's academic calendar link, or `{ "url": null }`
pub async fn get(State(state): State<AppState>, scope: ReadScope) -> Response {
    let Some(context_key) = scope.context_key() else {
        return no_calendar();
    };

    match state.repo.get_calendar(context_key).await {
        Ok(Some(link)) => ApiResponse::success(link).into_response(),
        Ok(None) => no_calendar(),
        Err(e) => {
            error!("Calendar fetch failed for '{}': {}", context_key, e);
            no_calendar()
        }
    }
}

/// POST /api/calendar - set (or replace) the calendar link
///
/// Expected Input:
/// ```json
/// { "url": "https://university.example/calendar.pdf" }
/// ```
pub async fn post(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<CalendarBody>, JsonRejection>,
) -> ApiResult<CalendarLink> {
    let Json(body) = payload?;
    let mut required = Required::default();
    let url = required.text("url", body.url);
    required.finish()?;

    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => return Err(ApiError::invalid_field("url", "must be an http(s) URL")),
    }

    let link = state.repo.upsert_calendar(&access.context_key, &url).await?;
    Ok(ApiResponse::success(link))
}
