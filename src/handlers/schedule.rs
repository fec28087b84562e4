// handlers/schedule.rs - /api/schedule

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::{non_empty, IdQuery, Required};
use crate::app::AppState;
use crate::authz::WriteAccess;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ReadScope};
use crate::store::{ResourceRef, Schedule, ScheduleEntry, ScheduleFields};

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    pub day: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    pub id: Option<i32>,
    pub course_id: Option<i32>,
    pub day_of_week: Option<i32>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
}

impl ScheduleBody {
    fn into_fields(self) -> Result<ScheduleFields, ApiError> {
        let mut required = Required::default();
        let course_id = required.id("courseId", self.course_id);
        let day_of_week = required.id("dayOfWeek", self.day_of_week);
        let start_time = required.text("startTime", self.start_time);
        let end_time = required.text("endTime", self.end_time);
        required.finish()?;

        if !(0..=6).contains(&day_of_week) {
            return Err(ApiError::invalid_field("dayOfWeek", "must be between 0 (Sunday) and 6"));
        }
        let start = parse_time("startTime", &start_time)?;
        let end = parse_time("endTime", &end_time)?;
        if end <= start {
            return Err(ApiError::invalid_field("endTime", "must be after startTime"));
        }

        Ok(ScheduleFields {
            course_id,
            day_of_week,
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
            location: non_empty(self.location),
        })
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`.
fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ApiError::invalid_field(field, format!("'{}' is not a HH:MM time", value)))
}

/// GET /api/schedule?day=N - weekly schedule joined with course details,
/// ordered by day then start time
pub async fn get(
    State(state): State<AppState>,
    scope: ReadScope,
    Query(query): Query<ScheduleQuery>,
) -> ApiResponse<Vec<ScheduleEntry>> {
    let Some(context_key) = scope.context_key() else {
        return ApiResponse::success(Vec::new());
    };

    // An unparseable day filter matches nothing, like an unknown day would.
    let day = match non_empty(query.day) {
        Some(day) => match day.parse::<i32>() {
            Ok(day) => Some(day),
            Err(_) => return ApiResponse::success(Vec::new()),
        },
        None => None,
    };

    match state.repo.list_schedule(context_key, day).await {
        Ok(entries) => ApiResponse::success(entries),
        Err(e) => {
            error!("Schedule fetch failed for '{}': {}", context_key, e);
            ApiResponse::success(Vec::new())
        }
    }
}

/// POST /api/schedule - add a weekly slot for a course of this classroom
///
/// Expected Input:
/// ```json
/// { "courseId": 3, "dayOfWeek": 1, "startTime": "09:00", "endTime": "10:30", "location": "B-204" }
/// ```
pub async fn post(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<ScheduleBody>, JsonRejection>,
) -> ApiResult<Schedule> {
    let Json(body) = payload?;
    let fields = body.into_fields()?;

    access
        .ensure_owns(state.repo.as_ref(), ResourceRef::Course(fields.course_id))
        .await?;
    let schedule = state.repo.create_schedule(&fields).await?;
    Ok(ApiResponse::created(schedule))
}

/// PUT /api/schedule - update a slot; both the slot and its (new) course must
/// belong to this classroom
pub async fn put(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<ScheduleBody>, JsonRejection>,
) -> ApiResult<Schedule> {
    let Json(body) = payload?;
    let mut required = Required::default();
    let id = required.id("id", body.id);
    required.finish()?;
    let fields = body.into_fields()?;

    access
        .ensure_owns(state.repo.as_ref(), ResourceRef::Course(fields.course_id))
        .await?;
    access.ensure_owns(state.repo.as_ref(), ResourceRef::Schedule(id)).await?;
    let schedule = state.repo.update_schedule(id, &fields).await?;
    Ok(ApiResponse::success(schedule))
}

/// DELETE /api/schedule?id=N
pub async fn delete(
    State(state): State<AppState>,
    access: WriteAccess,
    Query(query): Query<IdQuery>,
) -> ApiResult<Value> {
    let id = query.require()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Schedule(id)).await?;
    state.repo.delete_schedule(id).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(day: i32, start: &str, end: &str) -> ScheduleBody {
        ScheduleBody {
            id: None,
            course_id: Some(1),
            day_of_week: Some(day),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            location: Some("  ".into()),
        }
    }

    #[test]
    fn normalizes_times_and_blank_location() {
        let fields = body(0, "09:00:00", "10:30").into_fields().unwrap();
        assert_eq!(fields.start_time, "09:00");
        assert_eq!(fields.end_time, "10:30");
        assert_eq!(fields.location, None);
    }

    #[test]
    fn rejects_out_of_range_days_and_inverted_times() {
        assert!(body(7, "09:00", "10:00").into_fields().is_err());
        assert!(body(-1, "09:00", "10:00").into_fields().is_err());
        assert!(body(2, "10:00", "10:00").into_fields().is_err());
        assert!(body(2, "9am", "10:00").into_fields().is_err());
    }
}
