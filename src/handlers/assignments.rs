// handlers/assignments.rs - /api/assignments

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::{non_empty, IdQuery, Required};
use crate::app::AppState;
use crate::authz::WriteAccess;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ReadScope};
use crate::store::{Assignment, AssignmentEntry, AssignmentFields, ResourceRef};
use crate::types::AssignmentStatus;

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentQuery {
    /// `upcoming` or `past` (anything not upcoming).
    pub status: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBody {
    pub id: Option<i32>,
    pub course_id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub attachment_url: Option<String>,
    pub status: Option<String>,
}

impl AssignmentBody {
    fn into_fields(self) -> Result<AssignmentFields, ApiError> {
        let mut required = Required::default();
        let course_id = required.id("courseId", self.course_id);
        let title = required.text("title", self.title);
        let due_date = required.text("dueDate", self.due_date);
        required.finish()?;

        let status = match non_empty(self.status) {
            Some(status) => status
                .parse::<AssignmentStatus>()
                .map_err(|e| ApiError::invalid_field("status", e.to_string()))?,
            None => AssignmentStatus::default(),
        };

        Ok(AssignmentFields {
            course_id,
            title,
            description: non_empty(self.description),
            due_date: parse_due_date(&due_date)?,
            attachment_url: non_empty(self.attachment_url),
            status,
        })
    }
}

/// RFC 3339, a `datetime-local` value (`2024-05-01T23:59`, taken as UTC) or a plain date.
pub(crate) fn parse_due_date(value: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ApiError::invalid_field("dueDate", format!("'{}' is not a date", value)))
}

/// GET /api/assignments?status=upcoming|past&id=N - ordered by due date
///
/// With `id`, returns that single assignment or 404.
pub async fn get(
    State(state): State<AppState>,
    scope: ReadScope,
    Query(query): Query<AssignmentQuery>,
) -> Response {
    let Some(context_key) = scope.context_key() else {
        return ApiResponse::success(Vec::<AssignmentEntry>::new()).into_response();
    };

    if let Some(id) = non_empty(query.id) {
        return match get_one(&state, context_key, &id).await {
            Ok(entry) => ApiResponse::success(entry).into_response(),
            Err(e) => e.into_response(),
        };
    }

    let entries = match state.repo.list_assignments(context_key).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Assignments fetch failed for '{}': {}", context_key, e);
            Vec::new()
        }
    };

    let entries: Vec<AssignmentEntry> = match query.status.as_deref() {
        Some("upcoming") => entries
            .into_iter()
            .filter(|a| a.status == AssignmentStatus::Upcoming)
            .collect(),
        Some("past") => entries
            .into_iter()
            .filter(|a| a.status != AssignmentStatus::Upcoming)
            .collect(),
        _ => entries,
    };

    ApiResponse::success(entries).into_response()
}

async fn get_one(state: &AppState, context_key: &str, id: &str) -> Result<AssignmentEntry, ApiError> {
    let id: i32 = id.parse().map_err(|_| ApiError::not_found("Not found"))?;
    state
        .repo
        .get_assignment(context_key, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Not found"))
}

/// POST /api/assignments - create an assignment for a course of this classroom
///
/// Expected Input:
/// ```json
/// {
///   "courseId": 3,
///   "title": "Problem set 4",
///   "dueDate": "2024-05-01T23:59",
///   "description": "Chapters 5-6",   // optional
///   "attachmentUrl": "https://...",  // optional
///   "status": "upcoming"             // optional: upcoming | overdue | completed
/// }
/// ```
pub async fn post(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<AssignmentBody>, JsonRejection>,
) -> ApiResult<Assignment> {
    let Json(body) = payload?;
    let fields = body.into_fields()?;

    access
        .ensure_owns(state.repo.as_ref(), ResourceRef::Course(fields.course_id))
        .await?;
    let assignment = state.repo.create_assignment(&fields).await?;
    Ok(ApiResponse::created(assignment))
}

/// PUT /api/assignments - update an assignment; `id` in the body
pub async fn put(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<AssignmentBody>, JsonRejection>,
) -> ApiResult<Assignment> {
    let Json(body) = payload?;
    let mut required = Required::default();
    let id = required.id("id", body.id);
    required.finish()?;
    let fields = body.into_fields()?;

    access
        .ensure_owns(state.repo.as_ref(), ResourceRef::Course(fields.course_id))
        .await?;
    access.ensure_owns(state.repo.as_ref(), ResourceRef::Assignment(id)).await?;
    let assignment = state.repo.update_assignment(id, &fields).await?;
    Ok(ApiResponse::success(assignment))
}

/// DELETE /api/assignments?id=N
pub async fn delete(
    State(state): State<AppState>,
    access: WriteAccess,
    Query(query): Query<IdQuery>,
) -> ApiResult<Value> {
    let id = query.require()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Assignment(id)).await?;
    state.repo.delete_assignment(id).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_date_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
        assert_eq!(parse_due_date("2024-05-01T23:59").unwrap(), expected);
        assert_eq!(parse_due_date("2024-05-01T23:59:00Z").unwrap(), expected);
        assert_eq!(parse_due_date("2024-05-02T01:59:00+02:00").unwrap(), expected);
        assert_eq!(
            parse_due_date("2024-05-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
        assert!(parse_due_date("next friday").is_err());
    }

    #[test]
    fn status_defaults_to_upcoming_and_rejects_unknown() {
        let body = |status: Option<&str>| AssignmentBody {
            id: None,
            course_id: Some(1),
            title: Some("Lab".into()),
            description: None,
            due_date: Some("2024-05-01".into()),
            attachment_url: Some("".into()),
            status: status.map(str::to_string),
        };
        let fields = body(None).into_fields().unwrap();
        assert_eq!(fields.status, AssignmentStatus::Upcoming);
        assert_eq!(fields.attachment_url, None);
        assert_eq!(
            body(Some("completed")).into_fields().unwrap().status,
            AssignmentStatus::Completed
        );
        assert!(body(Some("archived")).into_fields().is_err());
    }
}
