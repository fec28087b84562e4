// handlers/announcements.rs - /api/announcements

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::{IdQuery, Required};
use crate::app::AppState;
use crate::authz::WriteAccess;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ReadScope};
use crate::store::{Announcement, AnnouncementFields, ResourceRef};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementBody {
    pub id: Option<i32>,
    pub content: Option<String>,
    pub course_id: Option<i32>,
}

impl AnnouncementBody {
    fn into_fields(self) -> Result<AnnouncementFields, ApiError> {
        let mut required = Required::default();
        let content = required.text("content", self.content);
        required.finish()?;
        Ok(AnnouncementFields {
            content,
            course_id: self.course_id,
        })
    }
}

/// An attached course must be one of this classroom's.
async fn check_course(state: &AppState, access: &WriteAccess, fields: &AnnouncementFields) -> Result<(), ApiError> {
    match fields.course_id {
        Some(course_id) => {
            access
                .ensure_owns(state.repo.as_ref(), ResourceRef::Course(course_id))
                .await
        }
        None => Ok(()),
    }
}

/// GET /api/announcements - newest first
pub async fn get(State(state): State<AppState>, scope: ReadScope) -> ApiResponse<Vec<Announcement>> {
    let Some(context_key) = scope.context_key() else {
        return ApiResponse::success(Vec::new());
    };

    match state.repo.list_announcements(context_key).await {
        Ok(announcements) => ApiResponse::success(announcements),
        Err(e) => {
            error!("Announcements fetch failed for '{}': {}", context_key, e);
            ApiResponse::success(Vec::new())
        }
    }
}

/// POST /api/announcements
///
/// Expected Input:
/// ```json
/// { "content": "Midterm moved to Friday", "courseId": 3 }   // courseId optional
/// ```
pub async fn post(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<AnnouncementBody>, JsonRejection>,
) -> ApiResult<Announcement> {
    let Json(body) = payload?;
    let fields = body.into_fields()?;

    check_course(&state, &access, &fields).await?;
    let announcement = state
        .repo
        .create_announcement(&access.context_key, &fields)
        .await?;
    Ok(ApiResponse::created(announcement))
}

/// PUT /api/announcements - `id` in the body
pub async fn put(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<AnnouncementBody>, JsonRejection>,
) -> ApiResult<Announcement> {
    let Json(body) = payload?;
    let mut required = Required::default();
    let id = required.id("id", body.id);
    required.finish()?;
    let fields = body.into_fields()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Announcement(id)).await?;
    check_course(&state, &access, &fields).await?;
    let announcement = state.repo.update_announcement(id, &fields).await?;
    Ok(ApiResponse::success(announcement))
}

/// DELETE /api/announcements?id=N
pub async fn delete(
    State(state): State<AppState>,
    access: WriteAccess,
    Query(query): Query<IdQuery>,
) -> ApiResult<Value> {
    let id = query.require()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Announcement(id)).await?;
    state.repo.delete_announcement(id).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}
