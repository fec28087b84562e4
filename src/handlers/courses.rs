// handlers/courses.rs - /api/courses

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::{non_empty, IdQuery, Required};
use crate::app::AppState;
use crate::authz::WriteAccess;
use crate::middleware::{ApiResponse, ApiResult, ReadScope};
use crate::store::{Course, CourseFields, ResourceRef};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseBody {
    pub id: Option<i32>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub instructor: Option<String>,
}

impl CourseBody {
    fn into_fields(self) -> Result<CourseFields, crate::error::ApiError> {
        let mut required = Required::default();
        let name = required.text("name", self.name);
        required.finish()?;
        Ok(CourseFields {
            name,
            code: non_empty(self.code),
            instructor: non_empty(self.instructor),
        })
    }
}

/// GET /api/courses - courses of the caller's classroom
pub async fn get(State(state): State<AppState>, scope: ReadScope) -> ApiResponse<Vec<Course>> {
    let Some(context_key) = scope.context_key() else {
        return ApiResponse::success(Vec::new());
    };

    match state.repo.list_courses(context_key).await {
        Ok(courses) => ApiResponse::success(courses),
        Err(e) => {
            error!("Courses fetch failed for '{}': {}", context_key, e);
            ApiResponse::success(Vec::new())
        }
    }
}

/// POST /api/courses - create a course
///
/// Expected Input:
/// ```json
/// { "name": "Linear Algebra", "code": "MAT201", "instructor": "Dr. Ruiz" }
/// ```
pub async fn post(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<CourseBody>, JsonRejection>,
) -> ApiResult<Course> {
    let Json(body) = payload?;
    let fields = body.into_fields()?;

    let course = state.repo.create_course(&access.context_key, &fields).await?;
    Ok(ApiResponse::created(course))
}

/// PUT /api/courses - update a course; `id` in the body
pub async fn put(
    State(state): State<AppState>,
    access: WriteAccess,
    payload: Result<Json<CourseBody>, JsonRejection>,
) -> ApiResult<Course> {
    let Json(body) = payload?;
    let mut required = Required::default();
    let id = required.id("id", body.id);
    required.finish()?;
    let fields = body.into_fields()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Course(id)).await?;
    let course = state.repo.update_course(id, &fields).await?;
    Ok(ApiResponse::success(course))
}

/// DELETE /api/courses?id=N - delete a course and everything attached to it
pub async fn delete(
    State(state): State<AppState>,
    access: WriteAccess,
    Query(query): Query<IdQuery>,
) -> ApiResult<Value> {
    let id = query.require()?;

    access.ensure_owns(state.repo.as_ref(), ResourceRef::Course(id)).await?;
    state.repo.delete_course(id).await?;
    Ok(ApiResponse::success(json!({ "id": id })))
}
