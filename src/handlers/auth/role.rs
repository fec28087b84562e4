use axum::{extract::State, http::StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ReadScope};
use crate::types::Role;

#[derive(Debug, Serialize)]
pub struct RoleView {
    pub role: Role,
}

/// GET /api/auth/role - the caller's role in the classroom named by `start_param`
///
/// Expected Output:
/// ```json
/// { "success": true, "data": { "role": "representative" } }
/// ```
///
/// Without any init data the answer is 401 carrying `student`, so the
/// frontend can still render the read-only view.
pub async fn get(State(state): State<AppState>, scope: ReadScope) -> ApiResponse<RoleView> {
    if !scope.is_present() {
        debug!("Role request without init data");
        return ApiResponse::with_status(RoleView { role: Role::Student }, StatusCode::UNAUTHORIZED);
    }

    let (Some(user_id), Some(context_key)) = (scope.user_id(), scope.context_key()) else {
        debug!("Role request without user or context, defaulting to student");
        return ApiResponse::success(RoleView { role: Role::Student });
    };

    let role = state.authorizer.resolve_role(user_id, context_key).await;
    ApiResponse::success(RoleView { role })
}
