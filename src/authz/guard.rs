//! The guard every mutating endpoint goes through.
//!
//! [`WriteAccess`] runs [`Authorizer::authorize_write`](super::Authorizer::authorize_write)
//! on the request's init data; [`WriteAccess::ensure_owns`] checks that a
//! resource id named in the body or query belongs to the caller's classroom.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::{error, warn};

use super::WriteDecision;
use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::raw_init_data;
use crate::store::{ClassroomRepository, ResourceRef};

/// A caller allowed to write to `context_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAccess {
    pub context_key: String,
    pub user_id: String,
}

impl WriteAccess {
    /// Scoped existence check. A missing row and a row in another classroom
    /// are indistinguishable to the caller.
    pub async fn ensure_owns(
        &self,
        repo: &dyn ClassroomRepository,
        resource: ResourceRef,
    ) -> Result<(), ApiError> {
        match repo.resource_in_context(resource, &self.context_key).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(
                    "Ownership check failed: {} is not in context '{}' (user '{}')",
                    resource, self.context_key, self.user_id
                );
                Err(ApiError::forbidden(format!("{} not found in this classroom", resource)))
            }
            Err(e) => {
                error!("Ownership check for {} failed: {}", resource, e);
                Err(ApiError::forbidden("Unauthorized"))
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for WriteAccess {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = raw_init_data(&parts.headers).unwrap_or_default();

        match state.authorizer.authorize_write(&raw).await {
            WriteDecision {
                authorized: true,
                context_key: Some(context_key),
                user_id: Some(user_id),
                ..
            } => Ok(WriteAccess {
                context_key,
                user_id,
            }),
            _ => Err(ApiError::forbidden("Unauthorized")),
        }
    }
}
