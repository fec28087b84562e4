//! Authorization core: role resolution and the write gate.
//!
//! Everything here is total. Denials are values carrying a [`DenialReason`];
//! nothing is raised to the caller, and store failures fail closed.

pub mod guard;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::init_data::{self, InitDataVerifier, ParsedInitData};
use crate::store::{RoleStore, StoreError};
use crate::types::Role;

pub use guard::WriteAccess;

/// Why a write was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    #[error("init data is missing, unsigned or lacks a user or context")]
    MalformedPayload,

    #[error("init data signature does not match")]
    SignatureMismatch,

    #[error("init data is older than the accepted window")]
    Expired,

    #[error("role does not allow writes in this classroom")]
    Unauthorized,

    #[error("roles could not be loaded")]
    StoreUnavailable,
}

/// Result of [`Authorizer::authorize_write`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteDecision {
    pub authorized: bool,
    pub context_key: Option<String>,
    pub user_id: Option<String>,
    #[serde(skip)]
    pub denial: Option<DenialReason>,
}

impl WriteDecision {
    fn allow(context_key: &str, user_id: &str) -> Self {
        Self {
            authorized: true,
            context_key: Some(context_key.to_string()),
            user_id: Some(user_id.to_string()),
            denial: None,
        }
    }

    fn deny(reason: DenialReason) -> Self {
        Self {
            authorized: false,
            context_key: None,
            user_id: None,
            denial: Some(reason),
        }
    }

    fn deny_for(reason: DenialReason, context_key: &str, user_id: &str) -> Self {
        Self {
            authorized: false,
            context_key: Some(context_key.to_string()),
            user_id: Some(user_id.to_string()),
            denial: Some(reason),
        }
    }
}

/// Verifies init data and looks up roles for the (user, context) it names.
#[derive(Clone)]
pub struct Authorizer {
    verifier: Arc<InitDataVerifier>,
    roles: Arc<dyn RoleStore>,
    max_age: Option<Duration>,
}

impl Authorizer {
    pub fn new(verifier: Arc<InitDataVerifier>, roles: Arc<dyn RoleStore>) -> Self {
        Self {
            verifier,
            roles,
            max_age: None,
        }
    }

    /// Require `auth_date` to be at most `max_age` old on writes.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn verifier(&self) -> &InitDataVerifier {
        &self.verifier
    }

    /// Role of `user_id` in `context_key`; `Student` when unknown or unreadable.
    pub async fn resolve_role(&self, user_id: &str, context_key: &str) -> Role {
        match self.lookup_role(user_id, context_key).await {
            Ok(role) => role,
            Err(e) => {
                error!("Role lookup failed for context '{}': {}", context_key, e);
                Role::Student
            }
        }
    }

    async fn lookup_role(&self, user_id: &str, context_key: &str) -> Result<Role, StoreError> {
        if user_id.is_empty() || context_key.is_empty() {
            return Ok(Role::Student);
        }

        let roles = self.roles.find_roles(user_id, context_key).await?;
        if roles.len() > 1 {
            warn!(
                "Data integrity: {} role rows for user '{}' in context '{}', using the first",
                roles.len(),
                user_id,
                context_key
            );
        }
        Ok(roles.into_iter().next().unwrap_or_default())
    }

    /// The single gate for mutations: signature, identity, context, freshness, role.
    pub async fn authorize_write(&self, raw: &str) -> WriteDecision {
        let decision = self.decide(raw).await;
        if let Some(reason) = decision.denial {
            warn!(
                "Write denied ({:?}) user={:?} context={:?}",
                reason, decision.user_id, decision.context_key
            );
        }
        decision
    }

    async fn decide(&self, raw: &str) -> WriteDecision {
        if raw.trim().is_empty() {
            return WriteDecision::deny(DenialReason::MalformedPayload);
        }

        let parsed = init_data::parse(raw);
        if parsed.context.signature_hash.is_none() {
            return WriteDecision::deny(DenialReason::MalformedPayload);
        }
        if !self.verifier.verify(raw) {
            return WriteDecision::deny(DenialReason::SignatureMismatch);
        }

        let (Some(user_id), Some(context_key)) = (parsed.user_id(), parsed.context_key()) else {
            return WriteDecision::deny(DenialReason::MalformedPayload);
        };

        if !self.is_fresh(&parsed) {
            return WriteDecision::deny_for(DenialReason::Expired, context_key, user_id);
        }

        match self.lookup_role(user_id, context_key).await {
            Ok(role) if role.can_write() => {
                debug!("Write allowed for user '{}' as {} in '{}'", user_id, role, context_key);
                WriteDecision::allow(context_key, user_id)
            }
            Ok(_) => WriteDecision::deny_for(DenialReason::Unauthorized, context_key, user_id),
            Err(e) => {
                error!("Role store unavailable while authorizing a write: {}", e);
                WriteDecision::deny(DenialReason::StoreUnavailable)
            }
        }
    }

    fn is_fresh(&self, parsed: &ParsedInitData) -> bool {
        let Some(max_age) = self.max_age else {
            return true;
        };
        let Some(auth_date) = parsed
            .context
            .auth_date
            .as_deref()
            .and_then(|value| value.parse::<i64>().ok())
        else {
            return false;
        };
        let age = Utc::now().timestamp() - auth_date;
        age <= max_age.as_secs() as i64
    }
}
