use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::AppState;
use crate::error::ApiError;
use crate::init_data::{self, AuthContext, ParsedIdentity};
use crate::middleware::{clear_session_cookie, session_cookie, ApiResponse, ApiResult, SESSION_COOKIE};
use crate::store::UserProfile;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub init_data: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: Option<ParsedIdentity>,
    pub context: AuthContext,
    /// Whether the stored payload still carries a valid signature.
    pub verified: bool,
}

/// POST /api/auth/session - exchange signed init data for a session cookie
///
/// Expected Input:
/// ```json
/// { "initData": "user=%7B...%7D&auth_date=...&hash=..." }
/// ```
pub async fn post(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<SessionView>), ApiError> {
    let Json(body) = payload?;
    let raw = body
        .init_data
        .filter(|raw| !raw.trim().is_empty())
        .ok_or_else(|| ApiError::missing_fields(&["initData"]))?;

    if !state.authorizer.verifier().verify(&raw) {
        warn!("Login rejected: init data signature does not match");
        return Err(ApiError::unauthorized("Invalid initData"));
    }

    let parsed = init_data::parse(&raw);
    let user = parsed
        .user()
        .cloned()
        .ok_or_else(|| ApiError::bad_request("No user data"))?;

    state
        .roles
        .upsert_user(&UserProfile {
            user_id: user.user_id.clone(),
            first_name: user.first_name.clone(),
            username: user.username.clone(),
        })
        .await?;
    info!("Session started for user '{}'", user.user_id);

    let security = &state.config.security;
    let jar = jar.add(session_cookie(
        &raw,
        security.session_max_age_secs,
        security.session_cookie_secure,
    ));

    Ok((
        jar,
        ApiResponse::success(SessionView {
            user: Some(user),
            context: parsed.context,
            verified: true,
        }),
    ))
}

/// GET /api/auth/session - the session stored in the cookie, or `null`
pub async fn get(State(state): State<AppState>, jar: CookieJar) -> ApiResult<Option<SessionView>> {
    let Some(raw) = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|raw| !raw.is_empty())
    else {
        return Ok(ApiResponse::success(None));
    };

    let verified = state.authorizer.verifier().verify(&raw);
    let parsed = init_data::parse(&raw);

    Ok(ApiResponse::success(Some(SessionView {
        user: parsed.user().cloned(),
        context: parsed.context,
        verified,
    })))
}

/// DELETE /api/auth/session - clear the session cookie
pub async fn delete(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<Option<SessionView>>) {
    let jar = jar.add(clear_session_cookie(state.config.security.session_cookie_secure));
    (jar, ApiResponse::success(None))
}
