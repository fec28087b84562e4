#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use classroom_api::init_data::InitDataVerifier;
use classroom_api::store::{MemoryStore, RoleStore};
use classroom_api::types::Role;
use classroom_api::{app, AppConfig, AppState};

pub const BOT_TOKEN: &str = "tok123";
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

/// The router over a fresh in-memory store; no sockets involved.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::development(BOT_TOKEN))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let router = app(AppState::new(config, store.clone()));
        Self { store, router }
    }

    pub async fn grant(&self, user_id: &str, context_key: &str, role: Role) {
        self.store
            .upsert_role(user_id, context_key, role)
            .await
            .expect("memory store never fails");
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    /// JSON request with optional init data header; returns status and parsed body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        init_data: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(init_data) = init_data {
            builder = builder.header(INIT_DATA_HEADER, init_data);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.send(request).await?;
        let status = response.status();
        Ok((status, json_body(response).await?))
    }

    pub async fn get(&self, uri: &str, init_data: Option<&str>) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, uri, init_data, None).await
    }
}

pub async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

fn user_json(user_id: &str) -> String {
    format!(r#"{{"id":{},"first_name":"User {}"}}"#, user_id, user_id)
}

/// Init data signed with the test bot token.
pub fn signed(user_id: &str, context_key: &str) -> String {
    signed_with(BOT_TOKEN, user_id, context_key)
}

pub fn signed_with(bot_token: &str, user_id: &str, context_key: &str) -> String {
    let user = user_json(user_id);
    InitDataVerifier::new(bot_token).sign(&[
        ("user", user.as_str()),
        ("auth_date", "1700000000"),
        ("start_param", context_key),
    ])
}

/// Same fields, no hash: good enough for the read endpoints.
pub fn unsigned(user_id: &str, context_key: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("user", &user_json(user_id))
        .append_pair("auth_date", "1700000000")
        .append_pair("start_param", context_key)
        .finish()
}

/// `Cookie` header value as a browser would send the session cookie back.
pub fn session_cookie_header(init_data: &str) -> String {
    axum_extra::extract::cookie::Cookie::new(
        classroom_api::middleware::SESSION_COOKIE,
        init_data.to_string(),
    )
    .encoded()
    .to_string()
}
