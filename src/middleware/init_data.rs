//! Where init data comes from on a request, and the unsigned read scope.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

use super::session::SESSION_COOKIE;
use crate::init_data::{self, ParsedInitData};

/// Header the mini-app frontend attaches to every API call.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// Raw init data: the header first, then the session cookie.
pub fn raw_init_data(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(INIT_DATA_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.trim().is_empty())
    })
}

/// Classroom scope for read endpoints.
///
/// Taken from the payload's `start_param` WITHOUT checking the signature, so
/// anyone can read any classroom whose key they know. Writes never use this.
#[derive(Debug, Clone, Default)]
pub struct ReadScope {
    pub parsed: Option<ParsedInitData>,
}

impl ReadScope {
    pub fn context_key(&self) -> Option<&str> {
        self.parsed.as_ref().and_then(ParsedInitData::context_key)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.parsed.as_ref().and_then(ParsedInitData::user_id)
    }

    /// Whether the request carried any init data at all.
    pub fn is_present(&self) -> bool {
        self.parsed.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ReadScope
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let parsed = raw_init_data(&parts.headers).map(|raw| init_data::parse(&raw));
        Ok(ReadScope { parsed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(INIT_DATA_HEADER, HeaderValue::from_static("start_param=a"));
        headers.insert(COOKIE, HeaderValue::from_static("telegram-session=start_param=b"));
        assert_eq!(raw_init_data(&headers).as_deref(), Some("start_param=a"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("other=1; telegram-session=start_param=b"));
        assert_eq!(raw_init_data(&headers).as_deref(), Some("start_param=b"));
    }

    #[test]
    fn blank_header_counts_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(INIT_DATA_HEADER, HeaderValue::from_static("  "));
        assert_eq!(raw_init_data(&headers), None);
    }
}
