use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const USER_FIELD: &str = "user";
pub const START_PARAM_FIELD: &str = "start_param";
pub const CHAT_INSTANCE_FIELD: &str = "chat_instance";
pub const CHAT_TYPE_FIELD: &str = "chat_type";
pub const AUTH_DATE_FIELD: &str = "auth_date";
pub const HASH_FIELD: &str = "hash";

/// The acting user, decoded from the JSON `user` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIdentity {
    pub user_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub language_code: Option<String>,
    pub is_premium: Option<bool>,
}

/// Outcome of decoding the `user` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityField {
    Absent,
    Malformed(String),
    Present(ParsedIdentity),
}

/// Scoping fields carried next to the identity. None of them is validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// `start_param`: the classroom this request targets.
    pub context_key: Option<String>,
    pub chat_instance: Option<String>,
    pub chat_type: Option<String>,
    pub auth_date: Option<String>,
    #[serde(skip)]
    pub signature_hash: Option<String>,
}

/// Structured but still untrusted view of an init data string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInitData {
    pub identity: IdentityField,
    pub context: AuthContext,
    /// The original string, kept for signature recomputation.
    pub raw: String,
}

impl ParsedInitData {
    pub fn user(&self) -> Option<&ParsedIdentity> {
        match &self.identity {
            IdentityField::Present(user) => Some(user),
            IdentityField::Absent | IdentityField::Malformed(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user().map(|user| user.user_id.as_str())
    }

    pub fn context_key(&self) -> Option<&str> {
        self.context.context_key.as_deref()
    }
}

#[derive(Deserialize)]
struct WireUser {
    id: WireUserId,
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    is_premium: Option<bool>,
}

// The platform sends a number, some clients forward it as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireUserId {
    Number(serde_json::Number),
    Text(String),
}

impl From<WireUser> for ParsedIdentity {
    fn from(user: WireUser) -> Self {
        let user_id = match user.id {
            WireUserId::Number(n) => n.to_string(),
            WireUserId::Text(s) => s,
        };
        Self {
            user_id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            language_code: user.language_code,
            is_premium: user.is_premium,
        }
    }
}

/// Decode `raw` as `application/x-www-form-urlencoded` pairs, in order, duplicates kept.
pub fn pairs(raw: &str) -> Vec<(String, String)> {
    let raw = raw.strip_prefix('?').unwrap_or(raw);
    form_urlencoded::parse(raw.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Parse an init data string. Never fails: anything unusable becomes `None`/`Absent`.
pub fn parse(raw: &str) -> ParsedInitData {
    let pairs = pairs(raw);

    // First occurrence wins; empty values count as missing.
    let field = |name: &str| -> Option<String> {
        pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    };

    let identity = match field(USER_FIELD) {
        None => IdentityField::Absent,
        Some(json) => match serde_json::from_str::<WireUser>(&json) {
            Ok(user) => IdentityField::Present(user.into()),
            Err(e) => {
                tracing::debug!("init data carries an undecodable user field: {}", e);
                IdentityField::Malformed(e.to_string())
            }
        },
    };

    let context = AuthContext {
        context_key: field(START_PARAM_FIELD),
        chat_instance: field(CHAT_INSTANCE_FIELD),
        chat_type: field(CHAT_TYPE_FIELD),
        auth_date: field(AUTH_DATE_FIELD),
        signature_hash: field(HASH_FIELD),
    };

    ParsedInitData {
        identity,
        context,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = "user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ana%22%7D&auth_date=1700000000&start_param=g1_0&hash=abc";

    #[test]
    fn extracts_identity_and_context() {
        let parsed = parse(SCENARIO_A);
        let user = parsed.user().expect("identity");
        assert_eq!(user.user_id, "42");
        assert_eq!(user.first_name, "Ana");
        assert_eq!(user.username, None);
        assert_eq!(parsed.context_key(), Some("g1_0"));
        assert_eq!(parsed.context.auth_date.as_deref(), Some("1700000000"));
        assert_eq!(parsed.context.signature_hash.as_deref(), Some("abc"));
        assert_eq!(parsed.context.chat_instance, None);
        assert_eq!(parsed.raw, SCENARIO_A);
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse(SCENARIO_A), parse(SCENARIO_A));
        assert_eq!(parse("user=%7Bbroken"), parse("user=%7Bbroken"));
    }

    #[test]
    fn tolerates_degenerate_input() {
        for raw in ["", "no-equals-sign", "&&&", "=", "%zz=%"] {
            let parsed = parse(raw);
            assert_eq!(parsed.identity, IdentityField::Absent, "input {raw:?}");
            assert_eq!(parsed.context, AuthContext::default(), "input {raw:?}");
        }
    }

    #[test]
    fn malformed_user_json_is_not_an_identity() {
        let parsed = parse("user=%7B%22id%22%3A&start_param=g1_0");
        assert!(matches!(parsed.identity, IdentityField::Malformed(_)));
        assert!(parsed.user().is_none());
        assert_eq!(parsed.context_key(), Some("g1_0"));
    }

    #[test]
    fn user_without_first_name_is_malformed() {
        let parsed = parse("user=%7B%22id%22%3A42%7D");
        assert!(matches!(parsed.identity, IdentityField::Malformed(_)));
    }

    #[test]
    fn accepts_string_user_ids_and_optional_fields() {
        let parsed = parse(
            "user=%7B%22id%22%3A%22777%22%2C%22first_name%22%3A%22Bo%22%2C%22username%22%3A%22bo%22%2C%22is_premium%22%3Atrue%7D&chat_type=supergroup",
        );
        let user = parsed.user().expect("identity");
        assert_eq!(user.user_id, "777");
        assert_eq!(user.username.as_deref(), Some("bo"));
        assert_eq!(user.is_premium, Some(true));
        assert_eq!(parsed.context.chat_type.as_deref(), Some("supergroup"));
    }

    #[test]
    fn first_occurrence_wins_and_empty_values_are_missing() {
        let parsed = parse("start_param=first&start_param=second&chat_instance=");
        assert_eq!(parsed.context_key(), Some("first"));
        assert_eq!(parsed.context.chat_instance, None);
    }

    #[test]
    fn plus_decodes_to_space() {
        let decoded = pairs("?a=one+two&b=%26");
        assert_eq!(
            decoded,
            vec![
                ("a".to_string(), "one two".to_string()),
                ("b".to_string(), "&".to_string())
            ]
        );
    }
}
