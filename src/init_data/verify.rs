use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use super::codec::{self, HASH_FIELD};

type HmacSha256 = Hmac<Sha256>;

/// Fixed key the platform uses to derive the per-bot secret.
const WEB_APP_DATA: &[u8] = b"WebAppData";

/// Checks init data signatures for one bot token.
///
/// The secret key `HMAC-SHA256(key = "WebAppData", msg = token)` is derived once at
/// construction; the token itself is not retained.
#[derive(Clone)]
pub struct InitDataVerifier {
    secret_key: [u8; 32],
}

impl fmt::Debug for InitDataVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitDataVerifier").finish_non_exhaustive()
    }
}

impl InitDataVerifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            secret_key: hmac_sha256(WEB_APP_DATA, bot_token.as_bytes()),
        }
    }

    /// True only when `raw` carries a `hash` equal to the recomputed signature.
    pub fn verify(&self, raw: &str) -> bool {
        let Some((check_string, supplied)) = data_check_string(raw) else {
            return false;
        };
        let expected = self.sign_check_string(&check_string);
        expected.as_bytes().ct_eq(supplied.as_bytes()).into()
    }

    /// Lowercase hex signature over every field of `raw` except `hash`.
    pub fn expected_hash(&self, raw: &str) -> String {
        let mut fields = codec::pairs(raw);
        fields.retain(|(key, _)| key != HASH_FIELD);
        self.sign_check_string(&canonicalize(fields))
    }

    /// Encode `fields` and append their signature, producing a payload the
    /// platform client would send.
    pub fn sign(&self, fields: &[(&str, &str)]) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in fields {
            serializer.append_pair(key, value);
        }
        let unsigned = serializer.finish();
        let hash = self.expected_hash(&unsigned);
        form_urlencoded::Serializer::for_suffix(unsigned, 0)
            .append_pair(HASH_FIELD, &hash)
            .finish()
    }

    fn sign_check_string(&self, check_string: &str) -> String {
        hex::encode(hmac_sha256(&self.secret_key, check_string.as_bytes()))
    }
}

/// One-shot form of [`InitDataVerifier::verify`].
pub fn verify_signature(raw: &str, bot_token: &str) -> bool {
    InitDataVerifier::new(bot_token).verify(raw)
}

/// Split `raw` into its canonical data-check string and the supplied hash.
///
/// Every `hash` pair is removed; the first one is the supplied signature. Returns
/// `None` when no non-empty hash is present.
pub fn data_check_string(raw: &str) -> Option<(String, String)> {
    let mut fields = codec::pairs(raw);
    let supplied = fields
        .iter()
        .find(|(key, _)| key == HASH_FIELD)
        .map(|(_, value)| value.clone())
        .filter(|value| !value.is_empty())?;
    fields.retain(|(key, _)| key != HASH_FIELD);
    Some((canonicalize(fields), supplied))
}

fn canonicalize(mut fields: Vec<(String, String)>) -> String {
    // Stable byte-order sort on keys; values keep their relative order.
    fields.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    // HMAC takes keys of any length.
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(message);
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "tok123";
    const USER_JSON: &str = r#"{"id":42,"first_name":"Ana"}"#;
    const UNSIGNED_A: &str =
        "user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ana%22%7D&auth_date=1700000000&start_param=g1_0";

    fn signed_a() -> String {
        let hash = InitDataVerifier::new(TOKEN).expected_hash(UNSIGNED_A);
        format!("{UNSIGNED_A}&hash={hash}")
    }

    #[test]
    fn matches_an_independent_computation() {
        let mut mac = HmacSha256::new_from_slice(b"WebAppData").unwrap();
        mac.update(TOKEN.as_bytes());
        let secret = mac.finalize().into_bytes();

        let check_string = format!("auth_date=1700000000\nstart_param=g1_0\nuser={USER_JSON}");
        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(check_string.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(InitDataVerifier::new(TOKEN).expected_hash(UNSIGNED_A), expected);
        assert!(verify_signature(&format!("{UNSIGNED_A}&hash={expected}"), TOKEN));
    }

    #[test]
    fn builds_sorted_data_check_string() {
        let (check, hash) = data_check_string(&signed_a()).unwrap();
        assert_eq!(check, format!("auth_date=1700000000\nstart_param=g1_0\nuser={USER_JSON}"));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn verifies_scenario_a() {
        assert!(verify_signature(&signed_a(), TOKEN));
    }

    #[test]
    fn rejects_other_hashes_and_secrets() {
        let forged = format!("{UNSIGNED_A}&hash={}", "0".repeat(64));
        assert!(!verify_signature(&forged, TOKEN));
        assert!(!verify_signature(&signed_a(), "tok124"));
        let upper = format!(
            "{UNSIGNED_A}&hash={}",
            InitDataVerifier::new(TOKEN).expected_hash(UNSIGNED_A).to_uppercase()
        );
        assert!(!verify_signature(&upper, TOKEN));
    }

    #[test]
    fn missing_or_empty_hash_fails() {
        assert!(!verify_signature(UNSIGNED_A, TOKEN));
        assert!(!verify_signature(&format!("{UNSIGNED_A}&hash="), TOKEN));
        assert!(!verify_signature("", TOKEN));
        assert!(!verify_signature("garbage", TOKEN));
    }

    #[test]
    fn field_order_does_not_matter() {
        let hash = InitDataVerifier::new(TOKEN).expected_hash(UNSIGNED_A);
        let permuted = format!(
            "start_param=g1_0&hash={hash}&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Ana%22%7D&auth_date=1700000000"
        );
        assert!(verify_signature(&permuted, TOKEN));
    }

    #[test]
    fn any_single_character_mutation_fails() {
        let verifier = InitDataVerifier::new(TOKEN);
        let raw = verifier.sign(&[
            ("user", USER_JSON),
            ("auth_date", "1700000000"),
            ("start_param", "g1_0"),
            ("chat_instance", "-5512"),
        ]);
        assert!(verifier.verify(&raw));

        let fields = codec::pairs(&raw);
        for (index, (key, value)) in fields.iter().enumerate() {
            if key == HASH_FIELD {
                continue;
            }
            for position in 0..value.len() {
                if !value.is_char_boundary(position) {
                    continue;
                }
                let mut mutated_value = value.clone();
                let original = mutated_value.remove(position);
                mutated_value.insert(position, if original == 'x' { 'y' } else { 'x' });

                let mut mutated = fields.clone();
                mutated[index].1 = mutated_value;
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(mutated.iter())
                    .finish();
                assert!(!verifier.verify(&encoded), "mutation of {key} at {position} verified");
            }
        }
    }

    #[test]
    fn sign_produces_verifiable_payloads() {
        let verifier = InitDataVerifier::new(TOKEN);
        let raw = verifier.sign(&[("user", USER_JSON), ("start_param", "-100_7")]);
        assert!(verifier.verify(&raw));
        let parsed = codec::parse(&raw);
        assert_eq!(parsed.user_id(), Some("42"));
        assert_eq!(parsed.context_key(), Some("-100_7"));
    }

    #[test]
    fn debug_output_hides_key_material() {
        let rendered = format!("{:?}", InitDataVerifier::new(TOKEN));
        assert_eq!(rendered, "InitDataVerifier { .. }");
    }
}
