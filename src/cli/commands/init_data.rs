use anyhow::bail;
use chrono::Utc;
use clap::Subcommand;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::cli::utils::{output_error, output_fields, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::init_data::{self, AuthContext, IdentityField, InitDataVerifier, ParsedIdentity};

#[derive(Subcommand)]
pub enum InitDataCommands {
    #[command(about = "Print a signed init data string for local testing")]
    Sign {
        #[arg(long, help = "User id placed in the user JSON")]
        user_id: String,
        #[arg(long, help = "First name placed in the user JSON")]
        first_name: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long, help = "Classroom context key (start_param)")]
        start_param: Option<String>,
        #[arg(long, help = "Unix seconds; defaults to now")]
        auth_date: Option<i64>,
        #[arg(long, help = "Bot token; defaults to BOT_TOKEN")]
        bot_token: Option<String>,
    },

    #[command(about = "Parse init data and check its signature")]
    Verify {
        #[arg(help = "Raw init data string")]
        raw: String,
        #[arg(long, help = "Bot token; defaults to BOT_TOKEN")]
        bot_token: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyReport {
    valid: bool,
    user: Option<ParsedIdentity>,
    user_error: Option<String>,
    context: AuthContext,
}

pub async fn handle(cmd: InitDataCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        InitDataCommands::Sign {
            user_id,
            first_name,
            username,
            start_param,
            auth_date,
            bot_token,
        } => {
            let verifier = InitDataVerifier::new(&resolve_token(bot_token)?);
            let user = user_json(&user_id, &first_name, username.as_deref());
            let auth_date = auth_date.unwrap_or_else(|| Utc::now().timestamp()).to_string();

            let mut fields: Vec<(&str, &str)> = vec![
                (init_data::codec::USER_FIELD, user.as_str()),
                (init_data::codec::AUTH_DATE_FIELD, auth_date.as_str()),
            ];
            if let Some(start_param) = start_param.as_deref() {
                fields.push((init_data::codec::START_PARAM_FIELD, start_param));
            }
            let signed = verifier.sign(&fields);

            match output_format {
                OutputFormat::Json => {
                    output_success(&output_format, "Init data signed", Some(&json!({ "initData": signed })))
                }
                OutputFormat::Text => {
                    println!("{}", signed);
                    Ok(())
                }
            }
        }
        InitDataCommands::Verify { raw, bot_token } => {
            let verifier = InitDataVerifier::new(&resolve_token(bot_token)?);
            let parsed = init_data::parse(&raw);
            let (user, user_error) = match parsed.identity.clone() {
                IdentityField::Present(user) => (Some(user), None),
                IdentityField::Malformed(reason) => (None, Some(reason)),
                IdentityField::Absent => (None, None),
            };
            let report = VerifyReport {
                valid: verifier.verify(&raw),
                user,
                user_error,
                context: parsed.context,
            };

            if report.valid {
                output_success(&output_format, "Signature is valid", Some(&report))?;
            } else {
                output_error(&output_format, "Signature does not match", Some("SIGNATURE_MISMATCH"))?;
            }
            if let OutputFormat::Text = output_format {
                output_fields(&[
                    ("user id", report.user.as_ref().map(|u| u.user_id.clone())),
                    ("first name", report.user.as_ref().map(|u| u.first_name.clone())),
                    ("username", report.user.as_ref().and_then(|u| u.username.clone())),
                    ("user error", report.user_error.clone()),
                    ("context key", report.context.context_key.clone()),
                    ("chat type", report.context.chat_type.clone()),
                    ("auth date", report.context.auth_date.clone()),
                ]);
            }

            if !report.valid {
                bail!("init data signature does not match");
            }
            Ok(())
        }
    }
}

fn resolve_token(flag: Option<String>) -> anyhow::Result<String> {
    match flag.filter(|token| !token.trim().is_empty()) {
        Some(token) => Ok(token),
        None => Ok(AppConfig::from_env()?.security.bot_token.expose().to_string()),
    }
}

/// Numeric ids are written as JSON numbers, the way the platform sends them.
fn user_json(user_id: &str, first_name: &str, username: Option<&str>) -> String {
    let mut user = Map::new();
    let id = match user_id.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::from(user_id),
    };
    user.insert("id".into(), id);
    user.insert("first_name".into(), Value::from(first_name));
    if let Some(username) = username {
        user.insert("username".into(), Value::from(username));
    }
    Value::Object(user).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_json_matches_the_platform_shape() {
        assert_eq!(user_json("42", "Ana", None), r#"{"first_name":"Ana","id":42}"#);
        assert_eq!(
            user_json("u-7", "Bo", Some("bo")),
            r#"{"first_name":"Bo","id":"u-7","username":"bo"}"#
        );
    }

    #[test]
    fn signed_output_parses_back() {
        let verifier = InitDataVerifier::new("tok123");
        let user = user_json("42", "Ana", None);
        let signed = verifier.sign(&[("user", &user), ("auth_date", "1700000000"), ("start_param", "g1_0")]);
        let parsed = init_data::parse(&signed);
        assert!(verifier.verify(&signed));
        assert_eq!(parsed.user_id(), Some("42"));
        assert_eq!(parsed.context_key(), Some("g1_0"));
    }
}
