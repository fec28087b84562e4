use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Process-wide configuration, loaded once at startup and handed to the server
/// and the CLI by value.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` runs against the in-memory store.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub bot_token: BotToken,
    pub session_max_age_secs: i64,
    pub session_cookie_secure: bool,
    /// Maximum accepted age of `auth_date` on writes. Unset means no freshness check.
    pub init_data_max_age: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Needed to build mini-app deep links.
    pub bot_username: Option<String>,
    pub app_name: String,
}

/// Bot token; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct BotToken(String);

impl BotToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(***)")
    }
}

const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24;

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// Fails fast when no bot token is configured: nothing can be verified without it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = var("BOT_TOKEN")
            .or_else(|| var("TELEGRAM_BOT_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing("BOT_TOKEN"))?;

        let base = match var("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Self::production(token),
            Some("staging") | Some("stage") => Self::staging(token),
            _ => Self::development(token),
        };

        base.with_overrides(var)
    }

    fn with_overrides<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = var("CLASSROOM_API_PORT").or_else(|| var("PORT")) {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = var("SECURITY_CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Database overrides
        self.database.url = var("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("DATABASE_MAX_CONNECTIONS", &v)?;
        }

        // Security overrides
        if let Some(v) = var("SESSION_MAX_AGE_SECS") {
            self.security.session_max_age_secs = parse_var("SESSION_MAX_AGE_SECS", &v)?;
        }
        if let Some(v) = var("SESSION_COOKIE_SECURE") {
            self.security.session_cookie_secure = parse_var("SESSION_COOKIE_SECURE", &v)?;
        }
        if let Some(v) = var("INIT_DATA_MAX_AGE_SECS") {
            let secs: u64 = parse_var("INIT_DATA_MAX_AGE_SECS", &v)?;
            self.security.init_data_max_age = (secs > 0).then(|| Duration::from_secs(secs));
        }

        // Telegram overrides
        self.telegram.bot_username = var("TELEGRAM_BOT_USERNAME")
            .map(|name| name.trim().trim_start_matches('@').to_string())
            .filter(|name| !name.is_empty());
        if let Some(v) = var("TELEGRAM_APP_NAME").filter(|v| !v.trim().is_empty()) {
            self.telegram.app_name = v.trim().to_string();
        }

        Ok(self)
    }

    pub fn development(bot_token: impl Into<String>) -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 3000,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
            },
            security: SecurityConfig {
                bot_token: BotToken::new(bot_token),
                session_max_age_secs: SESSION_MAX_AGE_SECS,
                session_cookie_secure: false,
                init_data_max_age: None,
            },
            telegram: TelegramConfig {
                bot_username: None,
                app_name: "app".to_string(),
            },
        }
    }

    pub fn staging(bot_token: impl Into<String>) -> Self {
        let mut config = Self::development(bot_token);
        config.environment = Environment::Staging;
        config.server.cors_origins = vec!["https://web.telegram.org".to_string()];
        config.database.max_connections = 20;
        config.security.session_cookie_secure = true;
        config
    }

    pub fn production(bot_token: impl Into<String>) -> Self {
        let mut config = Self::development(bot_token);
        config.environment = Environment::Production;
        config.server.cors_origins = vec!["https://web.telegram.org".to_string()];
        config.database.max_connections = 50;
        config.security.session_cookie_secure = true;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn bot_token_is_required() {
        assert_eq!(
            AppConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::Missing("BOT_TOKEN")
        );
        assert!(AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "  ")])).is_err());
    }

    #[test]
    fn falls_back_to_the_bot_process_variable() {
        let config = AppConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "tok")])).unwrap();
        assert_eq!(config.security.bot_token.expose(), "tok");
    }

    #[test]
    fn default_development_config() {
        let config = AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "tok")])).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.port, 3000);
        assert!(config.database.url.is_none());
        assert!(!config.security.session_cookie_secure);
        assert!(config.security.init_data_max_age.is_none());
        assert_eq!(config.telegram.app_name, "app");
    }

    #[test]
    fn production_preset_with_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BOT_TOKEN", "tok"),
            ("APP_ENV", "prod"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/classroom"),
            ("INIT_DATA_MAX_AGE_SECS", "86400"),
            ("TELEGRAM_BOT_USERNAME", "@class_bot"),
        ]))
        .unwrap();
        assert!(config.is_production());
        assert!(config.security.session_cookie_secure);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/classroom"));
        assert_eq!(config.security.init_data_max_age, Some(Duration::from_secs(86400)));
        assert_eq!(config.telegram.bot_username.as_deref(), Some("class_bot"));
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("BOT_TOKEN", "tok"), ("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn debug_output_hides_the_token() {
        let config = AppConfig::development("secret-token");
        assert!(!format!("{config:?}").contains("secret-token"));
    }
}
