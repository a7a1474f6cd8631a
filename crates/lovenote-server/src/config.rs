use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::FixedOffset;
use thiserror::Error;

const REQUIRED: &[&str] = &[
    "LOVENOTE_ADMIN_TOKEN",
    "LOVENOTE_CLIENT_TOKEN",
    "LOVENOTE_CRON_SECRET",
    "GEMINI_API_KEY",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "VAPID_PUBLIC_KEY",
    "VAPID_PRIVATE_KEY_FILE",
    "VAPID_SUBJECT",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Validated process configuration. Built once at startup; any problem is fatal.
#[derive(Debug, Clone)]
pub struct Config {
    pub admin_token: String,
    pub client_token: String,
    pub cron_secret: String,

    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub local_offset: FixedOffset,
    pub city: Option<String>,
    pub scheduler_every: Duration,

    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_url: String,

    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_api_url: String,

    pub vapid_public_key: String,
    pub vapid_private_key_file: PathBuf,
    pub vapid_subject: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Reports every missing required key at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&'static str> = REQUIRED.iter().copied().filter(|key| get(*key).is_none()).collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        let required = |key: &'static str| get(key).unwrap_or_default();

        let admin_token = required("LOVENOTE_ADMIN_TOKEN");
        let client_token = required("LOVENOTE_CLIENT_TOKEN");
        if admin_token == client_token {
            return Err(ConfigError::Invalid {
                key: "LOVENOTE_CLIENT_TOKEN",
                reason: "must differ from LOVENOTE_ADMIN_TOKEN".into(),
            });
        }

        let port = parse_or("LOVENOTE_PORT", get("LOVENOTE_PORT"), 3000u16)?;
        let offset_hours = parse_or("LOVENOTE_UTC_OFFSET_HOURS", get("LOVENOTE_UTC_OFFSET_HOURS"), 7i32)?;
        let local_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                key: "LOVENOTE_UTC_OFFSET_HOURS",
                reason: format!("{} is out of range", offset_hours),
            })?;
        let scheduler_secs = parse_or("LOVENOTE_SCHEDULER_SECS", get("LOVENOTE_SCHEDULER_SECS"), 60u64)?;
        if scheduler_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "LOVENOTE_SCHEDULER_SECS",
                reason: "must be positive".into(),
            });
        }

        let vapid_public_key = required("VAPID_PUBLIC_KEY");
        validate_vapid_public_key(&vapid_public_key)?;

        Ok(Self {
            admin_token,
            client_token,
            cron_secret: required("LOVENOTE_CRON_SECRET"),
            db_path: PathBuf::from(get("LOVENOTE_DB_PATH").unwrap_or_else(|| "lovenote.db".into())),
            host: get("LOVENOTE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            local_offset,
            city: get("LOVENOTE_CITY"),
            scheduler_every: Duration::from_secs(scheduler_secs),
            gemini_api_key: required("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".into()),
            gemini_api_url: get("GEMINI_API_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: required("TELEGRAM_CHAT_ID"),
            telegram_api_url: get("TELEGRAM_API_URL").unwrap_or_else(|| "https://api.telegram.org".into()),
            vapid_public_key,
            vapid_private_key_file: PathBuf::from(required("VAPID_PRIVATE_KEY_FILE")),
            vapid_subject: required("VAPID_SUBJECT"),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

/// Browsers expect an uncompressed P-256 point (65 bytes), base64url encoded.
fn validate_vapid_public_key(key: &str) -> Result<(), ConfigError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(key.trim_end_matches('='))
        .map_err(|e| ConfigError::Invalid {
            key: "VAPID_PUBLIC_KEY",
            reason: e.to_string(),
        })?;
    if bytes.len() != 65 || bytes[0] != 0x04 {
        return Err(ConfigError::Invalid {
            key: "VAPID_PUBLIC_KEY",
            reason: format!("expected a 65-byte uncompressed point, got {} bytes", bytes.len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn public_key() -> String {
        let mut point = vec![0x04u8];
        point.extend([7u8; 64]);
        URL_SAFE_NO_PAD.encode(point)
    }

    fn full_env() -> HashMap<&'static str, String> {
        let mut env: HashMap<&'static str, String> = REQUIRED.iter().map(|k| (*k, format!("value-{}", k))).collect();
        env.insert("VAPID_PUBLIC_KEY", public_key());
        env
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.local_offset, FixedOffset::east_opt(7 * 3600).unwrap());
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.scheduler_every, Duration::from_secs(60));
        assert_eq!(config.db_path, PathBuf::from("lovenote.db"));
        assert!(config.city.is_none());
    }

    #[test]
    fn every_missing_key_is_reported() {
        let mut env = full_env();
        env.remove("GEMINI_API_KEY");
        env.remove("TELEGRAM_CHAT_ID");
        env.insert("VAPID_SUBJECT", "   ".into());

        match load(&env) {
            Err(ConfigError::Missing(keys)) => {
                assert_eq!(keys, vec!["GEMINI_API_KEY", "TELEGRAM_CHAT_ID", "VAPID_SUBJECT"]);
            }
            other => panic!("expected Missing, got {:?}", other),
        }

        let empty: HashMap<&'static str, String> = HashMap::new();
        match load(&empty) {
            Err(ConfigError::Missing(keys)) => assert_eq!(keys.len(), REQUIRED.len()),
            other => panic!("expected Missing, got {:?}", other),
        }
    }

    #[test]
    fn identical_role_tokens_are_rejected() {
        let mut env = full_env();
        env.insert("LOVENOTE_CLIENT_TOKEN", env["LOVENOTE_ADMIN_TOKEN"].clone());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "LOVENOTE_CLIENT_TOKEN", .. })));
    }

    #[test]
    fn bad_optional_values_are_fatal() {
        let mut env = full_env();
        env.insert("LOVENOTE_PORT", "http".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "LOVENOTE_PORT", .. })));

        let mut env = full_env();
        env.insert("LOVENOTE_UTC_OFFSET_HOURS", "30".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "LOVENOTE_UTC_OFFSET_HOURS", .. })));

        let mut env = full_env();
        env.insert("LOVENOTE_UTC_OFFSET_HOURS", i32::MAX.to_string());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "LOVENOTE_UTC_OFFSET_HOURS", .. })));

        let mut env = full_env();
        env.insert("VAPID_PUBLIC_KEY", "c2hvcnQ".into());
        assert!(matches!(load(&env), Err(ConfigError::Invalid { key: "VAPID_PUBLIC_KEY", .. })));
    }

    #[test]
    fn optional_overrides() {
        let mut env = full_env();
        env.insert("LOVENOTE_PORT", "8080".into());
        env.insert("LOVENOTE_UTC_OFFSET_HOURS", "-5".into());
        env.insert("LOVENOTE_CITY", "Huế".into());
        let config = load(&env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.local_offset, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(config.city.as_deref(), Some("Huế"));
    }
}
