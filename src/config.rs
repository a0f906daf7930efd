use std::path::PathBuf;

use chrono::Duration;
use serde::Deserialize;
use tracing::warn;

/// Server configuration, read from the environment (and `.env`, when present).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_blob_root")]
    pub blob_root: PathBuf,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_enable_setup")]
    pub enable_setup: bool,
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("./storage/submissions")
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_enable_setup() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        if let Err(err) = dotenvy::dotenv() {
            warn!("Could not load config from .env file: {err}");
        }
        envy::from_env::<AppConfig>()
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_ttl_hours.max(1))
    }

    /// The credential `POST /setup` provisions, when both halves are configured.
    pub fn admin_credential(&self) -> Option<(&str, &str)> {
        let email = self.admin_email.as_deref().map(str::trim)?;
        let password = self.admin_password.as_deref()?;
        if email.is_empty() || password.is_empty() {
            return None;
        }
        Some((email, password))
    }
}

#[cfg(all(test, feature = "ssr"))]
mod tests {
    use super::*;

    fn parse(vars: &[(&str, &str)]) -> Result<AppConfig, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[("DATABASE_URL", "portal.db")]).expect("config");
        assert_eq!(config.database_url, "portal.db");
        assert_eq!(config.blob_root, PathBuf::from("./storage/submissions"));
        assert_eq!(config.session_ttl(), Duration::hours(24));
        assert!(config.enable_setup);
        assert_eq!(config.admin_credential(), None);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            ("DATABASE_URL", "portal.db"),
            ("BLOB_ROOT", "/srv/bucket"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "secret"),
            ("SESSION_TTL_HOURS", "2"),
            ("ENABLE_SETUP", "false"),
        ])
        .expect("config");
        assert_eq!(config.blob_root, PathBuf::from("/srv/bucket"));
        assert_eq!(config.session_ttl(), Duration::hours(2));
        assert!(!config.enable_setup);
        assert_eq!(
            config.admin_credential(),
            Some(("admin@example.com", "secret"))
        );
    }

    #[test]
    fn test_database_url_required() {
        assert!(parse(&[("BLOB_ROOT", "/srv/bucket")]).is_err());
    }
}
