//! Server configuration
//!
//! Values come from an optional TOML file, then environment variables.
//! Later sources win.

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use snapseek_core::auth::{DEFAULT_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS};
use snapseek_core::Provider;
use snapseek_net::unsplash::{DEFAULT_PER_PAGE, MAX_PER_PAGE};
use snapseek_net::OAuthConfig;

/// Env var naming an explicit config file
pub const CONFIG_ENV: &str = "SNAPSEEK_CONFIG";

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "snapseek.toml";

/// Shortest accepted cookie signing secret, in bytes
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("SESSION_SECRET is not set")]
    MissingSecret,

    #[error("SESSION_SECRET must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,

    #[error("Could not determine data directory")]
    NoDataDir,
}

/// Client credentials for one identity provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub callback_url: Option<String>,
}

impl ProviderSettings {
    /// Usable credentials, or `None` when the provider is disabled
    pub fn oauth(&self, provider: Provider, public_url: &str) -> Option<OAuthConfig> {
        let client_id = self.client_id.as_deref().filter(|s| !s.is_empty())?;
        let client_secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;
        let callback_url = self.callback_url.clone().unwrap_or_else(|| {
            format!("{}/auth/{provider}/callback", public_url.trim_end_matches('/'))
        });

        Some(OAuthConfig {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            callback_url,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// SQLite file; the platform data dir when unset
    pub database: Option<PathBuf>,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    /// Front-end origin(s), comma separated. The first is the logout target.
    pub frontend_origin: String,
    pub login_success_url: String,
    pub login_failure_url: String,
    /// Base URL the server is reachable at, used for default callback URLs
    pub public_url: Option<String>,
    pub sweep_interval_secs: u64,
    pub unsplash_access_key: Option<String>,
    /// Images requested per search
    pub unsplash_per_page: u32,
    pub google: ProviderSettings,
    pub github: ProviderSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            database: None,
            session_secret: String::new(),
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            cookie_secure: false,
            frontend_origin: "http://localhost:3000".into(),
            login_success_url: "http://localhost:3000/".into(),
            login_failure_url: "http://localhost:3000/login".into(),
            public_url: None,
            sweep_interval_secs: 300,
            unsplash_access_key: None,
            unsplash_per_page: DEFAULT_PER_PAGE,
            google: ProviderSettings::default(),
            github: ProviderSettings::default(),
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if explicit.is_some() || path.exists() {
            info!(path = %path.display(), "Loading config file");
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overlay environment values read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SNAPSEEK_HOST") {
            self.host = v;
        }
        if let Some(v) = get("SNAPSEEK_PORT") {
            self.port = parse_var("SNAPSEEK_PORT", &v)?;
        }
        if let Some(v) = get("SNAPSEEK_DATABASE") {
            self.database = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SESSION_SECRET") {
            self.session_secret = v;
        }
        if let Some(v) = get("SESSION_TTL_HOURS") {
            self.session_ttl_hours = parse_var("SESSION_TTL_HOURS", &v)?;
        }
        if let Some(v) = get("COOKIE_SECURE") {
            self.cookie_secure = parse_var("COOKIE_SECURE", &v)?;
        }
        if let Some(v) = get("FRONTEND_ORIGIN") {
            self.frontend_origin = v;
        }
        if let Some(v) = get("LOGIN_SUCCESS_URL") {
            self.login_success_url = v;
        }
        if let Some(v) = get("LOGIN_FAILURE_URL") {
            self.login_failure_url = v;
        }
        if let Some(v) = get("SNAPSEEK_PUBLIC_URL") {
            self.public_url = Some(v);
        }
        if let Some(v) = get("SNAPSEEK_SWEEP_INTERVAL_SECS") {
            self.sweep_interval_secs = parse_var("SNAPSEEK_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("UNSPLASH_ACCESS_KEY") {
            self.unsplash_access_key = Some(v);
        }
        if let Some(v) = get("UNSPLASH_PER_PAGE") {
            self.unsplash_per_page = parse_var("UNSPLASH_PER_PAGE", &v)?;
        }

        for (settings, prefix) in [(&mut self.google, "GOOGLE"), (&mut self.github, "GITHUB")] {
            if let Some(v) = get(&format!("{prefix}_CLIENT_ID")) {
                settings.client_id = Some(v);
            }
            if let Some(v) = get(&format!("{prefix}_CLIENT_SECRET")) {
                settings.client_secret = Some(v);
            }
            if let Some(v) = get(&format!("{prefix}_CALLBACK_URL")) {
                settings.callback_url = Some(v);
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.session_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret);
        }
        if self.session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "session_ttl_hours",
                message: "must be positive".into(),
            });
        }
        if self.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(ConfigError::Invalid {
                key: "session_ttl_hours",
                message: format!("must not exceed {MAX_SESSION_TTL_HOURS}"),
            });
        }
        if !(1..=MAX_PER_PAGE).contains(&self.unsplash_per_page) {
            return Err(ConfigError::Invalid {
                key: "unsplash_per_page",
                message: format!("must be between 1 and {MAX_PER_PAGE}"),
            });
        }
        if self.origins().is_empty() {
            return Err(ConfigError::Invalid {
                key: "frontend_origin",
                message: "at least one origin is required".into(),
            });
        }
        if self.unsplash_access_key.is_none() {
            warn!("UNSPLASH_ACCESS_KEY is not set; image searches will fail");
        }
        Ok(())
    }

    pub fn origins(&self) -> Vec<&str> {
        self.frontend_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Where `GET /auth/logout` sends the browser
    pub fn frontend_url(&self) -> &str {
        self.origins()
            .first()
            .copied()
            .unwrap_or(self.frontend_origin.as_str())
    }

    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "snapseek", "snapseek").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join("snapseek.db"))
    }

    /// OAuth credentials for `provider`, if it is enabled
    pub fn oauth(&self, provider: Provider) -> Option<OAuthConfig> {
        let settings = match provider {
            Provider::Google => &self.google,
            Provider::GitHub => &self.github,
        };
        settings.oauth(provider, &self.public_url())
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.frontend_url(), "http://localhost:3000");
        assert_eq!(config.login_failure_url, "http://localhost:3000/login");
        assert!(config.oauth(Provider::Google).is_none());
    }

    #[test]
    fn test_missing_or_short_secret_rejected() {
        let mut config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::MissingSecret)));

        config.session_secret = "short".into();
        assert!(matches!(config.validate(), Err(ConfigError::WeakSecret)));

        config.session_secret = SECRET.into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
port = 8080
session_secret = "{SECRET}"
frontend_origin = "https://app.example"

[google]
client_id = "file-id"
client_secret = "file-secret"
"#
        )
        .unwrap();

        let mut config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 8080);

        config
            .apply_env(env_of(&[
                ("SNAPSEEK_PORT", "9090"),
                ("GOOGLE_CLIENT_ID", "env-id"),
                ("GITHUB_CLIENT_ID", "gh"),
            ]))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.port, 9090);
        let google = config.oauth(Provider::Google).unwrap();
        assert_eq!(google.client_id, "env-id");
        assert_eq!(google.client_secret, "file-secret");
        assert_eq!(
            google.callback_url,
            "http://localhost:9090/auth/google/callback"
        );
        // No secret, so GitHub stays disabled
        assert!(config.oauth(Provider::GitHub).is_none());
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_of(&[("SNAPSEEK_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SNAPSEEK_PORT", .. }));
    }

    #[test]
    fn test_multiple_origins() {
        let config = Config {
            frontend_origin: "https://a.example, https://b.example".into(),
            ..Config::default()
        };
        assert_eq!(config.origins(), vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.frontend_url(), "https://a.example");
    }

    #[test]
    fn test_explicit_callback_url_wins() {
        let config = Config::from_toml(
            r#"
[github]
client_id = "id"
client_secret = "secret"
callback_url = "https://api.example/auth/github/callback"
"#,
        )
        .unwrap();
        assert_eq!(
            config.oauth(Provider::GitHub).unwrap().callback_url,
            "https://api.example/auth/github/callback"
        );
    }

    #[test]
    fn test_session_ttl_bounds() {
        let mut config = Config {
            session_secret: SECRET.into(),
            ..Config::default()
        };
        config
            .apply_env(env_of(&[("SESSION_TTL_HOURS", "10000000000")]))
            .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "session_ttl_hours", .. })
        ));

        config.session_ttl_hours = 0;
        assert!(config.validate().is_err());

        config.session_ttl_hours = MAX_SESSION_TTL_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsplash_page_size() {
        let mut config = Config {
            session_secret: SECRET.into(),
            ..Config::default()
        };
        assert_eq!(config.unsplash_per_page, DEFAULT_PER_PAGE);

        config
            .apply_env(env_of(&[("UNSPLASH_PER_PAGE", "25")]))
            .unwrap();
        assert_eq!(config.unsplash_per_page, 25);
        assert!(config.validate().is_ok());

        config.unsplash_per_page = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "unsplash_per_page", .. })
        ));
    }
}
