//! Configuration for the seerr reconciler.
//!
//! One YAML document (connection details plus the desired [`Settings`]),
//! overlaid with `SEERR_*` environment variables, API-key resolution
//! (env + keyring + plaintext) and translation to a [`ReconcileContext`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use seerr_core::{
    CoreError, ROOT_TREE, ReconcileContext, SecretResolver, Secret, SeerrClient, Settings,
    TlsMode, TransportConfig,
};

/// Keyring service under which API keys are stored.
pub const KEYRING_SERVICE: &str = "seerr";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for '{host}'")]
    NoCredentials { host: String },

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config document ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Secrets of one linked instance, as stored in the `instances` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSecret {
    pub api_key: Secret,
}

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hostname: String,
    pub port: u16,
    pub protocol: Protocol,
    pub url_base: Option<String>,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<Secret>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout: u64,

    /// Accept invalid TLS certificates.
    pub insecure: bool,

    /// Path to an extra PEM root certificate.
    pub ca_cert: Option<PathBuf>,

    /// Report up-to-date attributes at info level.
    pub check_unmanaged: bool,

    pub settings: Settings,

    /// Secrets of linked instances, by plugin then instance name.
    pub instances: BTreeMap<String, BTreeMap<String, InstanceSecret>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hostname: "localhost".into(),
            port: 5055,
            protocol: Protocol::Http,
            url_base: None,
            api_key: None,
            api_key_env: None,
            request_timeout: 30,
            insecure: false,
            ca_cert: None,
            check_unmanaged: false,
            settings: Settings::default(),
            instances: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Base URL of the managed instance, e.g. `http://localhost:5055/seerr`.
    pub fn host_url(&self) -> String {
        let base = self
            .url_base
            .as_deref()
            .map(|b| b.trim_matches('/'))
            .filter(|b| !b.is_empty())
            .map(|b| format!("/{b}"))
            .unwrap_or_default();
        format!(
            "{}://{}:{}{base}",
            self.protocol.scheme(),
            self.hostname,
            self.port
        )
    }

    /// Check connection fields and the desired settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "hostname".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Validation {
                field: "request_timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        url::Url::parse(&self.host_url()).map_err(|e| ConfigError::Validation {
            field: "hostname".into(),
            reason: format!("invalid URL '{}': {e}", self.host_url()),
        })?;
        self.settings.validate(ROOT_TREE)?;
        Ok(())
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        TransportConfig::default()
            .with_timeout(Duration::from_secs(self.request_timeout))
            .with_tls(tls)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "seerr", "seerr").map_or_else(
        || PathBuf::from("seerr.yaml"),
        |dirs| dirs.config_dir().join("config.yaml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered figment: defaults, then the YAML file, then `SEERR_*`
/// variables (`__` separates nested keys).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Yaml::file(path))
        .merge(Env::prefixed("SEERR_").split("__").ignore(&["config"]))
}

/// Load and validate the config document at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let config: Config = figment(path).extract()?;
    config.validate()?;
    debug!("loaded configuration for {}", config.host_url());
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the managed instance's API key.
///
/// Order: the variable named by `api_key_env`, the system keyring entry
/// `"{host_url}/api-key"`, then the plaintext `api_key`.
pub fn resolve_api_key(config: &Config) -> Result<SecretString, ConfigError> {
    let host = config.host_url();

    // 1. Env var named by the config
    if let Some(ref env_name) = config.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
        debug!("environment variable '{env_name}' is not set");
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{host}/api-key")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = config.api_key {
        return Ok(key.as_secret_string().clone());
    }

    Err(ConfigError::NoCredentials { host })
}

// ── Cross-instance secrets ──────────────────────────────────────────

/// The `instances` table, exposed to the reconciler as a [`SecretResolver`].
#[derive(Debug, Clone, Default)]
pub struct InstanceSecrets {
    instances: BTreeMap<String, BTreeMap<String, Secret>>,
}

impl InstanceSecrets {
    pub fn from_config(config: &Config) -> Self {
        let instances = config
            .instances
            .iter()
            .map(|(plugin, named)| {
                let keys = named
                    .iter()
                    .map(|(name, secret)| (name.clone(), secret.api_key.clone()))
                    .collect();
                (plugin.clone(), keys)
            })
            .collect();
        Self { instances }
    }
}

impl SecretResolver for InstanceSecrets {
    fn resolve(&self, plugin: &str, instance: &str) -> Option<SecretString> {
        self.instances
            .get(plugin)
            .and_then(|named| named.get(instance))
            .map(|secret| secret.as_secret_string().clone())
    }
}

// ── Context ─────────────────────────────────────────────────────────

/// Build the reconciliation context for the configured instance.
pub fn build_context(config: &Config, dry_run: bool) -> Result<ReconcileContext, ConfigError> {
    let api_key = resolve_api_key(config)?;
    let client = SeerrClient::new(&config.host_url(), &config.transport())
        .map_err(CoreError::from)?
        .with_api_key(api_key)
        .with_dry_run(dry_run);
    Ok(ReconcileContext::new(client)
        .with_secrets(Arc::new(InstanceSecrets::from_config(config)))
        .with_check_unmanaged(config.check_unmanaged))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn host_url_normalizes_base() {
        let config = Config {
            protocol: Protocol::Https,
            hostname: "seerr.example.com".into(),
            port: 443,
            url_base: Some("/seerr/".into()),
            ..Config::default()
        };
        assert_eq!(config.host_url(), "https://seerr.example.com:443/seerr");
        assert_eq!(Config::default().host_url(), "http://localhost:5055");
    }

    #[test]
    fn insecure_wins_over_ca_cert() {
        let config = Config {
            insecure: true,
            ca_cert: Some("/etc/ca.pem".into()),
            request_timeout: 5,
            ..Config::default()
        };
        let transport = config.transport();
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(5));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = Config {
            request_timeout: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid request_timeout: must be at least 1 second"
        );
    }

    #[test]
    fn instance_secrets_resolve_by_plugin_and_name() {
        let mut sonarr = BTreeMap::new();
        sonarr.insert(
            "sonarr-4k".to_owned(),
            InstanceSecret {
                api_key: Secret::new("k4"),
            },
        );
        let config = Config {
            instances: BTreeMap::from([("sonarr".to_owned(), sonarr)]),
            ..Config::default()
        };
        let secrets = InstanceSecrets::from_config(&config);
        assert!(secrets.resolve("sonarr", "sonarr-4k").is_some());
        assert!(secrets.resolve("sonarr", "sonarr").is_none());
        assert!(secrets.resolve("radarr", "sonarr-4k").is_none());
    }
}
