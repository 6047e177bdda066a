//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use seerr_config::{ConfigError, KEYRING_SERVICE};
use seerr_core::{ApiError, CoreError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFIG: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to the instance at {url}")]
    #[diagnostic(
        code(seerr::connection_failed),
        help(
            "Check that the instance is running and reachable.\n\
             For self-signed certificates, try --insecure (-k) or set ca_cert."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: ApiError,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(seerr::auth_failed),
        help("Verify the API key under Settings > General on the instance.")
    )]
    AuthFailed { message: String },

    #[error("No API key configured for '{host}'")]
    #[diagnostic(
        code(seerr::no_credentials),
        help(
            "Set api_key_env to the name of a variable holding the key,\n\
             store it in the system keyring (service '{service}', user '{host}/api-key'),\n\
             or set api_key in the config document."
        )
    )]
    NoCredentials { host: String, service: String },

    // ── Remote ───────────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(seerr::api_error))]
    Api(ApiError),

    #[error("{0}")]
    #[diagnostic(
        code(seerr::already_configured),
        help("Delete the instance's data directory and run apply again.")
    )]
    AlreadyConfigured(String),

    #[error("{count} section(s) failed to reconcile")]
    #[diagnostic(code(seerr::sections_failed), help("{summary}"))]
    SectionsFailed { count: usize, summary: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(seerr::invalid_config))]
    InvalidConfig(String),

    #[error("Configuration file not found")]
    #[diagnostic(
        code(seerr::no_config),
        help("Expected at: {path}\nPass another location with --config.")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(seerr::config))]
    Config(Box<figment::Error>),

    // ── Usage ────────────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(seerr::validation))]
    Validation { field: String, reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Unable to render YAML: {0}")]
    #[diagnostic(code(seerr::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::InvalidConfig(_) | Self::NoConfig { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => Self::ConnectionFailed {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
                source: ApiError::Transport(e),
            },
            ApiError::Tls(message) => Self::ConnectionFailed {
                url: String::new(),
                source: ApiError::Tls(message),
            },
            ApiError::Api {
                status: 401 | 403,
                message,
                ..
            }
            | ApiError::InvalidApiKey(message) => Self::AuthFailed { message },
            other => Self::Api(other),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Api(api) => api.into(),
            CoreError::AlreadyConfigured => Self::AlreadyConfigured(err.to_string()),
            CoreError::SectionsFailed { ref failures } => Self::SectionsFailed {
                count: failures.len(),
                summary: failures
                    .iter()
                    .map(|f| format!("[{}] {}", f.tree, f.error))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
            CoreError::Validation { .. }
            | CoreError::Mapping { .. }
            | CoreError::SecretNotFound { .. } => Self::InvalidConfig(err.to_string()),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { .. } => Self::InvalidConfig(err.to_string()),
            ConfigError::NoCredentials { host } => Self::NoCredentials {
                host,
                service: KEYRING_SERVICE.into(),
            },
            ConfigError::NotFound(path) => Self::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Io(err) => Self::Io(err),
            ConfigError::Core(err) => err.into(),
        }
    }
}
