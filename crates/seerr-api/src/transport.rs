// Connection options for the HTTP client behind `SeerrClient`: request
// timeout and how the instance's certificate is verified.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("seerr/", env!("CARGO_PKG_VERSION"));

/// How the instance's TLS certificate is verified.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    #[default]
    System,
    /// Trust the CA in the given PEM file in addition to the system roots.
    CustomCa(PathBuf),
    /// No verification (`--insecure`).
    DangerAcceptInvalid,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Build the client. It always keeps a cookie store: the bootstrap
    /// sequence signs in once and the follow-up calls reuse that session.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_store(true)
            .user_agent(USER_AGENT);
        let builder = match &self.tls {
            TlsMode::System => builder,
            TlsMode::CustomCa(path) => builder.add_root_certificate(load_ca(path)?),
            TlsMode::DangerAcceptInvalid => builder.danger_accept_invalid_certs(true),
        };
        builder
            .build()
            .map_err(|e| Error::Tls(format!("unable to build the HTTP client: {e}")))
    }
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path).map_err(|e| {
        Error::Tls(format!("unable to read CA certificate '{}': {e}", path.display()))
    })?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::Tls(format!("invalid CA certificate '{}': {e}", path.display())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_ca_file_is_a_tls_error() {
        let transport = TransportConfig::default()
            .with_tls(TlsMode::CustomCa("/nonexistent/seerr-ca.pem".into()));
        let err = transport.build_client().unwrap_err();
        assert!(matches!(err, Error::Tls(ref message) if message.contains("seerr-ca.pem")));
    }

    #[test]
    fn insecure_mode_builds() {
        let transport = TransportConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_tls(TlsMode::DangerAcceptInvalid);
        assert!(transport.build_client().is_ok());
    }
}
