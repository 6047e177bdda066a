// ── Reconciliation context ──
//
// Everything a reconciliation pass needs from its surroundings, passed
// explicitly to every section: the API client (credential, timeout,
// dry-run flag) and the capability to look up other managed instances'
// secrets.

use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;

use crate::error::CoreError;
use crate::remote_map::DiffOptions;
use seerr_api::SeerrClient;

/// Looks up the credential of another managed instance by plugin and name
/// (e.g. the API key of the Sonarr instance called `"sonarr-4k"`).
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, plugin: &str, instance: &str) -> Option<SecretString>;
}

/// A resolver that knows no instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretResolver for NoSecrets {
    fn resolve(&self, _plugin: &str, _instance: &str) -> Option<SecretString> {
        None
    }
}

/// Shared state for one reconciliation pass.
#[derive(Clone)]
pub struct ReconcileContext {
    client: SeerrClient,
    secrets: Arc<dyn SecretResolver>,
    check_unmanaged: bool,
}

impl ReconcileContext {
    pub fn new(client: SeerrClient) -> Self {
        Self {
            client,
            secrets: Arc::new(NoSecrets),
            check_unmanaged: false,
        }
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretResolver>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Report up-to-date attributes at `info` level.
    pub fn with_check_unmanaged(mut self, check_unmanaged: bool) -> Self {
        self.check_unmanaged = check_unmanaged;
        self
    }

    pub fn client(&self) -> &SeerrClient {
        &self.client
    }

    pub fn is_dry_run(&self) -> bool {
        self.client.is_dry_run()
    }

    /// Diff options for single-object sections.
    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions {
            check_unmanaged: self.check_unmanaged,
            set_unchanged: false,
        }
    }

    /// Resolve another instance's secret, failing if it is unknown.
    pub fn resolve_instance_secret(
        &self,
        plugin: &str,
        instance: &str,
    ) -> Result<SecretString, CoreError> {
        self.secrets
            .resolve(plugin, instance)
            .ok_or_else(|| CoreError::SecretNotFound {
                plugin: plugin.to_owned(),
                instance: instance.to_owned(),
            })
    }
}

impl fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("client", &self.client)
            .field("check_unmanaged", &self.check_unmanaged)
            .finish_non_exhaustive()
    }
}
