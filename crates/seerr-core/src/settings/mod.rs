// ── Configuration sections ──
//
// The top-level settings document and the pass that reconciles every
// section in dependency order.

pub mod general;
pub mod jellyfin;
pub mod notifications;
pub mod services;
pub mod users;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::context::ReconcileContext;
use crate::error::{CoreError, SectionFailure};
use crate::reconcile::Section;

pub use general::GeneralSettings;
pub use jellyfin::JellyfinSettings;
pub use notifications::NotificationsSettings;
pub use services::ServicesSettings;
pub use users::UsersSettings;

/// Tree path of the settings document in log and error messages.
pub const ROOT_TREE: &str = "seerr.settings";

/// Every managed section of the remote instance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub general: GeneralSettings,
    pub jellyfin: JellyfinSettings,
    pub users: UsersSettings,
    pub services: ServicesSettings,
    pub notifications: NotificationsSettings,
}

impl Settings {
    /// Check constraints serde cannot express.
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        self.general.validate(&format!("{tree}.general"))?;
        self.services.validate(&format!("{tree}.services"))?;
        self.notifications.validate(&format!("{tree}.notifications"))?;
        Ok(())
    }

    /// Whether the instance has completed setup.
    pub async fn is_initialized(tree: &str, ctx: &ReconcileContext) -> Result<bool, CoreError> {
        JellyfinSettings::is_initialized(&format!("{tree}.jellyfin"), ctx).await
    }

    /// Run the one-time setup using the Jellyfin section's credentials.
    pub async fn initialize(&self, tree: &str, ctx: &ReconcileContext) -> Result<(), CoreError> {
        self.jellyfin
            .initialize(&format!("{tree}.jellyfin"), ctx)
            .await
    }
}

/// Record the outcome of one section and keep going.
fn record(
    tree: String,
    result: Result<bool, CoreError>,
    changed: &mut bool,
    failures: &mut Vec<SectionFailure>,
) {
    match result {
        Ok(section_changed) => *changed |= section_changed,
        Err(err) => {
            error!("{tree}: {err}");
            failures.push(SectionFailure {
                tree,
                error: Box::new(err),
            });
        }
    }
}

impl Section for Settings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        Ok(Self {
            general: GeneralSettings::from_remote(&format!("{tree}.general"), ctx).await?,
            jellyfin: JellyfinSettings::from_remote(&format!("{tree}.jellyfin"), ctx).await?,
            users: UsersSettings::from_remote(&format!("{tree}.users"), ctx).await?,
            services: ServicesSettings::from_remote(&format!("{tree}.services"), ctx).await?,
            notifications: NotificationsSettings::from_remote(
                &format!("{tree}.notifications"),
                ctx,
            )
            .await?,
        })
    }

    /// Sections run in order; a failing section is logged and the rest
    /// still run. Any failure fails the pass once every section has run.
    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        let mut changed = false;
        let mut failures = Vec::new();

        let t = format!("{tree}.general");
        let result = self.general.update_remote(&t, ctx, &remote.general).await;
        record(t, result, &mut changed, &mut failures);

        let t = format!("{tree}.jellyfin");
        let result = self.jellyfin.update_remote(&t, ctx, &remote.jellyfin).await;
        record(t, result, &mut changed, &mut failures);

        let t = format!("{tree}.users");
        let result = self.users.update_remote(&t, ctx, &remote.users).await;
        record(t, result, &mut changed, &mut failures);

        let t = format!("{tree}.services");
        let result = self.services.update_remote(&t, ctx, &remote.services).await;
        record(t, result, &mut changed, &mut failures);

        let t = format!("{tree}.notifications");
        let result = self
            .notifications
            .update_remote(&t, ctx, &remote.notifications)
            .await;
        record(t, result, &mut changed, &mut failures);

        if !failures.is_empty() {
            return Err(CoreError::SectionsFailed { failures });
        }
        if changed {
            info!("{tree}: remote configuration updated");
        } else {
            info!("{tree}: remote configuration is up to date");
        }
        Ok(changed)
    }
}
