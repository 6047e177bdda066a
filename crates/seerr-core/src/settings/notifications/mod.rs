// Notification agents.

pub mod email;

use serde::{Deserialize, Serialize};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::reconcile::Section;

pub use email::{EmailSettings, EncryptionMethod};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsSettings {
    pub email: EmailSettings,
}

impl NotificationsSettings {
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        self.email.validate(&format!("{tree}.email"))
    }
}

impl Section for NotificationsSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        Ok(Self {
            email: EmailSettings::from_remote(&format!("{tree}.email"), ctx).await?,
        })
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        self.email
            .update_remote(&format!("{tree}.email"), ctx, &remote.email)
            .await
    }
}
