// Linked *arr services.

pub mod sonarr;

use serde::{Deserialize, Serialize};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::reconcile::Section;

pub use sonarr::{Sonarr, SonarrSettings};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServicesSettings {
    pub sonarr: SonarrSettings,
}

impl ServicesSettings {
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        self.sonarr.validate(&format!("{tree}.sonarr"))
    }
}

impl Section for ServicesSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        Ok(Self {
            sonarr: SonarrSettings::from_remote(&format!("{tree}.sonarr"), ctx).await?,
        })
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        self.sonarr
            .update_remote(&format!("{tree}.sonarr"), ctx, &remote.sonarr)
            .await
    }
}
