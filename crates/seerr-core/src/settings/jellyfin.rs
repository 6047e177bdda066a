// Jellyfin media server link (`/api/v1/settings/jellyfin`) and the one-time
// instance bootstrap that authenticates against Jellyfin.

use std::collections::BTreeSet;

use seerr_api::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::model::Secret;
use crate::reconcile::{self, Endpoint, Section};
use crate::remote_map::{MapError, RemoteMap, RemoteMapEntry, codec};

const ENDPOINT: Endpoint =
    Endpoint::post("/api/v1/settings/jellyfin").expecting(StatusCode::OK);
const LIBRARY_PATH: &str = "/api/v1/settings/jellyfin/library";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JellyfinSettings {
    /// Jellyfin server URL. Only used during bootstrap.
    #[serde(alias = "hostname")]
    pub server_url: Option<String>,
    /// Jellyfin administrator. Only used during bootstrap.
    pub username: Option<String>,
    pub password: Option<Secret>,
    #[serde(alias = "email")]
    pub email_address: Option<String>,
    #[serde(alias = "external_hostname")]
    pub external_url: Option<String>,
    /// Names of the Jellyfin libraries to enable.
    pub libraries: BTreeSet<String>,
}

/// A Jellyfin library as reported by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

fn parse_libraries(tree: &str, body: Value) -> Result<Vec<Library>, CoreError> {
    serde_json::from_value(body).map_err(|e| CoreError::Mapping {
        tree: tree.to_owned(),
        message: format!("unable to parse library list: {e}"),
    })
}

fn decode_enabled_libraries(value: &Value) -> Result<Value, MapError> {
    let libraries: Vec<Library> =
        serde_json::from_value(value.clone()).map_err(|e| MapError::new(e.to_string()))?;
    let enabled: BTreeSet<String> = libraries
        .into_iter()
        .filter(|library| library.enabled)
        .map(|library| library.name)
        .collect();
    Ok(Value::from_iter(enabled))
}

/// Sorted IDs of the named libraries.
fn library_ids(libraries: &[Library], names: &BTreeSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = libraries
        .iter()
        .filter(|library| names.contains(&library.name))
        .map(|library| library.id.clone())
        .collect();
    ids.sort_unstable();
    ids
}

/// Every name in `names` must be a known library.
fn check_libraries(
    tree: &str,
    names: &BTreeSet<String>,
    libraries: &[Library],
) -> Result<(), CoreError> {
    let Some(unknown) = names
        .iter()
        .find(|name| !libraries.iter().any(|library| &library.name == *name))
    else {
        return Ok(());
    };
    let available = libraries
        .iter()
        .map(|library| format!("{:?}", library.name))
        .collect::<Vec<_>>()
        .join(", ");
    Err(CoreError::validation(
        format!("{tree}.libraries"),
        format!("library '{unknown}' not found in Jellyfin (available libraries: {available})"),
    ))
}

impl JellyfinSettings {
    /// `libraries` is the remote's current library list, used to encode
    /// library names to IDs.
    pub fn remote_map(libraries: &[Library]) -> RemoteMap {
        let libraries = libraries.to_vec();
        vec![
            RemoteMapEntry::new("external_url", "externalHostname")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("libraries", "libraries")
                .decoder(decode_enabled_libraries)
                .encoder(move |names| {
                    let names: BTreeSet<String> = serde_json::from_value(names.clone())
                        .map_err(|e| MapError::new(e.to_string()))?;
                    Ok(Value::from(library_ids(&libraries, &names)))
                }),
        ]
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    /// Whether the instance has completed its initial setup.
    pub async fn is_initialized(tree: &str, ctx: &ReconcileContext) -> Result<bool, CoreError> {
        let public = ctx
            .client()
            .get("/api/v1/settings/public")
            .without_api_key()
            .send()
            .await?;
        public
            .get("initialized")
            .and_then(Value::as_bool)
            .ok_or_else(|| CoreError::Mapping {
                tree: tree.to_owned(),
                message: "public settings have no 'initialized' flag".into(),
            })
    }

    /// Names of bootstrap attributes that are unset or blank.
    fn missing_bootstrap_attrs(&self) -> Vec<&'static str> {
        let blank = |value: Option<&str>| value.is_none_or(|v| v.trim().is_empty());
        let mut missing = Vec::new();
        if blank(self.server_url.as_deref()) {
            missing.push("server_url");
        }
        if blank(self.username.as_deref()) {
            missing.push("username");
        }
        if blank(self.password.as_ref().map(Secret::expose)) {
            missing.push("password");
        }
        if blank(self.email_address.as_deref()) {
            missing.push("email_address");
        }
        if self.libraries.is_empty() {
            missing.push("libraries");
        }
        missing
    }

    /// Link the instance with Jellyfin, enable the configured libraries and
    /// finalize setup. All calls share one session cookie.
    pub async fn initialize(&self, tree: &str, ctx: &ReconcileContext) -> Result<(), CoreError> {
        info!("Checking if required attributes are defined");
        let missing = self.missing_bootstrap_attrs();
        if !missing.is_empty() {
            let attrs = missing
                .iter()
                .map(|attr| format!("'{tree}.{attr}'"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CoreError::validation(
                tree,
                format!(
                    "unable to initialize the instance, required attributes are missing. \
                     Either initialize it manually, or set the following attributes so it \
                     can be initialized automatically: {attrs}"
                ),
            ));
        }
        if ctx.is_dry_run() {
            info!("{tree}: instance is not initialized (skipping initialization in dry-run mode)");
            return Ok(());
        }

        info!("Authenticating with Jellyfin");
        let client = ctx.client();
        client
            .post("/api/v1/auth/jellyfin")
            .json(json!({
                "username": self.username,
                "password": self.password.as_ref().map(Secret::expose),
                "hostname": self.server_url,
                "email": self.email_address,
            }))
            .expect(StatusCode::OK)
            .without_api_key()
            .send()
            .await
            .map_err(|err| match err {
                seerr_api::Error::Api {
                    status: 500,
                    ref message,
                    ..
                } if message.contains("Jellyfin") && message.contains("configured") => {
                    CoreError::AlreadyConfigured
                }
                other => other.into(),
            })?;

        info!("Syncing Jellyfin libraries");
        let synced = client
            .get(format!("{LIBRARY_PATH}?sync=true"))
            .without_api_key()
            .send()
            .await?;
        let libraries = parse_libraries(tree, synced)?;
        check_libraries(tree, &self.libraries, &libraries)?;

        info!(
            "Enabling Jellyfin libraries: {}",
            self.libraries
                .iter()
                .map(|name| format!("{name:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        client
            .get(format!(
                "{LIBRARY_PATH}?enable={}",
                library_ids(&libraries, &self.libraries).join(",")
            ))
            .without_api_key()
            .mutating()
            .send()
            .await?;

        info!("Finalizing initialization");
        client
            .post("/api/v1/settings/initialize")
            .expect(StatusCode::OK)
            .without_api_key()
            .send()
            .await?;
        info!("Finished initializing instance");
        Ok(())
    }
}

impl Section for JellyfinSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        reconcile::fetch(ctx, tree, &ENDPOINT, &Self::remote_map(&[])).await
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        let listed = ctx.client().get(LIBRARY_PATH).send().await?;
        let libraries = parse_libraries(tree, listed)?;
        check_libraries(tree, &self.libraries, &libraries)?;

        let remote_map = Self::remote_map(&libraries);
        let (changed, mut payload) = reconcile::diff(ctx, tree, self, remote, &remote_map)?;

        // Libraries are enabled through a separate call, not the settings body.
        if let Some(ids) = payload.remove("libraries") {
            let ids: Vec<String> = serde_json::from_value(ids).map_err(|e| CoreError::Mapping {
                tree: format!("{tree}.libraries"),
                message: e.to_string(),
            })?;
            debug!("{tree}.libraries: enabling library IDs {ids:?}");
            ctx.client()
                .get(format!("{LIBRARY_PATH}?enable={}", ids.join(",")))
                .mutating()
                .send()
                .await?;
        }
        if !payload.is_empty() {
            reconcile::push(ctx, &ENDPOINT, payload).await?;
        }
        Ok(changed)
    }
}
