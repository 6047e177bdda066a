// Sonarr service links (`/api/v1/settings/sonarr`).
//
// A named collection. Each entry is probed through the remote's connection
// test, which returns the Sonarr instance's root folders, profiles and tags;
// references in the entry are resolved against that metadata.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use seerr_api::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::collection::{self, CollectionEntry, reference_id, resolve_reference};
use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::model::{ResourceRef, Secret};
use crate::reconcile::Section;
use crate::remote_map::{MapError, RemoteMap, RemoteMapEntry, codec};

const ENDPOINT: &str = "/api/v1/settings/sonarr";
const PROBE_PATH: &str = "/api/v1/settings/sonarr/test";

/// Plugin name under which linked Sonarr instances' secrets are stored.
pub const PLUGIN: &str = "sonarr";

fn default_port() -> u16 {
    8989
}

fn default_true() -> bool {
    true
}

/// One Sonarr instance linked to the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sonarr {
    #[serde(default)]
    pub is_default_server: bool,
    #[serde(default)]
    pub is_4k_server: bool,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub url_base: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
    #[serde(default)]
    pub enable_scan: bool,
    #[serde(default = "default_true")]
    pub enable_automatic_search: bool,
    /// Name of another managed Sonarr instance to take the API key from.
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<Secret>,
    pub root_folder: String,
    pub quality_profile: ResourceRef,
    pub language_profile: ResourceRef,
    #[serde(default)]
    pub tags: BTreeSet<ResourceRef>,
    #[serde(default)]
    pub anime_root_folder: Option<String>,
    #[serde(default)]
    pub anime_quality_profile: Option<ResourceRef>,
    #[serde(default)]
    pub anime_language_profile: Option<ResourceRef>,
    #[serde(default)]
    pub anime_tags: BTreeSet<ResourceRef>,
    #[serde(default, alias = "season_folders")]
    pub enable_season_folders: bool,
}

/// Live metadata of one Sonarr instance, plus the API key used to reach it.
#[derive(Debug, Clone, Default)]
pub struct SonarrMetadata {
    pub api_key: Option<Secret>,
    pub root_folders: Vec<String>,
    pub quality_profiles: IndexMap<String, i64>,
    pub language_profiles: IndexMap<String, i64>,
    pub tags: IndexMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct RootFolder {
    path: String,
}

#[derive(Debug, Deserialize)]
struct Profile {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Tag {
    id: i64,
    label: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProbeResponse {
    #[serde(default)]
    root_folders: Vec<RootFolder>,
    #[serde(default)]
    profiles: Vec<Profile>,
    #[serde(default)]
    language_profiles: Vec<Profile>,
    #[serde(default)]
    tags: Vec<Tag>,
}

impl SonarrMetadata {
    fn from_probe(tree: &str, api_key: Secret, body: Value) -> Result<Self, CoreError> {
        let probe: ProbeResponse = serde_json::from_value(body).map_err(|e| CoreError::Mapping {
            tree: tree.to_owned(),
            message: format!("unable to parse Sonarr metadata: {e}"),
        })?;
        Ok(Self {
            api_key: Some(api_key),
            root_folders: probe.root_folders.into_iter().map(|f| f.path).collect(),
            quality_profiles: probe.profiles.into_iter().map(|p| (p.name, p.id)).collect(),
            language_profiles: probe
                .language_profiles
                .into_iter()
                .map(|p| (p.name, p.id))
                .collect(),
            tags: probe.tags.into_iter().map(|t| (t.label, t.id)).collect(),
        })
    }
}

// ── Encoders ────────────────────────────────────────────────────────

type Encoder = Box<dyn Fn(&Value) -> Result<Value, MapError> + Send + Sync>;

fn to_id(description: &str, ids: &IndexMap<String, i64>, value: &Value) -> Result<Value, MapError> {
    let reference = ResourceRef::deserialize(value).map_err(|e| MapError::new(e.to_string()))?;
    reference_id(ids, &reference)
        .map(Value::from)
        .ok_or_else(|| MapError::new(format!("unknown {description} '{reference}'")))
}

/// Reference → remote ID.
fn id_encoder(description: &'static str, ids: &IndexMap<String, i64>) -> Encoder {
    let ids = ids.clone();
    Box::new(move |value| to_id(description, &ids, value))
}

/// Reference set → sorted remote IDs.
fn id_set_encoder(description: &'static str, ids: &IndexMap<String, i64>) -> Encoder {
    let ids = ids.clone();
    Box::new(move |value| {
        let Value::Array(items) = value else {
            return Err(MapError::new(format!("expected a list, got: {value}")));
        };
        let mut encoded = items
            .iter()
            .map(|item| {
                to_id(description, &ids, item)?
                    .as_i64()
                    .ok_or_else(|| MapError::new(format!("invalid {description} ID")))
            })
            .collect::<Result<Vec<i64>, _>>()?;
        encoded.sort_unstable();
        Ok(Value::from(encoded))
    })
}

// ── Entry ───────────────────────────────────────────────────────────

impl Sonarr {
    /// `api_key` is required unless the key comes from a linked instance.
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        if self.instance_name.is_none() && self.api_key.is_none() {
            return Err(CoreError::validation(
                format!("{tree}.api_key"),
                "required when 'instance_name' is not defined",
            ));
        }
        if self.hostname.trim().is_empty() {
            return Err(CoreError::validation(
                format!("{tree}.hostname"),
                "must not be empty",
            ));
        }
        Ok(())
    }

    fn resolve_api_key(&self, tree: &str, ctx: &ReconcileContext) -> Result<Secret, CoreError> {
        match (&self.api_key, &self.instance_name) {
            (Some(api_key), _) => Ok(api_key.clone()),
            (None, Some(instance)) => ctx
                .resolve_instance_secret(PLUGIN, instance)
                .map(Secret::from),
            (None, None) => Err(CoreError::validation(
                format!("{tree}.api_key"),
                "required when 'instance_name' is not defined",
            )),
        }
    }

    fn probe_body(&self, api_key: &Secret) -> Value {
        let mut body = json!({
            "hostname": self.hostname,
            "port": self.port,
            "useSsl": self.use_ssl,
            "apiKey": api_key.expose(),
        });
        if let Some(url_base) = self.url_base.as_deref().filter(|u| !u.is_empty()) {
            body["urlBase"] = Value::from(url_base);
        }
        body
    }

    fn render_root_folder(
        tree: &str,
        root_folders: &[String],
        folder: &str,
        required: bool,
    ) -> Result<(), CoreError> {
        if !required || root_folders.iter().any(|f| f == folder) {
            return Ok(());
        }
        let expected = root_folders
            .iter()
            .map(|f| format!("{f:?}"))
            .collect::<Vec<_>>()
            .join(", ");
        Err(CoreError::validation(
            tree,
            format!("Invalid root folder '{folder}' (expected one of: {expected})"),
        ))
    }
}

impl CollectionEntry for Sonarr {
    type Lookup = SonarrMetadata;

    async fn prepare(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
    ) -> Result<SonarrMetadata, CoreError> {
        let api_key = self.resolve_api_key(tree, ctx)?;
        let body = ctx
            .client()
            .post(PROBE_PATH)
            .json(self.probe_body(&api_key))
            .expect(StatusCode::OK)
            .read_only()
            .send()
            .await?;
        SonarrMetadata::from_probe(tree, api_key, body)
    }

    fn render(
        &self,
        tree: &str,
        lookup: &SonarrMetadata,
        required: bool,
    ) -> Result<Self, CoreError> {
        let resolve = |description: &str, ids: &IndexMap<String, i64>, reference: &ResourceRef| {
            resolve_reference(tree, description, ids, reference, required)
        };
        let resolve_set = |references: &BTreeSet<ResourceRef>| {
            references
                .iter()
                .map(|tag| resolve("tag", &lookup.tags, tag))
                .collect::<Result<BTreeSet<_>, _>>()
        };

        Self::render_root_folder(tree, &lookup.root_folders, &self.root_folder, required)?;
        let mut rendered = self.clone();
        rendered.api_key.clone_from(&lookup.api_key);
        rendered.quality_profile =
            resolve("quality profile", &lookup.quality_profiles, &self.quality_profile)?;
        rendered.language_profile =
            resolve("language profile", &lookup.language_profiles, &self.language_profile)?;
        rendered.tags = resolve_set(&self.tags)?;
        rendered.anime_quality_profile = self
            .anime_quality_profile
            .as_ref()
            .map(|p| resolve("quality profile", &lookup.quality_profiles, p))
            .transpose()?;
        rendered.anime_language_profile = self
            .anime_language_profile
            .as_ref()
            .map(|p| resolve("language profile", &lookup.language_profiles, p))
            .transpose()?;
        rendered.anime_tags = resolve_set(&self.anime_tags)?;
        Ok(rendered)
    }

    fn remote_map(lookup: Option<&SonarrMetadata>) -> RemoteMap {
        let empty = SonarrMetadata::default();
        let lookup = lookup.unwrap_or(&empty);
        vec![
            RemoteMapEntry::new("is_default_server", "isDefault"),
            RemoteMapEntry::new("is_4k_server", "is4k"),
            RemoteMapEntry::new("hostname", "hostname"),
            RemoteMapEntry::new("port", "port"),
            RemoteMapEntry::new("use_ssl", "useSsl"),
            RemoteMapEntry::new("url_base", "baseUrl")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("external_url", "externalUrl")
                .optional()
                .set_if(codec::is_truthy),
            RemoteMapEntry::new("enable_scan", "syncEnabled"),
            RemoteMapEntry::new("enable_automatic_search", "preventSearch")
                .decoder(codec::negate)
                .encoder(codec::negate),
            RemoteMapEntry::new("api_key", "apiKey").sensitive(),
            RemoteMapEntry::new("root_folder", "activeDirectory"),
            // The quality profile feeds both the ID and the name; the name
            // wins when decoding.
            RemoteMapEntry::new("quality_profile", "activeProfileId")
                .encoder(id_encoder("quality profile", &lookup.quality_profiles)),
            RemoteMapEntry::new("quality_profile", "activeProfileName"),
            RemoteMapEntry::new("language_profile", "activeLanguageProfileId")
                .encoder(id_encoder("language profile", &lookup.language_profiles)),
            RemoteMapEntry::new("tags", "tags").encoder(id_set_encoder("tag", &lookup.tags)),
            RemoteMapEntry::new("anime_root_folder", "activeAnimeDirectory")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("anime_quality_profile", "activeAnimeProfileId")
                .optional()
                .set_if(codec::is_truthy)
                .encoder(id_encoder("quality profile", &lookup.quality_profiles)),
            RemoteMapEntry::new("anime_quality_profile", "activeAnimeProfileName")
                .optional()
                .set_if(codec::is_truthy),
            RemoteMapEntry::new("anime_language_profile", "activeAnimeLanguageProfileId")
                .optional()
                .set_if(codec::is_truthy)
                .encoder(id_encoder("language profile", &lookup.language_profiles)),
            RemoteMapEntry::new("anime_tags", "animeTags")
                .encoder(id_set_encoder("tag", &lookup.tags)),
            RemoteMapEntry::new("enable_season_folders", "enableSeasonFolders"),
        ]
    }
}

// ── Section ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SonarrSettings {
    /// Delete remote Sonarr links that are not declared here.
    pub delete_unmanaged: bool,
    pub definitions: IndexMap<String, Sonarr>,
}

impl SonarrSettings {
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        for (name, definition) in &self.definitions {
            definition.validate(&collection::entry_tree(tree, name))?;
        }
        Ok(())
    }
}

impl Section for SonarrSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        Ok(Self {
            delete_unmanaged: false,
            definitions: collection::fetch_collection(ctx, tree, ENDPOINT).await?,
        })
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        collection::reconcile_collection(
            ctx,
            tree,
            ENDPOINT,
            &self.definitions,
            &remote.definitions,
            self.delete_unmanaged,
        )
        .await
    }
}
