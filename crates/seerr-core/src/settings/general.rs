// General application settings (`/api/v1/settings/main`).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::model;
use crate::reconcile::{self, Endpoint, Section};
use crate::remote_map::{RemoteMap, RemoteMapEntry, codec};

const ENDPOINT: Endpoint = Endpoint::post("/api/v1/settings/main");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralSettings {
    pub application_title: String,
    pub application_url: Option<String>,
    /// Takes effect after a restart.
    pub enable_proxy_support: bool,
    /// Takes effect after a restart.
    pub enable_csrf_protection: bool,
    pub enable_image_caching: bool,
    /// Two-letter language code.
    #[serde(alias = "locale", deserialize_with = "model::lowercase")]
    pub display_language: String,
    /// Two-letter country code; unset means all regions.
    #[serde(alias = "region", deserialize_with = "model::uppercase_opt")]
    pub discover_region: Option<String>,
    /// Two-letter language codes; empty means all languages.
    #[serde(alias = "original_languages", deserialize_with = "model::lowercase_set")]
    pub discover_languages: BTreeSet<String>,
    pub hide_available_media: bool,
    pub allow_partial_series_requests: bool,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            application_title: "Jellyseerr".into(),
            application_url: None,
            enable_proxy_support: false,
            enable_csrf_protection: false,
            enable_image_caching: false,
            display_language: "en".into(),
            discover_region: None,
            discover_languages: BTreeSet::new(),
            hide_available_media: false,
            allow_partial_series_requests: true,
        }
    }
}

impl GeneralSettings {
    pub fn remote_map() -> RemoteMap {
        vec![
            RemoteMapEntry::new("application_title", "applicationTitle"),
            RemoteMapEntry::new("application_url", "applicationUrl")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("enable_proxy_support", "trustProxy"),
            RemoteMapEntry::new("enable_csrf_protection", "csrfProtection"),
            RemoteMapEntry::new("enable_image_caching", "cacheImages"),
            RemoteMapEntry::new("display_language", "locale"),
            RemoteMapEntry::new("discover_region", "region")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("discover_languages", "originalLanguage")
                .decoder(codec::comma_set_decode)
                .encoder(codec::comma_set_encode),
            RemoteMapEntry::new("hide_available_media", "hideAvailable"),
            RemoteMapEntry::new("allow_partial_series_requests", "partialRequestsEnabled"),
        ]
    }

    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        if self.application_title.trim().is_empty() {
            return Err(CoreError::validation(
                format!("{tree}.application_title"),
                "must not be empty",
            ));
        }
        if self.display_language.is_empty() {
            return Err(CoreError::validation(
                format!("{tree}.display_language"),
                "must not be empty",
            ));
        }
        Ok(())
    }
}

impl Section for GeneralSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        reconcile::fetch(ctx, tree, &ENDPOINT, &Self::remote_map()).await
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        reconcile::push_if_changed(ctx, tree, &ENDPOINT, self, remote, &Self::remote_map()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::remote_map::ConfigRecord;

    fn remote_main() -> serde_json::Value {
        json!({
            "applicationTitle": "Jellyseerr",
            "applicationUrl": "",
            "trustProxy": false,
            "csrfProtection": false,
            "cacheImages": true,
            "locale": "en",
            "region": "",
            "originalLanguage": "fr,en",
            "hideAvailable": false,
            "partialRequestsEnabled": true,
            "defaultPermissions": 32
        })
    }

    #[test]
    fn decodes_main_settings() {
        let general =
            GeneralSettings::from_remote_object("g", &GeneralSettings::remote_map(), &remote_main())
                .unwrap();
        assert_eq!(
            general,
            GeneralSettings {
                enable_image_caching: true,
                discover_languages: BTreeSet::from(["en".to_owned(), "fr".to_owned()]),
                ..GeneralSettings::default()
            }
        );
    }

    #[test]
    fn language_and_region_are_separate_keys() {
        let desired = GeneralSettings {
            display_language: "de".into(),
            discover_region: Some("gb".into()),
            ..GeneralSettings::default()
        };
        let desired: GeneralSettings =
            serde_json::from_value(serde_json::to_value(desired).unwrap()).unwrap();
        let (changed, payload) = desired
            .update_remote_attrs(
                "g",
                &GeneralSettings::default(),
                &GeneralSettings::remote_map(),
                crate::DiffOptions::default(),
            )
            .unwrap();
        assert!(changed);
        assert_eq!(
            serde_json::Value::Object(payload),
            json!({ "locale": "de", "region": "GB" })
        );
    }

    #[test]
    fn aliases_and_case_are_normalized() {
        let general: GeneralSettings = serde_json::from_value(json!({
            "locale": "EN",
            "region": "us",
            "original_languages": ["FR", "en"]
        }))
        .unwrap();
        assert_eq!(general.display_language, "en");
        assert_eq!(general.discover_region.as_deref(), Some("US"));
        assert_eq!(
            general.discover_languages,
            BTreeSet::from(["en".to_owned(), "fr".to_owned()])
        );
    }

    #[test]
    fn empty_title_is_rejected() {
        let general = GeneralSettings {
            application_title: "  ".into(),
            ..GeneralSettings::default()
        };
        assert!(general.validate("g").is_err());
    }
}
