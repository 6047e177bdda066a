// Global user settings: sign-in methods, request quotas and default
// permissions. Shares `/api/v1/settings/main` with the general section.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::permissions::{self, Permission};
use crate::reconcile::{self, Endpoint, Section};
use crate::remote_map::{MapError, RemoteMap, RemoteMapEntry};

const ENDPOINT: Endpoint = Endpoint::post("/api/v1/settings/main");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsersSettings {
    pub enable_local_signin: bool,
    pub enable_new_jellyfin_signin: bool,
    /// Movie requests per quota period. 0 is unlimited.
    pub global_movie_request_limit: u32,
    /// Series requests per quota period. 0 is unlimited.
    pub global_series_request_limit: u32,
    #[serde(deserialize_with = "canonical_permissions")]
    pub default_permissions: BTreeSet<Permission>,
}

impl Default for UsersSettings {
    fn default() -> Self {
        Self {
            enable_local_signin: true,
            enable_new_jellyfin_signin: true,
            global_movie_request_limit: 0,
            global_series_request_limit: 0,
            default_permissions: BTreeSet::from([Permission::Request, Permission::ManageIssues]),
        }
    }
}

/// Permission sets are stored in the form the remote reports them.
fn canonical_permissions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<Permission>, D::Error> {
    let declared = BTreeSet::<Permission>::deserialize(deserializer)?;
    permissions::set_reduce(&declared).map_err(serde::de::Error::custom)
}

/// Quota periods (in days) currently set on the remote. Not managed, but
/// required when sending `defaultQuotas` back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaDays {
    pub movie: u64,
    pub tv: u64,
}

impl QuotaDays {
    fn from_main(main: &Value) -> Self {
        let days = |kind: &str| {
            main.pointer(&format!("/defaultQuotas/{kind}/quotaDays"))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Self {
            movie: days("movie"),
            tv: days("tv"),
        }
    }
}

fn quota_limit(
    kind: &'static str,
) -> impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static {
    move |quotas| match quotas.get(kind).and_then(|q| q.get("quotaLimit")) {
        None | Some(Value::Null) => Ok(Value::from(0)),
        Some(limit) if limit.is_u64() => Ok(limit.clone()),
        Some(other) => Err(MapError::new(format!("invalid {kind} quota limit: {other}"))),
    }
}

fn quotas_encoder(
    days: QuotaDays,
) -> impl Fn(&Map<String, Value>) -> Result<Value, MapError> + Send + Sync + 'static {
    move |record| {
        let limit = |field: &str| record.get(field).cloned().unwrap_or(Value::Null);
        Ok(json!({
            "movie": {
                "quotaDays": days.movie,
                "quotaLimit": limit("global_movie_request_limit"),
            },
            "tv": {
                "quotaDays": days.tv,
                "quotaLimit": limit("global_series_request_limit"),
            },
        }))
    }
}

impl UsersSettings {
    pub fn remote_map(days: QuotaDays) -> RemoteMap {
        vec![
            RemoteMapEntry::new("enable_local_signin", "localLogin"),
            RemoteMapEntry::new("enable_new_jellyfin_signin", "newPlexLogin"),
            RemoteMapEntry::new("global_movie_request_limit", "defaultQuotas")
                .decoder(quota_limit("movie"))
                .root_encoder(quotas_encoder(days)),
            RemoteMapEntry::new("global_series_request_limit", "defaultQuotas")
                .decoder(quota_limit("tv"))
                .root_encoder(quotas_encoder(days)),
            RemoteMapEntry::new("default_permissions", "defaultPermissions")
                .decoder(permissions::decode_value)
                .encoder(permissions::encode_value),
        ]
    }
}

impl Section for UsersSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        reconcile::fetch(ctx, tree, &ENDPOINT, &Self::remote_map(QuotaDays::default())).await
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        let main = reconcile::fetch_raw(ctx, &ENDPOINT).await?;
        let remote_map = Self::remote_map(QuotaDays::from_main(&main));
        reconcile::push_if_changed(ctx, tree, &ENDPOINT, self, remote, &remote_map).await
    }
}
