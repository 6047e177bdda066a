// Email notification agent (`/api/v1/settings/notifications/email`).
//
// The remote wraps the agent's settings as `{ enabled, options: {...} }`.
// The remote map runs over a flattened view (`options` plus `enabled`), and
// changes are merged back into the fetched object before posting it.

use seerr_api::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::model::Secret;
use crate::reconcile::{self, Endpoint, Section};
use crate::remote_map::{ConfigRecord, MapError, RemoteAttrs, RemoteMap, RemoteMapEntry, codec};

const ENDPOINT: Endpoint =
    Endpoint::post("/api/v1/settings/notifications/email").expecting(StatusCode::OK);

/// SMTP transport security. Stored on the remote as three booleans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionMethod {
    #[serde(alias = "none")]
    Unencrypted,
    #[serde(alias = "smtps")]
    ImplicitTls,
    #[default]
    #[serde(alias = "starttls_prefer")]
    StarttlsOptional,
    #[serde(alias = "starttls_strict")]
    StarttlsEnforce,
}

const ENCRYPTION_METHODS: [EncryptionMethod; 4] = [
    EncryptionMethod::Unencrypted,
    EncryptionMethod::ImplicitTls,
    EncryptionMethod::StarttlsOptional,
    EncryptionMethod::StarttlsEnforce,
];

impl EncryptionMethod {
    pub fn secure(self) -> bool {
        self == Self::ImplicitTls
    }

    pub fn ignore_tls(self) -> bool {
        self == Self::Unencrypted
    }

    pub fn require_tls(self) -> bool {
        self == Self::StarttlsEnforce
    }

    pub fn from_flags(secure: bool, ignore_tls: bool, require_tls: bool) -> Option<Self> {
        ENCRYPTION_METHODS.into_iter().find(|method| {
            (method.secure(), method.ignore_tls(), method.require_tls())
                == (secure, ignore_tls, require_tls)
        })
    }
}

fn decode_encryption(remote: &Map<String, Value>) -> Result<Value, MapError> {
    let flag = |key: &str| remote.get(key).and_then(Value::as_bool).unwrap_or(false);
    let (secure, ignore_tls, require_tls) = (flag("secure"), flag("ignoreTls"), flag("requireTls"));
    let method = EncryptionMethod::from_flags(secure, ignore_tls, require_tls).ok_or_else(|| {
        MapError::new(format!(
            "invalid encryption flags: secure={secure}, ignoreTls={ignore_tls}, \
             requireTls={require_tls}"
        ))
    })?;
    serde_json::to_value(method).map_err(|e| MapError::new(e.to_string()))
}

fn encryption_flag(
    flag: fn(EncryptionMethod) -> bool,
) -> impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static {
    move |value| {
        let method =
            EncryptionMethod::deserialize(value).map_err(|e| MapError::new(e.to_string()))?;
        Ok(Value::Bool(flag(method)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailSettings {
    pub enable: bool,
    #[serde(alias = "user_email_required")]
    pub require_user_email: bool,
    pub sender_name: Option<String>,
    pub sender_address: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub encryption_method: EncryptionMethod,
    #[serde(alias = "self_signed_certificates")]
    pub allow_selfsigned_certificates: bool,
    #[serde(alias = "smtp_user")]
    pub smtp_username: Option<String>,
    #[serde(alias = "smtp_pass")]
    pub smtp_password: Option<Secret>,
    #[serde(alias = "pgp_key")]
    pub pgp_private_key: Option<Secret>,
    #[serde(alias = "pgp_pass")]
    pub pgp_password: Option<Secret>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enable: false,
            require_user_email: false,
            sender_name: None,
            sender_address: None,
            smtp_host: None,
            smtp_port: 587,
            encryption_method: EncryptionMethod::default(),
            allow_selfsigned_certificates: false,
            smtp_username: None,
            smtp_password: None,
            pgp_private_key: None,
            pgp_password: None,
        }
    }
}

/// `{ enabled, options: {...} }` → `{ enabled, ...options }`.
fn flatten(tree: &str, raw: &Value) -> Result<Value, CoreError> {
    let mut flat = match raw.get("options") {
        Some(Value::Object(options)) => options.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(other) => {
            return Err(CoreError::Mapping {
                tree: tree.to_owned(),
                message: format!("expected an options object, got: {other}"),
            });
        }
    };
    let enabled = raw.get("enabled").cloned().unwrap_or(Value::Bool(false));
    flat.insert("enabled".to_owned(), enabled);
    Ok(Value::Object(flat))
}

/// Merge a flattened payload back into the fetched object.
fn merge(raw: &Value, mut payload: RemoteAttrs) -> Value {
    let mut body = raw.as_object().cloned().unwrap_or_default();
    if let Some(enabled) = payload.remove("enabled") {
        body.insert("enabled".to_owned(), enabled);
    }
    match body
        .entry("options")
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(options) => options.extend(payload),
        other => *other = Value::Object(payload),
    }
    Value::Object(body)
}

impl EmailSettings {
    pub fn remote_map() -> RemoteMap {
        vec![
            RemoteMapEntry::new("enable", "enabled"),
            RemoteMapEntry::new("require_user_email", "userEmailRequired").optional(),
            RemoteMapEntry::new("sender_name", "senderName")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("sender_address", "emailFrom")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("smtp_host", "smtpHost")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("smtp_port", "smtpPort"),
            RemoteMapEntry::new("encryption_method", "secure")
                .root_decoder(decode_encryption)
                .encoder(encryption_flag(EncryptionMethod::secure)),
            RemoteMapEntry::new("encryption_method", "ignoreTls")
                .root_decoder(decode_encryption)
                .encoder(encryption_flag(EncryptionMethod::ignore_tls)),
            RemoteMapEntry::new("encryption_method", "requireTls")
                .root_decoder(decode_encryption)
                .encoder(encryption_flag(EncryptionMethod::require_tls)),
            RemoteMapEntry::new("allow_selfsigned_certificates", "allowSelfSigned"),
            RemoteMapEntry::new("smtp_username", "authUser")
                .optional()
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("smtp_password", "authPass")
                .optional()
                .sensitive()
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("pgp_private_key", "pgpPrivateKey")
                .optional()
                .sensitive()
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("pgp_password", "pgpPassword")
                .optional()
                .sensitive()
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
        ]
    }

    /// When enabled, the sender and SMTP host must be set.
    pub fn validate(&self, tree: &str) -> Result<(), CoreError> {
        if !self.enable {
            return Ok(());
        }
        let required = [
            ("sender_name", &self.sender_name),
            ("sender_address", &self.sender_address),
            ("smtp_host", &self.smtp_host),
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| format!("'{tree}.{name}'"))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(CoreError::validation(
            tree,
            format!(
                "required attributes are missing while email notifications are enabled: {}",
                missing.join(", ")
            ),
        ))
    }
}

impl Section for EmailSettings {
    async fn from_remote(tree: &str, ctx: &ReconcileContext) -> Result<Self, CoreError> {
        let raw = reconcile::fetch_raw(ctx, &ENDPOINT).await?;
        Self::from_remote_object(tree, &Self::remote_map(), &flatten(tree, &raw)?)
    }

    async fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> Result<bool, CoreError> {
        let (changed, payload) = reconcile::diff(ctx, tree, self, remote, &Self::remote_map())?;
        if changed {
            let raw = reconcile::fetch_raw(ctx, &ENDPOINT).await?;
            reconcile::push(ctx, &ENDPOINT, merge(&raw, payload)).await?;
        }
        Ok(changed)
    }
}
