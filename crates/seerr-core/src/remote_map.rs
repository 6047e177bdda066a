// ── Attribute remote-map ──
//
// Declarative translation between the fields of a local configuration
// record and the keys of the remote's JSON objects. A section describes
// itself as a list of `RemoteMapEntry` values; the functions here turn a
// remote object into local attributes, diff two records, and build
// create/update payloads.
//
// Local values are handled in their serde JSON form, so records only need
// to derive `Serialize`/`Deserialize`. Sets must serialize in a stable
// order (`BTreeSet`) for comparisons to be order-independent.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::CoreError;

/// Local field name → local value (JSON form).
pub type LocalAttrs = Map<String, Value>;

/// Remote key → remote value, as sent in a request body.
pub type RemoteAttrs = Map<String, Value>;

/// Failure inside an encoder or decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MapError(pub String);

impl MapError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Value transform applied to a single attribute.
pub type Transform = Box<dyn Fn(&Value) -> Result<Value, MapError> + Send + Sync>;

/// Transform receiving an entire record (remote object or local attributes).
pub type RootTransform = Box<dyn Fn(&Map<String, Value>) -> Result<Value, MapError> + Send + Sync>;

/// Predicate on the desired local value deciding whether it is sent at all.
pub type Predicate = fn(&Value) -> bool;

/// An ordered list of entries describing one section's remote mapping.
pub type RemoteMap = Vec<RemoteMapEntry>;

// ── Entry ───────────────────────────────────────────────────────────

/// Maps one local field to one remote key.
///
/// Several entries may share a local field (one value fanning out to several
/// remote keys). When decoding, the last such entry wins.
pub struct RemoteMapEntry {
    local_field: &'static str,
    remote_key: &'static str,
    decoder: Option<Transform>,
    encoder: Option<Transform>,
    root_decoder: Option<RootTransform>,
    root_encoder: Option<RootTransform>,
    optional: bool,
    set_if: Option<Predicate>,
    sensitive: bool,
}

impl RemoteMapEntry {
    /// An identity mapping between `local_field` and `remote_key`.
    pub fn new(local_field: &'static str, remote_key: &'static str) -> Self {
        Self {
            local_field,
            remote_key,
            decoder: None,
            encoder: None,
            root_decoder: None,
            root_encoder: None,
            optional: false,
            set_if: None,
            sensitive: false,
        }
    }

    /// Remote value → local value.
    pub fn decoder(
        mut self,
        f: impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static,
    ) -> Self {
        self.decoder = Some(Box::new(f));
        self
    }

    /// Local value → remote value.
    pub fn encoder(
        mut self,
        f: impl Fn(&Value) -> Result<Value, MapError> + Send + Sync + 'static,
    ) -> Self {
        self.encoder = Some(Box::new(f));
        self
    }

    /// Entire remote object → local value.
    pub fn root_decoder(
        mut self,
        f: impl Fn(&Map<String, Value>) -> Result<Value, MapError> + Send + Sync + 'static,
    ) -> Self {
        self.root_decoder = Some(Box::new(f));
        self
    }

    /// Entire local record → remote value.
    pub fn root_encoder(
        mut self,
        f: impl Fn(&Map<String, Value>) -> Result<Value, MapError> + Send + Sync + 'static,
    ) -> Self {
        self.root_encoder = Some(Box::new(f));
        self
    }

    /// The remote key may be absent; the local field then keeps its default.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Only send this attribute when `predicate` holds for the desired value.
    pub fn set_if(mut self, predicate: Predicate) -> Self {
        self.set_if = Some(predicate);
        self
    }

    /// Redact values of this attribute in logs.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn local_field(&self) -> &'static str {
        self.local_field
    }

    pub fn remote_key(&self) -> &'static str {
        self.remote_key
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Decode this entry's local value from a remote object.
    ///
    /// Returns `Ok(None)` when an optional key is absent.
    pub fn decode(&self, remote: &Map<String, Value>) -> Result<Option<Value>, MapError> {
        if let Some(ref root_decoder) = self.root_decoder {
            return root_decoder(remote).map(Some);
        }
        let Some(value) = remote.get(self.remote_key) else {
            if self.optional {
                return Ok(None);
            }
            return Err(MapError::new(format!(
                "remote attribute '{}' is missing",
                self.remote_key
            )));
        };
        match self.decoder {
            Some(ref decoder) => decoder(value).map(Some),
            None => Ok(Some(value.clone())),
        }
    }

    /// Encode a local value for the remote, given the whole local record.
    pub fn encode(&self, record: &LocalAttrs, value: &Value) -> Result<Value, MapError> {
        if let Some(ref root_encoder) = self.root_encoder {
            return root_encoder(record);
        }
        match self.encoder {
            Some(ref encoder) => encoder(value),
            None => Ok(value.clone()),
        }
    }

    /// Whether the desired value passes this entry's `set_if` predicate.
    pub fn should_set(&self, value: &Value) -> bool {
        self.set_if.is_none_or(|predicate| predicate(value))
    }

    fn shown(&self, value: &Value) -> String {
        if self.sensitive {
            "********".to_owned()
        } else {
            value.to_string()
        }
    }
}

impl fmt::Debug for RemoteMapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteMapEntry")
            .field("local_field", &self.local_field)
            .field("remote_key", &self.remote_key)
            .field("decoder", &self.decoder.is_some())
            .field("encoder", &self.encoder.is_some())
            .field("root_decoder", &self.root_decoder.is_some())
            .field("root_encoder", &self.root_encoder.is_some())
            .field("optional", &self.optional)
            .field("set_if", &self.set_if.is_some())
            .finish_non_exhaustive()
    }
}

// ── Diff options ────────────────────────────────────────────────────

/// Knobs for [`get_update_remote_attrs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Report up-to-date attributes at `info` instead of `debug`.
    /// Never changes the payload.
    pub check_unmanaged: bool,
    /// Also place unchanged attributes in the payload (for endpoints that
    /// replace the whole object, like collection `PUT`s).
    pub set_unchanged: bool,
}

// ── Mapping functions ───────────────────────────────────────────────

fn field<'a>(tree: &str, attrs: &'a LocalAttrs, name: &str) -> Result<&'a Value, CoreError> {
    attrs.get(name).ok_or_else(|| CoreError::Mapping {
        tree: tree.to_owned(),
        message: format!("record has no field '{name}'"),
    })
}

/// Build local attributes from a remote object.
pub fn get_local_attrs(
    tree: &str,
    remote_map: &[RemoteMapEntry],
    remote: &Value,
) -> Result<LocalAttrs, CoreError> {
    let Value::Object(remote) = remote else {
        return Err(CoreError::Mapping {
            tree: tree.to_owned(),
            message: format!("expected a JSON object from the remote, got: {remote}"),
        });
    };
    let mut attrs = LocalAttrs::new();
    for entry in remote_map {
        let decoded = entry
            .decode(remote)
            .map_err(|e| CoreError::mapping(format!("{tree}.{}", entry.local_field), &e))?;
        if let Some(value) = decoded {
            attrs.insert(entry.local_field.to_owned(), value);
        }
    }
    Ok(attrs)
}

/// Diff desired local attributes against remote-derived ones.
///
/// Returns whether anything differs, and the payload of remote keys to send.
/// Entries failing their `set_if` predicate never appear in the payload.
pub fn get_update_remote_attrs(
    tree: &str,
    local: &LocalAttrs,
    remote: &LocalAttrs,
    remote_map: &[RemoteMapEntry],
    options: DiffOptions,
) -> Result<(bool, RemoteAttrs), CoreError> {
    let mut changed = false;
    let mut payload = RemoteAttrs::new();
    for entry in remote_map {
        let name = entry.local_field;
        let local_value = field(tree, local, name)?;
        let remote_value = remote.get(name).unwrap_or(&Value::Null);
        let differs = local_value != remote_value;
        if differs {
            info!(
                "{tree}.{name}: {} -> {}",
                entry.shown(remote_value),
                entry.shown(local_value)
            );
            changed = true;
        } else if options.check_unmanaged {
            info!("{tree}.{name}: {} (up to date)", entry.shown(local_value));
        } else {
            debug!("{tree}.{name}: {} (up to date)", entry.shown(local_value));
        }
        if entry.should_set(local_value) && (differs || options.set_unchanged) {
            let encoded = entry
                .encode(local, local_value)
                .map_err(|e| CoreError::mapping(format!("{tree}.{name}"), &e))?;
            payload.insert(entry.remote_key.to_owned(), encoded);
        }
    }
    Ok((changed, payload))
}

/// Build the payload creating a new remote object from desired attributes.
pub fn get_create_remote_attrs(
    tree: &str,
    local: &LocalAttrs,
    remote_map: &[RemoteMapEntry],
) -> Result<RemoteAttrs, CoreError> {
    let mut payload = RemoteAttrs::new();
    for entry in remote_map {
        let name = entry.local_field;
        let local_value = field(tree, local, name)?;
        if !entry.should_set(local_value) {
            continue;
        }
        info!("{tree}.{name}: {}", entry.shown(local_value));
        let encoded = entry
            .encode(local, local_value)
            .map_err(|e| CoreError::mapping(format!("{tree}.{name}"), &e))?;
        payload.insert(entry.remote_key.to_owned(), encoded);
    }
    Ok(payload)
}

// ── Record trait ────────────────────────────────────────────────────

/// A configuration record that can be moved through a remote map.
///
/// Implemented for every serde type; the serialized field names are the
/// local field names referenced by remote-map entries.
pub trait ConfigRecord: Serialize + DeserializeOwned {
    fn local_attrs(&self, tree: &str) -> Result<LocalAttrs, CoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(attrs)) => Ok(attrs),
            Ok(other) => Err(CoreError::Mapping {
                tree: tree.to_owned(),
                message: format!("record did not serialize to an object: {other}"),
            }),
            Err(e) => Err(CoreError::Mapping {
                tree: tree.to_owned(),
                message: e.to_string(),
            }),
        }
    }

    fn from_local_attrs(tree: &str, attrs: LocalAttrs) -> Result<Self, CoreError> {
        serde_json::from_value(Value::Object(attrs)).map_err(|e| CoreError::Mapping {
            tree: tree.to_owned(),
            message: e.to_string(),
        })
    }

    /// Build a record from a remote object.
    fn from_remote_object(
        tree: &str,
        remote_map: &[RemoteMapEntry],
        remote: &Value,
    ) -> Result<Self, CoreError> {
        Self::from_local_attrs(tree, get_local_attrs(tree, remote_map, remote)?)
    }

    /// Diff `self` (desired) against `remote` (built from the remote).
    fn update_remote_attrs(
        &self,
        tree: &str,
        remote: &Self,
        remote_map: &[RemoteMapEntry],
        options: DiffOptions,
    ) -> Result<(bool, RemoteAttrs), CoreError> {
        get_update_remote_attrs(
            tree,
            &self.local_attrs(tree)?,
            &remote.local_attrs(tree)?,
            remote_map,
            options,
        )
    }

    fn create_remote_attrs(
        &self,
        tree: &str,
        remote_map: &[RemoteMapEntry],
    ) -> Result<RemoteAttrs, CoreError> {
        get_create_remote_attrs(tree, &self.local_attrs(tree)?, remote_map)
    }
}

impl<T: Serialize + DeserializeOwned> ConfigRecord for T {}

// ── Common transforms ───────────────────────────────────────────────

/// Reusable encoders, decoders and predicates.
pub mod codec {
    use serde_json::Value;

    use super::MapError;

    /// `""` → `null`, anything else unchanged.
    pub fn empty_as_null(value: &Value) -> Result<Value, MapError> {
        Ok(match value {
            Value::String(s) if s.is_empty() => Value::Null,
            other => other.clone(),
        })
    }

    /// `null` → `""`, anything else unchanged.
    pub fn null_as_empty(value: &Value) -> Result<Value, MapError> {
        Ok(match value {
            Value::Null => Value::String(String::new()),
            other => other.clone(),
        })
    }

    pub fn negate(value: &Value) -> Result<Value, MapError> {
        value
            .as_bool()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| MapError::new(format!("expected a boolean, got: {value}")))
    }

    /// `"en, fr"` → `["en", "fr"]` (sorted, deduplicated); empty → `[]`.
    pub fn comma_set_decode(value: &Value) -> Result<Value, MapError> {
        let raw = match value {
            Value::Null => "",
            Value::String(s) => s.as_str(),
            other => {
                return Err(MapError::new(format!(
                    "expected a comma-separated string, got: {other}"
                )));
            }
        };
        let mut items: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        items.sort_unstable();
        items.dedup();
        Ok(Value::from(items))
    }

    /// `["fr", "en"]` → `"en,fr"`; empty → `""`.
    pub fn comma_set_encode(value: &Value) -> Result<Value, MapError> {
        let Value::Array(items) = value else {
            return Err(MapError::new(format!("expected a list, got: {value}")));
        };
        let mut items = items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| MapError::new(format!("expected a string, got: {item}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        items.sort_unstable();
        Ok(Value::String(items.join(",")))
    }

    /// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
    pub fn is_truthy(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Server {
        hostname: String,
        url_base: Option<String>,
        enable_automatic_search: bool,
        #[serde(default)]
        external_url: Option<String>,
    }

    fn server_map() -> RemoteMap {
        vec![
            RemoteMapEntry::new("hostname", "hostname"),
            RemoteMapEntry::new("url_base", "baseUrl")
                .decoder(codec::empty_as_null)
                .encoder(codec::null_as_empty),
            RemoteMapEntry::new("enable_automatic_search", "preventSearch")
                .decoder(codec::negate)
                .encoder(codec::negate),
            RemoteMapEntry::new("external_url", "externalUrl")
                .optional()
                .set_if(codec::is_truthy),
        ]
    }

    fn server() -> Server {
        Server {
            hostname: "sonarr".into(),
            url_base: None,
            enable_automatic_search: true,
            external_url: None,
        }
    }

    // ── Decoding ────────────────────────────────────────────────────

    #[test]
    fn decodes_remote_object_into_record() {
        let remote = json!({
            "hostname": "sonarr",
            "baseUrl": "",
            "preventSearch": false,
            "externalUrl": "https://sonarr.example.com",
            "unrelated": 1
        });
        let record = Server::from_remote_object("t", &server_map(), &remote).unwrap();
        assert_eq!(
            record,
            Server {
                external_url: Some("https://sonarr.example.com".into()),
                ..server()
            }
        );
    }

    #[test]
    fn optional_absent_key_keeps_default() {
        let remote = json!({ "hostname": "sonarr", "baseUrl": "/s", "preventSearch": true });
        let record = Server::from_remote_object("t", &server_map(), &remote).unwrap();
        assert_eq!(record.external_url, None);
        assert_eq!(record.url_base.as_deref(), Some("/s"));
        assert!(!record.enable_automatic_search);
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let remote = json!({ "hostname": "sonarr", "preventSearch": true });
        let err = get_local_attrs("svc", &server_map(), &remote).unwrap_err();
        assert!(
            err.to_string().contains("svc.url_base") && err.to_string().contains("baseUrl"),
            "got: {err}"
        );
    }

    #[test]
    fn malformed_remote_value_is_fatal() {
        let remote = json!({ "hostname": "sonarr", "baseUrl": "", "preventSearch": "yes" });
        let err = get_local_attrs("svc", &server_map(), &remote).unwrap_err();
        assert!(matches!(err, CoreError::Mapping { .. }), "got: {err:?}");
    }

    #[test]
    fn root_decoder_sees_whole_object_and_last_entry_wins() {
        let map = vec![
            RemoteMapEntry::new("profile", "activeProfileId"),
            RemoteMapEntry::new("profile", "activeProfileName"),
            RemoteMapEntry::new("total", "a").root_decoder(|remote| {
                let a = remote.get("a").and_then(Value::as_i64).unwrap_or(0);
                let b = remote.get("b").and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(a + b))
            }),
        ];
        let remote = json!({ "activeProfileId": 4, "activeProfileName": "HD", "a": 1, "b": 2 });
        let attrs = get_local_attrs("t", &map, &remote).unwrap();
        assert_eq!(attrs["profile"], json!("HD"));
        assert_eq!(attrs["total"], json!(3));
    }

    // ── Diffing ─────────────────────────────────────────────────────

    #[test]
    fn equal_records_produce_no_changes() {
        let (changed, payload) = server()
            .update_remote_attrs("t", &server(), &server_map(), DiffOptions::default())
            .unwrap();
        assert!(!changed);
        assert!(payload.is_empty());
    }

    #[test]
    fn check_unmanaged_does_not_alter_payload() {
        let options = DiffOptions {
            check_unmanaged: true,
            ..DiffOptions::default()
        };
        let (changed, payload) = server()
            .update_remote_attrs("t", &server(), &server_map(), options)
            .unwrap();
        assert!(!changed);
        assert!(payload.is_empty());
    }

    #[test]
    fn changed_attributes_are_encoded() {
        let desired = Server {
            enable_automatic_search: false,
            url_base: None,
            ..server()
        };
        let remote = Server {
            url_base: Some("/old".into()),
            ..server()
        };
        let (changed, payload) = desired
            .update_remote_attrs("t", &remote, &server_map(), DiffOptions::default())
            .unwrap();
        assert!(changed);
        assert_eq!(
            Value::Object(payload),
            json!({ "baseUrl": "", "preventSearch": true })
        );
    }

    #[test]
    fn set_if_excludes_falsy_value_even_when_changed() {
        let desired = server();
        let remote = Server {
            external_url: Some("https://old.example.com".into()),
            ..server()
        };
        let (changed, payload) = desired
            .update_remote_attrs("t", &remote, &server_map(), DiffOptions::default())
            .unwrap();
        assert!(changed);
        assert!(payload.is_empty());
    }

    #[test]
    fn set_unchanged_sends_everything_passing_set_if() {
        let options = DiffOptions {
            set_unchanged: true,
            ..DiffOptions::default()
        };
        let (changed, payload) = server()
            .update_remote_attrs("t", &server(), &server_map(), options)
            .unwrap();
        assert!(!changed);
        assert_eq!(
            Value::Object(payload),
            json!({ "hostname": "sonarr", "baseUrl": "", "preventSearch": false })
        );
    }

    #[test]
    fn root_encoder_fans_out_from_whole_record() {
        let quota = |record: &Map<String, Value>| {
            Ok(json!({
                "movie": { "quotaLimit": record["movie_limit"] },
                "tv": { "quotaLimit": record["tv_limit"] },
            }))
        };
        let map = vec![
            RemoteMapEntry::new("movie_limit", "defaultQuotas").root_encoder(quota),
            RemoteMapEntry::new("tv_limit", "defaultQuotas").root_encoder(quota),
        ];
        let local = json!({ "movie_limit": 5, "tv_limit": 2 });
        let remote = json!({ "movie_limit": 5, "tv_limit": 0 });
        let (changed, payload) = get_update_remote_attrs(
            "t",
            local.as_object().unwrap(),
            remote.as_object().unwrap(),
            &map,
            DiffOptions::default(),
        )
        .unwrap();
        assert!(changed);
        assert_eq!(
            payload["defaultQuotas"],
            json!({ "movie": { "quotaLimit": 5 }, "tv": { "quotaLimit": 2 } })
        );
    }

    #[test]
    fn unknown_local_field_is_fatal() {
        let map = vec![RemoteMapEntry::new("nonexistent", "x")];
        let err = server()
            .update_remote_attrs("t", &server(), &map, DiffOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"), "got: {err}");
    }

    #[test]
    fn create_payload_skips_set_if_failures() {
        let payload = server().create_remote_attrs("t", &server_map()).unwrap();
        assert_eq!(
            Value::Object(payload),
            json!({ "hostname": "sonarr", "baseUrl": "", "preventSearch": false })
        );
    }

    // ── Codec round trips ───────────────────────────────────────────

    #[test]
    fn codec_round_trips() {
        type CodecFn = fn(&Value) -> Result<Value, MapError>;
        let cases: &[(CodecFn, CodecFn, Value)] = &[
            (codec::null_as_empty, codec::empty_as_null, Value::Null),
            (codec::null_as_empty, codec::empty_as_null, json!("/sonarr")),
            (codec::negate, codec::negate, json!(true)),
            (codec::negate, codec::negate, json!(false)),
            (codec::comma_set_encode, codec::comma_set_decode, json!([])),
            (codec::comma_set_encode, codec::comma_set_decode, json!(["en", "fr"])),
        ];
        for (encode, decode, value) in cases {
            assert_eq!(&decode(&encode(value).unwrap()).unwrap(), value);
        }
    }

    #[test]
    fn comma_set_decode_normalizes() {
        assert_eq!(
            codec::comma_set_decode(&json!("fr, en,,en")).unwrap(),
            json!(["en", "fr"])
        );
        assert_eq!(codec::comma_set_decode(&json!("")).unwrap(), json!([]));
    }

    #[test]
    fn truthiness() {
        assert!(!codec::is_truthy(&Value::Null));
        assert!(!codec::is_truthy(&json!("")));
        assert!(!codec::is_truthy(&json!(0)));
        assert!(codec::is_truthy(&json!("x")));
        assert!(codec::is_truthy(&json!(3)));
    }
}
