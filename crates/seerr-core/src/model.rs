// ── Shared value types for configuration records ──

use std::collections::BTreeSet;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Secret ──────────────────────────────────────────────────────────

/// A secret configuration value (API key, password, PGP key).
///
/// Debug output is redacted. Serialization exposes the value, since records
/// are serialized to build request payloads and to dump configuration.
#[derive(Clone)]
pub struct Secret(SecretString);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn as_secret_string(&self) -> &SecretString {
        &self.0
    }
}

impl From<SecretString> for Secret {
    fn from(value: SecretString) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(********)")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Secret {}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ── ResourceRef ─────────────────────────────────────────────────────

/// A reference to a named resource on a linked service (quality profile,
/// language profile, tag), given either by name or by numeric ID.
///
/// Rendering resolves both forms against live metadata and normalizes to
/// the name, so configuration stays human-readable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<i64> for ResourceRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

// ── Case-normalizing field deserializers ────────────────────────────

/// Language codes are compared lowercase.
pub(crate) fn lowercase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|s| s.trim().to_lowercase())
}

pub(crate) fn lowercase_set<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeSet<String>, D::Error> {
    BTreeSet::<String>::deserialize(deserializer)
        .map(|set| set.into_iter().map(|s| s.trim().to_lowercase()).collect())
}

/// Region codes are compared uppercase.
pub(crate) fn uppercase_opt<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer).map(|s| s.map(|s| s.trim().to_uppercase()))
}
