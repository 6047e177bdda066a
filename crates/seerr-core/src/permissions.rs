// ── Permission bit flags ──
//
// The remote stores a user's permissions as one integer bitmask. Coarse
// flags (`REQUEST`, `MANAGE_ISSUES`, ...) imply their fine-grained siblings,
// and the remote never reports both. Decoding walks a fixed rule table;
// encoding is a plain OR-fold.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

use crate::remote_map::MapError;

/// A single permission flag. Discriminants are the remote's bit values.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[repr(u32)]
pub enum Permission {
    None = 0,
    Admin = 2,
    ManageSettings = 4,
    ManageUsers = 8,
    ManageRequests = 16,
    Request = 32,
    Vote = 64,
    AutoApprove = 128,
    AutoApproveMovie = 256,
    AutoApproveTv = 512,
    #[strum(to_string = "REQUEST_4K")]
    Request4k = 1024,
    #[strum(to_string = "REQUEST_4K_MOVIE")]
    Request4kMovie = 2048,
    #[strum(to_string = "REQUEST_4K_TV")]
    Request4kTv = 4096,
    RequestAdvanced = 8192,
    RequestView = 16384,
    #[strum(to_string = "AUTO_APPROVE_4K")]
    AutoApprove4k = 32768,
    #[strum(to_string = "AUTO_APPROVE_4K_MOVIE")]
    AutoApprove4kMovie = 65536,
    #[strum(to_string = "AUTO_APPROVE_4K_TV")]
    AutoApprove4kTv = 131_072,
    RequestMovie = 262_144,
    RequestTv = 524_288,
    ManageIssues = 1_048_576,
    ViewIssues = 2_097_152,
    CreateIssues = 4_194_304,
    AutoRequest = 8_388_608,
    AutoRequestMovie = 16_777_216,
    AutoRequestTv = 33_554_432,
    RecentView = 67_108_864,
    WatchlistView = 134_217_728,
}

impl Permission {
    /// The flag's bit value.
    #[allow(clippy::as_conversions)]
    pub const fn bits(self) -> u32 {
        self as u32
    }

    /// Lowercase name used in configuration documents (`manage_issues`).
    pub fn config_name(self) -> String {
        self.to_string().to_ascii_lowercase()
    }

    /// Parse a configuration name. Case-insensitive; `-` and `_` are equivalent.
    pub fn parse(name: &str) -> Result<Self, PermissionError> {
        Self::from_str(&name.trim().replace('-', "_"))
            .map_err(|_| PermissionError::Unknown(name.to_owned()))
    }

    fn is_set_in(self, bits: u32) -> bool {
        bits & self.bits() != 0
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.config_name())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::parse(&name).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("permission '{permission}' requires unset permission '{required}'")]
    MissingPrerequisite {
        permission: Permission,
        required: Permission,
    },

    #[error("unknown permission '{0}'")]
    Unknown(String),
}

// ── Rule table ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Rule {
    flag: Permission,
    requires: Option<Permission>,
}

const fn rule(flag: Permission) -> Rule {
    Rule {
        flag,
        requires: None,
    }
}

const fn rule_requiring(flag: Permission, requires: Permission) -> Rule {
    Rule {
        flag,
        requires: Some(requires),
    }
}

/// A coarse flag and the fine flags it implies. When the coarse bit is set
/// only the coarse flag is decoded.
#[derive(Debug)]
struct Family {
    coarse: Rule,
    fine: &'static [Rule],
}

/// Flags decoded on their own, outside any family.
const STANDALONE: &[Permission] = &[Permission::ManageUsers];

/// Families in decode order. A rule's prerequisite must already have been
/// decoded, so prerequisite families come first.
const FAMILIES: &[Family] = &[
    Family {
        coarse: rule(Permission::ManageIssues),
        fine: &[rule(Permission::CreateIssues), rule(Permission::ViewIssues)],
    },
    Family {
        coarse: rule(Permission::ManageRequests),
        fine: &[
            rule(Permission::RequestAdvanced),
            rule(Permission::RequestView),
            rule(Permission::RecentView),
            rule(Permission::WatchlistView),
        ],
    },
    Family {
        coarse: rule(Permission::Request),
        fine: &[rule(Permission::RequestMovie), rule(Permission::RequestTv)],
    },
    Family {
        coarse: rule(Permission::Request4k),
        fine: &[rule(Permission::Request4kMovie), rule(Permission::Request4kTv)],
    },
    Family {
        coarse: rule_requiring(Permission::AutoRequest, Permission::Request),
        fine: &[
            rule_requiring(Permission::AutoRequestMovie, Permission::RequestMovie),
            rule_requiring(Permission::AutoRequestTv, Permission::RequestTv),
        ],
    },
    Family {
        coarse: rule_requiring(Permission::AutoApprove, Permission::Request),
        fine: &[
            rule_requiring(Permission::AutoApproveMovie, Permission::RequestMovie),
            rule_requiring(Permission::AutoApproveTv, Permission::RequestTv),
        ],
    },
    Family {
        coarse: rule_requiring(Permission::AutoApprove4k, Permission::Request4k),
        fine: &[
            rule_requiring(Permission::AutoApprove4kMovie, Permission::Request4kMovie),
            rule_requiring(Permission::AutoApprove4kTv, Permission::Request4kTv),
        ],
    },
];

fn admit(decoded: &mut BTreeSet<Permission>, rule: Rule) -> Result<(), PermissionError> {
    if let Some(required) = rule.requires {
        if !decoded.contains(&required) {
            return Err(PermissionError::MissingPrerequisite {
                permission: rule.flag,
                required,
            });
        }
    }
    decoded.insert(rule.flag);
    Ok(())
}

// ── Codec ───────────────────────────────────────────────────────────

/// OR-fold of the member bits. Performs no validation.
pub fn encode<'a>(permissions: impl IntoIterator<Item = &'a Permission>) -> u32 {
    permissions
        .into_iter()
        .fold(0, |bits, permission| bits | permission.bits())
}

/// Decode a remote bitmask into its canonical permission set.
pub fn decode(bits: u32) -> Result<BTreeSet<Permission>, PermissionError> {
    if bits == 0 {
        return Ok(BTreeSet::from([Permission::None]));
    }
    if Permission::Admin.is_set_in(bits) {
        return Ok(BTreeSet::from([Permission::Admin]));
    }

    let mut decoded = BTreeSet::new();
    for &flag in STANDALONE {
        if flag.is_set_in(bits) {
            decoded.insert(flag);
        }
    }
    for family in FAMILIES {
        if family.coarse.flag.is_set_in(bits) {
            admit(&mut decoded, family.coarse)?;
            continue;
        }
        for &fine in family.fine {
            if fine.flag.is_set_in(bits) {
                admit(&mut decoded, fine)?;
            }
        }
    }

    if decoded.is_empty() {
        decoded.insert(Permission::None);
    }
    Ok(decoded)
}

/// Canonicalize a permission set into the form the remote reports.
pub fn set_reduce<'a>(
    permissions: impl IntoIterator<Item = &'a Permission>,
) -> Result<BTreeSet<Permission>, PermissionError> {
    decode(encode(permissions))
}

// ── Remote-map transforms ───────────────────────────────────────────

/// Remote integer → local permission name list.
pub fn decode_value(value: &Value) -> Result<Value, MapError> {
    let bits = value
        .as_u64()
        .and_then(|bits| u32::try_from(bits).ok())
        .ok_or_else(|| MapError::new(format!("expected a permission bitmask, got: {value}")))?;
    let decoded = decode(bits).map_err(|e| MapError::new(e.to_string()))?;
    serde_json::to_value(decoded).map_err(|e| MapError::new(e.to_string()))
}

/// Local permission name list → remote integer.
pub fn encode_value(value: &Value) -> Result<Value, MapError> {
    let permissions = BTreeSet::<Permission>::deserialize(value)
        .map_err(|e| MapError::new(e.to_string()))?;
    Ok(Value::from(encode(&permissions)))
}
