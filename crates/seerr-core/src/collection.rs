// ── Named-collection reconciler ──
//
// Reconciles a map of named entries against a remote collection endpoint
// (`GET`/`POST {endpoint}`, `PUT`/`DELETE {endpoint}/{id}`). Each entry is
// rendered against live metadata before it is compared, so references by
// name and by ID compare equal.

use std::future::Future;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::model::ResourceRef;
use crate::remote_map::{ConfigRecord, DiffOptions, RemoteAttrs, RemoteMap};

/// One entry type of a named collection.
pub trait CollectionEntry: ConfigRecord {
    /// Credential and live metadata the entry needs to render.
    type Lookup;

    /// Fetch the entry's lookup data (resolving its credential and probing
    /// its target as needed).
    fn prepare(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
    ) -> impl Future<Output = Result<Self::Lookup, CoreError>>;

    /// Resolve references against `lookup`. With `required`, an unresolvable
    /// reference is an error; otherwise it passes through unchanged.
    fn render(&self, tree: &str, lookup: &Self::Lookup, required: bool)
    -> Result<Self, CoreError>;

    /// The entry's remote map. Encoders that translate names to IDs need the
    /// lookup; decoding works without one.
    fn remote_map(lookup: Option<&Self::Lookup>) -> RemoteMap;
}

/// The tree path of a named entry within its collection section.
pub fn entry_tree(tree: &str, name: &str) -> String {
    format!("{tree}.definitions[{name:?}]")
}

// ── Fetching ────────────────────────────────────────────────────────

/// GET the remote collection, indexed by entry name.
///
/// Each value is the entry's ID and raw object. Two remote entries sharing a
/// name are reported as a validation error.
pub async fn fetch_index(
    ctx: &ReconcileContext,
    tree: &str,
    endpoint: &str,
) -> Result<IndexMap<String, (i64, Value)>, CoreError> {
    let body = ctx.client().get(endpoint).send().await?;
    let Value::Array(items) = body else {
        return Err(CoreError::Mapping {
            tree: tree.to_owned(),
            message: format!("expected a list from '{endpoint}', got: {body}"),
        });
    };

    let mut index = IndexMap::with_capacity(items.len());
    for item in items {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| CoreError::Mapping {
                tree: tree.to_owned(),
                message: format!("remote entry without a name: {item}"),
            })?;
        let id = item
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| CoreError::Mapping {
                tree: entry_tree(tree, &name),
                message: format!("remote entry without an ID: {item}"),
            })?;
        if let Some((other_id, _)) = index.get(&name) {
            return Err(CoreError::validation(
                entry_tree(tree, &name),
                format!(
                    "several remote entries share this name (IDs {other_id} and {id}), \
                     rename or delete one of them on the remote"
                ),
            ));
        }
        index.insert(name, (id, item));
    }
    Ok(index)
}

/// GET the remote collection and build a record per entry.
pub async fn fetch_collection<E: CollectionEntry>(
    ctx: &ReconcileContext,
    tree: &str,
    endpoint: &str,
) -> Result<IndexMap<String, E>, CoreError> {
    let remote_map = E::remote_map(None);
    fetch_index(ctx, tree, endpoint)
        .await?
        .into_iter()
        .map(|(name, (_, object))| {
            let entry = E::from_remote_object(&entry_tree(tree, &name), &remote_map, &object)?;
            Ok((name, entry))
        })
        .collect()
}

// ── Reconciling ─────────────────────────────────────────────────────

fn with_name(name: &str, attrs: RemoteAttrs) -> Value {
    let mut payload = Map::with_capacity(attrs.len() + 1);
    payload.insert("name".to_owned(), Value::String(name.to_owned()));
    payload.extend(attrs);
    Value::Object(payload)
}

fn remote_id(
    ids: &IndexMap<String, (i64, Value)>,
    tree: &str,
    name: &str,
) -> Result<i64, CoreError> {
    ids.get(name).map(|(id, _)| *id).ok_or_else(|| {
        CoreError::validation(
            entry_tree(tree, name),
            "entry is no longer present on the remote",
        )
    })
}

/// Reconcile `desired` against `remote` (both keyed by entry name).
///
/// Entries are processed in declared order and the first failure stops the
/// pass. Returns whether any create, update or delete was issued.
pub async fn reconcile_collection<E: CollectionEntry>(
    ctx: &ReconcileContext,
    tree: &str,
    endpoint: &str,
    desired: &IndexMap<String, E>,
    remote: &IndexMap<String, E>,
    delete_unmanaged: bool,
) -> Result<bool, CoreError> {
    let ids = fetch_index(ctx, tree, endpoint).await?;
    let options = DiffOptions {
        set_unchanged: true,
        ..ctx.diff_options()
    };
    let mut changed = false;

    for (name, entry) in desired {
        let entry_tree = entry_tree(tree, name);
        let lookup = entry.prepare(&entry_tree, ctx).await?;
        let rendered = entry.render(&entry_tree, &lookup, true)?;
        let remote_map = E::remote_map(Some(&lookup));

        let Some(remote_entry) = remote.get(name) else {
            let attrs = rendered.create_remote_attrs(&entry_tree, &remote_map)?;
            ctx.client()
                .post(endpoint)
                .json(with_name(name, attrs))
                .send()
                .await?;
            changed = true;
            continue;
        };

        let remote_rendered = remote_entry.render(&entry_tree, &lookup, false)?;
        let (entry_changed, attrs) =
            rendered.update_remote_attrs(&entry_tree, &remote_rendered, &remote_map, options)?;
        if entry_changed {
            let id = remote_id(&ids, tree, name)?;
            ctx.client()
                .put(format!("{endpoint}/{id}"))
                .json(with_name(name, attrs))
                .send()
                .await?;
            changed = true;
        }
    }

    for name in remote.keys().filter(|name| !desired.contains_key(*name)) {
        let entry_tree = entry_tree(tree, name);
        if delete_unmanaged {
            let id = remote_id(&ids, tree, name)?;
            info!("{entry_tree}: (...) -> (deleted)");
            ctx.client()
                .delete(format!("{endpoint}/{id}"))
                .send()
                .await?;
            changed = true;
        } else {
            debug!("{entry_tree}: (...) (unmanaged)");
        }
    }

    Ok(changed)
}

// ── Reference resolution ────────────────────────────────────────────

fn candidates(ids: &IndexMap<String, i64>) -> String {
    ids.iter()
        .map(|(name, id)| format!("{name:?} ({id})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve a name-or-ID reference against a name → ID table.
///
/// A known ID renders to its name; a name is kept as-is if known. With
/// `required`, anything else is an error listing every candidate; without,
/// the reference passes through unchanged.
pub fn resolve_reference(
    tree: &str,
    description: &str,
    ids: &IndexMap<String, i64>,
    reference: &ResourceRef,
    required: bool,
) -> Result<ResourceRef, CoreError> {
    match reference {
        ResourceRef::Id(id) => {
            if let Some((name, _)) = ids.iter().find(|(_, known)| *known == id) {
                return Ok(ResourceRef::Name(name.clone()));
            }
            if required {
                return Err(CoreError::validation(
                    tree,
                    format!(
                        "Invalid {description} ID {id} (expected one of: {})",
                        candidates(ids)
                    ),
                ));
            }
            Ok(reference.clone())
        }
        ResourceRef::Name(name) => {
            if !required || ids.contains_key(name) {
                return Ok(reference.clone());
            }
            Err(CoreError::validation(
                tree,
                format!(
                    "Invalid {description} name '{name}' (expected one of: {})",
                    candidates(ids)
                ),
            ))
        }
    }
}

/// Translate a rendered reference to its remote ID.
pub fn reference_id(ids: &IndexMap<String, i64>, reference: &ResourceRef) -> Option<i64> {
    match reference {
        ResourceRef::Id(id) => Some(*id),
        ResourceRef::Name(name) => ids.get(name).copied(),
    }
}
