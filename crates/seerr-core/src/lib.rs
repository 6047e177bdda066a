//! Reconciliation engine between a declarative configuration document and a
//! live Jellyseerr-style server.
//!
//! - **[`remote_map`]**: table-driven translation between local record
//!   fields and remote JSON keys, with custom encoders/decoders, root
//!   encoders spanning several keys, optional keys and `set_if` predicates.
//!
//! - **[`permissions`]**: [`Permission`] bit flags and the codec turning a
//!   permission set into the remote's integer bitmask and back, enforcing
//!   coarse/fine implication rules.
//!
//! - **[`reconcile`]**: the single-object section reconciler:
//!   fetch → build local-from-remote → diff → push.
//!
//! - **[`collection`]**: the named-collection reconciler: match entries by
//!   name, render references against live metadata, then create, update or
//!   delete.
//!
//! - **[`settings`]**: every configuration section and the top-level
//!   [`Settings`] pass that drives them in dependency order.
//!
//! All remote calls go through a [`ReconcileContext`], which carries the
//! API client (credential, timeout, dry-run flag) and the cross-instance
//! [`SecretResolver`].

pub mod collection;
pub mod context;
pub mod error;
pub mod model;
pub mod permissions;
pub mod reconcile;
pub mod remote_map;
pub mod settings;

// ── Primary re-exports ──────────────────────────────────────────────
pub use context::{NoSecrets, ReconcileContext, SecretResolver};
pub use error::{CoreError, SectionFailure};
pub use model::{ResourceRef, Secret};
pub use permissions::{Permission, PermissionError};
pub use reconcile::Section;
pub use remote_map::{ConfigRecord, DiffOptions, MapError, RemoteMap, RemoteMapEntry};
pub use settings::{ROOT_TREE, Settings};

pub use seerr_api::{Error as ApiError, SeerrClient, TlsMode, TransportConfig};
