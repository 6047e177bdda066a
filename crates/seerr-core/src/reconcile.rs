// ── Single-object section reconciler ──
//
// fetch → build local-from-remote → diff → push. Sections backed by one
// remote object use these helpers; named collections live in `collection`.

use std::future::Future;

use seerr_api::StatusCode;
use serde_json::Value;

use crate::context::ReconcileContext;
use crate::error::CoreError;
use crate::remote_map::{ConfigRecord, RemoteAttrs, RemoteMapEntry};

/// A configuration section that can be read from and pushed to the remote.
pub trait Section: Sized {
    /// Read the section's current state from the remote.
    fn from_remote(
        tree: &str,
        ctx: &ReconcileContext,
    ) -> impl Future<Output = Result<Self, CoreError>>;

    /// Bring the remote in line with `self`. Returns whether anything was pushed.
    fn update_remote(
        &self,
        tree: &str,
        ctx: &ReconcileContext,
        remote: &Self,
    ) -> impl Future<Output = Result<bool, CoreError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMethod {
    Post,
    Put,
}

/// Where a single-object section lives and how changes are pushed to it.
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub path: &'static str,
    pub push_method: PushMethod,
    pub push_status: StatusCode,
}

impl Endpoint {
    /// Changes are `POST`ed back, expecting `201 Created`.
    pub const fn post(path: &'static str) -> Self {
        Self {
            path,
            push_method: PushMethod::Post,
            push_status: StatusCode::CREATED,
        }
    }

    /// Changes are `PUT`, expecting `200 OK`.
    pub const fn put(path: &'static str) -> Self {
        Self {
            path,
            push_method: PushMethod::Put,
            push_status: StatusCode::OK,
        }
    }

    pub const fn expecting(mut self, status: StatusCode) -> Self {
        self.push_status = status;
        self
    }
}

/// GET the raw remote object.
pub async fn fetch_raw(ctx: &ReconcileContext, endpoint: &Endpoint) -> Result<Value, CoreError> {
    Ok(ctx.client().get(endpoint.path).send().await?)
}

/// GET the remote object and build a record from it.
pub async fn fetch<T: ConfigRecord>(
    ctx: &ReconcileContext,
    tree: &str,
    endpoint: &Endpoint,
    remote_map: &[RemoteMapEntry],
) -> Result<T, CoreError> {
    let remote = fetch_raw(ctx, endpoint).await?;
    T::from_remote_object(tree, remote_map, &remote)
}

/// Send a payload to the section's endpoint in a single request.
pub async fn push(
    ctx: &ReconcileContext,
    endpoint: &Endpoint,
    payload: impl Into<Value>,
) -> Result<Value, CoreError> {
    let client = ctx.client();
    let request = match endpoint.push_method {
        PushMethod::Post => client.post(endpoint.path),
        PushMethod::Put => client.put(endpoint.path),
    };
    Ok(request
        .json(payload)
        .expect(endpoint.push_status)
        .send()
        .await?)
}

/// Diff `desired` against `remote`; if anything changed, push every changed
/// attribute in one request.
pub async fn push_if_changed<T: ConfigRecord>(
    ctx: &ReconcileContext,
    tree: &str,
    endpoint: &Endpoint,
    desired: &T,
    remote: &T,
    remote_map: &[RemoteMapEntry],
) -> Result<bool, CoreError> {
    let (changed, payload) = diff(ctx, tree, desired, remote, remote_map)?;
    if changed {
        push(ctx, endpoint, payload).await?;
    }
    Ok(changed)
}

/// Diff with the context's options, without pushing.
pub fn diff<T: ConfigRecord>(
    ctx: &ReconcileContext,
    tree: &str,
    desired: &T,
    remote: &T,
    remote_map: &[RemoteMapEntry],
) -> Result<(bool, RemoteAttrs), CoreError> {
    desired.update_remote_attrs(tree, remote, remote_map, ctx.diff_options())
}
