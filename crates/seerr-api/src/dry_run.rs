// Response simulator for dry-run mode.
//
// Mutating calls are answered locally with the status the caller expects
// and an empty JSON object, so diff/create/update logic runs unchanged.

use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use tracing::info;
use url::Url;

/// A response synthesized instead of contacting the remote.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Simulate a mutating request.
pub fn simulate(method: &Method, url: &Url, expected: StatusCode) -> SimulatedResponse {
    info!(dry_run = true, "{method} {url} (simulated)");
    SimulatedResponse {
        status: expected,
        body: Value::Object(Map::new()),
    }
}

/// Side effects of a request, as declared by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Effect {
    /// Inferred from the verb: `GET`/`HEAD` read, everything else mutates.
    #[default]
    FromMethod,
    /// A probe sent with a mutating verb (e.g. a connection test).
    ReadOnly,
    /// A `GET` that changes remote state (e.g. enabling libraries).
    Mutating,
}

/// Whether a request must be simulated rather than sent.
pub fn must_simulate(method: &Method, effect: Effect) -> bool {
    match effect {
        Effect::FromMethod => *method != Method::GET && *method != Method::HEAD,
        Effect::ReadOnly => false,
        Effect::Mutating => true,
    }
}
