// HTTP client for the remote's `/api/v1/` JSON API.
//
// Auth: `X-Api-Key` header, omitted for the public settings and bootstrap calls.
// Every call declares the single status it expects; anything else is an error.

use reqwest::header::HeaderValue;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::Error;
use crate::dry_run::{self, Effect};
use crate::transport::TransportConfig;

// ── Client ───────────────────────────────────────────────────────────

/// Async client for a single remote instance.
///
/// Holds the credential and the dry-run flag; requests are built with
/// [`get`](Self::get), [`post`](Self::post), [`put`](Self::put) and
/// [`delete`](Self::delete) and sent one at a time by the caller.
#[derive(Debug, Clone)]
pub struct SeerrClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    dry_run: bool,
}

impl SeerrClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a host URL and transport config.
    ///
    /// Bootstrap calls share one session cookie.
    pub fn new(host_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Self::from_reqwest(host_url, transport.build_client()?)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(host_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(host_url)?,
            api_key: None,
            dry_run: false,
        })
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Enable or disable the dry-run response simulator.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Ensure the base URL ends with `/` so relative API paths join under it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join an API path (e.g. `"/api/v1/settings/main"`) onto the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn api_key_header(&self) -> Result<Option<HeaderValue>, Error> {
        let Some(key) = self.api_key.as_ref() else {
            return Ok(None);
        };
        let mut value = HeaderValue::from_str(key.expose_secret())
            .map_err(|e| Error::InvalidApiKey(e.to_string()))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    pub fn get(&self, path: impl Into<String>) -> ApiRequest<'_> {
        ApiRequest::new(self, Method::GET, path.into(), StatusCode::OK)
    }

    pub fn post(&self, path: impl Into<String>) -> ApiRequest<'_> {
        ApiRequest::new(self, Method::POST, path.into(), StatusCode::CREATED)
    }

    pub fn put(&self, path: impl Into<String>) -> ApiRequest<'_> {
        ApiRequest::new(self, Method::PUT, path.into(), StatusCode::OK)
    }

    pub fn delete(&self, path: impl Into<String>) -> ApiRequest<'_> {
        ApiRequest::new(self, Method::DELETE, path.into(), StatusCode::OK)
    }
}

// ── Request builder ──────────────────────────────────────────────────

/// A single pending API call.
#[must_use = "requests do nothing until `send` is awaited"]
pub struct ApiRequest<'a> {
    client: &'a SeerrClient,
    method: Method,
    path: String,
    body: Option<Value>,
    expected: StatusCode,
    use_api_key: bool,
    effect: Effect,
}

impl<'a> ApiRequest<'a> {
    fn new(client: &'a SeerrClient, method: Method, path: String, expected: StatusCode) -> Self {
        Self {
            client,
            method,
            path,
            body: None,
            expected,
            use_api_key: true,
            effect: Effect::FromMethod,
        }
    }

    /// Attach a JSON request body.
    pub fn json(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Override the expected success status.
    pub fn expect(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }

    /// Do not send the `X-Api-Key` header.
    pub fn without_api_key(mut self) -> Self {
        self.use_api_key = false;
        self
    }

    /// Mark a mutating-verb request as side-effect free so it is sent even in dry-run mode.
    pub fn read_only(mut self) -> Self {
        self.effect = Effect::ReadOnly;
        self
    }

    /// Mark a `GET` as changing remote state so dry-run mode simulates it.
    pub fn mutating(mut self) -> Self {
        self.effect = Effect::Mutating;
        self
    }

    /// Send the request and decode the JSON response body.
    ///
    /// An empty body decodes to `Value::Null`.
    pub async fn send(self) -> Result<Value, Error> {
        let url = self.client.url(&self.path)?;

        if self.client.dry_run && dry_run::must_simulate(&self.method, self.effect) {
            if let Some(ref body) = self.body {
                trace!("{} {url} <- req={body}", self.method);
            }
            return Ok(dry_run::simulate(&self.method, &url, self.expected).body);
        }

        debug!("{} {url}", self.method);
        let mut builder = self.client.http.request(self.method.clone(), url.clone());
        if self.use_api_key {
            if let Some(header) = self.client.api_key_header()? {
                builder = builder.header("X-Api-Key", header);
            }
        }
        if let Some(ref body) = self.body {
            trace!("{} {url} <- req={body}", self.method);
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let raw = resp.text().await?;
        debug!("{} {url} -> status={}", self.method, status.as_u16());
        trace!("{} {url} -> res={raw}", self.method);

        if status != self.expected {
            return Err(Error::unexpected_status(self.method, &url, status, &raw));
        }
        if raw.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&raw).map_err(|e| {
            let preview = raw
                .char_indices()
                .nth(200)
                .map_or(raw.as_str(), |(end, _)| &raw[..end]);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: raw.clone(),
            }
        })
    }
}
