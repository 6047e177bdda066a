//! `seerr dump-config`: read a live instance into a config document.

use secrecy::SecretString;
use url::Url;

use seerr_config::{Config, Protocol};
use seerr_core::{ROOT_TREE, ReconcileContext, Section, SeerrClient, Settings};

use crate::cli::{DumpConfigArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: DumpConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = connection_from_url(&args.url)?;
    if let Some(timeout) = global.timeout {
        config.request_timeout = timeout;
    }
    config.insecure = global.insecure;

    let api_key = match args.api_key {
        Some(key) => SecretString::from(key),
        None => SecretString::from(rpassword::prompt_password("Instance API key: ")?),
    };
    let client = SeerrClient::new(&config.host_url(), &config.transport())
        .map_err(CliError::from)?
        .with_api_key(api_key);
    let ctx = ReconcileContext::new(client);

    config.settings = Settings::from_remote(ROOT_TREE, &ctx).await?;
    print!("{}", output::render_yaml(&config)?);
    Ok(())
}

/// Connection fields of a config document, taken from an instance URL.
fn connection_from_url(raw: &str) -> Result<Config, CliError> {
    let invalid = |reason: String| CliError::Validation {
        field: "url".into(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(format!("'{raw}': {e}")))?;
    let protocol = match url.scheme() {
        "http" => Protocol::Http,
        "https" => Protocol::Https,
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    let hostname = url
        .host_str()
        .ok_or_else(|| invalid(format!("'{raw}' has no host")))?
        .to_owned();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid(format!("'{raw}' has no port")))?;
    let url_base = Some(url.path().trim_matches('/'))
        .filter(|base| !base.is_empty())
        .map(|base| format!("/{base}"));

    Ok(Config {
        hostname,
        port,
        protocol,
        url_base,
        ..Config::default()
    })
}
