//! `seerr apply`: bootstrap if needed, then reconcile every section.

use tracing::info;

use seerr_config::{Config, build_context, config_path, load_config};
use seerr_core::{ROOT_TREE, ReconcileContext, Section, Settings};

use crate::cli::{ApplyArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: ApplyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = args.config.clone().unwrap_or_else(config_path);
    let mut config = load_config(&path)?;
    apply_overrides(&mut config, &args, global);

    let ctx = build_context(&config, args.dry_run)?;
    let changed = reconcile(&config.settings, &ctx).await?;
    output::print_outcome(changed, args.dry_run, output::should_color(global.color))
}

fn apply_overrides(config: &mut Config, args: &ApplyArgs, global: &GlobalOpts) {
    if let Some(timeout) = global.timeout {
        config.request_timeout = timeout;
    }
    config.insecure |= global.insecure;
    config.check_unmanaged |= args.check_unmanaged;
}

/// Returns whether the remote was (or, in dry-run mode, would be) changed.
async fn reconcile(settings: &Settings, ctx: &ReconcileContext) -> Result<bool, CliError> {
    if !Settings::is_initialized(ROOT_TREE, ctx).await? {
        settings.initialize(ROOT_TREE, ctx).await?;
        if ctx.is_dry_run() {
            // Nothing past the bootstrap can be read from an uninitialized instance.
            return Ok(true);
        }
    }

    info!("Fetching remote configuration");
    let remote = Settings::from_remote(ROOT_TREE, ctx).await?;
    info!("Updating remote configuration");
    Ok(settings.update_remote(ROOT_TREE, ctx, &remote).await?)
}
