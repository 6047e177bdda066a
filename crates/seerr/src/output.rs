//! Terminal output: the apply summary line and YAML documents.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_yaml::Value;

use crate::cli::ColorMode;
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Print the outcome of an apply pass.
pub fn print_outcome(changed: bool, dry_run: bool, color: bool) -> Result<(), CliError> {
    let message = match (changed, dry_run) {
        (true, true) => "remote would be updated (dry run)",
        (true, false) => "remote updated",
        (false, _) => "remote is up to date",
    };
    let mut stdout = io::stdout().lock();
    match (color, changed) {
        (false, _) => writeln!(stdout, "{message}")?,
        (true, true) => writeln!(stdout, "{}", message.yellow())?,
        (true, false) => writeln!(stdout, "{}", message.green())?,
    }
    Ok(())
}

/// Render a serializable document as YAML, dropping null values so the
/// output only carries what is set.
pub fn render_yaml<T: serde::Serialize>(data: &T) -> Result<String, CliError> {
    let mut value = serde_yaml::to_value(data)?;
    strip_nulls(&mut value);
    Ok(serde_yaml::to_string(&value)?)
}

fn strip_nulls(value: &mut Value) {
    match value {
        Value::Mapping(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Sequence(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
