//! `clap`-backed grammars.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use ::clap::{ArgMatches, Command};

use super::{ArgValue, ParsedArgs};
use crate::error::{GrammarError, GrammarResult};

/// Runs clap's own consistency checks, which panic on a misconfigured
/// command, and reports a failure as [`GrammarError::InvalidHelpDoc`].
pub(super) fn validate(cmd: &Command) -> GrammarResult<()> {
    let checked = cmd.clone().no_binary_name(true);
    panic::catch_unwind(AssertUnwindSafe(move || checked.debug_assert())).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "misconfigured clap command".to_string());
        GrammarError::invalid_doc(cmd.get_name(), reason)
    })
}

/// Parses `tokens` with `cmd`, returning clap's rendered message on failure.
///
/// `--help` and `--version` also come back as `Err`, carrying the rendered
/// help text.
pub(super) fn parse(cmd: &Command, tokens: &[String]) -> Result<ParsedArgs, String> {
    let matches = cmd
        .clone()
        .no_binary_name(true)
        .try_get_matches_from(tokens)
        .map_err(|e| e.render().to_string())?;

    Ok(ParsedArgs {
        pattern: cmd.get_name().to_string(),
        values: collect_values(&matches),
        matches: Some(matches),
    })
}

fn collect_values(matches: &ArgMatches) -> HashMap<String, ArgValue> {
    matches
        .ids()
        .filter_map(|id| {
            let raw = matches.try_get_raw(id.as_str()).ok().flatten()?;
            let mut values: Vec<String> = raw.map(|v| v.to_string_lossy().into_owned()).collect();
            let value = if values.len() == 1 {
                ArgValue::Single(values.remove(0))
            } else {
                ArgValue::Multiple(values)
            };
            Some((id.as_str().to_string(), value))
        })
        .collect()
}

/// One usage line, e.g. `~roll [OPTIONS] <DICE> - Roll dice`.
pub(super) fn usage_line(head: &str, cmd: &Command) -> String {
    let rendered = cmd.clone().no_binary_name(true).render_usage().to_string();
    let usage = rendered.trim_start_matches("Usage:").trim();
    let usage = usage.strip_prefix(cmd.get_name()).unwrap_or(usage).trim();
    let about = cmd.get_about().map(|a| a.to_string());
    super::usage_line(head, usage, about.as_deref())
}
