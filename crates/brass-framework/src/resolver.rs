//! Command text resolution: prefixes, chains and aliases.

use std::collections::HashMap;
use std::sync::Arc;

use brass_core::remove_ineffective_text;

use crate::error::ResolveError;
use crate::module::Module;

/// A sub-command resolved to its module.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub module: Arc<Module>,
    /// The canonical keyword.
    pub keyword: String,
    /// The sub-command with its first token lowercased and any alias
    /// expanded.
    pub command: String,
}

/// Splits command text and resolves sub-commands to modules.
#[derive(Debug, Clone)]
pub struct CommandResolver {
    prefixes: Vec<String>,
    separator: String,
}

impl CommandResolver {
    pub fn new(prefixes: Vec<String>, separator: impl Into<String>) -> Self {
        Self {
            prefixes,
            separator: separator.into(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns the matched prefix and the text after it.
    pub fn strip_prefix<'a>(&self, display: &'a str) -> Option<(&'a str, &'a str)> {
        self.prefixes
            .iter()
            .filter(|p| !p.is_empty())
            .find_map(|p| {
                display
                    .strip_prefix(p.as_str())
                    .map(|body| (&display[..p.len()], body))
            })
    }

    /// Splits the text after the prefix into chained sub-commands.
    ///
    /// Parts are trimmed, a repeated prefix is dropped and empty parts are
    /// removed.
    pub fn split_chain(&self, body: &str) -> Vec<String> {
        let parts: Vec<&str> = body.split(self.separator.as_str()).collect();
        remove_ineffective_text(self.prefixes.as_slice(), &parts)
    }

    /// Resolves one sub-command.
    ///
    /// The first token is lowercased, then substituted once through
    /// `aliases`. An alias may expand to several words; the keyword is the
    /// first word of the expansion.
    pub fn resolve(
        &self,
        command: &str,
        modules: &HashMap<String, Arc<Module>>,
        aliases: &HashMap<String, String>,
    ) -> Result<Resolved, ResolveError> {
        let (first, rest) = match command.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, Some(rest)),
            None => (command, None),
        };
        let first = first.to_lowercase();

        let head = aliases.get(&first).cloned().unwrap_or(first);
        let command = match rest {
            Some(rest) => format!("{head} {rest}"),
            None => head,
        };

        let keyword = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();
        let module = modules
            .get(&keyword)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownCommand(keyword.clone()))?;

        Ok(Resolved {
            module,
            keyword,
            command,
        })
    }
}

impl Default for CommandResolver {
    fn default() -> Self {
        Self::new(vec!["~".into(), "～".into()], "&&")
    }
}
