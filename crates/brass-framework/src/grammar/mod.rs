//! Argument grammars for command modules.
//!
//! A [`CommandEntry`](crate::CommandEntry) may declare how its arguments
//! look. [`CommandParser`] tries every entry of a module against the user's
//! input and returns the most specific one that accepts it (the match with
//! the most literal words, earliest declaration on ties), together with the
//! typed [`ParsedArgs`].
//!
//! Two grammar kinds exist:
//!
//! - [`Grammar::Usage`]: one-line usage patterns, see [`UsagePattern`]
//! - `Grammar::Clap`: a full `clap::Command` (requires the `command`
//!   feature)

#[cfg(feature = "command")]
mod clap;
mod pattern;
mod split;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

pub use pattern::UsagePattern;
pub use split::shell_split;

use crate::error::{GrammarError, GrammarResult};
use crate::module::{CommandEntry, CommandModule};

// =============================================================================
// Parsed arguments
// =============================================================================

/// A single parsed argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Flag(bool),
    Single(String),
    Multiple(Vec<String>),
}

/// Arguments produced by a successful grammar match.
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    pattern: String,
    values: HashMap<String, ArgValue>,
    #[cfg(feature = "command")]
    matches: Option<::clap::ArgMatches>,
}

impl ParsedArgs {
    pub(crate) fn from_values(pattern: String, values: HashMap<String, ArgValue>) -> Self {
        Self {
            pattern,
            values,
            ..Self::default()
        }
    }

    /// The pattern that matched, without its description.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// A single value, or the first of several.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ArgValue::Single(v) => Some(v),
            ArgValue::Multiple(v) => v.first().map(String::as_str),
            ArgValue::Flag(_) => None,
        }
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name)? {
            ArgValue::Single(v) => Some(std::slice::from_ref(v)),
            ArgValue::Multiple(v) => Some(v),
            ArgValue::Flag(_) => None,
        }
    }

    /// Whether a flag was given. Unknown names read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(ArgValue::Flag(set)) => *set,
            Some(ArgValue::Single(v)) => v == "true",
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw clap matches, for entries declared with a clap grammar.
    #[cfg(feature = "command")]
    pub fn matches(&self) -> Option<&::clap::ArgMatches> {
        self.matches.as_ref()
    }
}

// =============================================================================
// Grammar
// =============================================================================

/// A set of usage patterns, compiled on first use.
#[derive(Debug)]
pub struct UsageGrammar {
    declarations: Vec<String>,
    compiled: OnceLock<GrammarResult<Vec<UsagePattern>>>,
}

impl UsageGrammar {
    pub fn new<I, S>(declarations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declarations: declarations.into_iter().map(Into::into).collect(),
            compiled: OnceLock::new(),
        }
    }

    pub fn declarations(&self) -> &[String] {
        &self.declarations
    }

    /// Compiled patterns, or the first malformed declaration.
    pub fn patterns(&self) -> GrammarResult<&[UsagePattern]> {
        self.compiled
            .get_or_init(|| {
                self.declarations
                    .iter()
                    .map(|d| UsagePattern::compile(d))
                    .collect()
            })
            .as_deref()
            .map_err(Clone::clone)
    }
}

/// An argument grammar attached to a command entry.
#[derive(Debug, Clone)]
pub enum Grammar {
    Usage(Arc<UsageGrammar>),
    #[cfg(feature = "command")]
    Clap(Arc<::clap::Command>),
}

impl Grammar {
    pub fn usage<I, S>(declarations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Usage(Arc::new(UsageGrammar::new(declarations)))
    }

    #[cfg(feature = "command")]
    pub fn clap(command: ::clap::Command) -> Self {
        Self::Clap(Arc::new(command))
    }

    fn validate(&self) -> GrammarResult<()> {
        match self {
            Self::Usage(g) => g.patterns().map(|_| ()),
            #[cfg(feature = "command")]
            Self::Clap(cmd) => clap::validate(cmd),
        }
    }

    fn usage_lines(&self, head: &str) -> Vec<String> {
        match self {
            Self::Usage(g) => g
                .patterns()
                .unwrap_or_default()
                .iter()
                .map(|p| usage_line(head, p.source(), p.desc()))
                .collect(),
            #[cfg(feature = "command")]
            Self::Clap(cmd) => vec![clap::usage_line(head, cmd)],
        }
    }
}

fn usage_line(head: &str, pattern: &str, desc: Option<&str>) -> String {
    let mut line = head.to_string();
    if !pattern.is_empty() {
        line.push(' ');
        line.push_str(pattern);
    }
    if let Some(desc) = desc {
        line.push_str(" - ");
        line.push_str(desc);
    }
    line
}

enum Attempt {
    /// Accepted, with the literal word count of the accepting pattern.
    Matched(ParsedArgs, usize),
    Rejected(Option<String>),
}

// =============================================================================
// CommandParser
// =============================================================================

/// Selects the entry of a command module that accepts a sub-command.
#[derive(Debug)]
pub struct CommandParser<'m> {
    module: &'m CommandModule,
    prefix: String,
}

impl<'m> CommandParser<'m> {
    /// Prepares a parser, compiling every declared grammar.
    ///
    /// A malformed declaration surfaces here as
    /// [`GrammarError::InvalidHelpDoc`].
    pub fn new(module: &'m CommandModule, prefix: impl Into<String>) -> GrammarResult<Self> {
        for grammar in module.match_list().iter().filter_map(CommandEntry::get_grammar) {
            grammar.validate()?;
        }
        Ok(Self {
            module,
            prefix: prefix.into(),
        })
    }

    /// Parses `command` (keyword followed by arguments).
    ///
    /// Every entry is tried; the match with the most literal words wins, so
    /// `wiki reset` selects a `reset` pattern over a catch-all `<title>`.
    /// Ties go to the earlier declaration. An entry without a grammar
    /// accepts only an empty remainder.
    pub fn parse(&self, command: &str) -> GrammarResult<(&'m CommandEntry, ParsedArgs)> {
        let remainder = command
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let tokens = shell_split(remainder);

        let mut best: Option<(&'m CommandEntry, ParsedArgs, usize)> = None;
        let mut rejection = None;
        for entry in self.module.match_list() {
            match attempt(entry, &tokens)? {
                Attempt::Matched(args, literals) => {
                    if best.as_ref().is_none_or(|(_, _, top)| literals > *top) {
                        best = Some((entry, args, literals));
                    }
                }
                Attempt::Rejected(message) => {
                    if rejection.is_none() {
                        rejection = message;
                    }
                }
            }
        }

        match best {
            Some((entry, args, _)) => Ok((entry, args)),
            None => Err(GrammarError::InvalidFormat {
                usage: rejection.unwrap_or_else(|| self.formatted_help_doc()),
            }),
        }
    }

    /// Usage listing for the module, one line per pattern.
    pub fn formatted_help_doc(&self) -> String {
        let head = format!("{}{}", self.prefix, self.module.keyword());
        self.module
            .match_list()
            .iter()
            .filter_map(CommandEntry::get_grammar)
            .flat_map(|g| g.usage_lines(&head))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn attempt(entry: &CommandEntry, tokens: &[String]) -> GrammarResult<Attempt> {
    let Some(grammar) = entry.get_grammar() else {
        return Ok(if tokens.is_empty() {
            Attempt::Matched(ParsedArgs::default(), 0)
        } else {
            Attempt::Rejected(None)
        });
    };

    match grammar {
        Grammar::Usage(g) => {
            let mut best: Option<(ParsedArgs, usize)> = None;
            for pattern in g.patterns()? {
                let literals = pattern.literal_count();
                if best.as_ref().is_some_and(|(_, top)| literals <= *top) {
                    continue;
                }
                if let Some(args) = pattern.matches(tokens) {
                    best = Some((args, literals));
                }
            }
            Ok(best.map_or(Attempt::Rejected(None), |(args, literals)| {
                Attempt::Matched(args, literals)
            }))
        }
        #[cfg(feature = "command")]
        Grammar::Clap(cmd) => Ok(match clap::parse(cmd, tokens) {
            Ok(args) => Attempt::Matched(args, 0),
            Err(message) => Attempt::Rejected(Some(message)),
        }),
    }
}
