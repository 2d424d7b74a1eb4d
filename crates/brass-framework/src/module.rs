//! Module model.
//!
//! A module is a registered capability. It comes in three shapes, modelled
//! as the [`Module`] sum type:
//!
//! - [`CommandModule`]: an explicit command triggered by `<prefix><keyword>`
//! - [`RegexModule`]: an implicit trigger evaluated against every message
//! - [`StubModule`]: a description-only entry with no handlers
//!
//! ```rust,ignore
//! let wiki = CommandModule::new("wiki")
//!     .alias("w")
//!     .desc("Query a wiki page")
//!     .entry(CommandEntry::new(query).usage(["<title> {Query a page}"]))
//!     .entry(CommandEntry::new(set_wiki).usage(["set <url>"]).required_admin(true));
//!
//! let bili = RegexModule::new("bilibili")
//!     .pattern(r"BV[0-9A-Za-z]{10}", MatchMode::FindAll, resolve_bv)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use regex::{Captures, Regex, RegexBuilder};

use crate::error::ModuleError;
use crate::grammar::Grammar;
use crate::handler::{BoxedHandler, HandlerFn, into_handler};

// =============================================================================
// Module
// =============================================================================

/// A registered capability.
#[derive(Clone, Debug)]
pub enum Module {
    Command(CommandModule),
    Regex(RegexModule),
    Stub(StubModule),
}

impl Module {
    /// The canonical keyword of this module.
    pub fn keyword(&self) -> &str {
        match self {
            Self::Command(m) => m.keyword(),
            Self::Regex(m) => m.keyword(),
            Self::Stub(m) => m.keyword(),
        }
    }

    /// Optional human description.
    pub fn desc(&self) -> Option<&str> {
        match self {
            Self::Command(m) => m.get_desc(),
            Self::Regex(m) => m.get_desc(),
            Self::Stub(m) => m.get_desc(),
        }
    }

    /// Returns the command variant, if this is one.
    pub fn as_command(&self) -> Option<&CommandModule> {
        match self {
            Self::Command(m) => Some(m),
            _ => None,
        }
    }
}

impl From<CommandModule> for Module {
    fn from(module: CommandModule) -> Self {
        Self::Command(module)
    }
}

impl From<RegexModule> for Module {
    fn from(module: RegexModule) -> Self {
        Self::Regex(module)
    }
}

impl From<StubModule> for Module {
    fn from(module: StubModule) -> Self {
        Self::Stub(module)
    }
}

// =============================================================================
// Command modules
// =============================================================================

/// One handler bound to a command module, optionally with an argument grammar.
///
/// When selected by its grammar the entry's own permission flags are checked
/// again, on top of the parent module's.
#[derive(Clone)]
pub struct CommandEntry {
    grammar: Option<Grammar>,
    required_admin: bool,
    required_superuser: bool,
    handler: BoxedHandler,
}

impl CommandEntry {
    pub fn new<H: HandlerFn>(handler: H) -> Self {
        Self::from_boxed(into_handler(handler))
    }

    pub fn from_boxed(handler: BoxedHandler) -> Self {
        Self {
            grammar: None,
            required_admin: false,
            required_superuser: false,
            handler,
        }
    }

    /// Declares a usage-pattern grammar (see [`crate::grammar`]).
    pub fn usage<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grammar(Grammar::usage(patterns))
    }

    pub fn grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = Some(grammar);
        self
    }

    pub fn required_admin(mut self, required: bool) -> Self {
        self.required_admin = required;
        self
    }

    pub fn required_superuser(mut self, required: bool) -> Self {
        self.required_superuser = required;
        self
    }

    pub fn get_grammar(&self) -> Option<&Grammar> {
        self.grammar.as_ref()
    }

    pub fn is_admin_only(&self) -> bool {
        self.required_admin
    }

    pub fn is_superuser_only(&self) -> bool {
        self.required_superuser
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("grammar", &self.grammar)
            .field("required_admin", &self.required_admin)
            .field("required_superuser", &self.required_superuser)
            .finish_non_exhaustive()
    }
}

/// An explicit command module.
#[derive(Clone, Debug)]
pub struct CommandModule {
    keyword: String,
    aliases: Vec<String>,
    desc: Option<String>,
    base: bool,
    required_admin: bool,
    required_superuser: bool,
    match_list: Vec<CommandEntry>,
}

impl CommandModule {
    /// Creates a module triggered by `keyword` (matched case-insensitively).
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            aliases: Vec::new(),
            desc: None,
            base: false,
            required_admin: false,
            required_superuser: false,
            match_list: Vec::new(),
        }
    }

    /// Adds an alias. The alias may expand to several words, e.g.
    /// `"wp" -> "wiki page"`; see [`alias_to`](Self::alias_to).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into().to_lowercase());
        self
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    /// Base modules are always enabled.
    pub fn base(mut self, base: bool) -> Self {
        self.base = base;
        self
    }

    pub fn required_admin(mut self, required: bool) -> Self {
        self.required_admin = required;
        self
    }

    pub fn required_superuser(mut self, required: bool) -> Self {
        self.required_superuser = required;
        self
    }

    /// Appends a handler entry.
    pub fn entry(mut self, entry: CommandEntry) -> Self {
        self.match_list.push(entry);
        self
    }

    /// Appends a grammar-less handler.
    pub fn handle<H: HandlerFn>(self, handler: H) -> Self {
        self.entry(CommandEntry::new(handler))
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn get_desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn is_base(&self) -> bool {
        self.base
    }

    pub fn is_admin_only(&self) -> bool {
        self.required_admin
    }

    pub fn is_superuser_only(&self) -> bool {
        self.required_superuser
    }

    pub fn match_list(&self) -> &[CommandEntry] {
        &self.match_list
    }

    /// Whether any entry declares an argument grammar.
    pub fn has_grammar(&self) -> bool {
        self.match_list.iter().any(|e| e.grammar.is_some())
    }
}

// =============================================================================
// Regex modules
// =============================================================================

/// How a regex trigger is evaluated against the display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The pattern must match starting at the first character.
    Match,
    /// Every non-overlapping match anywhere in the text.
    FindAll,
}

impl FromStr for MatchMode {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "M" | "MATCH" => Ok(Self::Match),
            "A" | "FINDALL" => Ok(Self::FindAll),
            _ => Err(ModuleError::UnknownMatchMode(s.to_string())),
        }
    }
}

/// Regex compile flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegexFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
    pub ignore_whitespace: bool,
}

impl RegexFlags {
    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }

    fn compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        RegexBuilder::new(pattern)
            .case_insensitive(self.case_insensitive)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
            .ignore_whitespace(self.ignore_whitespace)
            .build()
    }
}

/// One match (or one finding) of a regex trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    text: String,
    start: usize,
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl Captured {
    fn from_captures(regex: &Regex, caps: &Captures<'_>) -> Self {
        let whole = caps.get(0);
        let groups = caps
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();

        Self {
            text: whole.map(|m| m.as_str().to_string()).unwrap_or_default(),
            start: whole.map(|m| m.start()).unwrap_or_default(),
            groups,
            named,
        }
    }

    /// The whole matched text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte offset of the match in the display text.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Group `index`; `0` is the whole match.
    pub fn group(&self, index: usize) -> Option<&str> {
        if index == 0 {
            return Some(&self.text);
        }
        self.groups.get(index - 1).and_then(|g| g.as_deref())
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Positional groups, excluding the whole match.
    pub fn groups(&self) -> &[Option<String>] {
        &self.groups
    }
}

/// What a regex trigger saw; exposed to handlers as `matched_msg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexMatch {
    Match(Captured),
    FindAll(Vec<Captured>),
}

/// One pattern/handler pair of a regex module.
#[derive(Clone)]
pub struct RegexEntry {
    pattern: Regex,
    mode: MatchMode,
    show_typing: bool,
    handler: BoxedHandler,
}

impl RegexEntry {
    pub fn new<H: HandlerFn>(
        pattern: &str,
        mode: MatchMode,
        flags: RegexFlags,
        handler: H,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: flags.compile(pattern)?,
            mode,
            show_typing: true,
            handler: into_handler(handler),
        })
    }

    /// Whether to show the typing indicator while the handler runs
    /// (default: `true`).
    pub fn show_typing(mut self, show: bool) -> Self {
        self.show_typing = show;
        self
    }

    pub fn shows_typing(&self) -> bool {
        self.show_typing
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    /// Evaluates the pattern; `None` means the trigger did not fire.
    pub fn evaluate(&self, text: &str) -> Option<RegexMatch> {
        match self.mode {
            MatchMode::Match => self
                .pattern
                .captures(text)
                .filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))
                .map(|caps| RegexMatch::Match(Captured::from_captures(&self.pattern, &caps))),
            MatchMode::FindAll => {
                let found: Vec<_> = self
                    .pattern
                    .captures_iter(text)
                    .map(|caps| Captured::from_captures(&self.pattern, &caps))
                    .collect();
                (!found.is_empty()).then_some(RegexMatch::FindAll(found))
            }
        }
    }
}

impl fmt::Debug for RegexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexEntry")
            .field("pattern", &self.pattern.as_str())
            .field("mode", &self.mode)
            .field("show_typing", &self.show_typing)
            .finish_non_exhaustive()
    }
}

/// An implicit regex-trigger module.
#[derive(Clone, Debug)]
pub struct RegexModule {
    keyword: String,
    desc: Option<String>,
    required_admin: bool,
    required_superuser: bool,
    match_list: Vec<RegexEntry>,
}

impl RegexModule {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            desc: None,
            required_admin: false,
            required_superuser: false,
            match_list: Vec::new(),
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn required_admin(mut self, required: bool) -> Self {
        self.required_admin = required;
        self
    }

    pub fn required_superuser(mut self, required: bool) -> Self {
        self.required_superuser = required;
        self
    }

    pub fn trigger(mut self, entry: RegexEntry) -> Self {
        self.match_list.push(entry);
        self
    }

    /// Compiles `pattern` with default flags and appends it as a trigger.
    pub fn pattern<H: HandlerFn>(
        self,
        pattern: &str,
        mode: MatchMode,
        handler: H,
    ) -> Result<Self, ModuleError> {
        self.pattern_with_flags(pattern, mode, RegexFlags::default(), handler)
    }

    pub fn pattern_with_flags<H: HandlerFn>(
        self,
        pattern: &str,
        mode: MatchMode,
        flags: RegexFlags,
        handler: H,
    ) -> Result<Self, ModuleError> {
        let entry = RegexEntry::new(pattern, mode, flags, handler).map_err(|source| {
            ModuleError::InvalidRegex {
                module: self.keyword.clone(),
                source,
            }
        })?;
        Ok(self.trigger(entry))
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn get_desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn is_admin_only(&self) -> bool {
        self.required_admin
    }

    pub fn is_superuser_only(&self) -> bool {
        self.required_superuser
    }

    pub fn match_list(&self) -> &[RegexEntry] {
        &self.match_list
    }
}

// =============================================================================
// Stub modules
// =============================================================================

/// A description-only module; invoking it just prints the description.
#[derive(Clone, Debug)]
pub struct StubModule {
    keyword: String,
    desc: Option<String>,
}

impl StubModule {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            desc: None,
        }
    }

    pub fn desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn get_desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }
}
