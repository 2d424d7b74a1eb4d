//! Usage-pattern grammars.
//!
//! A usage pattern is a one-line declaration of accepted arguments:
//!
//! ```text
//! add <name> [<count>] [--force] {Adds an entry}
//! ```
//!
//! | Syntax       | Meaning                                          |
//! |--------------|--------------------------------------------------|
//! | `word`       | literal token, compared case-insensitively       |
//! | `<name>`     | required value                                   |
//! | `[<name>]`   | optional value                                   |
//! | `<name>...`  | one or more values; must be last                 |
//! | `[-x]`       | boolean flag, accepted anywhere in the input     |
//! | `{text}`     | description for usage output; must be last       |

use std::collections::{HashMap, HashSet};

use super::{ArgValue, ParsedArgs};
use crate::error::{GrammarError, GrammarResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Element {
    Literal(String),
    Required(String),
    Optional(String),
    Variadic(String),
}

/// One compiled usage pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsagePattern {
    source: String,
    elements: Vec<Element>,
    flags: Vec<Flag>,
    desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Flag {
    name: String,
    token: String,
}

impl UsagePattern {
    /// Compiles a pattern declaration.
    pub fn compile(declaration: &str) -> GrammarResult<Self> {
        let invalid = |reason: &str| GrammarError::invalid_doc(declaration, reason);

        let (body, desc) = split_description(declaration).map_err(|r| invalid(r))?;

        let mut elements = Vec::new();
        let mut flags = Vec::new();
        let mut names = HashSet::new();
        let mut claim = |name: &str| -> GrammarResult<String> {
            if name.is_empty() {
                return Err(invalid("empty argument name"));
            }
            if !names.insert(name.to_string()) {
                return Err(invalid("duplicate argument name"));
            }
            Ok(name.to_string())
        };

        for token in body.split_whitespace() {
            if elements
                .last()
                .is_some_and(|e| matches!(e, Element::Variadic(_)))
            {
                return Err(invalid("variadic argument must be last"));
            }

            if let Some(inner) = token.strip_prefix('[') {
                let inner = inner
                    .strip_suffix(']')
                    .ok_or_else(|| invalid("unbalanced '['"))?;
                if let Some(name) = inner.strip_prefix('<') {
                    let name = name
                        .strip_suffix('>')
                        .ok_or_else(|| invalid("unbalanced '<'"))?;
                    check_plain(name).map_err(|r| invalid(r))?;
                    elements.push(Element::Optional(claim(name)?));
                } else if inner.starts_with('-') {
                    let name = inner.trim_start_matches('-');
                    check_plain(name).map_err(|r| invalid(r))?;
                    flags.push(Flag {
                        name: claim(name)?,
                        token: inner.to_string(),
                    });
                } else {
                    return Err(invalid("optional part must be '<name>' or a flag"));
                }
            } else if let Some(inner) = token.strip_prefix('<') {
                let (inner, variadic) = match inner.strip_suffix("...") {
                    Some(rest) => (rest, true),
                    None => (inner, false),
                };
                let name = inner
                    .strip_suffix('>')
                    .ok_or_else(|| invalid("unbalanced '<'"))?;
                check_plain(name).map_err(|r| invalid(r))?;
                let name = claim(name)?;
                elements.push(if variadic {
                    Element::Variadic(name)
                } else {
                    Element::Required(name)
                });
            } else {
                check_plain(token).map_err(|r| invalid(r))?;
                elements.push(Element::Literal(token.to_lowercase()));
            }
        }

        Ok(Self {
            source: body.split_whitespace().collect::<Vec<_>>().join(" "),
            elements,
            flags,
            desc,
        })
    }

    /// The declaration without its description.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    /// Number of literal words; more literals means a more specific pattern.
    pub fn literal_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Literal(_)))
            .count()
    }

    /// Matches `tokens` in full, or returns `None`.
    pub fn matches(&self, tokens: &[String]) -> Option<ParsedArgs> {
        let mut values: HashMap<String, ArgValue> = self
            .flags
            .iter()
            .map(|f| (f.name.clone(), ArgValue::Flag(false)))
            .collect();

        let mut positional = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.flags.iter().find(|f| f.token == *token) {
                Some(flag) => {
                    values.insert(flag.name.clone(), ArgValue::Flag(true));
                }
                None => positional.push(token.as_str()),
            }
        }

        if !match_elements(&self.elements, &positional, &mut values) {
            return None;
        }
        Some(ParsedArgs::from_values(self.source.clone(), values))
    }
}

fn split_description(declaration: &str) -> Result<(&str, Option<String>), &'static str> {
    let Some(open) = declaration.find('{') else {
        if declaration.contains('}') {
            return Err("unbalanced '}'");
        }
        return Ok((declaration, None));
    };
    let rest = &declaration[open + 1..];
    let close = rest.find('}').ok_or("unbalanced '{'")?;
    if !rest[close + 1..].trim().is_empty() {
        return Err("description must be last");
    }
    let desc = rest[..close].trim();
    Ok((
        &declaration[..open],
        (!desc.is_empty()).then(|| desc.to_string()),
    ))
}

fn check_plain(text: &str) -> Result<(), &'static str> {
    if text.contains(['<', '>', '[', ']', '{', '}']) {
        return Err("unbalanced brackets");
    }
    if text.ends_with("...") {
        return Err("only '<name>...' may be variadic");
    }
    Ok(())
}

fn match_elements(
    elements: &[Element],
    tokens: &[&str],
    values: &mut HashMap<String, ArgValue>,
) -> bool {
    let Some((first, rest)) = elements.split_first() else {
        return tokens.is_empty();
    };

    match first {
        Element::Literal(word) => {
            tokens.first().is_some_and(|t| t.to_lowercase() == *word)
                && match_elements(rest, &tokens[1..], values)
        }
        Element::Required(name) => match tokens.split_first() {
            Some((token, tail)) => {
                values.insert(name.clone(), ArgValue::Single(token.to_string()));
                match_elements(rest, tail, values) || {
                    values.remove(name);
                    false
                }
            }
            None => false,
        },
        Element::Optional(name) => {
            if let Some((token, tail)) = tokens.split_first() {
                values.insert(name.clone(), ArgValue::Single(token.to_string()));
                if match_elements(rest, tail, values) {
                    return true;
                }
                values.remove(name);
            }
            match_elements(rest, tokens, values)
        }
        Element::Variadic(name) => {
            if tokens.is_empty() {
                return false;
            }
            values.insert(
                name.clone(),
                ArgValue::Multiple(tokens.iter().map(|t| t.to_string()).collect()),
            );
            true
        }
    }
}
