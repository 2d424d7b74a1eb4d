//! Display-text normalization.

/// Collapses runs of spaces into a single space and trims both ends.
///
/// Newlines and other whitespace inside the text are preserved so that
/// regex triggers still see the message's line structure.
pub fn remove_duplicate_space(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;

    for ch in text.trim().chars() {
        if ch == ' ' {
            if !last_was_space {
                out.push(ch);
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }

    out
}

/// Cleans up the parts of a chained command.
///
/// Each part is trimmed and a redundant leading prefix is removed, so that
/// `~a&&~b` behaves like `~a&&b`. Parts left empty are dropped.
pub fn remove_ineffective_text<S: AsRef<str>>(prefixes: &[S], parts: &[&str]) -> Vec<String> {
    parts
        .iter()
        .filter_map(|part| {
            let mut part = part.trim();
            if let Some(prefix) = prefixes
                .iter()
                .map(AsRef::as_ref)
                .find(|p| !p.is_empty() && part.starts_with(*p))
            {
                part = part[prefix.len()..].trim_start();
            }
            (!part.is_empty()).then(|| part.to_string())
        })
        .collect()
}
