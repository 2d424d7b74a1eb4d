/// Shell-like argument splitting for command remainders.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes)
/// - Backslash escapes, both bare and inside double quotes
///
/// An empty quoted string (`""`) yields an empty argument.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    let mut quoted = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if !in_single_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if escape_next {
        current.push('\\');
    }
    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_split_simple() {
        let args = shell_split("page hello world");
        assert_eq!(args, vec!["page", "hello", "world"]);
    }

    #[test]
    fn test_shell_split_quoted() {
        let args = shell_split(r#"page "hello world" test"#);
        assert_eq!(args, vec!["page", "hello world", "test"]);
    }

    #[test]
    fn test_shell_split_single_quoted() {
        let args = shell_split("page 'hello world' test");
        assert_eq!(args, vec!["page", "hello world", "test"]);
    }

    #[test]
    fn test_shell_split_mixed_quotes() {
        let args = shell_split(r#"cmd "double's quote" 'single"s quote'"#);
        assert_eq!(args, vec!["cmd", "double's quote", r#"single"s quote"#]);
    }

    #[test]
    fn test_shell_split_escapes() {
        assert_eq!(shell_split(r"a\ b c"), vec!["a b", "c"]);
        assert_eq!(shell_split(r#""say \"hi\"""#), vec![r#"say "hi""#]);
        assert_eq!(shell_split(r"trailing\"), vec![r"trailing\"]);
    }

    #[test]
    fn test_shell_split_empty_quotes() {
        assert_eq!(shell_split(r#"set "" x"#), vec!["set", "", "x"]);
    }

    #[test]
    fn test_shell_split_whitespace_only() {
        assert!(shell_split("").is_empty());
        assert!(shell_split("   \t \n ").is_empty());
    }
}
