//! Line splitting and line-shape recognition.
//!
//! Tokenization is plain whitespace splitting: no quoting, no escapes, no
//! globbing. The dispatch loop consumes the shapes produced here.

/// What a raw input line asks the shell to do.
#[derive(Debug, PartialEq, Eq)]
pub enum LineCommand {
    /// `parallel <rest>` — the rest of the line, verbatim, for the parallel
    /// runner to split on `;;` itself.
    Parallel(String),
    /// An ordinary command line, already stripped of a trailing `&`.
    Tokens {
        tokens: Vec<String>,
        background: bool,
    },
}

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(String::from).collect()
}

pub fn parse_line(line: &str) -> LineCommand {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("parallel ") {
        return LineCommand::Parallel(rest.trim().to_string());
    }
    let (line, background) = match line.strip_suffix('&') {
        Some(stripped) => (stripped.trim_end(), true),
        None => (line, false),
    };
    LineCommand::Tokens {
        tokens: tokenize(line),
        background,
    }
}

/// Split a token sequence at the first `|` token. Tokens on either side keep
/// their order; the `|` itself is dropped.
pub fn split_pipeline(tokens: &[String]) -> Option<(Vec<String>, Vec<String>)> {
    let at = tokens.iter().position(|t| t == "|")?;
    Some((tokens[..at].to_vec(), tokens[at + 1..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn tokenize_splits_on_any_whitespace() {
        assert_eq!(tokenize("  ls   -l\t/tmp "), toks(&["ls", "-l", "/tmp"]));
        assert_eq!(tokenize(""), Vec::<String>::new());
        assert_eq!(tokenize("   \t "), Vec::<String>::new());
    }

    #[test]
    fn parse_line_recognizes_parallel_prefix() {
        assert_eq!(
            parse_line("parallel sleep 1 ;; sleep 2"),
            LineCommand::Parallel("sleep 1 ;; sleep 2".to_string())
        );
        // Bare `parallel` is not the prefix form; it falls through to the
        // builtin, which prints the usage error.
        assert_eq!(
            parse_line("parallel"),
            LineCommand::Tokens {
                tokens: toks(&["parallel"]),
                background: false,
            }
        );
    }

    #[test]
    fn parse_line_strips_trailing_ampersand() {
        assert_eq!(
            parse_line("sleep 5 &"),
            LineCommand::Tokens {
                tokens: toks(&["sleep", "5"]),
                background: true,
            }
        );
        // No space before the ampersand works too.
        assert_eq!(
            parse_line("sleep 5&"),
            LineCommand::Tokens {
                tokens: toks(&["sleep", "5"]),
                background: true,
            }
        );
        assert_eq!(
            parse_line("ls -l"),
            LineCommand::Tokens {
                tokens: toks(&["ls", "-l"]),
                background: false,
            }
        );
    }

    #[test]
    fn split_pipeline_at_first_pipe_token() {
        let tokens = toks(&["a", "|", "b", "|", "c"]);
        let (left, right) = split_pipeline(&tokens).unwrap();
        assert_eq!(left, toks(&["a"]));
        assert_eq!(right, toks(&["b", "|", "c"]));

        assert_eq!(split_pipeline(&toks(&["ls", "-l"])), None);
    }
}
