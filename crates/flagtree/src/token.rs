//! Lexical classification of raw argument tokens.

/// Shape of one raw token, before any lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    /// Exactly `--`.
    Separator,
    /// `--name` or `--name=value`.
    Long { name: &'a str, value: Option<&'a str> },
    /// `-abc`; `cluster` is everything after the dash.
    Short { cluster: &'a str },
    /// Anything else, including a lone `-`.
    Word(&'a str),
}

pub(crate) fn classify(arg: &str, honor_double_dash: bool) -> Token<'_> {
    if arg == "--" {
        return if honor_double_dash {
            Token::Separator
        } else {
            Token::Word(arg)
        };
    }
    if let Some(rest) = arg.strip_prefix("--") {
        return match rest.split_once('=') {
            Some((name, value)) => Token::Long {
                name,
                value: Some(value),
            },
            None => Token::Long {
                name: rest,
                value: None,
            },
        };
    }
    match arg.strip_prefix('-') {
        Some(cluster) if !cluster.is_empty() => Token::Short { cluster },
        _ => Token::Word(arg),
    }
}

/// `-` followed by something, i.e. a token that would be read as a flag.
pub(crate) fn looks_like_option(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

/// Negative (or signed) decimal numbers such as `-5`, `-2.5`, `-.5`.
pub(crate) fn looks_like_number(arg: &str) -> bool {
    let Some(rest) = arg.strip_prefix('-') else {
        return false;
    };
    let starts_numeric = rest
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.');
    starts_numeric && arg.parse::<f64>().is_ok()
}
