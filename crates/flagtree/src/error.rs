use std::fmt;

/// Classification of a parse failure (or sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A flag token resolved to no declared flag in the active scope or any ancestor.
    UnknownFlag,
    /// A long-name prefix matched two or more flags.
    AmbiguousOption,
    /// A flag needs a value and none was available.
    ExpectedArgument,
    /// The declared command tree is malformed. Raised before any token is scanned.
    InvalidSchema,
    /// A value could not be converted (bad number, malformed map entry, disallowed choice).
    Marshal,
    /// A required flag or positional was never satisfied.
    Required,
    /// A positional-looking token is not a command and nothing can absorb it.
    UnknownCommand,
    /// The active command has sub-commands and none was given.
    CommandRequired,
    /// Help was requested. Not a failure: the message is the rendered help text.
    Help,
    /// Version was requested. Not a failure: the message is the version line.
    Version,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownFlag => "unknown flag",
            Self::AmbiguousOption => "ambiguous option",
            Self::ExpectedArgument => "expected argument",
            Self::InvalidSchema => "invalid schema",
            Self::Marshal => "marshal",
            Self::Required => "required",
            Self::UnknownCommand => "unknown command",
            Self::CommandRequired => "command required",
            Self::Help => "help",
            Self::Version => "version",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by schema validation and parsing.
///
/// `Display` yields the human-readable message only; use [`Error::kind`] to
/// branch on the failure class. For the [`ErrorKind::Help`] and
/// [`ErrorKind::Version`] sentinels the message is the text to print and
/// [`Error::remaining`] holds the tokens that were not scanned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    remaining: Vec<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            remaining: Vec::new(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSchema, message)
    }

    pub(crate) fn with_remaining(mut self, remaining: Vec<String>) -> Self {
        self.remaining = remaining;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Tokens left unscanned (plus any already unconsumed) when a sentinel fired.
    pub fn remaining(&self) -> &[String] {
        &self.remaining
    }

    /// Whether this is a "render and stop" signal rather than a failure.
    pub fn is_sentinel(&self) -> bool {
        matches!(self.kind, ErrorKind::Help | ErrorKind::Version)
    }

    pub fn is_help(&self) -> bool {
        self.kind == ErrorKind::Help
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_message_only() {
        let err = Error::new(ErrorKind::UnknownFlag, "unknown flag `x'");
        assert_eq!(err.to_string(), "unknown flag `x'");
        assert_eq!(err.kind(), ErrorKind::UnknownFlag);
        assert!(!err.is_sentinel());
    }

    #[test]
    fn sentinels_are_not_failures() {
        let help = Error::new(ErrorKind::Help, "Usage:\n  app\n")
            .with_remaining(vec!["-v".to_string()]);
        assert!(help.is_sentinel());
        assert!(help.is_help());
        assert_eq!(help.remaining(), ["-v".to_string()]);
        assert!(Error::new(ErrorKind::Version, "app 1.0").is_sentinel());
    }
}
