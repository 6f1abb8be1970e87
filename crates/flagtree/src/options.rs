use serde::{Deserialize, Serialize};

/// Parser-wide behavior switches.
///
/// Deserializes from kebab-case keys; missing keys keep their defaults:
///
/// ```
/// let opts: flagtree::ParserOptions =
///     serde_json::from_str(r#"{ "ignore-unknown": true }"#).unwrap();
/// assert!(opts.ignore_unknown);
/// assert!(opts.help_flag);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParserOptions {
    /// Add `-h/--help` to the root command (unless those names are taken).
    pub help_flag: bool,
    /// Match long names and command names ignoring ASCII case.
    pub case_insensitive: bool,
    /// Pass unknown flags through as positional tokens instead of failing.
    pub ignore_unknown: bool,
    /// Treat `--` as the end of options. When off, `--` is an ordinary token.
    pub honor_double_dash: bool,
    /// Send every token after `--` straight to the unconsumed list,
    /// bypassing positional slots.
    pub pass_double_dash: bool,
    /// Accept unambiguous prefixes of long names (`--verb` for `--verbose`).
    pub allow_abbreviations: bool,
    /// Stop option parsing at the first non-option, non-command token.
    pub pass_after_non_option: bool,
    /// Separator between group namespaces and long names.
    pub namespace_delimiter: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            help_flag: true,
            case_insensitive: false,
            ignore_unknown: false,
            honor_double_dash: true,
            pass_double_dash: false,
            allow_abbreviations: true,
            pass_after_non_option: false,
            namespace_delimiter: ".".to_string(),
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase `name` when matching is case-insensitive.
    pub(crate) fn normalize(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        }
    }
}
