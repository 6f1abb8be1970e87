//! Name resolution against the active command stack.
//!
//! `levels` is always root first; lookups walk it from the innermost level
//! outward, so a sub-command's flag shadows an ancestor flag of the same name.

use crate::options::ParserOptions;
use crate::registry::{FlagInfo, Registry};
use std::collections::HashSet;

/// A flag resolved at stack depth `depth` (0 = root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FlagRef {
    pub depth: usize,
    pub entry: usize,
}

impl FlagRef {
    pub fn info<'r>(&self, levels: &[&'r Registry]) -> &'r FlagInfo {
        levels[self.depth].entry(self.entry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LongMatch {
    Found(FlagRef),
    /// Display names of every candidate, innermost level first.
    Ambiguous(Vec<String>),
    Unknown,
}

/// Exact match first; then, if allowed, a unique prefix match.
pub(crate) fn resolve_long(levels: &[&Registry], name: &str, options: &ParserOptions) -> LongMatch {
    let key = options.normalize(name);
    for (depth, reg) in levels.iter().enumerate().rev() {
        if let Some(entry) = reg.by_long(&key) {
            return LongMatch::Found(FlagRef { depth, entry });
        }
    }
    if !options.allow_abbreviations || key.is_empty() {
        return LongMatch::Unknown;
    }

    let mut shadowed: HashSet<&str> = HashSet::new();
    let mut candidates: Vec<FlagRef> = Vec::new();
    for (depth, reg) in levels.iter().enumerate().rev() {
        for (long, entry) in reg.long_names() {
            if !shadowed.insert(long) {
                continue;
            }
            if long.starts_with(key.as_str()) {
                candidates.push(FlagRef { depth, entry });
            }
        }
    }

    match candidates.as_slice() {
        [] => LongMatch::Unknown,
        [only] => LongMatch::Found(*only),
        many => LongMatch::Ambiguous(
            many.iter()
                .map(|r| r.info(levels).display.clone())
                .collect(),
        ),
    }
}

pub(crate) fn resolve_short(levels: &[&Registry], c: char) -> Option<FlagRef> {
    levels
        .iter()
        .enumerate()
        .rev()
        .find_map(|(depth, reg)| reg.by_short(c).map(|entry| FlagRef { depth, entry }))
}

/// One flag occurrence taken from a short cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ShortBinding<'a> {
    pub flag: FlagRef,
    /// Inline value: the rest of the cluster, or what follows `=`.
    pub inline: Option<&'a str>,
}

/// Split `-abc` / `-ofile` / `-o=file` into flag occurrences.
///
/// Toggles are taken one character at a time. The first non-toggle ends the
/// cluster and takes the remainder as its value; if nothing remains its
/// `inline` is `None` and the caller decides whether the next token is the
/// value. An `=` right after any flag character also ends the cluster.
/// Returns the first unknown character as the error.
pub(crate) fn resolve_cluster<'a>(
    levels: &[&Registry],
    cluster: &'a str,
) -> Result<Vec<ShortBinding<'a>>, char> {
    let mut out = Vec::new();
    for (i, c) in cluster.char_indices() {
        let flag = resolve_short(levels, c).ok_or(c)?;
        let rest = &cluster[i + c.len_utf8()..];

        if let Some(value) = rest.strip_prefix('=') {
            out.push(ShortBinding {
                flag,
                inline: Some(value),
            });
            break;
        }
        if flag.info(levels).toggle {
            out.push(ShortBinding { flag, inline: None });
            continue;
        }
        out.push(ShortBinding {
            flag,
            inline: (!rest.is_empty()).then_some(rest),
        });
        break;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::flag::Flag;
    use crate::value::ValueKind;

    fn registry(cmd: Command) -> Registry {
        let mut cmd = cmd;
        cmd.prepare(".");
        Registry::build(&cmd, &ParserOptions::default()).unwrap()
    }

    fn foo_registry() -> Registry {
        registry(
            Command::new("app")
                .flag(Flag::new("bar").long("foo-bar"))
                .flag(Flag::new("baz").long("foo-baz"))
                .flag(Flag::new("verbose").long("verbose")),
        )
    }

    #[test]
    fn exact_match_beats_prefix() {
        let reg = registry(
            Command::new("app")
                .flag(Flag::new("foo").long("foo"))
                .flag(Flag::new("foobar").long("foobar")),
        );
        let levels = [&reg];
        let opts = ParserOptions::default();
        assert_eq!(
            resolve_long(&levels, "foo", &opts),
            LongMatch::Found(FlagRef { depth: 0, entry: 0 })
        );
        assert_eq!(
            resolve_long(&levels, "foob", &opts),
            LongMatch::Found(FlagRef { depth: 0, entry: 1 })
        );
    }

    #[test]
    fn ambiguous_prefix_names_every_candidate() {
        let reg = foo_registry();
        let levels = [&reg];
        match resolve_long(&levels, "foo", &ParserOptions::default()) {
            LongMatch::Ambiguous(names) => {
                assert_eq!(names, vec!["--foo-bar".to_string(), "--foo-baz".to_string()]);
            }
            other => panic!("expected Ambiguous, got: {other:?}"),
        }
    }

    #[test]
    fn abbreviations_can_be_disabled() {
        let reg = foo_registry();
        let levels = [&reg];
        let opts = ParserOptions {
            allow_abbreviations: false,
            ..Default::default()
        };
        assert_eq!(resolve_long(&levels, "verb", &opts), LongMatch::Unknown);
        assert!(matches!(
            resolve_long(&levels, "verb", &ParserOptions::default()),
            LongMatch::Found(_)
        ));
    }

    #[test]
    fn inner_levels_shadow_outer_ones() {
        let outer = registry(Command::new("parent").flag(Flag::new("opt").long("opt")));
        let inner = registry(Command::new("sub").flag(Flag::new("opt").long("opt")));
        let levels = [&outer, &inner];
        assert_eq!(
            resolve_long(&levels, "opt", &ParserOptions::default()),
            LongMatch::Found(FlagRef { depth: 1, entry: 0 })
        );
        // The shadowed ancestor does not make a prefix ambiguous.
        assert_eq!(
            resolve_long(&levels, "op", &ParserOptions::default()),
            LongMatch::Found(FlagRef { depth: 1, entry: 0 })
        );
    }

    #[test]
    fn clusters_split_toggles_and_take_inline_values() {
        let reg = registry(
            Command::new("app")
                .flag(Flag::new("a").short('a'))
                .flag(Flag::new("b").short('b'))
                .flag(Flag::new("o").short('o').kind(ValueKind::String)),
        );
        let levels = [&reg];

        let out = resolve_cluster(&levels, "abofile").unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].inline, Some("file"));

        let out = resolve_cluster(&levels, "o").unwrap();
        assert_eq!(out, vec![ShortBinding { flag: FlagRef { depth: 0, entry: 2 }, inline: None }]);

        let out = resolve_cluster(&levels, "a=false").unwrap();
        assert_eq!(out[0].inline, Some("false"));

        assert_eq!(resolve_cluster(&levels, "abz"), Err('z'));
    }
}
