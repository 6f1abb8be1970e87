//! Name indexes for one command level, built once per parser.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::group::FlagPath;
use crate::options::ParserOptions;
use indexmap::IndexMap;
use std::collections::HashMap;

/// What the matcher needs to know about a flag without touching the tree.
#[derive(Debug, Clone)]
pub(crate) struct FlagInfo {
    pub path: FlagPath,
    pub display: String,
    pub toggle: bool,
    pub optional_value: bool,
    pub help: bool,
    pub version: bool,
}

/// Flags of one command level indexed by short and (qualified) long name.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    entries: Vec<FlagInfo>,
    long: IndexMap<String, usize>,
    short: HashMap<char, usize>,
}

impl Registry {
    pub fn build(cmd: &Command, options: &ParserOptions) -> Result<Self> {
        let mut reg = Registry::default();
        let mut failure: Option<Error> = None;

        cmd.get_group().visit(&mut |path, flag| {
            if failure.is_some() {
                return;
            }
            let entry = reg.entries.len();

            if let Some(c) = flag.get_short() {
                if let Some(&prev) = reg.short.get(&c) {
                    failure = Some(Error::schema(format!(
                        "short flag `-{c}' of command `{}' maps to both `{}' and `{}'",
                        cmd.get_name(),
                        reg.entries[prev].display,
                        flag.display_name()
                    )));
                    return;
                }
                reg.short.insert(c, entry);
            }
            if let Some(long) = flag.get_qualified_long() {
                let key = options.normalize(long);
                if let Some(&prev) = reg.long.get(&key) {
                    failure = Some(Error::schema(format!(
                        "long flag `--{long}' of command `{}' is declared twice (also `{}')",
                        cmd.get_name(),
                        reg.entries[prev].display
                    )));
                    return;
                }
                reg.long.insert(key, entry);
            }

            reg.entries.push(FlagInfo {
                path,
                display: flag.display_name(),
                toggle: flag.is_toggle(),
                optional_value: flag.get_optional_value().is_some(),
                help: flag.is_help_trigger(),
                version: flag.is_version_trigger(),
            });
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(reg),
        }
    }

    pub fn entry(&self, index: usize) -> &FlagInfo {
        &self.entries[index]
    }

    /// Exact lookup; `key` must already be normalized.
    pub fn by_long(&self, key: &str) -> Option<usize> {
        self.long.get(key).copied()
    }

    pub fn by_short(&self, c: char) -> Option<usize> {
        self.short.get(&c).copied()
    }

    /// Normalized long names with their entry index, in declaration order.
    pub fn long_names(&self) -> impl Iterator<Item = (&str, usize)> {
        self.long.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

/// Registries for a whole command tree, mirroring its shape.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegistryTree {
    registry: Registry,
    children: Vec<RegistryTree>,
}

impl RegistryTree {
    pub fn build(cmd: &Command, options: &ParserOptions) -> Result<Self> {
        let registry = Registry::build(cmd, options)?;
        let children = cmd
            .get_subcommands()
            .iter()
            .map(|child| RegistryTree::build(child, options))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { registry, children })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn child(&self, index: usize) -> &RegistryTree {
        &self.children[index]
    }

    /// Registries along `path`, root first.
    pub fn along(&self, path: &[usize]) -> Vec<&Registry> {
        let mut node = self;
        let mut out = Vec::with_capacity(path.len() + 1);
        out.push(&node.registry);
        for &i in path {
            node = &node.children[i];
            out.push(&node.registry);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::flag::Flag;
    use crate::value::ValueKind;

    #[test]
    fn indexes_short_and_long_names() {
        let mut cmd = Command::new("app")
            .flag(Flag::new("verbose").short('v').long("verbose"))
            .flag(Flag::new("out").long("output").kind(ValueKind::String));
        cmd.prepare(".");
        let reg = Registry::build(&cmd, &ParserOptions::default()).unwrap();
        let v = reg.by_short('v').unwrap();
        assert!(reg.entry(v).toggle);
        let o = reg.by_long("output").unwrap();
        assert!(!reg.entry(o).toggle);
        assert_eq!(reg.entry(o).display, "--output");
        assert_eq!(reg.long_names().count(), 2);
    }

    #[test]
    fn duplicate_names_are_schema_errors() {
        let mut cmd = Command::new("app")
            .flag(Flag::new("a").short('x'))
            .flag(Flag::new("b").short('x'));
        cmd.prepare(".");
        let err = Registry::build(&cmd, &ParserOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);

        let mut cmd = Command::new("app")
            .flag(Flag::new("a").long("Name"))
            .flag(Flag::new("b").long("name"));
        cmd.prepare(".");
        assert!(Registry::build(&cmd, &ParserOptions::default()).is_ok());
        let opts = ParserOptions {
            case_insensitive: true,
            ..Default::default()
        };
        assert!(Registry::build(&cmd, &opts).is_err());
    }
}
