use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::group::{FlagPath, Group};
use crate::options::ParserOptions;
use crate::value::{self, ConvertError, Value, ValueKind};
use std::collections::HashSet;

/// An input bound by position.
///
/// A slot whose kind is a list is a *remainder* slot: it absorbs every
/// further positional token (up to `at_most`, when set). Only the last slot
/// of a command may be a remainder.
#[derive(Debug, Clone)]
pub struct Positional {
    name: String,
    help: String,
    kind: ValueKind,
    required: usize,
    max: Option<usize>,
    value: Value,
    count: usize,
}

impl Positional {
    pub fn new(name: impl Into<String>) -> Self {
        let kind = ValueKind::String;
        Self {
            name: name.into(),
            help: String::new(),
            value: kind.zero(),
            kind,
            required: 0,
            max: None,
            count: 0,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn kind(mut self, kind: ValueKind) -> Self {
        self.value = kind.zero();
        self.kind = kind;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = usize::from(required);
        self
    }

    /// Minimum number of values for a remainder slot.
    pub fn at_least(mut self, n: usize) -> Self {
        self.required = n;
        self
    }

    /// Maximum number of values for a remainder slot.
    pub fn at_most(mut self, n: usize) -> Self {
        self.max = Some(n);
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_help(&self) -> &str {
        &self.help
    }

    pub fn get_kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required > 0
    }

    pub fn min_count(&self) -> usize {
        self.required
    }

    pub fn max_count(&self) -> Option<usize> {
        self.max
    }

    pub fn is_remainder(&self) -> bool {
        matches!(self.kind, ValueKind::List(_))
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Number of tokens bound during the last parse.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the slot can take another token.
    pub(crate) fn is_open(&self) -> bool {
        if self.is_remainder() {
            self.max.is_none_or(|max| self.count < max)
        } else {
            self.count == 0
        }
    }

    pub(crate) fn is_unmet(&self) -> bool {
        self.count < self.required
    }

    pub(crate) fn reset(&mut self) {
        self.value = self.kind.zero();
        self.count = 0;
    }

    pub(crate) fn bind(&mut self, raw: &str) -> Result<(), ConvertError> {
        let current = std::mem::replace(&mut self.value, Value::None);
        self.value = value::convert(raw, &self.kind, current)?;
        self.count += 1;
        Ok(())
    }
}

/// Create a positional slot builder. Shorthand for [`Positional::new`].
pub fn positional(name: impl Into<String>) -> Positional {
    Positional::new(name)
}

/// A scope with its own flags, positional slots and sub-commands.
///
/// ```
/// use flagtree::{Command, Flag, Positional, ValueKind};
///
/// let app = Command::new("app")
///     .flag(Flag::new("verbose").short('v').long("verbose"))
///     .subcommand(
///         Command::new("add")
///             .alias("a")
///             .about("Add a file")
///             .positional(Positional::new("file").required(true)),
///     );
/// assert!(app.find_command(&["a"]).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    about: String,
    long_about: String,
    version: String,
    hidden: bool,
    subcommands_optional: bool,
    pass_after_non_option: bool,
    help_trigger: bool,
    group: Group,
    positionals: Vec<Positional>,
    commands: Vec<Command>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            about: String::new(),
            long_about: String::new(),
            version: String::new(),
            hidden: false,
            subcommands_optional: false,
            pass_after_non_option: false,
            help_trigger: false,
            group: Group::default(),
            positionals: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// One-line description shown in command listings.
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = about.into();
        self
    }

    /// Longer description shown in this command's own help.
    pub fn long_about(mut self, long_about: impl Into<String>) -> Self {
        self.long_about = long_about.into();
        self
    }

    /// Version string; on the root command this enables `-V/--version`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Hide from command listings. Hidden commands are still dispatched.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Allow finishing a parse without selecting one of the sub-commands.
    pub fn subcommands_optional(mut self, yes: bool) -> Self {
        self.subcommands_optional = yes;
        self
    }

    /// Treat everything from the first non-option, non-command token onward
    /// as positional.
    pub fn pass_after_non_option(mut self, yes: bool) -> Self {
        self.pass_after_non_option = yes;
        self
    }

    /// Naming this command on the command line renders help for the
    /// command it was found under instead of entering it (`app sub help`).
    pub fn help_trigger(mut self, yes: bool) -> Self {
        self.help_trigger = yes;
        self
    }

    pub fn flag(mut self, flag: Flag) -> Self {
        self.group.push_flag(flag);
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group.push_group(group);
        self
    }

    pub fn positional(mut self, positional: Positional) -> Self {
        self.positionals.push(positional);
        self
    }

    pub fn subcommand(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn get_about(&self) -> &str {
        &self.about
    }

    pub fn get_long_about(&self) -> &str {
        &self.long_about
    }

    pub fn get_version(&self) -> &str {
        &self.version
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_subcommands_optional(&self) -> bool {
        self.subcommands_optional
    }

    pub fn is_pass_after_non_option(&self) -> bool {
        self.pass_after_non_option
    }

    pub fn is_help_trigger(&self) -> bool {
        self.help_trigger
    }

    /// The command's own option group; its nested groups are the command's groups.
    pub fn get_group(&self) -> &Group {
        &self.group
    }

    pub fn get_groups(&self) -> &[Group] {
        self.group.get_groups()
    }

    pub fn get_positionals(&self) -> &[Positional] {
        &self.positionals
    }

    pub fn get_subcommands(&self) -> &[Command] {
        &self.commands
    }

    pub fn has_subcommands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// All flags of this command in declaration order, nested groups included.
    pub fn flags(&self) -> Vec<&Flag> {
        let mut out = Vec::new();
        self.group.visit(&mut |_, f| out.push(f));
        out
    }

    /// Find a flag of this command by id.
    pub fn find_flag(&self, id: &str) -> Option<&Flag> {
        self.flags().into_iter().find(|f| f.get_id() == id)
    }

    pub fn find_positional(&self, name: &str) -> Option<&Positional> {
        self.positionals.iter().find(|p| p.name == name)
    }

    /// Whether `token` names this command (name or alias).
    pub fn matches_name(&self, token: &str, case_insensitive: bool) -> bool {
        let eq = |candidate: &str| {
            if case_insensitive {
                candidate.eq_ignore_ascii_case(token)
            } else {
                candidate == token
            }
        };
        eq(&self.name) || self.aliases.iter().any(|a| eq(a))
    }

    /// Resolve a path of command names or aliases below this command.
    pub fn find_command(&self, path: &[&str]) -> Option<&Command> {
        let mut cmd = self;
        for name in path {
            cmd = cmd.commands.iter().find(|c| c.matches_name(name, false))?;
        }
        Some(cmd)
    }

    pub(crate) fn subcommand_index(&self, token: &str, case_insensitive: bool) -> Option<usize> {
        self.commands
            .iter()
            .position(|c| c.matches_name(token, case_insensitive))
    }

    /// Index path (as used by the parser) for a path of command names.
    pub(crate) fn index_path(&self, path: &[&str]) -> Option<Vec<usize>> {
        let mut cmd = self;
        let mut out = Vec::with_capacity(path.len());
        for name in path {
            let idx = cmd.subcommand_index(name, false)?;
            out.push(idx);
            cmd = &cmd.commands[idx];
        }
        Some(out)
    }

    pub(crate) fn flag_at(&self, path: &FlagPath) -> Option<&Flag> {
        self.group.flag_at(path)
    }

    pub(crate) fn flag_at_mut(&mut self, path: &FlagPath) -> Option<&mut Flag> {
        self.group.flag_at_mut(path)
    }

    pub(crate) fn positionals_mut(&mut self) -> &mut [Positional] {
        &mut self.positionals
    }

    pub(crate) fn push_group(&mut self, group: Group) {
        self.group.push_group(group);
    }

    pub(crate) fn prepare(&mut self, delimiter: &str) {
        self.group.prepare("", delimiter);
        for child in &mut self.commands {
            child.prepare(delimiter);
        }
    }

    /// Reset every flag and positional in this subtree to its pre-parse state.
    pub(crate) fn reset_all<'e>(&mut self, env: &dyn Fn(&str) -> Option<&'e str>) -> Result<()> {
        for flag in self.group.flags_mut() {
            let name = flag.display_name();
            flag.reset(env).map_err(|e| crate::session::marshal_error(&name, &e))?;
        }
        for slot in &mut self.positionals {
            slot.reset();
        }
        for child in &mut self.commands {
            child.reset_all(env)?;
        }
        Ok(())
    }

    /// Structural checks that do not depend on flag name indexing (which
    /// the registry performs). Command names and aliases are compared the
    /// way the parser will match them.
    pub(crate) fn validate(&self, options: &ParserOptions) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::schema("command name must not be empty"));
        }

        let mut ids: HashSet<&str> = HashSet::new();
        for flag in self.flags() {
            if flag.get_short().is_none() && flag.get_long().is_none() {
                return Err(Error::schema(format!(
                    "flag `{}' in command `{}' has neither a short nor a long name",
                    flag.get_id(),
                    self.name
                )));
            }
            if let Some(c) = flag.get_short() {
                if c == '-' || c == '=' || c.is_whitespace() {
                    return Err(Error::schema(format!("invalid short name `{c}'")));
                }
            }
            if let Some(long) = flag.get_long() {
                if long.is_empty() || long.contains('=') || long.contains(char::is_whitespace) {
                    return Err(Error::schema(format!("invalid long name `{long}'")));
                }
            }
            if let Some(preset) = flag.get_preset() {
                if !flag.get_kind().accepts(preset) {
                    return Err(Error::schema(format!(
                        "preset of flag `{}' does not match its kind `{}'",
                        flag.display_name(),
                        flag.get_kind()
                    )));
                }
            }
            flag.get_kind()
                .validate()
                .map_err(|e| Error::schema(format!("flag `{}': {e}", flag.display_name())))?;
            if !ids.insert(flag.get_id()) {
                return Err(Error::schema(format!(
                    "duplicate flag id `{}' in command `{}'",
                    flag.get_id(),
                    self.name
                )));
            }
        }

        let last = self.positionals.len().saturating_sub(1);
        for (i, slot) in self.positionals.iter().enumerate() {
            if slot.name.trim().is_empty() {
                return Err(Error::schema(format!(
                    "positional argument {i} of command `{}' has no name",
                    self.name
                )));
            }
            if slot.is_remainder() && i != last {
                return Err(Error::schema(format!(
                    "positional `{}' of command `{}' absorbs the remaining arguments and must be last",
                    slot.name, self.name
                )));
            }
            if !slot.is_remainder() && (slot.required > 1 || slot.max.is_some()) {
                return Err(Error::schema(format!(
                    "positional `{}' takes a single value; counts apply to list kinds only",
                    slot.name
                )));
            }
            if slot.max.is_some_and(|max| max < slot.required) {
                return Err(Error::schema(format!(
                    "positional `{}' has a maximum below its minimum",
                    slot.name
                )));
            }
            slot.kind
                .validate()
                .map_err(|e| Error::schema(format!("positional `{}': {e}", slot.name)))?;
            if !ids.insert(slot.name.as_str()) {
                return Err(Error::schema(format!(
                    "positional `{}' collides with another name in command `{}'",
                    slot.name, self.name
                )));
            }
        }

        let mut names: HashSet<String> = HashSet::new();
        for child in &self.commands {
            for name in std::iter::once(&child.name).chain(child.aliases.iter()) {
                if !names.insert(options.normalize(name)) {
                    return Err(Error::schema(format!(
                        "command name or alias `{name}' is used more than once under `{}'",
                        self.name
                    )));
                }
            }
            child.validate(options)?;
        }

        Ok(())
    }
}

/// Create a command builder. Shorthand for [`Command::new`].
pub fn command(name: impl Into<String>) -> Command {
    Command::new(name)
}

/// Walk `path` (child indices) down from `root`.
pub(crate) fn command_at<'a>(root: &'a Command, path: &[usize]) -> &'a Command {
    let mut cmd = root;
    for &i in path {
        cmd = &cmd.commands[i];
    }
    cmd
}

pub(crate) fn command_at_mut<'a>(root: &'a mut Command, path: &[usize]) -> &'a mut Command {
    let mut cmd = root;
    for &i in path {
        cmd = &mut cmd.commands[i];
    }
    cmd
}
