//! JSON schema for flagtree command trees.
//!
//! The data types here mirror the builder API of `flagtree` and are used for:
//! - describing a command tree in a file (the `flagtree` CLI reads these)
//! - exporting an existing [`Command`] back into the same format

use flagtree::{Command, Error, ErrorKind, Flag, Group, ParserOptions, Positional, ValueKind};
use serde::{Deserialize, Serialize};

/// Current value of [`SchemaV1::format_version`].
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct FlagSchema {
    /// Key for reading the value back; defaults to the (qualified) long
    /// name, else the short name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// `"-v"` or `"v"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// `"--verbose"` or `"verbose"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    /// Value kind such as `int` or `list<string>`; a boolean toggle when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_delim: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional_value: Option<String>,
    #[serde(default)]
    pub help_trigger: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PositionalSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    /// Value kind; `string` when absent. A `list<..>` kind makes the slot
    /// absorb every remaining positional token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_most: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub about: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long_about: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub subcommands_optional: bool,
    #[serde(default)]
    pub pass_after_non_option: bool,
    /// Naming this command renders help for its parent instead of entering it.
    #[serde(default)]
    pub help_trigger: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positionals: Vec<PositionalSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<CommandSchema>,
}

/// Top-level JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SchemaV1 {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub command: CommandSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ParserOptions>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl SchemaV1 {
    pub fn new(command: CommandSchema, options: Option<ParserOptions>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            command,
            options,
        }
    }

    /// Encode as JSON bytes.
    pub fn to_json_bytes(&self) -> Vec<u8> {
        serde_json::to_vec_pretty(self).unwrap_or_default()
    }
}

/// Decode a schema document. Syntax errors come back as `serde_json` errors;
/// an unsupported format version is reported as a schema error.
pub fn from_json(bytes: &[u8]) -> Result<SchemaV1, SchemaError> {
    let doc: SchemaV1 = serde_json::from_slice(bytes)?;
    if doc.format_version != FORMAT_VERSION {
        return Err(SchemaError::Invalid(schema_error(format!(
            "unsupported format version {} (expected {FORMAT_VERSION})",
            doc.format_version
        ))));
    }
    Ok(doc)
}

/// Why a schema document could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] Error),
}

fn schema_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::InvalidSchema, message)
}

fn parse_kind(raw: Option<&str>, fallback: ValueKind, owner: &str) -> flagtree::Result<ValueKind> {
    match raw {
        None => Ok(fallback),
        Some(raw) => raw
            .parse()
            .map_err(|e| schema_error(format!("{owner}: {e}"))),
    }
}

fn parse_short(raw: &str, owner: &str) -> flagtree::Result<char> {
    let trimmed = raw.strip_prefix('-').unwrap_or(raw);
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(schema_error(format!(
            "{owner}: short name `{raw}' must be a single character"
        ))),
    }
}

impl FlagSchema {
    pub fn build(&self) -> flagtree::Result<Flag> {
        let owner = self
            .long
            .as_deref()
            .or(self.short.as_deref())
            .unwrap_or(self.id.as_str())
            .to_string();

        let mut flag = Flag::new(self.id.clone())
            .help(self.help.clone())
            .kind(parse_kind(self.kind.as_deref(), ValueKind::Bool, &owner)?)
            .required(self.required)
            .hidden(self.hidden)
            .help_trigger(self.help_trigger)
            .choices(self.choices.iter().cloned());
        if let Some(short) = &self.short {
            flag = flag.short(parse_short(short, &owner)?);
        }
        if let Some(long) = &self.long {
            flag = flag.long(long.clone());
        }
        for value in &self.default {
            flag = flag.default_value(value.clone());
        }
        if let Some(mask) = &self.default_mask {
            flag = flag.default_mask(mask.clone());
        }
        if let Some(env) = &self.env {
            flag = flag.env(env.clone());
        }
        if let Some(delim) = &self.env_delim {
            flag = flag.env_delim(delim.clone());
        }
        if let Some(name) = &self.value_name {
            flag = flag.value_name(name.clone());
        }
        if let Some(value) = &self.optional_value {
            flag = flag.optional_value(value.clone());
        }
        Ok(flag)
    }

    pub fn from_flag(flag: &Flag) -> Self {
        let kind = flag.get_kind();
        Self {
            id: flag.get_id().to_string(),
            short: flag.get_short().map(|c| c.to_string()),
            long: flag.get_long().map(str::to_string),
            help: flag.get_help().to_string(),
            kind: (*kind != ValueKind::Bool).then(|| kind.to_string()),
            required: flag.is_required(),
            default: flag.get_defaults().to_vec(),
            default_mask: flag.get_default_mask().map(str::to_string),
            env: flag.get_env().map(str::to_string),
            env_delim: flag.get_env_delim().map(str::to_string),
            choices: flag.get_choices().to_vec(),
            hidden: flag.is_hidden(),
            value_name: flag.get_value_name().map(str::to_string),
            optional_value: flag.get_optional_value().map(str::to_string),
            help_trigger: flag.is_help_trigger(),
        }
    }
}

impl GroupSchema {
    pub fn build(&self) -> flagtree::Result<Group> {
        let mut group = Group::new(self.name.clone())
            .help(self.help.clone())
            .hidden(self.hidden);
        if let Some(ns) = &self.namespace {
            group = group.namespace(ns.clone());
        }
        for flag in &self.flags {
            group = group.flag(flag.build()?);
        }
        for child in &self.groups {
            group = group.group(child.build()?);
        }
        Ok(group)
    }

    pub fn from_group(group: &Group) -> Self {
        Self {
            name: group.get_name().to_string(),
            help: group.get_help().to_string(),
            namespace: group.get_namespace().map(str::to_string),
            hidden: group.is_hidden(),
            flags: exported_flags(group.get_flags()),
            groups: exported_groups(group.get_groups()),
        }
    }
}

impl PositionalSchema {
    pub fn build(&self) -> flagtree::Result<Positional> {
        let owner = format!("positional `{}'", self.name);
        let mut slot = Positional::new(self.name.clone())
            .help(self.help.clone())
            .kind(parse_kind(self.kind.as_deref(), ValueKind::String, &owner)?)
            .required(self.required);
        if let Some(n) = self.at_least {
            slot = slot.at_least(n);
        }
        if let Some(n) = self.at_most {
            slot = slot.at_most(n);
        }
        Ok(slot)
    }

    pub fn from_positional(slot: &Positional) -> Self {
        let kind = slot.get_kind();
        let counted = slot.is_remainder() && slot.min_count() > 0;
        Self {
            name: slot.get_name().to_string(),
            help: slot.get_help().to_string(),
            kind: (*kind != ValueKind::String).then(|| kind.to_string()),
            required: slot.is_required() && !counted,
            at_least: counted.then(|| slot.min_count()),
            at_most: slot.max_count(),
        }
    }
}

impl CommandSchema {
    /// Build the command tree. Only per-node conversion problems are caught
    /// here; `flagtree::Parser::new` performs full validation.
    pub fn build(&self) -> flagtree::Result<Command> {
        let mut cmd = Command::new(self.name.clone())
            .about(self.about.clone())
            .long_about(self.long_about.clone())
            .version(self.version.clone())
            .hidden(self.hidden)
            .subcommands_optional(self.subcommands_optional)
            .pass_after_non_option(self.pass_after_non_option)
            .help_trigger(self.help_trigger);
        for alias in &self.aliases {
            cmd = cmd.alias(alias.clone());
        }
        for flag in &self.flags {
            cmd = cmd.flag(flag.build()?);
        }
        for group in &self.groups {
            cmd = cmd.group(group.build()?);
        }
        for slot in &self.positionals {
            cmd = cmd.positional(slot.build()?);
        }
        for child in &self.commands {
            cmd = cmd.subcommand(child.build()?);
        }
        Ok(cmd)
    }

    pub fn from_command(cmd: &Command) -> Self {
        Self {
            name: cmd.get_name().to_string(),
            aliases: cmd.get_aliases().to_vec(),
            about: cmd.get_about().to_string(),
            long_about: cmd.get_long_about().to_string(),
            version: cmd.get_version().to_string(),
            hidden: cmd.is_hidden(),
            subcommands_optional: cmd.is_subcommands_optional(),
            pass_after_non_option: cmd.is_pass_after_non_option(),
            help_trigger: cmd.is_help_trigger(),
            flags: exported_flags(cmd.get_group().get_flags()),
            groups: exported_groups(cmd.get_groups()),
            positionals: cmd
                .get_positionals()
                .iter()
                .map(PositionalSchema::from_positional)
                .collect(),
            commands: cmd
                .get_subcommands()
                .iter()
                .map(CommandSchema::from_command)
                .collect(),
        }
    }
}

/// Flags the parser added itself are left out of exports.
fn exported_flags(flags: &[Flag]) -> Vec<FlagSchema> {
    flags
        .iter()
        .filter(|f| !f.is_builtin())
        .map(FlagSchema::from_flag)
        .collect()
}

fn exported_groups(groups: &[Group]) -> Vec<GroupSchema> {
    groups
        .iter()
        .filter(|g| !is_builtin_group(g))
        .map(GroupSchema::from_group)
        .collect()
}

fn is_builtin_group(group: &Group) -> bool {
    group.get_groups().is_empty()
        && !group.get_flags().is_empty()
        && group.get_flags().iter().all(Flag::is_builtin)
}
