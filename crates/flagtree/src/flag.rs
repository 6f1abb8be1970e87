use crate::value::{self, ConvertError, Value, ValueKind};

/// Where a flag's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Nothing applied; the kind's zero value.
    Zero,
    /// Declared default values.
    Default,
    /// A programmatic default set with [`Flag::preset`].
    Preset,
    /// An environment variable.
    Env,
    /// The argument vector.
    Argv,
}

/// A named, typed input bound via `-x` or `--xyz`.
///
/// Built with setter-style methods, read with `get_*` accessors:
///
/// ```
/// use flagtree::{Flag, ValueKind};
///
/// let verbose = Flag::new("verbose").short('v').long("verbose").help("Verbose output");
/// let output = Flag::new("output")
///     .short('o')
///     .long("output")
///     .kind(ValueKind::String)
///     .value_name("FILE");
/// assert!(verbose.is_toggle());
/// assert!(!output.is_toggle());
/// ```
#[derive(Debug, Clone)]
pub struct Flag {
    id: String,
    short: Option<char>,
    long: Option<String>,
    qualified_long: Option<String>,
    help: String,
    kind: ValueKind,
    required: bool,
    defaults: Vec<String>,
    default_mask: Option<String>,
    preset: Option<Value>,
    env: Option<String>,
    env_delim: Option<String>,
    choices: Vec<String>,
    hidden: bool,
    value_name: Option<String>,
    optional_value: Option<String>,
    help_trigger: bool,
    version_trigger: bool,
    builtin: bool,

    value: Value,
    seen: usize,
    source: ValueSource,
}

impl Flag {
    /// Create a boolean toggle identified by `id`.
    ///
    /// `id` is the key used to read the value back; it does not make the flag
    /// addressable on the command line. Set [`Flag::short`] and/or
    /// [`Flag::long`] for that. An empty `id` defaults to the long name (or
    /// the short name) when the tree is prepared.
    pub fn new(id: impl Into<String>) -> Self {
        let kind = ValueKind::Bool;
        Self {
            id: id.into(),
            short: None,
            long: None,
            qualified_long: None,
            help: String::new(),
            value: kind.zero(),
            kind,
            required: false,
            defaults: Vec::new(),
            default_mask: None,
            preset: None,
            env: None,
            env_delim: None,
            choices: Vec::new(),
            hidden: false,
            value_name: None,
            optional_value: None,
            help_trigger: false,
            version_trigger: false,
            builtin: false,
            seen: 0,
            source: ValueSource::Zero,
        }
    }

    pub fn short(mut self, c: char) -> Self {
        self.short = Some(c);
        self
    }

    /// Long name without leading dashes (`"verbose"`, not `"--verbose"`).
    pub fn long(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim_start_matches('-').to_string();
        self.long = Some(name);
        self
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
        self.required = required;
        self
    }

    /// Add a declared default. List and map flags may declare several.
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.defaults.push(value.into());
        self
    }

    /// Text shown instead of the default in help. `"-"` hides the default.
    pub fn default_mask(mut self, mask: impl Into<String>) -> Self {
        self.default_mask = Some(mask.into());
        self
    }

    /// Programmatic default; takes precedence over declared defaults.
    pub fn preset(mut self, value: Value) -> Self {
        self.preset = Some(value);
        self
    }

    /// Environment variable consulted when the flag is absent from argv.
    pub fn env(mut self, name: impl Into<String>) -> Self {
        self.env = Some(name.into());
        self
    }

    /// Split list/map environment values on this delimiter.
    pub fn env_delim(mut self, delim: impl Into<String>) -> Self {
        self.env_delim = Some(delim.into());
        self
    }

    pub fn choice(mut self, choice: impl Into<String>) -> Self {
        self.choices.push(choice.into());
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices.extend(choices.into_iter().map(Into::into));
        self
    }

    /// Hide from help output. Hidden flags still parse.
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn value_name(mut self, name: impl Into<String>) -> Self {
        self.value_name = Some(name.into());
        self
    }

    /// Value bound when the flag appears without one (`--color` vs `--color=never`).
    ///
    /// A flag with an optional value never consumes the following token.
    pub fn optional_value(mut self, value: impl Into<String>) -> Self {
        self.optional_value = Some(value.into());
        self
    }

    /// Recognizing this flag aborts the scan with the help sentinel.
    pub fn help_trigger(mut self, yes: bool) -> Self {
        self.help_trigger = yes;
        self
    }

    pub(crate) fn version_trigger(mut self, yes: bool) -> Self {
        self.version_trigger = yes;
        self
    }

    pub(crate) fn builtin(mut self) -> Self {
        self.builtin = true;
        self
    }

    pub fn get_id(&self) -> &str {
        &self.id
    }

    pub fn get_short(&self) -> Option<char> {
        self.short
    }

    pub fn get_long(&self) -> Option<&str> {
        self.long.as_deref()
    }

    /// Long name including group namespaces (`sip.sap.opt`).
    pub fn get_qualified_long(&self) -> Option<&str> {
        self.qualified_long.as_deref().or(self.long.as_deref())
    }

    pub fn get_help(&self) -> &str {
        &self.help
    }

    pub fn get_kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn get_defaults(&self) -> &[String] {
        &self.defaults
    }

    pub fn get_default_mask(&self) -> Option<&str> {
        self.default_mask.as_deref()
    }

    pub fn get_preset(&self) -> Option<&Value> {
        self.preset.as_ref()
    }

    pub fn get_env(&self) -> Option<&str> {
        self.env.as_deref()
    }

    pub fn get_env_delim(&self) -> Option<&str> {
        self.env_delim.as_deref()
    }

    pub fn get_choices(&self) -> &[String] {
        &self.choices
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn get_value_name(&self) -> Option<&str> {
        self.value_name.as_deref()
    }

    pub fn get_optional_value(&self) -> Option<&str> {
        self.optional_value.as_deref()
    }

    pub fn is_help_trigger(&self) -> bool {
        self.help_trigger
    }

    pub fn is_version_trigger(&self) -> bool {
        self.version_trigger
    }

    /// Whether the parser added this flag (`-h/--help`, `-V/--version`).
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn is_toggle(&self) -> bool {
        self.kind.is_toggle()
    }

    /// Name used in messages: `--long` when there is one, else `-s`.
    pub fn display_name(&self) -> String {
        match (self.get_qualified_long(), self.short) {
            (Some(long), _) => format!("--{long}"),
            (None, Some(c)) => format!("-{c}"),
            (None, None) => self.id.clone(),
        }
    }

    /// Current bound value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Number of times the flag appeared in argv during the last parse.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn source(&self) -> ValueSource {
        self.source
    }

    /// Whether the flag was given explicitly on the command line.
    pub fn is_set(&self) -> bool {
        self.seen > 0
    }

    /// Whether the flag still holds its default (declared, preset or zero).
    pub fn is_set_default(&self) -> bool {
        matches!(
            self.source,
            ValueSource::Zero | ValueSource::Default | ValueSource::Preset
        )
    }

    /// Required flags are satisfied by argv or by the environment.
    pub(crate) fn is_satisfied(&self) -> bool {
        self.seen > 0 || self.source == ValueSource::Env
    }

    pub(crate) fn prepare(&mut self, qualified_long: Option<String>) {
        self.qualified_long = qualified_long;
        if self.id.is_empty() {
            self.id = match (self.get_qualified_long(), self.short) {
                (Some(long), _) => long.to_string(),
                (None, Some(c)) => c.to_string(),
                (None, None) => String::new(),
            };
        }
    }

    /// Restore the pre-parse value: zero, then declared defaults, then the
    /// preset, then the environment.
    pub(crate) fn reset<'e>(
        &mut self,
        env: &dyn Fn(&str) -> Option<&'e str>,
    ) -> Result<(), ConvertError> {
        self.seen = 0;
        self.value = self.kind.zero();
        self.source = ValueSource::Zero;

        for raw in &self.defaults {
            let current = std::mem::replace(&mut self.value, Value::None);
            self.value = value::convert(raw, &self.kind, current)?;
            self.source = ValueSource::Default;
        }

        if let Some(preset) = &self.preset {
            self.value = preset.clone();
            self.source = ValueSource::Preset;
        }

        if let Some(raw) = self.env.as_deref().and_then(env) {
            let mut next = self.kind.zero();
            match self.env_delim.as_deref() {
                Some(delim) if self.kind.is_repeatable() && !delim.is_empty() => {
                    for part in raw.split(delim) {
                        next = value::convert(part, &self.kind, next)?;
                    }
                }
                _ => next = value::convert(raw, &self.kind, next)?,
            }
            self.value = next;
            self.source = ValueSource::Env;
        }

        Ok(())
    }

    /// Bind one occurrence from argv. `raw` is `None` when the flag appeared
    /// without a value (toggles and optional-value flags).
    pub(crate) fn bind(&mut self, raw: Option<&str>) -> Result<(), ConvertError> {
        let raw = match raw {
            Some(raw) => raw,
            None => match self.optional_value.as_deref() {
                Some(optional) => optional,
                None => "true",
            },
        };

        if !matches!(self.kind, ValueKind::Map(_)) {
            value::check_choice(raw, &self.choices)?;
        }

        // The first explicit occurrence replaces values that came from
        // defaults or the environment instead of appending to them.
        let current = if self.source == ValueSource::Argv {
            std::mem::replace(&mut self.value, Value::None)
        } else {
            self.kind.zero()
        };
        self.value = value::convert(raw, &self.kind, current)?;
        self.seen += 1;
        self.source = ValueSource::Argv;
        Ok(())
    }
}

/// Create a flag builder. Shorthand for [`Flag::new`].
pub fn flag(id: impl Into<String>) -> Flag {
    Flag::new(id)
}
