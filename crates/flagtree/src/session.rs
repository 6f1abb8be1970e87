//! One parse run over a prepared command tree.

use crate::command::{Command, command_at, command_at_mut};
use crate::error::{Error, ErrorKind, Result};
use crate::flag::Flag;
use crate::help;
use crate::matcher::{self, FlagRef, LongMatch};
use crate::options::ParserOptions;
use crate::registry::{Registry, RegistryTree};
use crate::token::{self, Token};
use crate::value::{self, ConvertError, Value};

/// Wrap a conversion failure into a `Marshal` error naming the flag or slot.
pub(crate) fn marshal_error(name: &str, err: &ConvertError) -> Error {
    let message = match err {
        ConvertError::Invalid { .. } => format!("invalid argument for flag `{name}' {err}"),
        ConvertError::Choice { value, allowed } => format!(
            "Invalid value `{value}' for option `{name}'. Allowed values are: {}",
            value::join_choices(allowed)
        ),
    };
    Error::new(ErrorKind::Marshal, message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Options, commands and positionals are all recognized.
    Any,
    /// The previous token was a flag that needs the next token as its value.
    Value(FlagRef),
    /// After `--`: no option interpretation, commands still dispatch.
    OptionsDisabled,
    /// After the first non-option under pass-after-non-option: positional
    /// slots, then unconsumed.
    PositionalOnly,
    /// After `--` with pass-double-dash: everything is unconsumed.
    PassThrough,
}

pub(crate) struct Session<'p> {
    root: &'p mut Command,
    node: &'p RegistryTree,
    levels: Vec<&'p Registry>,
    options: &'p ParserOptions,
    tokens: Vec<String>,
    cursor: usize,
    stack: Vec<usize>,
    slot: usize,
    rest_at_level: bool,
    unconsumed: Vec<String>,
    state: State,
}

impl<'p> Session<'p> {
    pub fn new(
        root: &'p mut Command,
        tree: &'p RegistryTree,
        options: &'p ParserOptions,
        tokens: Vec<String>,
    ) -> Self {
        Self {
            root,
            node: tree,
            levels: vec![tree.registry()],
            options,
            tokens,
            cursor: 0,
            stack: Vec::new(),
            slot: 0,
            rest_at_level: false,
            unconsumed: Vec::new(),
            state: State::Any,
        }
    }

    /// Child indices of the commands entered before the run ended.
    pub fn into_stack(self) -> Vec<usize> {
        self.stack
    }

    /// Reset the tree, scan every token, then check requirements.
    /// Returns the unconsumed tokens.
    pub fn run<'e>(&mut self, env: &dyn Fn(&str) -> Option<&'e str>) -> Result<Vec<String>> {
        tracing::debug!(tokens = self.tokens.len(), "parse started");
        self.root.reset_all(env)?;

        while self.cursor < self.tokens.len() {
            let arg = self.tokens[self.cursor].clone();
            self.cursor += 1;
            tracing::trace!(token = %arg, state = ?self.state, "scan");

            match self.state {
                State::Any => self.any(&arg)?,
                State::Value(flag) => {
                    self.state = State::Any;
                    self.option_value(flag, &arg)?;
                }
                State::OptionsDisabled => self.non_option(&arg)?,
                State::PositionalOnly => self.positional(&arg, false)?,
                State::PassThrough => self.unconsumed.push(arg),
            }
        }

        if let State::Value(flag) = self.state {
            return Err(Error::new(
                ErrorKind::ExpectedArgument,
                format!("expected argument for flag `{}'", flag.info(&self.levels).display),
            ));
        }

        self.check_required()?;
        self.check_command()?;

        tracing::debug!(
            depth = self.stack.len(),
            unconsumed = self.unconsumed.len(),
            "parse finished"
        );
        Ok(std::mem::take(&mut self.unconsumed))
    }

    fn active(&self) -> &Command {
        command_at(&*self.root, &self.stack)
    }

    fn any(&mut self, arg: &str) -> Result<()> {
        match token::classify(arg, self.options.honor_double_dash) {
            Token::Separator => {
                self.state = if self.options.pass_double_dash {
                    State::PassThrough
                } else {
                    State::OptionsDisabled
                };
                Ok(())
            }
            Token::Long { name, value } => {
                match matcher::resolve_long(&self.levels, name, self.options) {
                    LongMatch::Found(flag) => self.occurrence(flag, value),
                    LongMatch::Ambiguous(candidates) => {
                        let list = candidates
                            .iter()
                            .map(|c| format!("`{c}'"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        Err(Error::new(
                            ErrorKind::AmbiguousOption,
                            format!("ambiguous option `--{name}' could match {list}"),
                        ))
                    }
                    LongMatch::Unknown => self.unknown(arg, name),
                }
            }
            Token::Short { cluster } => {
                if token::looks_like_number(arg) && self.number_is_positional(cluster) {
                    return self.non_option(arg);
                }
                match matcher::resolve_cluster(&self.levels, cluster) {
                    Ok(bindings) => {
                        for b in bindings {
                            self.occurrence(b.flag, b.inline)?;
                        }
                        Ok(())
                    }
                    Err(c) => self.unknown(arg, &c.to_string()),
                }
            }
            Token::Word(word) => self.non_option(word),
        }
    }

    /// `-5` is a value when the next slot wants a number or no short
    /// flag claims its first character.
    fn number_is_positional(&self, cluster: &str) -> bool {
        let next_slot_numeric = self
            .active()
            .get_positionals()
            .iter()
            .skip(self.slot)
            .find(|p| p.is_open())
            .is_some_and(|p| p.get_kind().is_numeric());
        let first = cluster.chars().next();
        next_slot_numeric || first.is_none_or(|c| matcher::resolve_short(&self.levels, c).is_none())
    }

    fn unknown(&mut self, arg: &str, name: &str) -> Result<()> {
        if self.options.ignore_unknown {
            tracing::trace!(token = %arg, "ignoring unknown flag");
            return self.positional(arg, false);
        }
        Err(Error::new(
            ErrorKind::UnknownFlag,
            format!("unknown flag `{name}'"),
        ))
    }

    /// One flag occurrence, long or from a short cluster.
    fn occurrence(&mut self, flag: FlagRef, inline: Option<&str>) -> Result<()> {
        let info = flag.info(&self.levels);
        self.check_triggers(flag)?;
        match inline {
            Some(value) => self.bind(flag, Some(value)),
            None if info.toggle || info.optional_value => self.bind(flag, None),
            None => {
                self.state = State::Value(flag);
                Ok(())
            }
        }
    }

    fn check_triggers(&self, flag: FlagRef) -> Result<()> {
        let info = flag.info(&self.levels);
        if info.help {
            tracing::debug!(flag = %info.display, "help requested");
            let text = help::render(&*self.root, &self.stack);
            return Err(self.sentinel(ErrorKind::Help, text));
        }
        if info.version {
            let text = help::render_version(&*self.root);
            return Err(self.sentinel(ErrorKind::Version, text));
        }
        Ok(())
    }

    fn sentinel(&self, kind: ErrorKind, text: String) -> Error {
        let mut remaining = self.unconsumed.clone();
        remaining.extend(self.tokens[self.cursor..].iter().cloned());
        Error::new(kind, text).with_remaining(remaining)
    }

    fn option_value(&mut self, flag: FlagRef, arg: &str) -> Result<()> {
        if token::looks_like_option(arg) {
            let accepted = {
                let f = self.flag(flag)?;
                f.get_kind().is_numeric()
                    && value::convert(arg, f.get_kind(), Value::None).is_ok()
            };
            if !accepted {
                return Err(Error::new(
                    ErrorKind::ExpectedArgument,
                    format!(
                        "expected argument for flag `{}', but got option `{arg}'",
                        flag.info(&self.levels).display
                    ),
                ));
            }
        }
        self.bind(flag, Some(arg))
    }

    fn flag(&self, flag: FlagRef) -> Result<&Flag> {
        let info = flag.info(&self.levels);
        command_at(&*self.root, &self.stack[..flag.depth])
            .flag_at(&info.path)
            .ok_or_else(|| Error::schema(format!("flag `{}' is not addressable", info.display)))
    }

    fn bind(&mut self, flag: FlagRef, raw: Option<&str>) -> Result<()> {
        let info = flag.info(&self.levels);
        let target = command_at_mut(self.root, &self.stack[..flag.depth])
            .flag_at_mut(&info.path)
            .ok_or_else(|| Error::schema(format!("flag `{}' is not addressable", info.display)))?;
        target
            .bind(raw)
            .map_err(|e| marshal_error(&info.display, &e))?;
        tracing::trace!(flag = %info.display, "bound");
        Ok(())
    }

    /// A token that is not an option: command name, positional value or
    /// unconsumed.
    fn non_option(&mut self, arg: &str) -> Result<()> {
        let cmd = self.active();
        let dispatch = !self.rest_at_level && !cmd.get_positionals().iter().any(|p| p.is_unmet());
        if dispatch {
            if let Some(index) = cmd.subcommand_index(arg, self.options.case_insensitive) {
                if cmd.get_subcommands()[index].is_help_trigger() {
                    tracing::debug!(command = %arg, "help requested");
                    let text = help::render(&*self.root, &self.stack);
                    return Err(self.sentinel(ErrorKind::Help, text));
                }
                self.enter(index);
                return Ok(());
            }
        }

        let pass = self.options.pass_after_non_option || cmd.is_pass_after_non_option();
        if pass && self.state == State::Any {
            self.state = State::PositionalOnly;
            return self.positional(arg, false);
        }
        self.positional(arg, true)
    }

    fn enter(&mut self, index: usize) {
        self.node = self.node.child(index);
        self.levels.push(self.node.registry());
        self.stack.push(index);
        self.slot = 0;
        self.rest_at_level = false;
        tracing::debug!(command = self.active().get_name(), "entered command");
    }

    /// Bind to the next open slot of the active command, or set aside as
    /// unconsumed. With `strict`, a command that needs a sub-command rejects
    /// the first token nothing can take.
    fn positional(&mut self, arg: &str, strict: bool) -> Result<()> {
        let slots = command_at_mut(self.root, &self.stack).positionals_mut();
        while self.slot < slots.len() && !slots[self.slot].is_open() {
            self.slot += 1;
        }
        if let Some(slot) = slots.get_mut(self.slot) {
            let name = slot.get_name().to_string();
            return slot.bind(arg).map_err(|e| marshal_error(&name, &e));
        }

        let cmd = self.active();
        if strict
            && !self.rest_at_level
            && cmd.has_subcommands()
            && !cmd.is_subcommands_optional()
        {
            return Err(unknown_command(cmd, arg));
        }
        self.unconsumed.push(arg.to_string());
        self.rest_at_level = true;
        Ok(())
    }

    fn check_required(&self) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        for depth in 0..=self.stack.len() {
            let cmd = command_at(&*self.root, &self.stack[..depth]);
            missing.extend(
                cmd.flags()
                    .into_iter()
                    .filter(|f| f.is_required() && !f.is_satisfied())
                    .map(|f| format!("`{}'", f.display_name())),
            );
        }

        match missing.as_slice() {
            [] => {}
            [only] => {
                return Err(Error::new(
                    ErrorKind::Required,
                    format!("the required flag {only} was not specified"),
                ));
            }
            [head @ .., last] => {
                return Err(Error::new(
                    ErrorKind::Required,
                    format!(
                        "the required flags {} and {last} were not specified",
                        head.join(", ")
                    ),
                ));
            }
        }

        for depth in 0..=self.stack.len() {
            let cmd = command_at(&*self.root, &self.stack[..depth]);
            let names: Vec<String> = cmd
                .get_positionals()
                .iter()
                .filter(|p| p.is_unmet())
                .map(|p| {
                    if p.is_remainder() {
                        let arguments = if p.min_count() > 1 {
                            format!("arguments, but got only {}", p.count())
                        } else {
                            "argument".to_string()
                        };
                        format!("`{} (at least {} {arguments})`", p.get_name(), p.min_count())
                    } else {
                        format!("`{}`", p.get_name())
                    }
                })
                .collect();

            match names.as_slice() {
                [] => continue,
                [only] => {
                    return Err(Error::new(
                        ErrorKind::Required,
                        format!("the required argument {only} was not provided"),
                    ));
                }
                [head @ .., last] => {
                    return Err(Error::new(
                        ErrorKind::Required,
                        format!(
                            "the required arguments {} and {last} were not provided",
                            head.join(", ")
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_command(&self) -> Result<()> {
        let cmd = self.active();
        if !cmd.has_subcommands() || cmd.is_subcommands_optional() {
            return Ok(());
        }
        let names = visible_command_names(cmd);
        let message = match names.as_slice() {
            [] => "Please specify a command".to_string(),
            [only] => format!("Please specify the {only} command"),
            _ => format!("Please specify one command of: {}", value::join_choices(&names)),
        };
        Err(Error::new(ErrorKind::CommandRequired, message))
    }
}

fn visible_command_names(cmd: &Command) -> Vec<String> {
    let mut names: Vec<String> = cmd
        .get_subcommands()
        .iter()
        .filter(|c| !c.is_hidden())
        .map(|c| c.get_name().to_string())
        .collect();
    names.sort();
    names
}

fn unknown_command(cmd: &Command, arg: &str) -> Error {
    let names = visible_command_names(cmd);
    let mut message = format!("Unknown command `{arg}'");
    match closest(arg, &names) {
        Some(name) => message.push_str(&format!(", did you mean `{name}'?")),
        None => match names.as_slice() {
            [] => {}
            [only] => message.push_str(&format!(". You should use the {only} command")),
            _ => message.push_str(&format!(
                ". Please specify one command of: {}",
                value::join_choices(&names)
            )),
        },
    }
    Error::new(ErrorKind::UnknownCommand, message)
}

/// Closest name by edit distance, if it differs in under half its length.
fn closest<'n>(arg: &str, names: &'n [String]) -> Option<&'n str> {
    names
        .iter()
        .map(|name| (name, strsim::levenshtein(arg, name)))
        .filter(|(name, distance)| distance * 2 < name.chars().count())
        .min_by_key(|(_, distance)| *distance)
        .map(|(name, _)| name.as_str())
}
