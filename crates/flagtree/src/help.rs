//! Help text for the active command stack.
//!
//! Layout: a usage line, the leaf's long description, option groups of every
//! command on the stack (sub-command options indented under a
//! `[name command options]` header), described positionals, and the leaf's
//! visible sub-commands.

use crate::command::{Command, command_at};
use crate::flag::Flag;
use crate::group::Group;
use crate::value::Value;

const COLUMNS: usize = 80;
const PADDING_BEFORE_OPTION: usize = 2;
const DISTANCE_BEFORE_DESCRIPTION: usize = 2;
const SUBCOMMAND_INDENT: usize = 4;
const ROOT_GROUP_NAME: &str = "Application Options";

/// Column metrics shared by every option and argument row.
struct Alignment {
    max_len: usize,
    has_short: bool,
    has_value_name: bool,
}

impl Alignment {
    fn measure(chain: &[&Command]) -> Self {
        let indent = if chain.len() > 1 { SUBCOMMAND_INDENT } else { 0 };
        let mut align = Alignment {
            max_len: 0,
            has_short: false,
            has_value_name: false,
        };
        let mut update = |len: usize| align.max_len = align.max_len.max(len + indent);

        let mut has_short = false;
        let mut has_value_name = false;
        for cmd in chain {
            for slot in cmd.get_positionals() {
                update(slot.get_name().chars().count());
            }
            for (group, _) in visible_groups(cmd.get_group()) {
                for flag in group.get_flags().iter().filter(|f| !f.is_hidden()) {
                    has_short |= flag.get_short().is_some();
                    has_value_name |= flag.get_value_name().is_some_and(|n| !n.is_empty());
                    let mut len = flag.get_qualified_long().map_or(0, |l| l.chars().count())
                        + flag.get_value_name().map_or(0, |n| n.chars().count());
                    if !flag.get_choices().is_empty() {
                        len += choices_label(flag).chars().count();
                    }
                    update(len);
                }
            }
        }
        align.has_short = has_short;
        align.has_value_name = has_value_name;
        align
    }

    /// Column where descriptions start.
    fn description_start(&self) -> usize {
        let mut start = self.max_len + DISTANCE_BEFORE_DESCRIPTION;
        if self.has_short {
            start += 2;
        }
        if self.max_len > 0 {
            start += 4;
        }
        if self.has_value_name {
            start += 3;
        }
        start + PADDING_BEFORE_OPTION
    }
}

/// Render help for the command reached by `stack` (child indices from `root`).
pub(crate) fn render(root: &Command, stack: &[usize]) -> String {
    let chain: Vec<&Command> = (0..=stack.len())
        .map(|depth| command_at(root, &stack[..depth]))
        .collect();
    let leaf = command_at(root, stack);
    let align = Alignment::measure(&chain);

    let mut out = String::new();
    out.push_str(&format!("Usage:\n  {}\n", usage(&chain)));

    if !leaf.get_long_about().is_empty() {
        out.push('\n');
        out.push_str(&wrap_text(leaf.get_long_about(), COLUMNS, ""));
        out.push('\n');
    }

    let mut indent = false;
    for (depth, cmd) in chain.iter().enumerate() {
        let mut announce = depth > 0;
        for (group, own) in visible_groups(cmd.get_group()) {
            let mut first = true;
            for flag in group.get_flags().iter().filter(|f| !f.is_hidden()) {
                if announce {
                    out.push_str(&format!("\n[{} command options]\n", cmd.get_name()));
                    indent = true;
                    announce = false;
                }
                // A sub-command's own flags sit directly under its header.
                if first && !(own && depth > 0) {
                    out.push('\n');
                    if indent {
                        out.push_str(&" ".repeat(SUBCOMMAND_INDENT));
                    }
                    let name = if own && group.get_name().is_empty() {
                        ROOT_GROUP_NAME
                    } else {
                        group.get_name()
                    };
                    out.push_str(&format!("{name}:\n"));
                    first = false;
                }
                write_flag(&mut out, flag, &align, indent);
            }
        }
        write_arguments(&mut out, cmd, depth, &align);
    }

    write_commands(&mut out, leaf);
    out
}

/// The line printed for the version sentinel.
pub(crate) fn render_version(root: &Command) -> String {
    if root.get_version().trim().is_empty() {
        format!("{}\n", root.get_name())
    } else {
        format!("{} {}\n", root.get_name(), root.get_version().trim())
    }
}

fn usage(chain: &[&Command]) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (depth, cmd) in chain.iter().enumerate() {
        parts.push(cmd.get_name().to_string());
        if has_visible_flags(cmd) {
            if depth == 0 {
                parts.push("[OPTIONS]".to_string());
            } else {
                parts.push(format!("[{}-OPTIONS]", cmd.get_name()));
            }
        }
    }

    let Some(leaf) = chain.last() else {
        return String::new();
    };
    for slot in leaf.get_positionals() {
        let mut name = slot.get_name().to_string();
        if slot.is_remainder() {
            name.push_str("...");
        }
        if slot.is_required() {
            parts.push(name);
        } else {
            parts.push(format!("[{name}]"));
        }
    }

    let names: Vec<&str> = visible_commands(leaf).iter().map(|c| c.get_name()).collect();
    if !names.is_empty() {
        let joined = names.join(" | ");
        if leaf.is_subcommands_optional() {
            parts.push(format!("[{joined}]"));
        } else {
            parts.push(format!("<{joined}>"));
        }
    }
    parts.join(" ")
}

fn write_flag(out: &mut String, flag: &Flag, align: &Alignment, indent: bool) {
    let mut line = " ".repeat(PADDING_BEFORE_OPTION + if indent { SUBCOMMAND_INDENT } else { 0 });
    match flag.get_short() {
        Some(c) => {
            line.push('-');
            line.push(c);
        }
        None if align.has_short => line.push_str("  "),
        None => {}
    }
    if let Some(long) = flag.get_qualified_long() {
        if flag.get_short().is_some() {
            line.push_str(", ");
        } else if align.has_short {
            line.push_str("  ");
        }
        line.push_str("--");
        line.push_str(long);
    }
    if !flag.is_toggle() {
        line.push('=');
        if let Some(name) = flag.get_value_name() {
            line.push_str(name);
        }
        if !flag.get_choices().is_empty() {
            line.push_str(&choices_label(flag));
        }
    }

    let written = line.chars().count();
    out.push_str(&line);

    if !flag.get_help().is_empty() {
        let start = align.description_start();
        out.push_str(&" ".repeat(start.saturating_sub(written)));

        let env = flag
            .get_env()
            .map(|name| format!(" [${name}]"))
            .unwrap_or_default();
        let default = default_label(flag);
        let desc = if default.is_empty() {
            format!("{}{env}", flag.get_help())
        } else {
            format!("{} (default: {default}){env}", flag.get_help())
        };
        out.push_str(&wrap_text(&desc, COLUMNS.saturating_sub(start), &" ".repeat(start)));
    }
    out.push('\n');
}

fn write_arguments(out: &mut String, cmd: &Command, depth: usize, align: &Alignment) {
    let described: Vec<_> = cmd
        .get_positionals()
        .iter()
        .filter(|p| !p.get_help().is_empty())
        .collect();
    if described.is_empty() {
        return;
    }

    if depth == 0 {
        out.push_str("\nArguments:\n");
    } else {
        out.push_str(&format!("\n[{} command arguments]\n", cmd.get_name()));
    }

    let start = align.description_start();
    for slot in described {
        let prefix = format!("{}{}:", " ".repeat(PADDING_BEFORE_OPTION), slot.get_name());
        out.push_str(&prefix);
        out.push_str(&" ".repeat(start.saturating_sub(prefix.chars().count())));
        out.push_str(&wrap_text(
            slot.get_help(),
            COLUMNS.saturating_sub(1 + start),
            &" ".repeat(start),
        ));
        out.push('\n');
    }
}

fn write_commands(out: &mut String, leaf: &Command) {
    let commands = visible_commands(leaf);
    let Some(width) = commands.iter().map(|c| c.get_name().chars().count()).max() else {
        return;
    };

    out.push_str("\nAvailable commands:\n");
    for cmd in commands {
        out.push_str(&format!("  {}", cmd.get_name()));
        if !cmd.get_about().is_empty() {
            let pad = width - cmd.get_name().chars().count();
            out.push_str(&format!("{}  {}", " ".repeat(pad), cmd.get_about()));
            if !cmd.get_aliases().is_empty() {
                out.push_str(&format!(" (aliases: {})", cmd.get_aliases().join(", ")));
            }
        }
        out.push('\n');
    }
}

fn visible_commands(cmd: &Command) -> Vec<&Command> {
    let mut out: Vec<&Command> = cmd
        .get_subcommands()
        .iter()
        .filter(|c| !c.is_hidden())
        .collect();
    out.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    out
}

/// Groups in display order with a marker for the command's own group.
/// A hidden group hides everything below it.
fn visible_groups(own: &Group) -> Vec<(&Group, bool)> {
    fn walk<'a>(group: &'a Group, own: bool, out: &mut Vec<(&'a Group, bool)>) {
        if group.is_hidden() {
            return;
        }
        out.push((group, own));
        for child in group.get_groups() {
            walk(child, false, out);
        }
    }
    let mut out = Vec::new();
    walk(own, true, &mut out);
    out
}

fn has_visible_flags(cmd: &Command) -> bool {
    visible_groups(cmd.get_group())
        .iter()
        .any(|(g, _)| g.get_flags().iter().any(|f| !f.is_hidden()))
}

fn choices_label(flag: &Flag) -> String {
    format!("[{}]", flag.get_choices().join("|"))
}

/// Default shown in help: the mask, else declared defaults, else a
/// non-zero preset. A mask of `-` shows nothing.
fn default_label(flag: &Flag) -> String {
    if let Some(mask) = flag.get_default_mask() {
        return if mask == "-" { String::new() } else { mask.to_string() };
    }
    if !flag.get_defaults().is_empty() {
        return flag
            .get_defaults()
            .iter()
            .map(|d| quote_if_needed(d))
            .collect::<Vec<_>>()
            .join(", ");
    }
    match flag.get_preset() {
        Some(preset) if *preset != flag.get_kind().zero() => match preset {
            Value::List(items) => items
                .iter()
                .map(|v| quote_if_needed(&v.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => quote_if_needed(&other.to_string()),
        },
        _ => String::new(),
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.chars().any(char::is_control) {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

/// Greedy word wrap at `width` columns. Continuation lines (and the lines
/// of later paragraphs) start with `prefix`; a word longer than the width
/// is split with a hyphen.
pub fn wrap_text(s: &str, width: usize, prefix: &str) -> String {
    let width = width.max(10);
    let mut out = String::new();

    for line in s.split('\n') {
        let mut wrapped = String::new();
        let mut rest = line.trim();

        while rest.chars().count() > width {
            let window = char_offset(rest, width);
            let (head, tail, hyphen) = match rest[..window].rfind(' ') {
                Some(pos) => (&rest[..pos], &rest[pos..], false),
                None => {
                    let cut = char_offset(rest, width - 1);
                    (&rest[..cut], &rest[cut..], true)
                }
            };
            if !wrapped.is_empty() {
                wrapped.push('\n');
                wrapped.push_str(prefix);
            }
            wrapped.push_str(head.trim());
            if hyphen {
                wrapped.push('-');
            }
            rest = tail.trim();
        }

        if !rest.is_empty() {
            if !wrapped.is_empty() {
                wrapped.push('\n');
                wrapped.push_str(prefix);
            }
            wrapped.push_str(rest);
        }

        if !out.is_empty() {
            out.push('\n');
            if !wrapped.is_empty() {
                out.push_str(prefix);
            }
        }
        out.push_str(&wrapped);
    }
    out
}

fn char_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}
