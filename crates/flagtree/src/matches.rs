use crate::command::{Command, command_at};
use crate::flag::ValueSource;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Snapshot of one command level after a parse.
///
/// Values are keyed by flag id and positional name. The entered
/// sub-command (if any) is nested under [`Matches::subcommand`]; the
/// unconsumed tokens of the whole parse live on the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Matches {
    command: String,
    values: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    explicit: IndexSet<String>,
    #[serde(skip)]
    present: IndexSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subcommand: Option<Box<Matches>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rest: Vec<String>,
}

impl Matches {
    pub(crate) fn collect(root: &Command, stack: &[usize], rest: &[String]) -> Self {
        let mut levels: Vec<Matches> = (0..=stack.len())
            .map(|depth| Self::level(command_at(root, &stack[..depth])))
            .collect();

        let mut out = levels.pop().unwrap_or_default();
        while let Some(mut parent) = levels.pop() {
            parent.subcommand = Some(Box::new(out));
            out = parent;
        }
        out.rest = rest.to_vec();
        out
    }

    fn level(cmd: &Command) -> Self {
        let mut m = Matches {
            command: cmd.get_name().to_string(),
            ..Default::default()
        };
        for flag in cmd.flags().into_iter().filter(|f| !f.is_builtin()) {
            let id = flag.get_id();
            m.values.insert(id.to_string(), flag.value().clone());
            if flag.is_set() {
                m.explicit.insert(id.to_string());
            }
            if flag.source() != ValueSource::Zero {
                m.present.insert(id.to_string());
            }
        }
        for slot in cmd.get_positionals() {
            let name = slot.get_name();
            m.values.insert(name.to_string(), slot.value().clone());
            if slot.count() > 0 {
                m.explicit.insert(name.to_string());
                m.present.insert(name.to_string());
            }
        }
        m
    }

    /// Name of the command this level describes.
    pub fn name(&self) -> &str {
        &self.command
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn get_str(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(Value::as_str)
    }

    /// `false` for unknown ids and non-boolean values.
    pub fn get_bool(&self, id: &str) -> bool {
        self.get(id).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_int(&self, id: &str) -> Option<i64> {
        self.get(id).and_then(Value::as_int)
    }

    /// Elements of a list value.
    pub fn get_all(&self, id: &str) -> Option<&[Value]> {
        self.get(id).and_then(Value::as_list)
    }

    /// Whether a value came from anywhere other than the kind's zero value.
    pub fn is_present(&self, id: &str) -> bool {
        self.present.contains(id)
    }

    /// Whether the value was explicitly provided in argv.
    ///
    /// This does not include values sourced from env/default.
    pub fn is_explicit(&self, id: &str) -> bool {
        self.explicit.contains(id)
    }

    /// The entered sub-command and its matches.
    pub fn subcommand(&self) -> Option<(&str, &Matches)> {
        self.subcommand.as_deref().map(|m| (m.name(), m))
    }

    /// Unconsumed tokens of the whole parse (top level only).
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    /// All values of this level in declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
