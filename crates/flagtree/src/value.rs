//! Value kinds and the token-to-value converter.
//!
//! Every flag and positional slot carries a [`ValueKind`] resolved once when
//! the tree is built. [`convert`] turns one raw token into a [`Value`],
//! appending to list and map containers instead of replacing them.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// The closed set of value shapes a flag or positional can hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Int,
    Uint,
    Float,
    Bool,
    Duration,
    /// Converted by a function installed with [`register_converter`].
    Custom(String),
    /// Every occurrence appends one element.
    List(Box<ValueKind>),
    /// Every occurrence inserts one `key:value` entry.
    Map(Box<ValueKind>),
    /// Holds [`Value::None`] until bound.
    Optional(Box<ValueKind>),
}

impl ValueKind {
    pub fn list(inner: ValueKind) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn map(inner: ValueKind) -> Self {
        Self::Map(Box::new(inner))
    }

    pub fn optional(inner: ValueKind) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Toggles never consume the following token as their value.
    pub fn is_toggle(&self) -> bool {
        match self {
            Self::Bool => true,
            Self::List(inner) | Self::Optional(inner) => **inner == Self::Bool,
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            Self::Int | Self::Uint | Self::Float => true,
            Self::List(inner) | Self::Optional(inner) => inner.is_numeric(),
            _ => false,
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Map(_) | Self::Optional(_))
    }

    /// The value a slot holds before any default or token is applied.
    pub fn zero(&self) -> Value {
        match self {
            Self::String | Self::Custom(_) => Value::Str(String::new()),
            Self::Int => Value::Int(0),
            Self::Uint => Value::Uint(0),
            Self::Float => Value::Float(0.0),
            Self::Bool => Value::Bool(false),
            Self::Duration => Value::Duration(Duration::ZERO),
            Self::List(_) => Value::List(Vec::new()),
            Self::Map(_) => Value::Map(IndexMap::new()),
            Self::Optional(_) => Value::None,
        }
    }

    /// Whether `value` has the shape this kind produces. Custom kinds
    /// accept any bound value.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::String, Value::Str(_))
            | (Self::Int, Value::Int(_))
            | (Self::Uint, Value::Uint(_))
            | (Self::Float, Value::Float(_))
            | (Self::Bool, Value::Bool(_))
            | (Self::Duration, Value::Duration(_)) => true,
            (Self::Custom(_), v) => !v.is_none(),
            (Self::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            (Self::Map(inner), Value::Map(map)) => map.values().all(|v| inner.accepts(v)),
            (Self::Optional(_), Value::None) => true,
            (Self::Optional(inner), v) => inner.accepts(v),
            _ => false,
        }
    }

    /// Containers hold scalars only, and custom kinds must have a converter.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::List(inner) | Self::Map(inner) | Self::Optional(inner) => {
                if !inner.is_scalar() {
                    return Err(format!("unsupported nested kind `{self}'"));
                }
                inner.validate()
            }
            Self::Custom(name) if !has_converter(name) => {
                Err(format!("no converter registered for `{name}'"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Uint => f.write_str("uint"),
            Self::Float => f.write_str("float"),
            Self::Bool => f.write_str("bool"),
            Self::Duration => f.write_str("duration"),
            Self::Custom(name) => write!(f, "custom<{name}>"),
            Self::List(inner) => write!(f, "list<{inner}>"),
            Self::Map(inner) => write!(f, "map<{inner}>"),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
        }
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "string" | "str" => return Ok(Self::String),
            "int" => return Ok(Self::Int),
            "uint" => return Ok(Self::Uint),
            "float" => return Ok(Self::Float),
            "bool" => return Ok(Self::Bool),
            "duration" => return Ok(Self::Duration),
            _ => {}
        }

        let Some((outer, rest)) = s.split_once('<') else {
            return Err(format!("unknown value kind `{s}'"));
        };
        let Some(inner) = rest.strip_suffix('>') else {
            return Err(format!("unterminated value kind `{s}'"));
        };
        match outer.trim() {
            "custom" => Ok(Self::Custom(inner.trim().to_string())),
            "list" => Ok(Self::list(inner.parse()?)),
            "map" => Ok(Self::map(inner.parse()?)),
            "optional" => Ok(Self::optional(inner.parse()?)),
            other => Err(format!("unknown value kind `{other}'")),
        }
    }
}

/// A bound value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Str(String),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Duration(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Self::Map(map) => {
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                Ok(())
            }
        }
    }
}

/// Untagged: scalars serialize as themselves, durations as their display
/// form (`1.5s`), lists as sequences and maps as objects.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_none(),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Uint(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Duration(v) => serializer.serialize_str(&format!("{v:?}")),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Why a token could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error("(expected {expected}): {reason}")]
    Invalid { expected: String, reason: String },
    #[error("invalid choice `{value}', allowed values are: {}", join_choices(.allowed))]
    Choice { value: String, allowed: Vec<String> },
}

impl ConvertError {
    fn invalid(kind: &ValueKind, reason: impl Into<String>) -> Self {
        Self::Invalid {
            expected: kind.to_string(),
            reason: reason.into(),
        }
    }
}

/// Join choices the way the error messages list them: `a, b or c`.
pub fn join_choices(allowed: &[String]) -> String {
    match allowed {
        [] => String::new(),
        [only] => only.clone(),
        [head @ .., last] => format!("{} or {last}", head.join(", ")),
    }
}

/// Convert `raw` into a value of `kind`, folding it into `existing` for
/// list and map kinds. Scalars ignore `existing`.
pub fn convert(raw: &str, kind: &ValueKind, existing: Value) -> Result<Value, ConvertError> {
    match kind {
        ValueKind::List(inner) => {
            let mut items = match existing {
                Value::List(items) => items,
                _ => Vec::new(),
            };
            items.push(convert_scalar(raw, inner)?);
            Ok(Value::List(items))
        }
        ValueKind::Map(inner) => {
            let Some((key, value)) = split_map_entry(raw) else {
                return Err(ConvertError::invalid(
                    kind,
                    format!("expected key:value, got `{raw}'"),
                ));
            };
            let mut map = match existing {
                Value::Map(map) => map,
                _ => IndexMap::new(),
            };
            map.insert(key.to_string(), convert_scalar(value, inner)?);
            Ok(Value::Map(map))
        }
        ValueKind::Optional(inner) => convert_scalar(raw, inner),
        _ => convert_scalar(raw, kind),
    }
}

/// Reject `raw` unless it is one of `choices` (case-sensitive). An empty
/// choice list allows everything.
pub fn check_choice(raw: &str, choices: &[String]) -> Result<(), ConvertError> {
    if choices.is_empty() || choices.iter().any(|c| c == raw) {
        return Ok(());
    }
    Err(ConvertError::Choice {
        value: raw.to_string(),
        allowed: choices.to_vec(),
    })
}

fn split_map_entry(raw: &str) -> Option<(&str, &str)> {
    raw.split_once(':').or_else(|| raw.split_once('='))
}

fn convert_scalar(raw: &str, kind: &ValueKind) -> Result<Value, ConvertError> {
    match kind {
        ValueKind::String => Ok(Value::Str(raw.to_string())),
        ValueKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| ConvertError::invalid(kind, format!("parsing `{raw}': {e}"))),
        ValueKind::Uint => raw
            .parse::<u64>()
            .map(Value::Uint)
            .map_err(|e| ConvertError::invalid(kind, format!("parsing `{raw}': {e}"))),
        ValueKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| ConvertError::invalid(kind, format!("parsing `{raw}': {e}"))),
        ValueKind::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| ConvertError::invalid(kind, format!("parsing `{raw}': not a boolean"))),
        ValueKind::Duration => parse_duration(raw)
            .map(Value::Duration)
            .map_err(|e| ConvertError::invalid(kind, e)),
        ValueKind::Custom(name) => {
            let Some(converter) = lookup_converter(name) else {
                return Err(ConvertError::invalid(
                    kind,
                    format!("no converter registered for `{name}'"),
                ));
            };
            converter(raw).map_err(|e| ConvertError::invalid(kind, e))
        }
        ValueKind::List(_) | ValueKind::Map(_) | ValueKind::Optional(_) => Err(
            ConvertError::invalid(kind, "nested containers are not supported"),
        ),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parse a duration such as `1h30m`, `250ms` or `1.5s`.
///
/// Units: `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`. A bare `0` is allowed.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    if raw == "0" {
        return Ok(Duration::ZERO);
    }
    if raw.starts_with('-') {
        return Err(format!("negative duration `{raw}' is not supported"));
    }
    let s = raw.strip_prefix('+').unwrap_or(raw);
    if s.is_empty() {
        return Err(format!("invalid duration `{raw}'"));
    }

    let mut nanos = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_end == 0 {
            return Err(format!("invalid duration `{raw}'"));
        }
        let number: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("invalid duration `{raw}'"))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            "" => return Err(format!("missing unit in duration `{raw}'")),
            unit => return Err(format!("unknown unit `{unit}' in duration `{raw}'")),
        };
        nanos += number * scale;
        rest = &rest[unit_end..];
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(format!("duration `{raw}' is out of range"));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// A caller-supplied converter for [`ValueKind::Custom`].
pub type ConvertFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

fn converters() -> &'static RwLock<HashMap<String, ConvertFn>> {
    static CONVERTERS: OnceLock<RwLock<HashMap<String, ConvertFn>>> = OnceLock::new();
    CONVERTERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Install a process-wide converter for `ValueKind::Custom(name)`.
///
/// Install converters before building any parser that uses them; a later
/// registration under the same name replaces the earlier one.
pub fn register_converter<F>(name: impl Into<String>, f: F)
where
    F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
{
    let name = name.into();
    match converters().write() {
        Ok(mut map) => {
            map.insert(name, Arc::new(f));
        }
        Err(poisoned) => {
            poisoned.into_inner().insert(name, Arc::new(f));
        }
    }
}

pub fn has_converter(name: &str) -> bool {
    lookup_converter(name).is_some()
}

fn lookup_converter(name: &str) -> Option<ConvertFn> {
    let map = match converters().read() {
        Ok(map) => map,
        Err(poisoned) => poisoned.into_inner(),
    };
    map.get(name).cloned()
}
