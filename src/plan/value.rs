//! Loosely typed parameter and payload values.
//!
//! Plans arrive as JSON or YAML with arbitrary nested arguments. Instead of
//! carrying raw JSON around, values are decoded into [`ParamValue`], where a
//! string of the form `${step.field}` becomes a typed [`Placeholder`] that is
//! resolved against earlier step payloads right before a provider call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ExecutionError;

/// Named arguments of a provider call.
pub type Parameters = BTreeMap<String, ParamValue>;

/// A parameter or payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ParamValue {
    /// Absent / null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value, kept in its textual JSON form.
    Number(serde_json::Number),
    /// Plain string.
    Text(String),
    /// Reference to a field of an earlier step's payload.
    Placeholder(Placeholder),
    /// Ordered list.
    List(Vec<ParamValue>),
    /// Nested mapping.
    Map(Parameters),
}

/// A `${step.field.field}` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// Step whose payload is referenced.
    pub step: String,
    /// Path inside the payload; list elements are addressed by index.
    pub path: Vec<String>,
}

/// Source of success payloads for placeholder resolution.
pub trait PayloadSource {
    /// Returns the success payload recorded for `step`, if any.
    fn payload(&self, step: &str) -> Option<&ParamValue>;
}

impl PayloadSource for BTreeMap<String, ParamValue> {
    fn payload(&self, step: &str) -> Option<&ParamValue> {
        self.get(step)
    }
}

impl Placeholder {
    /// Parses a whole-string placeholder.
    ///
    /// Returns `None` when `text` is an ordinary string.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let inner = text.strip_prefix("${")?.strip_suffix('}')?;
        let mut segments = inner.split('.').map(str::trim);
        let step = segments.next().filter(|s| !s.is_empty())?;
        let path: Vec<String> = segments.map(String::from).collect();
        if path.is_empty() || path.iter().any(String::is_empty) {
            return None;
        }
        Some(Self {
            step: step.to_string(),
            path,
        })
    }

    /// Resolves the placeholder against recorded payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::UnresolvedPlaceholder`] when the step has no
    /// payload or the path does not exist in it.
    pub fn resolve(&self, source: &impl PayloadSource) -> Result<ParamValue, ExecutionError> {
        source
            .payload(&self.step)
            .and_then(|payload| payload.lookup(&self.path))
            .cloned()
            .ok_or_else(|| ExecutionError::UnresolvedPlaceholder {
                placeholder: self.to_string(),
            })
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.step, self.path.join("."))
    }
}

impl ParamValue {
    /// Looks up a nested value by path.
    #[must_use]
    pub fn lookup(&self, path: &[String]) -> Option<&Self> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        let next = match self {
            Self::Map(map) => map.get(head)?,
            Self::List(items) => items.get(head.parse::<usize>().ok()?)?,
            _ => return None,
        };
        next.lookup(rest)
    }

    /// Collects every placeholder contained in this value.
    #[must_use]
    pub fn placeholders(&self) -> Vec<&Placeholder> {
        let mut found = Vec::new();
        self.collect_placeholders(&mut found);
        found
    }

    fn collect_placeholders<'a>(&'a self, found: &mut Vec<&'a Placeholder>) {
        match self {
            Self::Placeholder(p) => found.push(p),
            Self::List(items) => items.iter().for_each(|v| v.collect_placeholders(found)),
            Self::Map(map) => map.values().for_each(|v| v.collect_placeholders(found)),
            _ => {}
        }
    }

    /// Returns a copy with all placeholders substituted.
    ///
    /// # Errors
    ///
    /// Returns an error for the first placeholder that cannot be resolved.
    pub fn resolve(&self, source: &impl PayloadSource) -> Result<Self, ExecutionError> {
        Ok(match self {
            Self::Placeholder(p) => p.resolve(source)?,
            Self::List(items) => Self::List(
                items
                    .iter()
                    .map(|v| v.resolve(source))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(map) => Self::Map(resolve_parameters(map, source)?),
            other => other.clone(),
        })
    }

    /// Returns the string content for text values.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true for [`ParamValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Collects the placeholders of a whole parameter map.
#[must_use]
pub fn parameter_placeholders(params: &Parameters) -> Vec<&Placeholder> {
    params.values().flat_map(ParamValue::placeholders).collect()
}

/// Substitutes placeholders in a parameter map.
///
/// # Errors
///
/// Returns an error for the first placeholder that cannot be resolved.
pub fn resolve_parameters(
    params: &Parameters,
    source: &impl PayloadSource,
) -> Result<Parameters, ExecutionError> {
    params
        .iter()
        .map(|(k, v)| Ok((k.clone(), v.resolve(source)?)))
        .collect()
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Placeholder::parse(&s).map_or(Self::Text(s), Self::Placeholder),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<ParamValue> for serde_json::Value {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Null => Self::Null,
            ParamValue::Bool(b) => Self::Bool(b),
            ParamValue::Number(n) => Self::Number(n),
            ParamValue::Text(s) => Self::String(s),
            ParamValue::Placeholder(p) => Self::String(p.to_string()),
            ParamValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            ParamValue::Map(map) => Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            other => write!(f, "{}", serde_json::Value::from(other.clone())),
        }
    }
}
