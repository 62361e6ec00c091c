use std::{collections::HashMap, fmt};

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Context key holding the identity of the entity flags are evaluated for.
pub const TARGETING_KEY: &str = "targetingKey";

/// Context key holding an optional request identifier forwarded to the backend for tracing.
pub const REQUEST_ID_KEY: &str = "requestID";

/// Evaluation context supplied by the caller.
///
/// Must contain a non-empty [`TARGETING_KEY`] entry. All entries, including the reserved ones, are
/// forwarded to the backend as strings.
pub type FlattenedContext = HashMap<String, ContextValue>;

/// A loosely-typed evaluation context value.
///
/// Values are rendered with [`Display`](fmt::Display) before they are sent to the backend, so the
/// backend only ever sees strings: numbers use their shortest decimal form, booleans become `true`
/// or `false`, structures are rendered as compact JSON and null becomes an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
#[allow(missing_docs)]
pub enum ContextValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Null,
    /// Arrays and objects.
    Structure(serde_json::Value),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::String(s) => f.write_str(s),
            ContextValue::Integer(i) => write!(f, "{i}"),
            ContextValue::Number(n) => write!(f, "{n}"),
            ContextValue::Boolean(b) => write!(f, "{b}"),
            ContextValue::Null => Ok(()),
            ContextValue::Structure(v) => write!(f, "{v}"),
        }
    }
}

/// Render every context value as a string, keeping all keys.
pub(crate) fn stringify(context: &FlattenedContext) -> HashMap<String, String> {
    context
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect()
}

/// Returns the stringified targeting key if it is present and non-empty.
pub(crate) fn targeting_key(context: &FlattenedContext) -> Option<String> {
    context
        .get(TARGETING_KEY)
        .map(ToString::to_string)
        .filter(|key| !key.is_empty())
}
