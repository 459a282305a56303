use crate::error::ActorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload carried by an [`Operation`](crate::operation::Operation) and by its reply.
///
/// A closed set of scalar kinds keeps every handler's `match` exhaustive. The
/// serde representation is untagged so YAML/JSON scalars map onto it directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Value {
    /// Short name of the variant, used in type mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Text(_) => "text",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub(crate) fn into_int(self) -> Result<i64, ActorError> {
        match self {
            Value::Int(v) => Ok(v),
            other => Err(other.unexpected("int")),
        }
    }

    pub(crate) fn into_bool(self) -> Result<bool, ActorError> {
        match self {
            Value::Bool(v) => Ok(v),
            other => Err(other.unexpected("bool")),
        }
    }

    /// `Null` reads as "no value".
    pub(crate) fn into_option(self) -> Option<Value> {
        match self {
            Value::Null => None,
            other => Some(other),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ActorError {
        ActorError::UnexpectedReply {
            expected,
            found: self.kind(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = serde_json::Error;

    /// Floats, arrays and objects are rejected; everything else maps 1:1.
    fn try_from(v: serde_json::Value) -> Result<Self, Self::Error> {
        serde_json::from_value(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_scalars_map_onto_variants() {
        assert_eq!(Value::try_from(json!(null)).unwrap(), Value::Null);
        assert_eq!(Value::try_from(json!(true)).unwrap(), Value::Bool(true));
        assert_eq!(Value::try_from(json!(-7)).unwrap(), Value::Int(-7));
        assert_eq!(
            Value::try_from(json!("seven")).unwrap(),
            Value::Text("seven".into())
        );
    }

    #[test]
    fn floats_and_containers_are_rejected() {
        assert!(Value::try_from(json!(1.5)).is_err());
        assert!(Value::try_from(json!([1, 2])).is_err());
        assert!(Value::try_from(json!({"a": 1})).is_err());
    }

    #[test]
    fn serializes_without_tags() {
        let out = serde_json::to_string(&vec![Value::Int(1), Value::from("x")]).unwrap();
        assert_eq!(out, r#"[1,"x"]"#);
    }
}
