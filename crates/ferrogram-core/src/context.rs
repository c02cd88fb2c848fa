//! Typed binding map built up while an update is dispatched.
//!
//! Rules and middleware extract values from an update (command arguments,
//! regex groups, data loaded by a middleware) and publish them under string
//! keys. Handlers later pick the keys they declare. Values are a closed
//! variant type rather than arbitrary objects so that every consumer can
//! convert them back with [`TryFrom`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single value stored in a [`Context`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ContextValue>),
    Map(HashMap<String, ContextValue>),
    /// Anything else, kept as JSON.
    Json(Value),
}

impl ContextValue {
    /// Returns a short name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Json(_) => "json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ContextValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value into plain JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Str(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl<T: Into<ContextValue>> From<Vec<T>> for ContextValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for ContextValue {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

/// Failed conversion out of a [`ContextValue`].
#[derive(Debug, Clone, Error)]
#[error("expected {expected}, found {found}")]
pub struct ValueTypeError {
    pub expected: &'static str,
    pub found: &'static str,
}

macro_rules! impl_try_from_value {
    ($ty:ty, $expected:literal, $variant:ident) => {
        impl TryFrom<ContextValue> for $ty {
            type Error = ValueTypeError;

            fn try_from(value: ContextValue) -> Result<Self, Self::Error> {
                match value {
                    ContextValue::$variant(v) => Ok(v),
                    other => Err(ValueTypeError {
                        expected: $expected,
                        found: other.kind(),
                    }),
                }
            }
        }
    };
}

impl_try_from_value!(bool, "bool", Bool);
impl_try_from_value!(i64, "int", Int);
impl_try_from_value!(f64, "float", Float);
impl_try_from_value!(String, "str", Str);
impl_try_from_value!(Vec<ContextValue>, "list", List);

impl TryFrom<ContextValue> for Vec<String> {
    type Error = ValueTypeError;

    fn try_from(value: ContextValue) -> Result<Self, Self::Error> {
        let found = value.kind();
        match value {
            ContextValue::List(items) => items.into_iter().map(String::try_from).collect(),
            _ => Err(ValueTypeError {
                expected: "list",
                found,
            }),
        }
    }
}

impl TryFrom<ContextValue> for Value {
    type Error = ValueTypeError;

    fn try_from(value: ContextValue) -> Result<Self, Self::Error> {
        Ok(value.to_json())
    }
}

/// String-keyed bindings for one update's dispatch.
///
/// Merging is last-writer-wins on key collision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: HashMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a value, returning the previous one under that key.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_str)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ContextValue::as_int)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }

    /// Merges `other` into `self`; keys from `other` overwrite.
    pub fn merge(&mut self, other: Context) {
        self.values.extend(other.values);
    }
}

impl FromIterator<(String, ContextValue)> for Context {
    fn from_iter<I: IntoIterator<Item = (String, ContextValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Context {
    type Item = (String, ContextValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_last_writer_wins() {
        let mut a = Context::new().with("x", 1i64).with("y", "a");
        let b = Context::new().with("y", "b").with("z", true);
        a.merge(b);
        assert_eq!(a.get_int("x"), Some(1));
        assert_eq!(a.get_str("y"), Some("b"));
        assert_eq!(a.get("z"), Some(&ContextValue::Bool(true)));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_try_from_value() {
        let args = ContextValue::from(vec!["a", "b"]);
        let parsed: Vec<String> = args.try_into().unwrap();
        assert_eq!(parsed, vec!["a".to_string(), "b".to_string()]);

        let err = String::try_from(ContextValue::Int(3)).unwrap_err();
        assert_eq!(err.expected, "str");
        assert_eq!(err.found, "int");
    }
}
