//! Flag values
//!
//! A single value type shared by every provider so results from different
//! backends can be compared and reduced without knowing the requested type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value a flag resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Boolean(bool),
    String(String),
    Integer(i64),
    Float(f64),
    Structure(serde_json::Value),
}

impl FlagValue {
    pub fn boolean(value: bool) -> Self {
        Self::Boolean(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn float(value: f64) -> Self {
        Self::Float(value)
    }

    pub fn structure(value: serde_json::Value) -> Self {
        Self::Structure(value)
    }

    /// Type tag of this value
    pub fn value_type(&self) -> FlagValueType {
        match self {
            Self::Boolean(_) => FlagValueType::Boolean,
            Self::String(_) => FlagValueType::String,
            Self::Integer(_) => FlagValueType::Integer,
            Self::Float(_) => FlagValueType::Float,
            Self::Structure(_) => FlagValueType::Structure,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structure(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(n) => write!(f, "{}", n),
            Self::Structure(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FlagValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FlagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<serde_json::Value> for FlagValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Structure(value)
    }
}

/// Requested value type of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagValueType {
    Boolean,
    String,
    Integer,
    Float,
    Structure,
}

impl fmt::Display for FlagValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Structure => "structure",
        };
        f.write_str(name)
    }
}

/// Rust types that can be requested from a provider.
///
/// Bridges the typed `resolve_*` methods and the type-erased [`FlagValue`]
/// that strategies compare.
pub trait FlagType: Clone + Send + Sync + 'static {
    /// Type tag for this Rust type
    const VALUE_TYPE: FlagValueType;

    /// Wrap into a [`FlagValue`]
    fn into_flag_value(self) -> FlagValue;

    /// Unwrap from a [`FlagValue`], `None` on a type mismatch
    fn from_flag_value(value: FlagValue) -> Option<Self>;
}

impl FlagType for bool {
    const VALUE_TYPE: FlagValueType = FlagValueType::Boolean;

    fn into_flag_value(self) -> FlagValue {
        FlagValue::Boolean(self)
    }

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FlagType for String {
    const VALUE_TYPE: FlagValueType = FlagValueType::String;

    fn into_flag_value(self) -> FlagValue {
        FlagValue::String(self)
    }

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        match value {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FlagType for i64 {
    const VALUE_TYPE: FlagValueType = FlagValueType::Integer;

    fn into_flag_value(self) -> FlagValue {
        FlagValue::Integer(self)
    }

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_i64()
    }
}

impl FlagType for f64 {
    const VALUE_TYPE: FlagValueType = FlagValueType::Float;

    fn into_flag_value(self) -> FlagValue {
        FlagValue::Float(self)
    }

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        value.as_f64()
    }
}

impl FlagType for serde_json::Value {
    const VALUE_TYPE: FlagValueType = FlagValueType::Structure;

    fn into_flag_value(self) -> FlagValue {
        FlagValue::Structure(self)
    }

    fn from_flag_value(value: FlagValue) -> Option<Self> {
        match value {
            FlagValue::Structure(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_tags() {
        assert_eq!(FlagValue::boolean(true).value_type(), FlagValueType::Boolean);
        assert_eq!(FlagValue::string("x").value_type(), FlagValueType::String);
        assert_eq!(FlagValue::integer(3).value_type(), FlagValueType::Integer);
        assert_eq!(FlagValue::float(0.5).value_type(), FlagValueType::Float);
        assert_eq!(
            FlagValue::structure(serde_json::json!({"a": 1})).value_type(),
            FlagValueType::Structure
        );
    }

    #[test]
    fn test_accessors_reject_other_types() {
        let value = FlagValue::string("blue");
        assert_eq!(value.as_str(), Some("blue"));
        assert_eq!(value.as_bool(), None);
        assert_eq!(value.as_i64(), None);
    }

    #[test]
    fn test_flag_type_mismatch() {
        assert_eq!(bool::from_flag_value(FlagValue::Boolean(true)), Some(true));
        assert_eq!(i64::from_flag_value(FlagValue::Boolean(true)), None);
        assert_eq!(
            String::from_flag_value("red".into()),
            Some("red".to_string())
        );
    }

    #[test]
    fn test_untagged_deserialize() {
        let value: FlagValue = serde_json::from_str("true").unwrap();
        assert_eq!(value, FlagValue::Boolean(true));

        let value: FlagValue = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(value, FlagValue::string("green"));

        let value: FlagValue = serde_json::from_str("42").unwrap();
        assert_eq!(value, FlagValue::Integer(42));
    }
}
