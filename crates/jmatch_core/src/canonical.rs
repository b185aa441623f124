//! Canonicalization of document values
//!
//! Internally the engine works on [`serde_json::Value`]: arrays are ordered
//! sequences, maps are string-keyed objects. External data enters through
//! serde ([`to_canonical`]) and leaves the same way ([`from_canonical`]), so
//! any caller type with a compatible element structure converts to and from
//! the canonical representation. This module also holds the kind
//! classification and the numeric canonicalization used by the comparison
//! runtime.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// The canonical kinds a document value can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    Array,
    Map,
}

impl Kind {
    /// Classify a document value
    pub fn of(value: &Value) -> Kind {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(n) => {
                if n.is_f64() {
                    Kind::Float
                } else {
                    Kind::Integer
                }
            }
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Map,
        }
    }

    /// The kind's name, used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Integer => "integer",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Map => "map",
        }
    }

    /// True for arrays and maps
    pub fn is_container(&self) -> bool {
        matches!(self, Kind::Array | Kind::Map)
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lossless coercion of any numeric value to a float, for comparisons
pub fn float_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Error produced when a caller value cannot be canonicalized
#[derive(Debug)]
pub struct CanonicalError {
    pub message: String,
}

impl std::fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CanonicalError {}

/// Convert any serializable value to the canonical document representation
///
/// Containers used with jmatch must be convertible to arrays of values or
/// string-keyed maps of values; anything else (a map with non-string keys,
/// say) is a canonicalization error.
pub fn to_canonical<T: Serialize>(data: &T) -> Result<Value, CanonicalError> {
    serde_json::to_value(data).map_err(|e| CanonicalError {
        message: format!("value is not canonicalizable: {e}"),
    })
}

/// Convert a canonical document value back to a concrete caller type
pub fn from_canonical<T: DeserializeOwned>(value: Value) -> Result<T, CanonicalError> {
    serde_json::from_value(value).map_err(|e| CanonicalError {
        message: format!("value does not fit the requested type: {e}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Kind::of(&json!(null)), Kind::Null);
        assert_eq!(Kind::of(&json!(true)), Kind::Bool);
        assert_eq!(Kind::of(&json!(7)), Kind::Integer);
        assert_eq!(Kind::of(&json!(7.2)), Kind::Float);
        assert_eq!(Kind::of(&json!("hi")), Kind::String);
        assert_eq!(Kind::of(&json!([1])), Kind::Array);
        assert_eq!(Kind::of(&json!({"a": 1})), Kind::Map);
    }

    #[test]
    fn test_container_kinds() {
        assert!(Kind::of(&json!([])).is_container());
        assert!(Kind::of(&json!({})).is_container());
        assert!(!Kind::of(&json!("nope")).is_container());
    }

    #[test]
    fn test_float_from_value() {
        assert_eq!(float_from_value(&json!(3)), Some(3.0));
        assert_eq!(float_from_value(&json!(2.5)), Some(2.5));
        assert_eq!(float_from_value(&json!(u64::MAX)), Some(u64::MAX as f64));
        assert_eq!(float_from_value(&json!("3")), None);
        assert_eq!(float_from_value(&json!(null)), None);
    }

    #[test]
    fn test_canonical_round_trip() {
        let mut original = BTreeMap::new();
        original.insert("count".to_string(), 3u32);
        let canonical = to_canonical(&original).unwrap();
        assert_eq!(canonical, json!({"count": 3}));
        let restored: BTreeMap<String, u32> = from_canonical(canonical).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_non_string_keys_fail() {
        let mut bad = BTreeMap::new();
        bad.insert(vec![1u8], "x");
        assert!(to_canonical(&bad).is_err());
    }
}
