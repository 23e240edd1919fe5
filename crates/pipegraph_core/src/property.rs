// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scalar node properties.
//!
//! A property's value kind is pinned by its first write; later writes of a
//! different kind are rejected and leave the stored value untouched. Floats
//! must be finite, since NaN and infinities have no JSON form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value stored in a node property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
}

impl PropertyValue {
    /// Value kind
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Int(_) => PropertyKind::Int,
            Self::Float(_) => PropertyKind::Float,
            Self::Str(_) => PropertyKind::Str,
        }
    }

    /// Integer value, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float value, if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v:?}"),
        }
    }
}

/// Kind of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Integer
    Int,
    /// Floating point
    Float,
    /// String
    Str,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("string"),
        }
    }
}

/// Rejected property write
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PropertyError {
    /// Value kind differs from the stored one
    #[error("property '{name}' holds {expected} values, got {found}")]
    KindMismatch {
        /// Property name
        name: String,
        /// Pinned kind
        expected: PropertyKind,
        /// Kind of the rejected value
        found: PropertyKind,
    },

    /// NaN or infinite float
    #[error("property '{name}' must be a finite number")]
    NonFinite {
        /// Property name
        name: String,
    },
}

/// Ordered property map with kind pinning
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: IndexMap<String, PropertyValue>,
}

impl Properties {
    /// Create an empty property map
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a property value
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Set a property, returning the previous value
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<Option<PropertyValue>, PropertyError> {
        let name = name.into();
        let value = value.into();
        if value.as_float().is_some_and(|v| !v.is_finite()) {
            return Err(PropertyError::NonFinite { name });
        }
        if let Some(existing) = self.values.get(&name) {
            if existing.kind() != value.kind() {
                return Err(PropertyError::KindMismatch {
                    name,
                    expected: existing.kind(),
                    found: value.kind(),
                });
            }
        }
        Ok(self.values.insert(name, value))
    }

    /// Remove a property, unpinning its kind
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.shift_remove(name)
    }

    /// Whether a property exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterate over properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no properties
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_pinned_by_first_write() {
        let mut props = Properties::new();
        assert_eq!(props.set("count", 3).unwrap(), None);
        assert_eq!(props.set("count", 4).unwrap(), Some(PropertyValue::Int(3)));

        assert_eq!(
            props.set("count", 1.5),
            Err(PropertyError::KindMismatch {
                name: "count".to_string(),
                expected: PropertyKind::Int,
                found: PropertyKind::Float,
            })
        );
        assert_eq!(props.get("count"), Some(&PropertyValue::Int(4)));
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        let mut props = Properties::new();
        props.set("gain", 0.5).unwrap();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                props.set("gain", bad),
                Err(PropertyError::NonFinite { name: "gain".to_string() })
            );
        }
        assert_eq!(props.get("gain"), Some(&PropertyValue::Float(0.5)));
        assert!(props.set("fresh", f64::NAN).is_err());
        assert!(!props.contains("fresh"));
    }

    #[test]
    fn test_remove_unpins_kind() {
        let mut props = Properties::new();
        props.set("label", "a").unwrap();
        props.remove("label");
        assert!(props.set("label", 2.0).is_ok());
    }

    #[test]
    fn test_json_scalars() {
        let values: Vec<PropertyValue> = serde_json::from_str(r#"[1, 1.5, 2.0, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                PropertyValue::Int(1),
                PropertyValue::Float(1.5),
                PropertyValue::Float(2.0),
                PropertyValue::Str("x".to_string()),
            ]
        );
        assert_eq!(serde_json::to_string(&PropertyValue::Float(2.0)).unwrap(), "2.0");
    }
}
