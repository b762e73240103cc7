//! Runtime values produced by argument coercion and read back by executors.
use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Typed value tagged with explicit type information so compiled predicates
/// serialize without ambiguity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// 64-bit floating point literal.
    Float(f64),
    /// UTF-8 string literal.
    String(String),
    /// Enum constant; ordering follows declaration order.
    Enum {
        /// Position of the constant in its declaration.
        ordinal: u32,
        /// Constant name.
        name: String,
    },
    /// Nanoseconds since Unix epoch in UTC.
    #[serde(deserialize_with = "serde_datetime::deserialize")]
    DateTime(i128),
}

/// Timestamps may arrive as numbers or decimal strings. Buffered
/// (content-first) input never offers `i128`, so both forms go through
/// `deserialize_any`.
mod serde_datetime {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i128, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NanosVisitor;

        impl<'de> Visitor<'de> for NanosVisitor {
            type Value = i128;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("nanoseconds since Unix epoch as a number or string")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<i128, E> {
                Ok(i128::from(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<i128, E> {
                Ok(i128::from(value))
            }

            fn visit_i128<E: de::Error>(self, value: i128) -> Result<i128, E> {
                Ok(value)
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<i128, E> {
                value
                    .parse::<i128>()
                    .map_err(|err| E::custom(format!("invalid timestamp '{value}': {err}")))
            }
        }

        deserializer.deserialize_any(NanosVisitor)
    }
}

impl Value {
    /// Short name of the runtime type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "text",
            Value::Enum { .. } => "enum",
            Value::DateTime(_) => "datetime",
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts an instant to the canonical nanosecond representation.
    pub fn from_datetime(instant: OffsetDateTime) -> Self {
        Value::DateTime(instant.unix_timestamp_nanos())
    }

    /// Orders two values of compatible types.
    ///
    /// Integers and floats compare numerically. Null and mismatched types are
    /// unordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
            (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).map(Ordering::reverse),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Enum { ordinal: a, .. }, Value::Enum { ordinal: b, .. }) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality with numeric widening; null never equals anything.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Enum { name: a, .. }, Value::Enum { name: b, .. }) => a == b,
            (Value::Enum { name, .. }, Value::String(s))
            | (Value::String(s), Value::Enum { name, .. }) => name == s,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

/// Exact ordering of an integer against a float; no rounding through `f64`.
fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first float above i64::MAX.
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    if float.is_nan() {
        return None;
    }
    if float >= BOUND {
        return Some(Ordering::Less);
    }
    if float < -BOUND {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    let fraction = float - whole;
    Some(int.cmp(&(whole as i64)).then(if fraction > 0.0 {
        Ordering::Less
    } else if fraction < 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    }))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Enum { name, .. } => write!(f, "{name}"),
            Value::DateTime(nanos) => write!(f, "TIMESTAMP({nanos})"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::from_datetime(value)
    }
}
