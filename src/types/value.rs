//! Decoded column values and row objects.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Decimal(BigDecimal),
    BigInt(BigInt),
    /// Flat array of same-kind elements.
    Array(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in conversion error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(_) => "BOOLEAN",
            Value::Byte(_) => "BYTE",
            Value::Short(_) => "SHORT",
            Value::Int(_) => "INT",
            Value::Long(_) => "LONG",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::String(_) => "STRING",
            Value::Decimal(_) => "DECIMAL",
            Value::BigInt(_) => "BIGINT",
            Value::Array(_) => "ARRAY",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::BigInt(v) => write!(f, "{v}"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Identifies a named field of a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A row object that exposes its columns as named fields.
///
/// Implemented by backends that hand out typed records rather than value
/// sequences. Errors are free-form; the row accessor wraps them into a single
/// access failure kind.
pub trait Record: Send + Sync + fmt::Debug {
    /// Read the field described by `field`.
    fn field(&self, field: &FieldDescriptor) -> Result<Value, String>;
}

/// A row object as held by a cursor.
#[derive(Debug, Clone)]
pub enum Row {
    /// One-column rows carry the bare value.
    Scalar(Value),
    /// Multi-column rows, one value per schema column.
    Sequence(Vec<Value>),
    /// Row read through named fields.
    Record(Arc<dyn Record>),
    /// Row read by key.
    Map(BTreeMap<String, Value>),
}

impl Row {
    /// Normalize decoded column values: a single column yields the bare value.
    #[must_use]
    pub fn from_columns(mut values: Vec<Value>) -> Self {
        if values.len() == 1 {
            Row::Scalar(values.swap_remove(0))
        } else {
            Row::Sequence(values)
        }
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Row::Scalar(a), Row::Scalar(b)) => a == b,
            (Row::Sequence(a), Row::Sequence(b)) => a == b,
            (Row::Map(a), Row::Map(b)) => a == b,
            (Row::Record(a), Row::Record(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_single_column_normalization() {
        let row = Row::from_columns(vec![Value::Long(7)]);
        assert_eq!(row, Row::Scalar(Value::Long(7)));
    }

    #[test]
    fn test_multi_column_normalization() {
        let row = Row::from_columns(vec![Value::Long(7), Value::from("x")]);
        assert_eq!(
            row,
            Row::Sequence(vec![Value::Long(7), Value::String("x".to_string())])
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Null]).to_string(),
            "[1, NULL]"
        );
        let dec = BigDecimal::from_str("12345678901234567890.123").unwrap();
        assert_eq!(
            Value::Decimal(dec).to_string(),
            "12345678901234567890.123"
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Long(3));
    }
}
