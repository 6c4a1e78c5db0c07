use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::ColumnType;

/// A single cell in a frame, and the literal type carried by operation
/// parameters (filter comparisons, fill values, derive operands).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for CellValue {}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            CellValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view used by comparisons and arithmetic: integers widen
    /// to f64 so `Integer(3)` and `Float(3.0)` compare equal.
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            CellValue::Integer(n) => Some(*n as f64),
            CellValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// The column type this value belongs to, if it is typed at all.
    pub fn dtype(&self) -> Option<ColumnType> {
        match self {
            CellValue::Null => None,
            CellValue::Text(_) => Some(ColumnType::Text),
            CellValue::Integer(_) => Some(ColumnType::Integer),
            CellValue::Float(_) => Some(ColumnType::Float),
            CellValue::Boolean(_) => Some(ColumnType::Boolean),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "null"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Integer(n) => write!(f, "{n}"),
            CellValue::Float(x) => write!(f, "{x}"),
            CellValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_equality_uses_total_cmp() {
        assert_eq!(CellValue::Float(1.5), CellValue::Float(1.5));
        assert_ne!(CellValue::Float(f64::NAN), CellValue::Float(1.5));
        // NaN equals itself under total_cmp
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
    }

    #[test]
    fn numeric_view_widens_integers() {
        assert_eq!(CellValue::Integer(3).as_numeric(), Some(3.0));
        assert_eq!(CellValue::Float(3.0).as_numeric(), Some(3.0));
        assert_eq!(CellValue::Text("3".into()).as_numeric(), None);
    }

    #[test]
    fn cross_variant_values_are_not_equal() {
        assert_ne!(CellValue::Integer(1), CellValue::Float(1.0));
        assert_ne!(CellValue::Null, CellValue::Text(String::new()));
    }
}
