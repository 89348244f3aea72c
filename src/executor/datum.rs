//! Datum type - runtime values carried in rows and bound parameters

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::catalog::DataType;

/// A single value in a row
#[derive(Debug, Clone, Default)]
pub enum Datum {
    /// NULL value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (covers Int, BigInt)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value (covers Varchar, Text)
    String(String),
}

impl Datum {
    /// Check if this datum is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Numeric type tag for ordering different types
    fn type_tag(&self) -> u8 {
        match self {
            Datum::Null => 0,
            Datum::Bool(_) => 1,
            Datum::Int(_) => 2,
            Datum::Float(_) => 3,
            Datum::String(_) => 4,
        }
    }

    /// Natural data type of this datum, `None` for NULL
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Datum::Null => None,
            Datum::Bool(_) => Some(DataType::Boolean),
            Datum::Int(_) => Some(DataType::BigInt),
            Datum::Float(_) => Some(DataType::Double),
            Datum::String(_) => Some(DataType::Text),
        }
    }

    /// Convert to boolean, returns None if NULL or not convertible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(*b),
            Datum::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Convert to i64, returns None if NULL or not convertible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Datum::Int(i) => Some(*i),
            Datum::Float(f) => Some(*f as i64),
            Datum::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Convert to f64, returns None if NULL or not convertible
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Datum::Float(f) => Some(*f),
            Datum::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to string reference, returns None if NULL or not a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce this datum to a column type
    ///
    /// NULL coerces to every type. Returns `None` when the value has no
    /// lossless representation in `target`.
    pub fn coerce_to(&self, target: DataType) -> Option<Datum> {
        match (self, target) {
            (Datum::Null, _) => Some(Datum::Null),
            (Datum::Bool(_), DataType::Boolean) => Some(self.clone()),
            (Datum::Int(i), DataType::Int) => i32::try_from(*i).ok().map(|_| self.clone()),
            (Datum::Int(_), DataType::BigInt) => Some(self.clone()),
            (Datum::Int(i), DataType::Double) => Some(Datum::Float(*i as f64)),
            (Datum::Float(_), DataType::Double) => Some(self.clone()),
            (Datum::String(s), DataType::Varchar(max)) => {
                (s.chars().count() <= max as usize).then(|| self.clone())
            }
            (Datum::String(_), DataType::Text) => Some(self.clone()),
            _ => None,
        }
    }

    /// Negate this datum (for unary minus)
    pub fn negate(&self) -> Option<Datum> {
        match self {
            Datum::Int(i) => i.checked_neg().map(Datum::Int),
            Datum::Float(f) => Some(Datum::Float(-f)),
            Datum::Null => Some(Datum::Null),
            _ => None,
        }
    }

    /// Logical NOT
    pub fn not(&self) -> Option<Datum> {
        match self {
            Datum::Bool(b) => Some(Datum::Bool(!b)),
            Datum::Null => Some(Datum::Null),
            _ => None,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::Int(i) => write!(f, "{}", i),
            Datum::Float(v) => write!(f, "{}", v),
            Datum::String(s) => write!(f, "'{}'", s),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Datum::Null, Datum::Null) => true,
            (Datum::Bool(a), Datum::Bool(b)) => a == b,
            (Datum::Int(a), Datum::Int(b)) => a == b,
            (Datum::Float(a), Datum::Float(b)) => a.to_bits() == b.to_bits(),
            (Datum::String(a), Datum::String(b)) => a == b,
            (Datum::Int(a), Datum::Float(b)) | (Datum::Float(b), Datum::Int(a)) => {
                (*a as f64).to_bits() == b.to_bits()
            }
            _ => false,
        }
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // NULLs sort first
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Null, _) => Ordering::Less,
            (_, Datum::Null) => Ordering::Greater,

            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Int(a), Datum::Int(b)) => a.cmp(b),
            (Datum::Float(a), Datum::Float(b)) => a.total_cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),

            (Datum::Int(a), Datum::Float(b)) => (*a as f64).total_cmp(b),
            (Datum::Float(a), Datum::Int(b)) => a.total_cmp(&(*b as f64)),

            _ => self.type_tag().cmp(&other.type_tag()),
        }
    }
}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Datum::Null => 0u8.hash(state),
            Datum::Bool(b) => b.hash(state),
            // Int and Float compare equal across types, so hash through f64
            Datum::Int(i) => (*i as f64).to_bits().hash(state),
            Datum::Float(f) => f.to_bits().hash(state),
            Datum::String(s) => s.hash(state),
        }
    }
}

impl From<i64> for Datum {
    fn from(v: i64) -> Self {
        Datum::Int(v)
    }
}

impl From<i32> for Datum {
    fn from(v: i32) -> Self {
        Datum::Int(i64::from(v))
    }
}

impl From<&str> for Datum {
    fn from(v: &str) -> Self {
        Datum::String(v.to_string())
    }
}

impl From<bool> for Datum {
    fn from(v: bool) -> Self {
        Datum::Bool(v)
    }
}
