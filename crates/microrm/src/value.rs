//! Dynamic values exchanged between entities, records, filters and the driver.

use crate::coercion::SemanticType;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Format used when a timestamp value has to be rendered for diagnostics.
const DEBUG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamically typed scalar.
///
/// Records coming from the store only ever hold the first five variants.
/// `Timestamp` lives on the entity side and has to be formatted by the
/// data mapper before it can be bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Name of the runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "unset" for identifier checks.
    ///
    /// `null`, `false`, `0`, `0.0`, `""` and `"0"` are empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty() || s == "0",
            Value::Timestamp(_) => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(DEBUG_TIMESTAMP_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => {
                serializer.collect_str(&ts.format(DEBUG_TIMESTAMP_FORMAT))
            }
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => |$v:ident| $expr:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $expr
                }
            }

            impl From<$ty> for FilterValue {
                fn from(v: $ty) -> Self {
                    FilterValue::from(Value::from(v))
                }
            }
        )*
    };
}

impl_from_scalar! {
    bool => |v| Value::Bool(v),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    f64 => |v| Value::Float(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    NaiveDateTime => |v| Value::Timestamp(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// A filter entry: null test, scalar equality, or an OR-group.
///
/// Lists may nest; each nested list renders its own parenthesized OR-group.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Scalar(Value),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Build an OR-group from anything convertible into filter values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FilterValue>,
    {
        FilterValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => FilterValue::Null,
            other => FilterValue::Scalar(other),
        }
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(items: Vec<T>) -> Self {
        FilterValue::list(items)
    }
}

/// Storage-shaped row: column name to raw value, in column order.
pub type Record = IndexMap<String, Value>;

/// Column (or attribute) name to filter value. Entries are ANDed in order.
pub type Filter = IndexMap<String, FilterValue>;

/// Column name to sort direction, in priority order.
pub type OrderBy = IndexMap<String, Direction>;

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Build a [`Record`] from `column => value` pairs.
///
/// ```ignore
/// let record = microrm::record! { "id" => 1, "name" => "alice" };
/// ```
#[macro_export]
macro_rules! record {
    () => { $crate::Record::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $( record.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        record
    }};
}

/// Build a [`Filter`] from `column => value` pairs.
///
/// ```ignore
/// let filter = microrm::filter! { "status" => "active", "role" => vec![1, 2] };
/// ```
#[macro_export]
macro_rules! filter {
    () => { $crate::Filter::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut filter = $crate::Filter::new();
        $( filter.insert(::std::string::String::from($key), $crate::FilterValue::from($value)); )+
        filter
    }};
}

/// A value could not be converted into an entity field type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    pub expected: &'static str,
    pub found: &'static str,
}

impl ConversionError {
    fn new(expected: &'static str, value: &Value) -> Self {
        Self {
            expected,
            found: value.type_name(),
        }
    }
}

/// Rust field types that can be read into a [`Value`].
///
/// `KIND` is the semantic type an attribute of this field type gets when the
/// mapping config does not declare one.
pub trait IntoValue {
    const KIND: SemanticType;

    fn into_value(self) -> Value;
}

/// Rust field types that can be written from a [`Value`].
///
/// A `Null` writes the zero value of non-optional scalar fields.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

impl IntoValue for i64 {
    const KIND: SemanticType = SemanticType::Integer;

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => Ok(i),
            Value::Null => Ok(0),
            other => Err(ConversionError::new("integer", &other)),
        }
    }
}

impl IntoValue for i32 {
    const KIND: SemanticType = SemanticType::Integer;

    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| ConversionError {
                expected: "32-bit integer",
                found: "out of range integer",
            }),
            Value::Null => Ok(0),
            other => Err(ConversionError::new("integer", &other)),
        }
    }
}

impl IntoValue for f64 {
    const KIND: SemanticType = SemanticType::Float;

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(i) => Ok(i as f64),
            Value::Null => Ok(0.0),
            other => Err(ConversionError::new("float", &other)),
        }
    }
}

impl IntoValue for bool {
    const KIND: SemanticType = SemanticType::Boolean;

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ConversionError::new("boolean", &other)),
        }
    }
}

impl IntoValue for String {
    const KIND: SemanticType = SemanticType::String;

    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(ConversionError::new("string", &other)),
        }
    }
}

impl IntoValue for NaiveDateTime {
    const KIND: SemanticType = SemanticType::Timestamp;

    fn into_value(self) -> Value {
        Value::Timestamp(self)
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            other => Err(ConversionError::new("timestamp", &other)),
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    const KIND: SemanticType = T::KIND;

    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_value_becomes_null_filter() {
        assert_eq!(FilterValue::from(Value::Null), FilterValue::Null);
        assert_eq!(FilterValue::from(Value::from(Option::<i64>::None)), FilterValue::Null);
    }

    #[test]
    fn nested_vec_becomes_nested_list() {
        let f = FilterValue::from(vec![vec![1, 2], vec![3]]);
        assert_eq!(
            f,
            FilterValue::List(vec![
                FilterValue::List(vec![1.into(), 2.into()]),
                FilterValue::List(vec![3.into()]),
            ])
        );
    }

    #[test]
    fn emptiness_follows_unset_identifier_rules() {
        assert!(Value::Null.is_empty());
        assert!(Value::Int(0).is_empty());
        assert!(Value::Text("0".into()).is_empty());
        assert!(!Value::Int(7).is_empty());
        assert!(!Value::Text("a".into()).is_empty());
    }

    #[test]
    fn option_field_round_trip() {
        assert_eq!(Some(3_i64).into_value(), Value::Int(3));
        assert_eq!(Option::<i64>::None.into_value(), Value::Null);
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::Text("x".into())),
            Ok(Some("x".into()))
        );
    }

    #[test]
    fn null_writes_zero_value_for_scalars() {
        assert_eq!(i64::from_value(Value::Null), Ok(0));
        assert_eq!(String::from_value(Value::Null), Ok(String::new()));
        assert!(NaiveDateTime::from_value(Value::Null).is_err());
    }

    #[test]
    fn mismatched_value_is_rejected() {
        let err = i64::from_value(Value::Text("1".into())).unwrap_err();
        assert_eq!(err.to_string(), "expected integer, found string");
        assert!(i32::from_value(Value::Int(i64::MAX)).is_err());
    }

    #[test]
    fn macros_preserve_order() {
        let record = crate::record! { "b" => 1, "a" => "x" };
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a"]);

        let filter = crate::filter! { "z" => Value::Null, "y" => vec![1, 2] };
        assert_eq!(filter["z"], FilterValue::Null);
        assert!(matches!(filter["y"], FilterValue::List(_)));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(2),
            Value::Text("s".into()),
        ])
        .unwrap();
        assert_eq!(json, r#"[null,true,2,"s"]"#);
    }
}
