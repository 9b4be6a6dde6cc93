//! Conversion of attribute values to and from their stored representation.
//!
//! Scalar conversions are deliberately permissive: a string that is not a
//! number becomes `0`, the leading numeric part of `"12abc"` becomes `12`.
//! Only timestamps are validated, against a single configurable format.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;
use chrono::NaiveDateTime;
use chrono::format::{Item, StrftimeItems};
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Default timestamp format (`Y-m-d H:i:s`).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declared type of an entity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemanticType {
    #[default]
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Text => "text",
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticType {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(SemanticType::String),
            "text" => Ok(SemanticType::Text),
            "integer" | "int" => Ok(SemanticType::Integer),
            "float" | "double" => Ok(SemanticType::Float),
            "boolean" | "bool" => Ok(SemanticType::Boolean),
            "timestamp" | "datetime" => Ok(SemanticType::Timestamp),
            other => Err(OrmError::mapping_config(format!(
                "unknown attribute type '{other}'"
            ))),
        }
    }
}

/// Converts values between entity shape and storage shape.
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    timestamp_format: String,
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl TypeCoercer {
    /// Create a coercer using `timestamp_format` (chrono `strftime` syntax).
    ///
    /// Fails with [`OrmError::MappingConfig`] if the format string is invalid.
    pub fn new(timestamp_format: impl Into<String>) -> OrmResult<Self> {
        let timestamp_format = timestamp_format.into();
        if timestamp_format.is_empty()
            || StrftimeItems::new(&timestamp_format).any(|item| matches!(item, Item::Error))
        {
            return Err(OrmError::mapping_config(format!(
                "invalid timestamp format '{timestamp_format}'"
            )));
        }
        Ok(Self { timestamp_format })
    }

    pub fn timestamp_format(&self) -> &str {
        &self.timestamp_format
    }

    /// Convert an entity value into its raw stored form.
    ///
    /// `Null` passes through untouched whatever the declared type.
    pub fn to_storage(&self, value: Value, ty: SemanticType) -> OrmResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match ty {
            SemanticType::Timestamp => match value {
                Value::Timestamp(ts) => self.format_timestamp(&ts).map(Value::Text),
                Value::Text(s) => {
                    self.parse_timestamp(&s)?;
                    Ok(Value::Text(s))
                }
                other => Err(OrmError::format(format!(
                    "cannot store {} value '{other}' as a timestamp",
                    other.type_name()
                ))),
            },
            _ => self.coerce_scalar(value, ty),
        }
    }

    /// Convert a raw stored value into the entity-side value for `ty`.
    ///
    /// Fails with [`OrmError::Format`] when a timestamp does not match the
    /// configured format.
    pub fn to_entity(&self, raw: Value, ty: SemanticType) -> OrmResult<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        match ty {
            SemanticType::Timestamp => match raw {
                Value::Text(s) => self.parse_timestamp(&s).map(Value::Timestamp),
                Value::Timestamp(ts) => Ok(Value::Timestamp(ts)),
                other => Err(OrmError::format(format!(
                    "cannot read {} value '{other}' as a timestamp",
                    other.type_name()
                ))),
            },
            _ => self.coerce_scalar(raw, ty),
        }
    }

    fn coerce_scalar(&self, value: Value, ty: SemanticType) -> OrmResult<Value> {
        Ok(match ty {
            SemanticType::String | SemanticType::Text => Value::Text(self.to_text(value)?),
            SemanticType::Integer => Value::Int(to_int(&value)),
            SemanticType::Float => Value::Float(to_float(&value)),
            SemanticType::Boolean => Value::Bool(to_bool(&value)),
            SemanticType::Timestamp => value,
        })
    }

    fn to_text(&self, value: Value) -> OrmResult<String> {
        Ok(match value {
            Value::Null => String::new(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Text(s) => s,
            Value::Timestamp(ts) => self.format_timestamp(&ts)?,
        })
    }

    fn format_timestamp(&self, ts: &NaiveDateTime) -> OrmResult<String> {
        let mut out = String::new();
        write!(out, "{}", ts.format(&self.timestamp_format)).map_err(|_| {
            OrmError::format(format!(
                "cannot format timestamp with '{}'",
                self.timestamp_format
            ))
        })?;
        Ok(out)
    }

    fn parse_timestamp(&self, s: &str) -> OrmResult<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s, &self.timestamp_format).map_err(|e| {
            OrmError::format(format!(
                "'{s}' does not match timestamp format '{}': {e}",
                self.timestamp_format
            ))
        })
    }
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Bool(b) => i64::from(*b),
        Value::Int(i) => *i,
        Value::Float(x) => float_to_int(*x),
        Value::Text(s) => {
            let prefix = numeric_prefix(s);
            match prefix.parse::<i64>() {
                Ok(i) => i,
                Err(_) => float_to_int(prefix.parse::<f64>().unwrap_or(0.0)),
            }
        }
        Value::Timestamp(ts) => ts.and_utc().timestamp(),
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        Value::Text(s) => numeric_prefix(s).parse::<f64>().unwrap_or(0.0),
        Value::Timestamp(ts) => ts.and_utc().timestamp() as f64,
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(x) => *x != 0.0,
        Value::Text(s) => !(s.is_empty() || s == "0"),
        Value::Timestamp(_) => true,
    }
}

fn float_to_int(x: f64) -> i64 {
    if x.is_finite() { x.trunc() as i64 } else { 0 }
}

/// Longest leading slice of `s` (after whitespace) that reads as a decimal number.
fn numeric_prefix(s: &str) -> &str {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut has_digits = int_end > end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return "";
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 7)
            .unwrap()
    }

    #[test]
    fn parses_type_names() {
        assert_eq!("datetime".parse::<SemanticType>().unwrap(), SemanticType::Timestamp);
        assert_eq!("INT".parse::<SemanticType>().unwrap(), SemanticType::Integer);
        assert!(matches!(
            "decimal".parse::<SemanticType>(),
            Err(OrmError::MappingConfig(_))
        ));
    }

    #[test]
    fn null_passes_through_every_type() {
        let c = TypeCoercer::default();
        for ty in [
            SemanticType::String,
            SemanticType::Text,
            SemanticType::Integer,
            SemanticType::Float,
            SemanticType::Boolean,
            SemanticType::Timestamp,
        ] {
            assert_eq!(c.to_storage(Value::Null, ty).unwrap(), Value::Null);
            assert_eq!(c.to_entity(Value::Null, ty).unwrap(), Value::Null);
        }
    }

    #[test]
    fn timestamp_uses_configured_format() {
        let c = TypeCoercer::default();
        let raw = c.to_storage(Value::Timestamp(ts()), SemanticType::Timestamp).unwrap();
        assert_eq!(raw, Value::Text("2017-03-09 14:05:07".into()));
        assert_eq!(
            c.to_entity(raw, SemanticType::Timestamp).unwrap(),
            Value::Timestamp(ts())
        );

        let custom = TypeCoercer::new("%d/%m/%Y %H:%M").unwrap();
        let raw = custom
            .to_storage(Value::Timestamp(ts()), SemanticType::Timestamp)
            .unwrap();
        assert_eq!(raw, Value::Text("09/03/2017 14:05".into()));
    }

    #[test]
    fn timestamp_mismatch_is_a_format_error() {
        let c = TypeCoercer::default();
        let err = c
            .to_entity(Value::Text("09/03/2017".into()), SemanticType::Timestamp)
            .unwrap_err();
        assert!(matches!(err, OrmError::Format(_)));

        let err = c.to_storage(Value::Int(3), SemanticType::Timestamp).unwrap_err();
        assert!(matches!(err, OrmError::Format(_)));
    }

    #[test]
    fn invalid_format_is_rejected_up_front() {
        assert!(matches!(
            TypeCoercer::new("%Y-%Q"),
            Err(OrmError::MappingConfig(_))
        ));
        assert!(TypeCoercer::new("").is_err());
    }

    #[test]
    fn text_coercion_is_unconditional() {
        let c = TypeCoercer::default();
        let cases = [
            (Value::Bool(true), "1"),
            (Value::Bool(false), ""),
            (Value::Int(42), "42"),
            (Value::Float(1.5), "1.5"),
            (Value::Float(2.0), "2"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                c.to_storage(input, SemanticType::Text).unwrap(),
                Value::Text(expected.into())
            );
        }
    }

    #[test]
    fn invalid_numeric_strings_coerce_to_zero() {
        let c = TypeCoercer::default();
        assert_eq!(
            c.to_entity(Value::Text("abc".into()), SemanticType::Integer).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            c.to_entity(Value::Text("abc".into()), SemanticType::Float).unwrap(),
            Value::Float(0.0)
        );
    }

    #[test]
    fn numeric_prefix_is_used() {
        let c = TypeCoercer::default();
        assert_eq!(
            c.to_entity(Value::Text(" 12abc".into()), SemanticType::Integer).unwrap(),
            Value::Int(12)
        );
        assert_eq!(
            c.to_entity(Value::Text("1.9".into()), SemanticType::Integer).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            c.to_entity(Value::Text("-2.5e1x".into()), SemanticType::Float).unwrap(),
            Value::Float(-25.0)
        );
        assert_eq!(
            c.to_entity(Value::Float(-3.7), SemanticType::Integer).unwrap(),
            Value::Int(-3)
        );
    }

    #[test]
    fn boolean_coercion() {
        let c = TypeCoercer::default();
        for (input, expected) in [
            (Value::Text("0".into()), false),
            (Value::Text("".into()), false),
            (Value::Text("no".into()), true),
            (Value::Int(0), false),
            (Value::Int(5), true),
            (Value::Float(0.0), false),
        ] {
            assert_eq!(
                c.to_entity(input, SemanticType::Boolean).unwrap(),
                Value::Bool(expected)
            );
        }
    }

    #[test]
    fn numeric_prefix_edges() {
        assert_eq!(numeric_prefix("."), "");
        assert_eq!(numeric_prefix("-"), "");
        assert_eq!(numeric_prefix("5."), "5.");
        assert_eq!(numeric_prefix(".5"), ".5");
        assert_eq!(numeric_prefix("3e"), "3");
        assert_eq!(numeric_prefix("3e+2"), "3e+2");
    }
}
