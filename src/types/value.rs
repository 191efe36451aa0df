//! Primitive values and the lexical literal form produced by the parser.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::PrimitiveKind;

/// A typed primitive value.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Null,
    Boolean(bool),
    Byte(u8),
    SByte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    String(String),
    Guid(Uuid),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeOfDay(NaiveTime),
    Duration(TimeDelta),
    Binary(Vec<u8>),
    /// Enum member by name; flags members are comma-separated.
    Enum { type_name: String, member: String },
}

impl PrimitiveValue {
    /// Returns the primitive kind, or `None` for null and enum values.
    #[must_use]
    pub fn kind(&self) -> Option<PrimitiveKind> {
        let kind = match self {
            PrimitiveValue::Null | PrimitiveValue::Enum { .. } => return None,
            PrimitiveValue::Boolean(_) => PrimitiveKind::Boolean,
            PrimitiveValue::Byte(_) => PrimitiveKind::Byte,
            PrimitiveValue::SByte(_) => PrimitiveKind::SByte,
            PrimitiveValue::Int16(_) => PrimitiveKind::Int16,
            PrimitiveValue::Int32(_) => PrimitiveKind::Int32,
            PrimitiveValue::Int64(_) => PrimitiveKind::Int64,
            PrimitiveValue::Single(_) => PrimitiveKind::Single,
            PrimitiveValue::Double(_) => PrimitiveKind::Double,
            PrimitiveValue::Decimal(_) => PrimitiveKind::Decimal,
            PrimitiveValue::String(_) => PrimitiveKind::String,
            PrimitiveValue::Guid(_) => PrimitiveKind::Guid,
            PrimitiveValue::Date(_) => PrimitiveKind::Date,
            PrimitiveValue::DateTime(_) => PrimitiveKind::DateTime,
            PrimitiveValue::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
            PrimitiveValue::TimeOfDay(_) => PrimitiveKind::TimeOfDay,
            PrimitiveValue::Duration(_) => PrimitiveKind::Duration,
            PrimitiveValue::Binary(_) => PrimitiveKind::Binary,
        };
        Some(kind)
    }

    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, PrimitiveValue::Null)
    }

    /// Attempts to extract a string reference.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrimitiveValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn as_i128(&self) -> Option<i128> {
        match self {
            PrimitiveValue::Byte(v) => Some(i128::from(*v)),
            PrimitiveValue::SByte(v) => Some(i128::from(*v)),
            PrimitiveValue::Int16(v) => Some(i128::from(*v)),
            PrimitiveValue::Int32(v) => Some(i128::from(*v)),
            PrimitiveValue::Int64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            PrimitiveValue::Single(v) => Some(f64::from(*v)),
            PrimitiveValue::Double(v) => Some(*v),
            PrimitiveValue::Decimal(v) => v.to_f64(),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Converts a constant to another primitive kind when the value is
    /// representable there. Used to type literals against the other operand.
    #[must_use]
    pub fn convert_to(&self, target: PrimitiveKind) -> Option<PrimitiveValue> {
        if self.kind() == Some(target) {
            return Some(self.clone());
        }
        if let Some(int) = self.as_i128() {
            return match target {
                PrimitiveKind::Byte => u8::try_from(int).ok().map(PrimitiveValue::Byte),
                PrimitiveKind::SByte => i8::try_from(int).ok().map(PrimitiveValue::SByte),
                PrimitiveKind::Int16 => i16::try_from(int).ok().map(PrimitiveValue::Int16),
                PrimitiveKind::Int32 => i32::try_from(int).ok().map(PrimitiveValue::Int32),
                PrimitiveKind::Int64 => i64::try_from(int).ok().map(PrimitiveValue::Int64),
                PrimitiveKind::Single => Some(PrimitiveValue::Single(int as f32)),
                PrimitiveKind::Double => Some(PrimitiveValue::Double(int as f64)),
                PrimitiveKind::Decimal => i64::try_from(int)
                    .ok()
                    .map(|v| PrimitiveValue::Decimal(Decimal::from(v))),
                _ => None,
            };
        }
        match (self, target) {
            (
                PrimitiveValue::Single(_) | PrimitiveValue::Double(_) | PrimitiveValue::Decimal(_),
                PrimitiveKind::Double,
            ) => self.as_f64().map(PrimitiveValue::Double),
            (
                PrimitiveValue::Single(_) | PrimitiveValue::Double(_) | PrimitiveValue::Decimal(_),
                PrimitiveKind::Single,
            ) => self
                .as_f64()
                .filter(|v| !v.is_finite() || v.abs() <= f64::from(f32::MAX))
                .map(|v| PrimitiveValue::Single(v as f32)),
            (PrimitiveValue::Single(_) | PrimitiveValue::Double(_), PrimitiveKind::Decimal) => self
                .as_f64()
                .and_then(Decimal::from_f64)
                .map(PrimitiveValue::Decimal),
            (PrimitiveValue::DateTime(v), PrimitiveKind::DateTimeOffset) => Some(
                PrimitiveValue::DateTimeOffset(DateTime::<Utc>::from_naive_utc_and_offset(*v, Utc).fixed_offset()),
            ),
            _ => None,
        }
    }
}

/// Lexically classified literal, before conversion to a typed value.
///
/// The parser only decides which primitive kind the text *claims* to be;
/// the binder converts the text and reports invalid content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    /// Unescaped string content.
    String(String),
    /// Raw numeric text, including sign, exponent, and type suffix.
    Number(String),
    /// A literal whose kind follows from its form, e.g. a bare guid or
    /// `duration'P1D'`. `prefix` is the quoted-literal prefix, if any.
    Typed {
        kind: PrimitiveKind,
        text: String,
        prefix: Option<String>,
    },
    /// `Namespace.EnumType'Member'`.
    Enum { type_name: String, member: String },
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Null => f.write_str("null"),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            LiteralValue::Number(text) => f.write_str(text),
            LiteralValue::Typed {
                text,
                prefix: Some(prefix),
                ..
            } => write!(f, "{prefix}'{}'", text.replace('\'', "''")),
            LiteralValue::Typed { text, .. } => f.write_str(text),
            LiteralValue::Enum { type_name, member } => {
                write!(f, "{type_name}'{}'", member.replace('\'', "''"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_values() {
        assert_eq!(PrimitiveValue::Int32(1).kind(), Some(PrimitiveKind::Int32));
        assert_eq!(PrimitiveValue::Null.kind(), None);
        assert_eq!(
            PrimitiveValue::Enum {
                type_name: "NS.Color".into(),
                member: "Red".into()
            }
            .kind(),
            None
        );
    }

    #[test]
    fn test_integer_constant_conversion() {
        let ten = PrimitiveValue::Int32(10);
        assert_eq!(
            ten.convert_to(PrimitiveKind::Decimal),
            Some(PrimitiveValue::Decimal(Decimal::from(10)))
        );
        assert_eq!(ten.convert_to(PrimitiveKind::Byte), Some(PrimitiveValue::Byte(10)));
        assert_eq!(PrimitiveValue::Int32(300).convert_to(PrimitiveKind::Byte), None);
        assert_eq!(ten.convert_to(PrimitiveKind::String), None);
    }

    #[test]
    fn test_decimal_constant_converts_to_double() {
        let value = PrimitiveValue::Decimal(Decimal::new(55, 1));
        assert_eq!(
            value.convert_to(PrimitiveKind::Double),
            Some(PrimitiveValue::Double(5.5))
        );
        assert_eq!(value.convert_to(PrimitiveKind::Int32), None);
    }
}
