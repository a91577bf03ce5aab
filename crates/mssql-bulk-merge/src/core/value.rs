//! SQL values extracted from records for parameter binding.
//!
//! Column accessors return a [`SqlValue`] that borrows from the record
//! wherever it can, so binding a row does not copy its strings or bytes.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Type hint for NULL values so the driver can send a typed NULL parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// A single column value of a record.
///
/// The `'a` lifetime lets text and binary values borrow from the record the
/// accessor was called on.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Boolean value (bit).
    Bool(bool),

    /// Unsigned 8-bit integer (tinyint).
    U8(u8),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (float).
    F64(f64),

    /// Text data, borrowed from the record when possible.
    Text(Cow<'a, str>),

    /// Binary data, borrowed from the record when possible.
    Bytes(Cow<'a, [u8]>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::U8(v) => SqlValue::U8(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Create a text value from a borrowed string slice.
    #[must_use]
    pub fn text(s: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(s))
    }

    /// Create a bytes value from a borrowed byte slice.
    #[must_use]
    pub fn bytes(b: &'a [u8]) -> Self {
        SqlValue::Bytes(Cow::Borrowed(b))
    }

    /// Describe why SQL Server cannot store this value, if it cannot.
    ///
    /// Floats must be finite and dates must fall within 0001-01-01 to
    /// 9999-12-31. Such values are rejected rather than bound as NULL.
    pub fn out_of_range(&self) -> Option<String> {
        match self {
            SqlValue::F32(f) if !f.is_finite() => Some(format!("float value {} is not finite", f)),
            SqlValue::F64(f) if !f.is_finite() => Some(format!("float value {} is not finite", f)),
            SqlValue::Date(d) => date_out_of_range(*d),
            SqlValue::DateTime(dt) => date_out_of_range(dt.date()),
            SqlValue::DateTimeOffset(dto) => date_out_of_range(dto.naive_utc().date()),
            _ => None,
        }
    }
}

fn date_out_of_range(date: NaiveDate) -> Option<String> {
    let min = NaiveDate::from_ymd_opt(1, 1, 1)?;
    let max = NaiveDate::from_ymd_opt(9999, 12, 31)?;
    if date < min || date > max {
        Some(format!("date {} is outside 0001-01-01..9999-12-31", date))
    } else {
        None
    }
}

/// Types that know which typed NULL represents their absence.
///
/// Used by the `From<Option<T>>` conversion so `None` binds as a NULL of the
/// right SQL type.
pub trait NullHint {
    const NULL_TYPE: SqlNullType;
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident, $null:ident;)*) => {
        $(
            impl From<$ty> for SqlValue<'_> {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(v)
                }
            }

            impl NullHint for $ty {
                const NULL_TYPE: SqlNullType = SqlNullType::$null;
            }
        )*
    };
}

sql_value_from! {
    bool => Bool, Bool;
    u8 => U8, U8;
    i16 => I16, I16;
    i32 => I32, I32;
    i64 => I64, I64;
    f32 => F32, F32;
    f64 => F64, F64;
    Uuid => Uuid, Uuid;
    Decimal => Decimal, Decimal;
    NaiveDateTime => DateTime, DateTime;
    DateTime<FixedOffset> => DateTimeOffset, DateTimeOffset;
    NaiveDate => Date, Date;
    NaiveTime => Time, Time;
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl NullHint for String {
    const NULL_TYPE: SqlNullType = SqlNullType::String;
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl NullHint for &str {
    const NULL_TYPE: SqlNullType = SqlNullType::String;
}

impl<'a> From<&'a String> for SqlValue<'a> {
    fn from(v: &'a String) -> Self {
        SqlValue::Text(Cow::Borrowed(v.as_str()))
    }
}

impl NullHint for &String {
    const NULL_TYPE: SqlNullType = SqlNullType::String;
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

impl NullHint for Vec<u8> {
    const NULL_TYPE: SqlNullType = SqlNullType::Bytes;
}

impl<'a> From<&'a [u8]> for SqlValue<'a> {
    fn from(v: &'a [u8]) -> Self {
        SqlValue::Bytes(Cow::Borrowed(v))
    }
}

impl NullHint for &[u8] {
    const NULL_TYPE: SqlNullType = SqlNullType::Bytes;
}

impl<'a, T> From<Option<T>> for SqlValue<'a>
where
    T: Into<SqlValue<'a>> + NullHint,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null(T::NULL_TYPE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_into_owned() {
        let source = String::from("hello");
        let borrowed = SqlValue::text(&source);
        let owned: SqlValue<'static> = borrowed.into_owned();
        assert_eq!(owned, SqlValue::Text(Cow::Owned("hello".to_string())));
    }

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null(SqlNullType::String).is_null());
        assert!(!SqlValue::I32(42).is_null());
    }

    #[test]
    fn test_option_conversion_keeps_null_type() {
        let none: Option<i64> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null(SqlNullType::I64));

        let missing: Option<&str> = None;
        assert_eq!(SqlValue::from(missing), SqlValue::Null(SqlNullType::String));

        let present = Some("abc");
        assert_eq!(SqlValue::from(present), SqlValue::text("abc"));
    }

    #[test]
    fn test_borrowed_text_does_not_allocate() {
        let name = String::from("widget");
        match SqlValue::from(&name) {
            SqlValue::Text(Cow::Borrowed(s)) => assert_eq!(s, "widget"),
            other => panic!("expected borrowed text, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_values() {
        assert!(SqlValue::F64(f64::NAN).out_of_range().is_some());
        assert!(SqlValue::F64(f64::NEG_INFINITY).out_of_range().is_some());
        assert!(SqlValue::F32(f32::INFINITY).out_of_range().is_some());
        assert!(SqlValue::F64(-1.5e300).out_of_range().is_none());

        let ancient = NaiveDate::from_ymd_opt(-5, 6, 1).unwrap();
        let reason = SqlValue::Date(ancient).out_of_range().unwrap();
        assert!(reason.contains("outside"));
        assert!(SqlValue::DateTime(ancient.and_hms_opt(0, 0, 0).unwrap())
            .out_of_range()
            .is_some());

        let far = NaiveDate::from_ymd_opt(10_000, 1, 1).unwrap();
        assert!(SqlValue::Date(far).out_of_range().is_some());

        let first = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        assert!(SqlValue::Date(first).out_of_range().is_none());
        assert!(SqlValue::Null(SqlNullType::F64).out_of_range().is_none());
        assert!(SqlValue::text("x").out_of_range().is_none());
    }

    #[test]
    fn test_from_implementations() {
        let v: SqlValue<'static> = 42i32.into();
        assert_eq!(v, SqlValue::I32(42));

        let v: SqlValue<'static> = "hello".to_string().into();
        assert_eq!(v, SqlValue::Text(Cow::Owned("hello".to_string())));

        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(SqlValue::from(d), SqlValue::Date(d));
    }
}
