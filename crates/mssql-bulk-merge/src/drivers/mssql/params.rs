//! Parameter binding: [`SqlValue`] as a Tiberius [`ToSql`] parameter.
//!
//! The loader rejects values reported by [`SqlValue::out_of_range`] before
//! binding, so the NULL fallbacks below only apply to direct callers.

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveTime, Timelike};
use tiberius::{ColumnData, ToSql};
use tracing::warn;

use crate::core::value::{SqlNullType, SqlValue};

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null(null_type) => null_column_data(*null_type),
            SqlValue::Bool(b) => ColumnData::Bit(Some(*b)),
            SqlValue::U8(v) => ColumnData::U8(Some(*v)),
            SqlValue::I16(i) => ColumnData::I16(Some(*i)),
            SqlValue::I32(i) => ColumnData::I32(Some(*i)),
            SqlValue::I64(i) => ColumnData::I64(Some(*i)),
            SqlValue::F32(f) => {
                if f.is_nan() || f.is_infinite() {
                    // MSSQL doesn't support NaN/Infinity
                    warn!("Converting F32 NaN/Infinity to NULL for MSSQL compatibility");
                    ColumnData::F32(None)
                } else {
                    ColumnData::F32(Some(*f))
                }
            }
            SqlValue::F64(f) => {
                if f.is_nan() || f.is_infinite() {
                    warn!("Converting F64 NaN/Infinity to NULL for MSSQL compatibility");
                    ColumnData::F64(None)
                } else {
                    ColumnData::F64(Some(*f))
                }
            }
            SqlValue::Text(s) => ColumnData::String(Some(Cow::Borrowed(s.as_ref()))),
            SqlValue::Bytes(b) => ColumnData::Binary(Some(Cow::Borrowed(b.as_ref()))),
            SqlValue::Uuid(u) => ColumnData::Guid(Some(*u)),
            SqlValue::Decimal(d) => ColumnData::Numeric(Some(
                tiberius::numeric::Numeric::new_with_scale(d.mantissa(), d.scale() as u8),
            )),
            SqlValue::DateTime(dt) => match tds_date(dt.date()) {
                Some(date) => ColumnData::DateTime2(Some(tiberius::time::DateTime2::new(
                    date,
                    tds_time(dt.time()),
                ))),
                None => {
                    warn!("DateTime out of valid range ({}), converting to NULL", dt);
                    ColumnData::DateTime2(None)
                }
            },
            SqlValue::DateTimeOffset(dto) => {
                let naive = dto.naive_utc();
                match tds_date(naive.date()) {
                    Some(date) => {
                        let datetime2 =
                            tiberius::time::DateTime2::new(date, tds_time(naive.time()));
                        // Integer division truncates sub-minute offsets
                        let offset_minutes = (dto.offset().local_minus_utc() / 60) as i16;
                        ColumnData::DateTimeOffset(Some(tiberius::time::DateTimeOffset::new(
                            datetime2,
                            offset_minutes,
                        )))
                    }
                    None => {
                        warn!("DateTimeOffset out of valid range ({}), converting to NULL", dto);
                        ColumnData::DateTimeOffset(None)
                    }
                }
            }
            SqlValue::Date(d) => match tds_date(*d) {
                Some(date) => ColumnData::Date(Some(date)),
                None => {
                    warn!("Date out of valid range ({}), converting to NULL", d);
                    ColumnData::Date(None)
                }
            },
            SqlValue::Time(t) => ColumnData::Time(Some(tds_time(*t))),
        }
    }
}

fn null_column_data(null_type: SqlNullType) -> ColumnData<'static> {
    match null_type {
        SqlNullType::Bool => ColumnData::Bit(None),
        SqlNullType::U8 => ColumnData::U8(None),
        SqlNullType::I16 => ColumnData::I16(None),
        SqlNullType::I32 => ColumnData::I32(None),
        SqlNullType::I64 => ColumnData::I64(None),
        SqlNullType::F32 => ColumnData::F32(None),
        SqlNullType::F64 => ColumnData::F64(None),
        SqlNullType::String => ColumnData::String(None),
        SqlNullType::Bytes => ColumnData::Binary(None),
        SqlNullType::Uuid => ColumnData::Guid(None),
        SqlNullType::Decimal => ColumnData::Numeric(None),
        SqlNullType::DateTime => ColumnData::DateTime2(None),
        SqlNullType::DateTimeOffset => ColumnData::DateTimeOffset(None),
        SqlNullType::Date => ColumnData::Date(None),
        SqlNullType::Time => ColumnData::Time(None),
    }
}

/// Days since 0001-01-01, or `None` when the date cannot be represented.
fn tds_date(date: NaiveDate) -> Option<tiberius::time::Date> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?;
    let days = (date - epoch).num_days();
    if days < 0 || days > u32::MAX as i64 {
        return None;
    }
    Some(tiberius::time::Date::new(days as u32))
}

/// Time of day at scale 7 (100 nanosecond increments).
fn tds_time(time: NaiveTime) -> tiberius::time::Time {
    let nanos =
        time.num_seconds_from_midnight() as u64 * 1_000_000_000 + time.nanosecond() as u64;
    tiberius::time::Time::new(nanos / 100, 7)
}
