use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcDateTime, UtcOffset};

use super::{FixedConverter, impl_fixed};
use crate::{
    Result,
    error::{DecodeError, OutOfRangeError},
    io::{PgReader, PgWriter},
    types::datetime,
};

fn infinity_disabled(what: &str) -> OutOfRangeError {
    OutOfRangeError::new(format!("{what} infinity requires infinity conversions"))
}

fn out_of_range(what: &str) -> DecodeError {
    DecodeError::Invalid(format!("{what} is outside of the supported range").into())
}

/// Map wire timestamp into a value, `infinity` maps onto the value bounds if enabled.
fn read_micros<T>(
    micros: i64,
    infinity: bool,
    min: T,
    max: T,
    what: &str,
    convert: impl FnOnce(i64) -> Option<T>,
) -> Result<T> {
    match micros {
        i64::MAX if infinity => Ok(max),
        i64::MIN if infinity => Ok(min),
        i64::MAX | i64::MIN => Err(infinity_disabled(what).into()),
        micros => Ok(convert(micros).ok_or_else(|| out_of_range(what))?),
    }
}

/// `timestamp` as [`PrimitiveDateTime`].
///
/// With `infinity_conversions`, `infinity` and `-infinity` map onto
/// [`PrimitiveDateTime::MAX`] and [`PrimitiveDateTime::MIN`], in both directions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampConverter {
    pub infinity_conversions: bool,
}

impl FixedConverter for TimestampConverter {
    type Value = PrimitiveDateTime;

    const SIZE: usize = 8;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<PrimitiveDateTime> {
        read_micros(
            reader.read_i64(),
            self.infinity_conversions,
            PrimitiveDateTime::MIN,
            PrimitiveDateTime::MAX,
            "timestamp",
            datetime::micros_to_primitive,
        )
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &PrimitiveDateTime) -> Result<()> {
        let micros = match *value {
            value if self.infinity_conversions && value == PrimitiveDateTime::MAX => i64::MAX,
            value if self.infinity_conversions && value == PrimitiveDateTime::MIN => i64::MIN,
            value => datetime::primitive_to_micros(value)
                .ok_or_else(|| OutOfRangeError::new(format!("timestamp {value}")))?,
        };
        writer.write_i64(micros);
        Ok(())
    }
}

/// `timestamptz` as [`UtcDateTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampTzConverter {
    pub infinity_conversions: bool,
}

impl FixedConverter for TimestampTzConverter {
    type Value = UtcDateTime;

    const SIZE: usize = 8;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<UtcDateTime> {
        read_micros(
            reader.read_i64(),
            self.infinity_conversions,
            PrimitiveDateTime::MIN.as_utc(),
            PrimitiveDateTime::MAX.as_utc(),
            "timestamptz",
            datetime::micros_to_utc,
        )
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &UtcDateTime) -> Result<()> {
        writer.write_i64(write_utc(*value, self.infinity_conversions)?);
        Ok(())
    }
}

fn write_utc(value: UtcDateTime, infinity: bool) -> Result<i64, OutOfRangeError> {
    if infinity && value == PrimitiveDateTime::MAX.as_utc() {
        return Ok(i64::MAX);
    }
    if infinity && value == PrimitiveDateTime::MIN.as_utc() {
        return Ok(i64::MIN);
    }
    datetime::utc_to_micros(value).ok_or_else(|| OutOfRangeError::new(format!("timestamptz {value}")))
}

/// `timestamptz` as [`OffsetDateTime`], always read in UTC.
///
/// Values of any offset are converted to UTC before writing.
#[derive(Debug, Clone, Copy, Default)]
pub struct OffsetDateTimeConverter {
    pub infinity_conversions: bool,
}

impl FixedConverter for OffsetDateTimeConverter {
    type Value = OffsetDateTime;

    const SIZE: usize = 8;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<OffsetDateTime> {
        read_micros(
            reader.read_i64(),
            self.infinity_conversions,
            PrimitiveDateTime::MIN.assume_utc(),
            PrimitiveDateTime::MAX.assume_utc(),
            "timestamptz",
            |micros| datetime::micros_to_primitive(micros).map(PrimitiveDateTime::assume_utc),
        )
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &OffsetDateTime) -> Result<()> {
        let utc = value
            .checked_to_offset(UtcOffset::UTC)
            .ok_or_else(|| OutOfRangeError::new(format!("timestamptz {value}")))?;
        let utc = PrimitiveDateTime::new(utc.date(), utc.time()).as_utc();
        writer.write_i64(write_utc(utc, self.infinity_conversions)?);
        Ok(())
    }
}

/// `date` as [`Date`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DateConverter {
    pub infinity_conversions: bool,
}

impl FixedConverter for DateConverter {
    type Value = Date;

    const SIZE: usize = 4;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Date> {
        match reader.read_i32() {
            i32::MAX if self.infinity_conversions => Ok(Date::MAX),
            i32::MIN if self.infinity_conversions => Ok(Date::MIN),
            i32::MAX | i32::MIN => Err(infinity_disabled("date").into()),
            days => Ok(datetime::days_to_date(days).ok_or_else(|| out_of_range("date"))?),
        }
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Date) -> Result<()> {
        let days = match *value {
            value if self.infinity_conversions && value == Date::MAX => i32::MAX,
            value if self.infinity_conversions && value == Date::MIN => i32::MIN,
            value => datetime::date_to_days(value),
        };
        writer.write_i32(days);
        Ok(())
    }
}

impl_fixed!(TimestampConverter, TimestampTzConverter, OffsetDateTimeConverter, DateConverter);
