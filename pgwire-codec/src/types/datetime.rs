//! Postgres date and time epoch arithmetic.
//!
//! Postgres counts `timestamp` in microseconds and `date` in days since 2000-01-01.
use time::{Date, Duration, PrimitiveDateTime, UtcDateTime};

/// Julian day number of 2000-01-01.
pub(crate) const PG_EPOCH_JULIAN_DAY: i32 = 2_451_545;

const PG_EPOCH: PrimitiveDateTime = match Date::from_julian_day(PG_EPOCH_JULIAN_DAY) {
    Ok(date) => date.midnight(),
    Err(_) => panic!("invalid postgres epoch"),
};

pub(crate) fn micros_to_primitive(micros: i64) -> Option<PrimitiveDateTime> {
    PG_EPOCH.checked_add(Duration::microseconds(micros))
}

pub(crate) fn primitive_to_micros(value: PrimitiveDateTime) -> Option<i64> {
    (value - PG_EPOCH).whole_microseconds().try_into().ok()
}

pub(crate) fn micros_to_utc(micros: i64) -> Option<UtcDateTime> {
    micros_to_primitive(micros).map(PrimitiveDateTime::as_utc)
}

pub(crate) fn utc_to_micros(value: UtcDateTime) -> Option<i64> {
    primitive_to_micros(PrimitiveDateTime::new(value.date(), value.time()))
}

pub(crate) fn days_to_date(days: i32) -> Option<Date> {
    Date::from_julian_day(PG_EPOCH_JULIAN_DAY.checked_add(days)?).ok()
}

pub(crate) fn date_to_days(value: Date) -> i32 {
    value.to_julian_day() - PG_EPOCH_JULIAN_DAY
}

#[cfg(test)]
mod test {
    use super::*;
    use time::Month;

    #[test]
    fn epoch() {
        let epoch = micros_to_primitive(0).unwrap();
        assert_eq!(epoch.date(), Date::from_calendar_date(2000, Month::January, 1).unwrap());
        assert_eq!(primitive_to_micros(epoch), Some(0));

        let day = micros_to_utc(86_400_000_000).unwrap();
        assert_eq!(day.day(), 2);
        assert_eq!(utc_to_micros(day), Some(86_400_000_000));

        assert_eq!(days_to_date(-1).unwrap().year(), 1999);
        assert_eq!(date_to_days(days_to_date(366).unwrap()), 366);
        assert_eq!(days_to_date(i32::MAX), None);
    }
}
