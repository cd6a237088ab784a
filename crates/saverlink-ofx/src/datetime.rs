//! OFX date-time values.
//!
//! OFX encodes timestamps as `YYYYMMDD[HHMM[SS[.XXX]]][[offset[:TZ]]]`,
//! e.g. `20200315120000.000[-5:EST]`. Values without an offset are GMT.
//!
//! The offset is kept: the calendar date a bank reports is the date in its
//! own zone, which can differ from the UTC date.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::{Error, Result};

/// Parses an OFX date-time, keeping its offset.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] if the value is malformed or out of range.
pub fn parse_datetime(value: &str) -> Result<DateTime<FixedOffset>> {
    let invalid = || Error::InvalidDate(value.to_string());
    let value = value.trim();

    let (stamp, zone) = match value.split_once('[') {
        Some((stamp, zone)) => (stamp, Some(zone.trim_end_matches(']'))),
        None => (value, None),
    };
    let digits = stamp.split('.').next().unwrap_or(stamp);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let field = |range: std::ops::Range<usize>| -> Result<u32> {
        digits
            .get(range)
            .and_then(|s| s.parse().ok())
            .ok_or_else(invalid)
    };

    let date = match digits.len() {
        8 | 12 | 14 => {
            let year = i32::try_from(field(0..4)?).map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, field(4..6)?, field(6..8)?).ok_or_else(invalid)?
        }
        _ => return Err(invalid()),
    };
    let time = match digits.len() {
        8 => NaiveTime::MIN,
        12 => NaiveTime::from_hms_opt(field(8..10)?, field(10..12)?, 0).ok_or_else(invalid)?,
        _ => NaiveTime::from_hms_opt(field(8..10)?, field(10..12)?, field(12..14)?)
            .ok_or_else(invalid)?,
    };
    let local = NaiveDateTime::new(date, time);

    let offset = match zone {
        Some(zone) => parse_offset(zone).ok_or_else(invalid)?,
        None => FixedOffset::east_opt(0).ok_or_else(invalid)?,
    };
    offset.from_local_datetime(&local).single().ok_or_else(invalid)
}

/// Parses the bracketed zone part: `-5:EST`, `+5.30:IST`, `0:GMT`, `-8`.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let offset = zone.split(':').next()?.trim();
    let (negative, magnitude) = match offset.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, offset.strip_prefix('+').unwrap_or(offset)),
    };
    let (hours, minutes) = match magnitude.split_once('.') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (magnitude.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes >= 60 {
        return None;
    }
    let seconds = hours * 3600 + minutes * 60;
    FixedOffset::east_opt(if negative { -seconds } else { seconds })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn utc(dt: DateTime<FixedOffset>) -> String {
        dt.with_timezone(&Utc).to_rfc3339()
    }

    #[test]
    fn test_date_only() {
        let dt = parse_datetime("20200315").unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-03-15T00:00:00+00:00");
        assert_eq!(dt.timestamp(), 1584230400);
    }

    #[test]
    fn test_full_with_offset() {
        let dt = parse_datetime("20200315120000.000[-5:EST]").unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-03-15T12:00:00-05:00");
        assert_eq!(utc(dt), "2020-03-15T17:00:00+00:00");
    }

    #[test]
    fn test_evening_keeps_local_date() {
        let dt = parse_datetime("20200315200000[-5:EST]").unwrap();
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2020, 3, 15).unwrap());
        assert_eq!(utc(dt), "2020-03-16T01:00:00+00:00");
    }

    #[test]
    fn test_fractional_offset() {
        let dt = parse_datetime("20200315120000[+5.30:IST]").unwrap();
        assert_eq!(utc(dt), "2020-03-15T06:30:00+00:00");
    }

    #[test]
    fn test_hour_minute_only() {
        let dt = parse_datetime("202003151230").unwrap();
        assert_eq!(dt.to_rfc3339(), "2020-03-15T12:30:00+00:00");
    }

    #[test]
    fn test_invalid_values() {
        for value in ["", "2020", "2020031", "20201340", "2020AB15", "20200315[bogus]"] {
            assert!(
                matches!(parse_datetime(value), Err(Error::InvalidDate(_))),
                "{value} should be rejected"
            );
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_date_only_round_trips(y in 1970i32..2100, m in 1u32..=12, d in 1u32..=28) {
            let value = format!("{y:04}{m:02}{d:02}");
            let dt = parse_datetime(&value).unwrap();
            proptest::prop_assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(y, m, d).unwrap());
        }
    }
}
