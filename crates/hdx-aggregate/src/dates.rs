//! Date extraction for freshness comparison.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use hdx_model::{CellValue, HdxError};

use crate::schema::DateKind;

/// Formats tried, in order, when no explicit format is configured.
const CALENDAR_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parses a date cell.
///
/// `Ok(None)` means the cell is blank. Anything present that cannot be read as
/// a date is a data format error.
pub fn parse_date(
    value: &CellValue,
    kind: DateKind,
    format: Option<&str>,
    column: &str,
) -> Result<Option<NaiveDateTime>, HdxError> {
    if value.is_null() {
        return Ok(None);
    }
    let invalid = |message: &str| HdxError::data_format(column, value.to_text(), message);

    match kind {
        DateKind::CalendarDate => match value {
            CellValue::Date(date) => Ok(Some(date.and_time(NaiveTime::MIN))),
            CellValue::Text(text) => parse_calendar_text(text.trim(), format)
                .map(Some)
                .ok_or_else(|| invalid("not a recognised calendar date")),
            _ => Err(invalid("expected a calendar date")),
        },
        DateKind::IntegerEpoch => {
            let seconds = match value {
                CellValue::Int(seconds) => Some(*seconds),
                CellValue::Float(seconds) if seconds.fract() == 0.0 => Some(*seconds as i64),
                CellValue::Text(text) => text.trim().parse::<i64>().ok(),
                _ => None,
            }
            .ok_or_else(|| invalid("expected integer seconds since the epoch"))?;
            DateTime::from_timestamp(seconds, 0)
                .map(|dt| Some(dt.naive_utc()))
                .ok_or_else(|| invalid("epoch seconds out of range"))
        }
    }
}

fn parse_calendar_text(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(format) = format {
        return NaiveDateTime::parse_from_str(text, format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, format)
                    .ok()
                    .map(|d| d.and_time(NaiveTime::MIN))
            });
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            CALENDAR_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn calendar_dates_in_common_layouts() {
        let parse = |v: &str| parse_date(&CellValue::from(v), DateKind::CalendarDate, None, "date");
        assert_eq!(parse("2020-02-01").expect("iso"), Some(day(2020, 2, 1)));
        assert_eq!(parse("01/02/2020").expect("dmy"), Some(day(2020, 2, 1)));
        assert_eq!(parse(" ").expect("blank"), None);
        assert!(
            parse("2020-02-01T10:30:00")
                .expect("datetime")
                .is_some_and(|dt| dt.date() == day(2020, 2, 1).date())
        );
    }

    #[test]
    fn explicit_format_is_honoured() {
        let value = CellValue::from("Feb 01 2020");
        let parsed = parse_date(&value, DateKind::CalendarDate, Some("%b %d %Y"), "date")
            .expect("custom format");
        assert_eq!(parsed, Some(day(2020, 2, 1)));
    }

    #[test]
    fn epoch_seconds() {
        let parsed = parse_date(&CellValue::Int(1_580_515_200), DateKind::IntegerEpoch, None, "ts")
            .expect("epoch");
        assert_eq!(parsed, Some(day(2020, 2, 1)));
    }

    #[test]
    fn malformed_dates_are_data_format_errors() {
        let err = parse_date(&CellValue::from("soon"), DateKind::CalendarDate, None, "date")
            .unwrap_err();
        assert!(err.is_data_format());
        let err = parse_date(&CellValue::from("1.5e3"), DateKind::IntegerEpoch, None, "ts")
            .unwrap_err();
        assert!(err.is_data_format());
    }
}
