//! Date parsing and derived metrics for the partition stage

use chrono::{Datelike, NaiveDate};
use clinic_common::{EtlError, Result};

/// Date of birth: day, month, four-digit year, no separators ("15031990")
pub const DOB_FORMAT: &str = "%d%m%Y";

/// Consultation date: four-digit year, month, day, no separators ("20240115")
pub const CONSULT_DATE_FORMAT: &str = "%Y%m%d";

/// Both formats are exactly eight digits
const DATE_WIDTH: usize = 8;

/// Parse a fixed-format date field; a missing value is a parse failure too
///
/// chrono accepts short years for `%Y` ("150390" would become year 90), so the
/// width is checked before parsing.
pub fn parse_field(field: &str, value: Option<&str>, format: &str) -> Result<NaiveDate> {
    let raw = value.unwrap_or_default();
    let parse_err = || EtlError::DateParse {
        field: field.to_string(),
        value: raw.to_string(),
    };

    if raw.len() != DATE_WIDTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_err());
    }
    NaiveDate::parse_from_str(raw, format).map_err(|_| parse_err())
}

pub fn parse_dob(value: Option<&str>) -> Result<NaiveDate> {
    parse_field("DOB", value, DOB_FORMAT)
}

pub fn parse_consult_date(value: Option<&str>) -> Result<NaiveDate> {
    parse_field("Consul_Dt", value, CONSULT_DATE_FORMAT)
}

/// Whole years between `dob` and `today`, one less if this year's birthday is still ahead
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let birthday_pending = (today.month(), today.day()) < (dob.month(), dob.day());
    today.year() - dob.year() - i32::from(birthday_pending)
}

/// `today - date` in whole days; negative for dates in the future
pub fn days_since(date: NaiveDate, today: NaiveDate) -> i64 {
    (today - date).num_days()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_dob() {
        assert_eq!(parse_dob(Some("15031990")).unwrap(), ymd(1990, 3, 15));
    }

    #[test]
    fn test_parse_consult_date() {
        assert_eq!(parse_consult_date(Some("20240115")).unwrap(), ymd(2024, 1, 15));
    }

    #[test]
    fn test_parse_rejects_malformed_and_missing() {
        assert!(parse_dob(Some("1990-03-15")).is_err());
        assert!(parse_dob(Some("31131990")).is_err());
        assert!(parse_consult_date(Some("202401")).is_err());
        assert!(parse_consult_date(Some("")).is_err());

        match parse_consult_date(None) {
            Err(EtlError::DateParse { field, value }) => {
                assert_eq!(field, "Consul_Dt");
                assert_eq!(value, "");
            },
            other => panic!("expected DateParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_short_years() {
        assert!(parse_dob(Some("150390")).is_err());
        assert!(parse_dob(Some("1503199")).is_err());
        assert!(parse_dob(Some("150319900")).is_err());
        assert!(parse_consult_date(Some("240115")).is_err());
        assert!(parse_consult_date(Some(" 2024011")).is_err());
    }

    #[test]
    fn test_age_around_birthday() {
        let today = ymd(2024, 6, 15);
        assert_eq!(age_on(parse_dob(Some("15061990")).unwrap(), today), 34);
        assert_eq!(age_on(parse_dob(Some("16061990")).unwrap(), today), 33);
        assert_eq!(age_on(parse_dob(Some("14061990")).unwrap(), today), 34);
    }

    #[test]
    fn test_age_leap_day_birthday() {
        let dob = ymd(2000, 2, 29);
        assert_eq!(age_on(dob, ymd(2023, 2, 28)), 22);
        assert_eq!(age_on(dob, ymd(2023, 3, 1)), 23);
    }

    #[test]
    fn test_days_since() {
        let today = ymd(2024, 6, 15);
        assert_eq!(days_since(ymd(2024, 5, 16), today), 30);
        assert_eq!(days_since(ymd(2024, 5, 15), today), 31);
        assert_eq!(days_since(ymd(2024, 6, 20), today), -5);
    }
}
