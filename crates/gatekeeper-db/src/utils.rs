//! Shared utility functions

use chrono::{DateTime, NaiveDate, Utc};

/// Storage format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a datetime string (RFC3339 format) or return current time
///
/// This helper is used throughout the database layer to handle datetime parsing
/// with a fallback to the current time if parsing fails.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a nullable RFC3339 column; unparsable values read as absent
pub fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

/// Parse a stored calendar date
pub fn parse_date(s: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_or_now() {
        let valid_time = "2024-01-01T12:00:00Z";
        let parsed = parse_datetime_or_now(valid_time);
        assert_eq!(parsed.to_rfc3339(), "2024-01-01T12:00:00+00:00");

        // Invalid time should return current time (just check it doesn't panic)
        let invalid_time = "invalid";
        let now_before = Utc::now();
        let parsed = parse_datetime_or_now(invalid_time);
        let now_after = Utc::now();
        assert!(parsed >= now_before && parsed <= now_after);
    }

    #[test]
    fn test_parse_optional_datetime() {
        assert!(parse_optional_datetime(None).is_none());
        assert!(parse_optional_datetime(Some("garbage".to_string())).is_none());

        let parsed = parse_optional_datetime(Some("2025-03-04T05:06:07Z".to_string())).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-04T05:06:07+00:00");
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("1990-04-12").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(1990, 4, 12).unwrap());
        assert_eq!(date.format(DATE_FORMAT).to_string(), "1990-04-12");
        assert!(parse_date("12/04/1990").is_err());
    }
}
