//! Common validation utilities.

use chrono::NaiveDate;
use validator::ValidationError;

/// Maximum length of an export request id (a hex SHA-256 digest).
pub const MAX_REQUEST_ID_LENGTH: usize = 64;

/// Date formats accepted by the export date filter.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y"];

/// Validates that a request id is a lowercase hex token of sane length.
pub fn validate_request_id(request_id: &str) -> Result<(), ValidationError> {
    if request_id.is_empty() || request_id.len() > MAX_REQUEST_ID_LENGTH {
        let mut err = ValidationError::new("request_id_length");
        err.message = Some("Request ID must be between 1 and 64 characters".into());
        return Err(err);
    }

    if !request_id
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        let mut err = ValidationError::new("request_id_format");
        err.message = Some("Request ID must be a lowercase hex string".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a CSV separator is exactly one ASCII character.
pub fn validate_csv_separator(separator: &str) -> Result<(), ValidationError> {
    let mut chars = separator.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => Ok(()),
        _ => {
            let mut err = ValidationError::new("csv_separator");
            err.message = Some("CSV separator must be a single ASCII character".into());
            Err(err)
        }
    }
}

/// Parses a user supplied calendar date.
///
/// Accepts ISO dates as well as the `m/d/Y`, `d.m.Y` and `F d, Y` forms the
/// date picker emits. Returns `None` for anything else.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_request_id() {
        assert!(validate_request_id("9f86d081884c7d659a2feaa0c55ad015").is_ok());
        assert!(validate_request_id(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_request_id_rejects_bad_input() {
        assert!(validate_request_id("").is_err());
        assert!(validate_request_id(&"a".repeat(65)).is_err());
        assert!(validate_request_id("../../etc").is_err());
        assert!(validate_request_id("ABCDEF").is_err());
    }

    #[test]
    fn test_validate_request_id_error_message() {
        let err = validate_request_id("xyz").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Request ID must be a lowercase hex string"
        );
    }

    #[test]
    fn test_validate_csv_separator() {
        assert!(validate_csv_separator(",").is_ok());
        assert!(validate_csv_separator(";").is_ok());
        assert!(validate_csv_separator("\t").is_ok());
        assert!(validate_csv_separator("").is_err());
        assert!(validate_csv_separator(",,").is_err());
        assert!(validate_csv_separator("\"").is_err());
        assert!(validate_csv_separator("é").is_err());
    }

    #[test]
    fn test_parse_calendar_date() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(parse_calendar_date("2024-05-01"), Some(expected));
        assert_eq!(parse_calendar_date("05/01/2024"), Some(expected));
        assert_eq!(parse_calendar_date("01.05.2024"), Some(expected));
        assert_eq!(parse_calendar_date("May 1, 2024"), Some(expected));
        assert_eq!(parse_calendar_date(" 2024-05-01 "), Some(expected));
    }

    #[test]
    fn test_parse_calendar_date_invalid() {
        assert_eq!(parse_calendar_date(""), None);
        assert_eq!(parse_calendar_date("yesterday"), None);
        assert_eq!(parse_calendar_date("2024-13-40"), None);
    }
}
