use chrono::{DateTime, SecondsFormat, Utc};

use crate::validation::{sanitize, ValidationError, ValidationErrorKind};

/// Parse an RFC3339 timestamp supplied at the boundary and normalise it to UTC.
///
/// Inputs without an offset are rejected rather than guessed.
pub fn parse_rfc3339(input: &str, field: &str) -> Result<DateTime<Utc>, ValidationError> {
    let input = sanitize(input);
    if input.is_empty() {
        return Err(ValidationErrorKind::InvalidTimestamp.at(field, "is required"));
    }

    DateTime::parse_from_rfc3339(&input)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| {
            ValidationErrorKind::InvalidTimestamp.at(field, "must be a valid RFC3339 timestamp")
        })
}

/// RFC3339 with a `Z` suffix, the format used on the wire.
pub fn format_rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
