use std::str::FromStr;

use crate::error::FieldConversionError;

/// Collapses runs of whitespace (including non-breaking spaces) into single
/// spaces and trims both ends.
pub fn clean_text(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a required cell. Blank or malformed text is an error.
pub fn parse_field<T>(field: &str, raw: &str) -> Result<T, FieldConversionError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text = clean_text(raw);
    if text.is_empty() {
        return Err(FieldConversionError {
            field: field.to_string(),
            raw: raw.to_string(),
            message: "empty value".to_string(),
        });
    }
    text.parse::<T>().map_err(|e| FieldConversionError {
        field: field.to_string(),
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

/// Parses an optional cell: blank maps to `None`, malformed text is still an error.
pub fn parse_optional_field<T>(field: &str, raw: &str) -> Result<Option<T>, FieldConversionError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if clean_text(raw).is_empty() {
        return Ok(None);
    }
    parse_field(field, raw).map(Some)
}

/// Parses a signed cell such as a plus/minus ("+7", "-3", "0").
pub fn parse_signed_field(field: &str, raw: &str) -> Result<Option<i32>, FieldConversionError> {
    let text = clean_text(raw);
    parse_optional_field(field, text.strip_prefix('+').unwrap_or(&text))
}

/// Parses a game clock value ("34:12" or "240") into seconds.
pub fn parse_clock_seconds(field: &str, raw: &str) -> Result<u32, FieldConversionError> {
    let text = clean_text(raw);
    let err = |message: &str| FieldConversionError {
        field: field.to_string(),
        raw: raw.to_string(),
        message: message.to_string(),
    };
    match text.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u32 = parse_field(field, minutes)?;
            let seconds: u32 = parse_field(field, seconds)?;
            if seconds >= 60 {
                return Err(err("seconds out of range"));
            }
            minutes
                .checked_mul(60)
                .and_then(|total| total.checked_add(seconds))
                .ok_or_else(|| err("value out of range"))
        }
        None => parse_field::<u32>(field, &text)?
            .checked_mul(60)
            .ok_or_else(|| err("value out of range")),
    }
}
