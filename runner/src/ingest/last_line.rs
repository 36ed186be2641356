use super::IngestorError;
use crate::values::Value;

/// Take the first token after the first `": "` on the last line of `output`.
///
/// `"...\nDuration: 12.3 s\n"` yields `"12.3"`. Trailing blank lines are not
/// skipped, the very last line has to carry the value.
pub fn last_line_token(output: &str) -> Result<&str, IngestorError> {
    let line = output.lines().last().ok_or(IngestorError::EmptyOutput)?;

    let value = line
        .split(": ")
        .nth(1)
        .ok_or_else(|| IngestorError::MissingSeparator(line.to_owned()))?;

    value
        .split_whitespace()
        .next()
        .ok_or_else(|| IngestorError::MissingValue(line.to_owned()))
}

/// [last_line_token] read as a float, stored under `field`
pub fn last_line_number(output: &str, field: &'static str) -> Result<Value, IngestorError> {
    let token = last_line_token(output)?;

    token
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|_| IngestorError::InvalidNumber {
            field,
            value: token.to_owned(),
        })
}
