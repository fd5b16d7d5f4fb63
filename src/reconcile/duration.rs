//! Human duration strings such as `"1h 30m"` or `"45min"`.

use regex::Regex;
use std::sync::LazyLock;

use crate::{Error, Result};

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr|h))?\s*(?:(\d+(?:\.\d+)?)\s*(?:minutes|minute|mins|min|m))?\s*$",
    )
    .expect("duration regex is valid")
});

/// Parse a duration into hours.
///
/// Either the hour or the minute part may be omitted, not both.
pub fn parse_duration(text: &str) -> Result<f64> {
    let invalid = || Error::InvalidFormat(format!("'{}' is not a duration", text));
    let caps = DURATION_RE.captures(text).ok_or_else(invalid)?;

    let hours = caps.get(1).map(|m| m.as_str());
    let minutes = caps.get(2).map(|m| m.as_str());
    if hours.is_none() && minutes.is_none() {
        return Err(invalid());
    }

    let number = |s: Option<&str>| -> Result<f64> {
        s.map_or(Ok(0.0), |s| s.parse::<f64>().map_err(|_| invalid()))
    };
    Ok(number(hours)? + number(minutes)? / 60.0)
}
