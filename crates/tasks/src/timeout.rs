//! Parses a timeout string of the form `NNs|NNm|NNh|NNd` into a [`chrono::Duration`].

use chrono::Duration;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TimeoutParseError {
    #[error("empty timeout string")]
    Empty,
    #[error("timeout must end in s, m, h, or d")]
    UnknownUnit,
    #[error("timeout magnitude is not a valid number")]
    InvalidMagnitude,
}

/// Parse `"30s"`, `"15m"`, `"2h"`, `"1d"` into a duration.
pub fn parse_timeout(s: &str) -> Result<Duration, TimeoutParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TimeoutParseError::Empty);
    }
    let (magnitude, unit) = s.split_at(s.len() - 1);
    let magnitude: i64 = magnitude.parse().map_err(|_| TimeoutParseError::InvalidMagnitude)?;
    match unit {
        "s" => Ok(Duration::seconds(magnitude)),
        "m" => Ok(Duration::minutes(magnitude)),
        "h" => Ok(Duration::hours(magnitude)),
        "d" => Ok(Duration::days(magnitude)),
        _ => Err(TimeoutParseError::UnknownUnit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_timeout("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_timeout("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_timeout("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_timeout("1d").unwrap(), Duration::days(1));
    }

    #[test]
    fn rejects_empty_and_unknown_unit() {
        assert_eq!(parse_timeout(""), Err(TimeoutParseError::Empty));
        assert_eq!(parse_timeout("30x"), Err(TimeoutParseError::UnknownUnit));
    }

    #[test]
    fn rejects_non_numeric_magnitude() {
        assert_eq!(parse_timeout("abcs"), Err(TimeoutParseError::InvalidMagnitude));
    }
}
