// src/config/duration.rs

//! Human-friendly durations for `[supervisor].stop_timeout` and
//! `--stop-timeout`.

use std::time::Duration;

/// Seconds per unit for the second-based suffixes.
const UNIT_SECONDS: [(&str, u64); 3] = [("s", 1), ("m", 60), ("h", 60 * 60)];

/// Parse `<digits><unit>` where unit is one of `ms`, `s`, `m` or `h`,
/// e.g. `"10s"` or `"250ms"`. Surrounding whitespace is ignored; anything
/// after the unit is rejected.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit (ms, s, m or h)"))?;
    let (digits, unit) = s.split_at(split);

    if digits.is_empty() {
        return Err(format!("duration '{s}' must start with a number"));
    }
    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid number in duration '{s}': {e}"))?;

    if unit.eq_ignore_ascii_case("ms") {
        return Ok(Duration::from_millis(value));
    }

    let (_, per_unit) = UNIT_SECONDS
        .iter()
        .find(|(name, _)| unit.eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown unit '{unit}' in duration '{s}'; expected ms, s, m or h"))?;

    value
        .checked_mul(*per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration(" 2m "), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("1H"), Ok(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_missing_or_unknown_units() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("s").is_err());
        assert!(parse_duration("5s5").is_err());
        assert!(parse_duration("5 s").is_err());
    }

    #[test]
    fn overflowing_values_are_errors() {
        let err = parse_duration("6000000000000000000h").expect_err("overflow accepted");
        assert!(err.contains("too large"), "got: {err}");
        assert!(parse_duration("400000000000000000m").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
        assert_eq!(
            parse_duration("18446744073709551615ms"),
            Ok(Duration::from_millis(u64::MAX))
        );
    }
}
