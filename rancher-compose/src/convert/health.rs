//! Health check and duration conversion.

use bollard::models::HealthConfig;

use crate::config::types::Healthcheck;
use crate::error::{Error, Result};

const NANOS_PER_MICRO: f64 = 1_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

fn unit_nanos(unit: &str) -> Option<f64> {
    match unit {
        "ns" => Some(1.0),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(60.0 * NANOS_PER_SECOND),
        "h" => Some(3600.0 * NANOS_PER_SECOND),
        _ => None,
    }
}

/// Parses a Go-style duration (`1m30s`, `500ms`, `1.5h`) into nanoseconds.
///
/// A bare `0` is accepted; any other number needs a unit.
///
/// # Errors
///
/// Returns [`Error::Conversion`] naming `field` when the string is not a
/// duration.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::health::parse_duration;
///
/// assert_eq!(parse_duration("interval", "1m30s").unwrap(), 90_000_000_000);
/// assert_eq!(parse_duration("timeout", "500ms").unwrap(), 500_000_000);
/// assert!(parse_duration("timeout", "10").is_err());
/// ```
pub fn parse_duration(field: &str, raw: &str) -> Result<i64> {
    let invalid = || Error::Conversion {
        field: field.to_string(),
        value: raw.to_string(),
        reason: "expected a duration such as 30s or 1m30s".to_string(),
    };

    let text = raw.trim();
    if text == "0" {
        return Ok(0);
    }
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = 0.0;
    let mut rest = text;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let (number, after) = rest.split_at(number_end);
        let unit_end = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, next) = after.split_at(unit_end);

        let quantity: f64 = number.parse().map_err(|_| invalid())?;
        total += quantity * unit_nanos(unit).ok_or_else(invalid)?;
        rest = next;
    }

    #[allow(clippy::cast_possible_truncation)]
    Ok(total.round() as i64)
}

fn optional_duration(field: &str, raw: &str) -> Result<Option<i64>> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        parse_duration(field, raw).map(Some)
    }
}

/// Converts a compose health check into the API health config.
///
/// A string test runs through the shell (`CMD-SHELL`), a list is used
/// as-is, and `disable: true` becomes `["NONE"]`.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for malformed durations.
pub fn convert_healthcheck(healthcheck: &Healthcheck) -> Result<HealthConfig> {
    if healthcheck.disable == Some(true) {
        return Ok(HealthConfig {
            test: Some(vec!["NONE".to_string()]),
            ..Default::default()
        });
    }

    let test = match healthcheck.test.0.as_slice() {
        [] => None,
        [single] if !single.starts_with("CMD") && single != "NONE" => {
            Some(vec!["CMD-SHELL".to_string(), single.clone()])
        }
        all => Some(all.to_vec()),
    };

    Ok(HealthConfig {
        test,
        interval: optional_duration("healthcheck.interval", &healthcheck.interval)?,
        timeout: optional_duration("healthcheck.timeout", &healthcheck.timeout)?,
        retries: healthcheck.retries.map(|r| r.0),
        start_period: optional_duration("healthcheck.start_period", &healthcheck.start_period)?,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml_types::{StringOrInt, StringOrSlice};

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("f", "10s").unwrap(), 10_000_000_000);
        assert_eq!(parse_duration("f", "1h").unwrap(), 3_600_000_000_000);
        assert_eq!(parse_duration("f", "1.5s").unwrap(), 1_500_000_000);
        assert_eq!(parse_duration("f", "2us").unwrap(), 2_000);
        assert_eq!(parse_duration("f", "0").unwrap(), 0);
        assert_eq!(parse_duration("f", "1h2m3s").unwrap(), 3_723_000_000_000);
    }

    #[test]
    fn test_parse_duration_rejects() {
        for bad in ["", "s", "10", "10x", "1m30", "abc"] {
            assert!(parse_duration("f", bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_string_test_uses_shell() {
        let healthcheck = Healthcheck {
            test: StringOrSlice(vec!["curl -f http://localhost".to_string()]),
            interval: "30s".to_string(),
            retries: Some(StringOrInt(3)),
            ..Default::default()
        };
        let config = convert_healthcheck(&healthcheck).unwrap();
        assert_eq!(
            config.test,
            Some(vec![
                "CMD-SHELL".to_string(),
                "curl -f http://localhost".to_string()
            ])
        );
        assert_eq!(config.interval, Some(30_000_000_000));
        assert_eq!(config.timeout, None);
        assert_eq!(config.retries, Some(3));
    }

    #[test]
    fn test_list_test_kept() {
        let healthcheck = Healthcheck {
            test: StringOrSlice(vec!["CMD".to_string(), "true".to_string()]),
            ..Default::default()
        };
        let config = convert_healthcheck(&healthcheck).unwrap();
        assert_eq!(config.test, Some(vec!["CMD".to_string(), "true".to_string()]));
    }

    #[test]
    fn test_disable() {
        let healthcheck = Healthcheck {
            test: StringOrSlice(vec!["true".to_string()]),
            disable: Some(true),
            ..Default::default()
        };
        let config = convert_healthcheck(&healthcheck).unwrap();
        assert_eq!(config.test, Some(vec!["NONE".to_string()]));
        assert_eq!(config.interval, None);
    }

    #[test]
    fn test_bad_interval_names_field() {
        let healthcheck = Healthcheck {
            interval: "often".to_string(),
            ..Default::default()
        };
        let err = convert_healthcheck(&healthcheck).unwrap_err();
        assert!(format!("{err}").contains("healthcheck.interval"));
    }
}
