//! Restart policy parsing.

use bollard::models::{RestartPolicy, RestartPolicyNameEnum};

use crate::error::{Error, Result};

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    Error::Conversion {
        field: "restart".to_string(),
        value: raw.to_string(),
        reason: reason.into(),
    }
}

/// Parses a compose `restart` value into an API restart policy.
///
/// Accepts `no`, `always`, `unless-stopped` and `on-failure[:max-retries]`.
/// An empty value yields `None` so the daemon default applies.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for unknown policies, for a retry count on
/// anything but `on-failure`, and for non-numeric retry counts.
///
/// # Examples
///
/// ```
/// use bollard::models::RestartPolicyNameEnum;
/// use rancher_compose::convert::restart::parse_restart_policy;
///
/// let policy = parse_restart_policy("on-failure:5").unwrap().unwrap();
/// assert_eq!(policy.name, Some(RestartPolicyNameEnum::ON_FAILURE));
/// assert_eq!(policy.maximum_retry_count, Some(5));
///
/// assert!(parse_restart_policy("").unwrap().is_none());
/// assert!(parse_restart_policy("sometimes").is_err());
/// ```
pub fn parse_restart_policy(raw: &str) -> Result<Option<RestartPolicy>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (name, count) = match trimmed.split_once(':') {
        Some((name, count)) => (name, Some(count)),
        None => (trimmed, None),
    };

    let policy = match name {
        "no" => RestartPolicyNameEnum::NO,
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        other => return Err(invalid(raw, format!("unknown restart policy '{other}'"))),
    };

    let maximum_retry_count = match count {
        None => None,
        Some(_) if policy != RestartPolicyNameEnum::ON_FAILURE => {
            return Err(invalid(raw, "maximum retry count only applies to on-failure"));
        }
        Some(count) => Some(
            count
                .parse::<i64>()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| invalid(raw, format!("invalid maximum retry count '{count}'")))?,
        ),
    };

    Ok(Some(RestartPolicy {
        name: Some(policy),
        maximum_retry_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_policies() {
        for (raw, expected) in [
            ("no", RestartPolicyNameEnum::NO),
            ("always", RestartPolicyNameEnum::ALWAYS),
            ("unless-stopped", RestartPolicyNameEnum::UNLESS_STOPPED),
            ("on-failure", RestartPolicyNameEnum::ON_FAILURE),
        ] {
            let policy = parse_restart_policy(raw).unwrap().unwrap();
            assert_eq!(policy.name, Some(expected));
            assert_eq!(policy.maximum_retry_count, None);
        }
    }

    #[test]
    fn test_on_failure_with_count() {
        let policy = parse_restart_policy("on-failure:3").unwrap().unwrap();
        assert_eq!(policy.maximum_retry_count, Some(3));
    }

    #[test]
    fn test_empty_is_none() {
        assert!(parse_restart_policy("").unwrap().is_none());
        assert!(parse_restart_policy("  ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_policies() {
        for bad in ["sometimes", "always:3", "on-failure:x", "on-failure:-1", "false"] {
            let err = parse_restart_policy(bad).unwrap_err();
            assert!(
                matches!(err, Error::Conversion { ref field, .. } if field == "restart"),
                "{bad} should be rejected"
            );
        }
    }
}
