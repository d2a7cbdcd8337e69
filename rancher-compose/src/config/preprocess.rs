//! Value normalization applied after interpolation.
//!
//! Two independent passes run over every raw service map:
//!
//! 1. [`preprocess_service_map`] forces every scalar under `environment` and
//!    `labels` to a string, so `DEBUG: true` and `PORT: 80` become
//!    `"true"` and `"80"`.
//! 2. [`try_convert_strings_to_ints`] turns numeric-looking strings into
//!    integers for the Rancher fields that the schema declares numeric,
//!    which matters once interpolation has produced `scale: "3"`.

use std::collections::HashSet;

use serde_yaml::{Mapping, Value};

use crate::config::raw::{RawService, RawServiceMap};
use crate::config::yaml_types::scalar_to_string;
use crate::error::Result;

/// Fields whose nested scalars are stringified.
const STRINGIFIED_FIELDS: &[&str] = &["environment", "labels"];

/// Rancher fields eligible for numeric coercion.
pub const NUMERIC_FIELDS: &[&str] = &[
    "scale",
    "scale_min",
    "scale_max",
    "scale_increment",
    "drain_timeout_ms",
    "health_check",
    "lb_config",
    "upgrade_strategy",
    "vcpu",
    "memory_mb",
    "cpu_shares",
    "cpu_quota",
    "cpu_period",
    "mem_limit",
    "mem_reservation",
    "memswap_limit",
    "mem_swappiness",
    "shm_size",
    "blkio_weight",
    "oom_score_adj",
    "pids_limit",
];

/// The default coercion field set, as a lookup table.
#[must_use]
pub fn numeric_fields() -> HashSet<&'static str> {
    NUMERIC_FIELDS.iter().copied().collect()
}

fn stringify(value: Value) -> Value {
    match value {
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(stringify).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let key = scalar_to_string(&k).map_or(k, Value::String);
                    (key, stringify(v))
                })
                .collect::<Mapping>(),
        ),
        Value::Null => Value::Null,
        other => scalar_to_string(&other).map_or(other, Value::String),
    }
}

/// Stringifies the scalars of `environment` and `labels` in every service.
///
/// Other fields are left untouched. Null values stay null so a bare
/// `KEY:` entry can still be resolved from the environment later.
///
/// # Errors
///
/// Currently infallible; the `Result` keeps the pipeline stages uniform.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::create_raw_config;
/// use rancher_compose::config::preprocess::preprocess_service_map;
///
/// let raw = create_raw_config(b"web:\n  environment:\n    DEBUG: true\n  scale: 2\n").unwrap();
/// let services = preprocess_service_map(raw.services).unwrap();
/// assert_eq!(services["web"]["environment"]["DEBUG"], serde_yaml::Value::String("true".into()));
/// assert!(services["web"]["scale"].is_number());
/// ```
pub fn preprocess_service_map(services: RawServiceMap) -> Result<RawServiceMap> {
    Ok(services
        .into_iter()
        .map(|(name, service)| {
            let service = service
                .into_iter()
                .map(|(field, value)| {
                    if STRINGIFIED_FIELDS.contains(&field.as_str()) {
                        (field, stringify(value))
                    } else {
                        (field, value)
                    }
                })
                .collect::<RawService>();
            (name, service)
        })
        .collect())
}

/// Numeric leaves inside the structured fields of [`NUMERIC_FIELDS`].
///
/// String-typed siblings such as `certs`, `default_cert` or `hostname` are
/// never coerced, even when they look like numbers.
pub const NESTED_NUMERIC_KEYS: &[&str] = &[
    "source_port",
    "target_port",
    "priority",
    "port",
    "interval",
    "initializing_timeout",
    "reinitializing_timeout",
    "unhealthy_threshold",
    "healthy_threshold",
    "response_timeout",
    "batch_size",
    "interval_millis",
];

fn coerce_scalar(value: Value) -> Value {
    match value {
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

fn coerce_nested(value: Value) -> Value {
    match value {
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(coerce_nested).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let numeric = k
                        .as_str()
                        .is_some_and(|key| NESTED_NUMERIC_KEYS.contains(&key));
                    let v = match v {
                        Value::Sequence(_) | Value::Mapping(_) => coerce_nested(v),
                        scalar if numeric => coerce_scalar(scalar),
                        scalar => scalar,
                    };
                    (k, v)
                })
                .collect::<Mapping>(),
        ),
        other => other,
    }
}

fn coerce_ints(value: Value) -> Value {
    match value {
        Value::Sequence(_) | Value::Mapping(_) => coerce_nested(value),
        scalar => coerce_scalar(scalar),
    }
}

/// Converts integer-looking strings to integers under the given fields.
///
/// Strings that do not parse, and fields outside `fields`, are unchanged.
/// Inside structured fields only the keys in [`NESTED_NUMERIC_KEYS`] are
/// coerced.
///
/// # Errors
///
/// Currently infallible; the `Result` keeps the pipeline stages uniform.
pub fn try_convert_strings_to_ints(
    services: RawServiceMap,
    fields: &HashSet<&str>,
) -> Result<RawServiceMap> {
    Ok(services
        .into_iter()
        .map(|(name, service)| {
            let service = service
                .into_iter()
                .map(|(field, value)| {
                    if fields.contains(field.as_str()) {
                        let coerced = coerce_ints(value);
                        (field, coerced)
                    } else {
                        (field, value)
                    }
                })
                .collect::<RawService>();
            (name, service)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::raw::create_raw_config;

    fn services(yaml: &str) -> RawServiceMap {
        create_raw_config(yaml.as_bytes()).unwrap().services
    }

    #[test]
    fn test_environment_map_scalars_become_strings() {
        let out = preprocess_service_map(services(
            "web:\n  environment:\n    A: 1\n    B: false\n    C:\n    D: text\n",
        ))
        .unwrap();
        let env = &out["web"]["environment"];
        assert_eq!(env["A"], Value::String("1".into()));
        assert_eq!(env["B"], Value::String("false".into()));
        assert_eq!(env["C"], Value::Null);
        assert_eq!(env["D"], Value::String("text".into()));
    }

    #[test]
    fn test_label_list_entries_become_strings() {
        let out = preprocess_service_map(services("web:\n  labels: [1, a=b]\n")).unwrap();
        assert_eq!(out["web"]["labels"][0], Value::String("1".into()));
    }

    #[test]
    fn test_other_fields_untouched() {
        let out = preprocess_service_map(services("web:\n  privileged: true\n  scale: 3\n")).unwrap();
        assert_eq!(out["web"]["privileged"], Value::Bool(true));
        assert_eq!(out["web"]["scale"], Value::Number(3.into()));
    }

    #[test]
    fn test_numeric_coercion_for_listed_fields() {
        let out = try_convert_strings_to_ints(
            services(
                "web:\n  scale: \"3\"\n  health_check:\n    port: \"80\"\n    request_line: GET /\n\
                 \x20 image: \"123\"\n",
            ),
            &numeric_fields(),
        )
        .unwrap();
        assert_eq!(out["web"]["scale"], Value::Number(3.into()));
        assert_eq!(out["web"]["health_check"]["port"], Value::Number(80.into()));
        assert_eq!(
            out["web"]["health_check"]["request_line"],
            Value::String("GET /".into())
        );
        assert_eq!(out["web"]["image"], Value::String("123".into()));
    }

    #[test]
    fn test_unparseable_strings_left_alone() {
        let out = try_convert_strings_to_ints(
            services("web:\n  mem_limit: 512m\n  scale: ${SCALE}\n"),
            &numeric_fields(),
        )
        .unwrap();
        assert_eq!(out["web"]["mem_limit"], Value::String("512m".into()));
        assert_eq!(out["web"]["scale"], Value::String("${SCALE}".into()));
    }

    #[test]
    fn test_coercion_recurses_into_sequences() {
        let out = try_convert_strings_to_ints(
            services("lb:\n  lb_config:\n    port_rules:\n    - source_port: \"80\"\n"),
            &numeric_fields(),
        )
        .unwrap();
        assert_eq!(
            out["lb"]["lb_config"]["port_rules"][0]["source_port"],
            Value::Number(80.into())
        );
    }

    #[test]
    fn test_coercion_skips_string_leaves_of_structured_fields() {
        let out = try_convert_strings_to_ints(
            services(
                "lb:\n  lb_config:\n    certs: ['2024']\n    default_cert: '2024'\n    \
                 config: '1000'\n    port_rules:\n    - hostname: '42'\n      \
                 target_port: '8080'\n",
            ),
            &numeric_fields(),
        )
        .unwrap();
        let lb = &out["lb"]["lb_config"];
        assert_eq!(lb["certs"][0], Value::String("2024".into()));
        assert_eq!(lb["default_cert"], Value::String("2024".into()));
        assert_eq!(lb["config"], Value::String("1000".into()));
        assert_eq!(lb["port_rules"][0]["hostname"], Value::String("42".into()));
        assert_eq!(lb["port_rules"][0]["target_port"], Value::Number(8080.into()));
    }
}
