//! Variable interpolation over raw compose values.
//!
//! Supported forms are `$VAR`, `${VAR}`, `${VAR:-default}` (default when the
//! variable is unset or empty), `${VAR-default}` (default when unset) and
//! `$$` for a literal dollar sign. A reference to an unknown variable without
//! a default is left in the output exactly as written.

use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::str::Chars;

use serde_yaml::Value;

use crate::config::raw::RawServiceMap;
use crate::error::{Error, Result};
use crate::lookup::EnvironmentLookup;

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Substitutes variable references in a single string.
///
/// # Errors
///
/// Returns [`Error::Interpolation`] for an unterminated `${` or a malformed
/// reference body.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use rancher_compose::config::interpolation::interpolate_str;
///
/// let vars = HashMap::from([("TAG".to_string(), "1.25".to_string())]);
/// assert_eq!(interpolate_str("image", "nginx:${TAG}", &vars).unwrap(), "nginx:1.25");
/// assert_eq!(interpolate_str("image", "${MISSING}", &vars).unwrap(), "${MISSING}");
/// assert_eq!(interpolate_str("image", "${MISSING:-x}", &vars).unwrap(), "x");
/// assert_eq!(interpolate_str("cmd", "echo $$HOME", &vars).unwrap(), "echo $HOME");
/// ```
pub fn interpolate_str(key: &str, input: &str, variables: &HashMap<String, String>) -> Result<String> {
    let invalid = || Error::Interpolation {
        key: key.to_string(),
        value: input.to_string(),
    };

    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            output.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                output.push('$');
            }
            Some('{') => {
                chars.next();
                let inner = read_braced(&mut chars).ok_or_else(invalid)?;
                let resolved = resolve_braced(&inner, variables).ok_or_else(invalid)?;
                match resolved {
                    Some(value) => output.push_str(&value),
                    None => {
                        output.push_str("${");
                        output.push_str(&inner);
                        output.push('}');
                    }
                }
            }
            Some(next) if is_name_start(next) => {
                let mut name = String::new();
                while let Some(&nc) = chars.peek() {
                    if !is_name_char(nc) {
                        break;
                    }
                    name.push(nc);
                    chars.next();
                }
                match variables.get(&name) {
                    Some(value) => output.push_str(value),
                    None => {
                        output.push('$');
                        output.push_str(&name);
                    }
                }
            }
            _ => output.push('$'),
        }
    }

    Ok(output)
}

fn read_braced(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut inner = String::new();
    for c in chars.by_ref() {
        if c == '}' {
            return Some(inner);
        }
        inner.push(c);
    }
    None
}

/// Resolves the body of a `${...}` reference.
///
/// The outer `Option` is `None` when the body is malformed; the inner one is
/// `None` when the variable is unknown and no default applies.
fn resolve_braced(inner: &str, variables: &HashMap<String, String>) -> Option<Option<String>> {
    let name_len = inner
        .char_indices()
        .find(|&(_, c)| !is_name_char(c))
        .map_or(inner.len(), |(i, _)| i);
    let (name, modifier) = inner.split_at(name_len);
    if name.is_empty() || !name.starts_with(is_name_start) {
        return None;
    }

    let current = variables.get(name);
    if modifier.is_empty() {
        return Some(current.cloned());
    }
    if let Some(default) = modifier.strip_prefix(":-") {
        return Some(Some(match current {
            Some(value) if !value.is_empty() => value.clone(),
            _ => default.to_string(),
        }));
    }
    if let Some(default) = modifier.strip_prefix('-') {
        return Some(Some(
            current.cloned().unwrap_or_else(|| default.to_string()),
        ));
    }
    None
}

/// Interpolates every string leaf of `value` in place, preserving shape.
///
/// # Errors
///
/// Returns the first [`Error::Interpolation`] encountered.
pub fn interpolate(key: &str, value: &mut Value, variables: &HashMap<String, String>) -> Result<()> {
    match value {
        Value::String(s) => {
            *s = interpolate_str(key, s, variables)?;
        }
        Value::Sequence(items) => {
            for item in items {
                interpolate(key, item, variables)?;
            }
        }
        Value::Mapping(map) => {
            for (_, nested) in map.iter_mut() {
                interpolate(key, nested, variables)?;
            }
        }
        Value::Tagged(tagged) => interpolate(key, &mut tagged.value, variables)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Interpolates every field of every service.
///
/// # Errors
///
/// Returns [`Error::Interpolation`] naming the `service.field` that failed.
pub fn interpolate_services(
    services: &mut RawServiceMap,
    lookup: &dyn EnvironmentLookup,
) -> Result<()> {
    let variables = lookup.variables();
    for (name, service) in services.iter_mut() {
        for (field, value) in service.iter_mut() {
            interpolate(&format!("{name}.{field}"), value, &variables)?;
        }
    }
    Ok(())
}

/// Interpolates a top-level declaration map such as `volumes` or `networks`.
///
/// # Errors
///
/// Returns [`Error::Interpolation`] naming the entry that failed.
pub fn interpolate_declarations(
    declarations: &mut BTreeMap<String, Value>,
    lookup: &dyn EnvironmentLookup,
) -> Result<()> {
    let variables = lookup.variables();
    for (name, value) in declarations.iter_mut() {
        interpolate(name, value, &variables)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MapEnvLookup;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("HOST".to_string(), "db".to_string()),
            ("PORT".to_string(), "5432".to_string()),
            ("EMPTY".to_string(), String::new()),
        ])
    }

    #[test]
    fn test_braced_and_bare_references() {
        let v = vars();
        assert_eq!(interpolate_str("k", "${HOST}:$PORT", &v).unwrap(), "db:5432");
        assert_eq!(interpolate_str("k", "$HOST-suffix", &v).unwrap(), "db-suffix");
    }

    #[test]
    fn test_defaults() {
        let v = vars();
        assert_eq!(interpolate_str("k", "${EMPTY:-x}", &v).unwrap(), "x");
        assert_eq!(interpolate_str("k", "${EMPTY-x}", &v).unwrap(), "");
        assert_eq!(interpolate_str("k", "${NOPE-x}", &v).unwrap(), "x");
        assert_eq!(interpolate_str("k", "${NOPE:-}", &v).unwrap(), "");
    }

    #[test]
    fn test_unresolved_passes_through() {
        let v = vars();
        assert_eq!(
            interpolate_str("image", "${MISSING_VAR}", &v).unwrap(),
            "${MISSING_VAR}"
        );
        assert_eq!(interpolate_str("image", "$MISSING", &v).unwrap(), "$MISSING");
    }

    #[test]
    fn test_escapes_and_lone_dollar() {
        let v = vars();
        assert_eq!(interpolate_str("k", "$$HOST", &v).unwrap(), "$HOST");
        assert_eq!(interpolate_str("k", "cost: 5$", &v).unwrap(), "cost: 5$");
        assert_eq!(interpolate_str("k", "^a$ b", &v).unwrap(), "^a$ b");
    }

    #[test]
    fn test_malformed_references() {
        let v = vars();
        assert!(matches!(
            interpolate_str("image", "${HOST", &v),
            Err(Error::Interpolation { .. })
        ));
        assert!(interpolate_str("image", "${}", &v).is_err());
        assert!(interpolate_str("image", "${HOST?err}", &v).is_err());
        assert!(interpolate_str("image", "${1ABC}", &v).is_err());
    }

    #[test]
    fn test_interpolate_preserves_shape() {
        let mut value: Value =
            serde_yaml::from_str("a: [\"${HOST}\", 3, true]\nb:\n  c: $PORT\n").unwrap();
        interpolate("field", &mut value, &vars()).unwrap();
        assert_eq!(value["a"][0], Value::String("db".into()));
        assert_eq!(value["a"][1], Value::Number(3.into()));
        assert_eq!(value["a"][2], Value::Bool(true));
        assert_eq!(value["b"]["c"], Value::String("5432".into()));
    }

    #[test]
    fn test_interpolate_services_names_failing_field() {
        let mut services = RawServiceMap::new();
        let mut web = crate::config::raw::RawService::new();
        web.insert("image".to_string(), Value::String("${BROKEN".into()));
        services.insert("web".to_string(), web);

        let lookup = MapEnvLookup::new(HashMap::new());
        let err = interpolate_services(&mut services, &lookup).unwrap_err();
        assert!(matches!(err, Error::Interpolation { ref key, .. } if key == "web.image"));
    }

    #[test]
    fn test_interpolate_declarations() {
        let mut volumes = BTreeMap::new();
        volumes.insert(
            "data".to_string(),
            serde_yaml::from_str::<Value>("driver: ${DRIVER:-local}").unwrap(),
        );
        let lookup = MapEnvLookup::new(HashMap::new());
        interpolate_declarations(&mut volumes, &lookup).unwrap();
        assert_eq!(volumes["data"]["driver"], Value::String("local".into()));
    }
}
