//! Resolution of service fields that reference other files.
//!
//! `env_file` entries are read through the [`ResourceLookup`] and folded
//! into `environment`; relative build contexts are resolved against the
//! compose file that declared them.

use std::collections::HashMap;

use serde_yaml::Value;

use crate::config::raw::RawService;
use crate::config::yaml_types::scalar_to_string;
use crate::error::{Error, Result};
use crate::lookup::ResourceLookup;

/// Build context prefixes that name remote sources.
const REMOTE_PREFIXES: &[&str] = &["git://", "git@", "github.com/", "http://", "https://"];

/// Parses the contents of an env file into `KEY=VALUE` (or bare `KEY`) entries.
///
/// Blank lines and `#` comments are skipped, and a leading `export ` is
/// stripped.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::resources::parse_env_file;
///
/// let entries = parse_env_file("# db\nexport HOST=db\n\nPORT=5432\nDEBUG\n");
/// assert_eq!(entries, vec!["HOST=db", "PORT=5432", "DEBUG"]);
/// ```
#[must_use]
pub fn parse_env_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.strip_prefix("export ").unwrap_or(line).trim_start())
        .map(str::to_string)
        .collect()
}

fn entry_key(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(key, _)| key)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    }
}

/// Reads the raw `environment` field as a `KEY=VALUE` list.
fn environment_entries(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Mapping(map)) => map
            .iter()
            .filter_map(|(k, v)| {
                let key = scalar_to_string(k)?;
                Some(match scalar_to_string(v) {
                    Some(value) => format!("{key}={value}"),
                    None => key,
                })
            })
            .collect(),
        Some(other) => string_list(other),
        None => Vec::new(),
    }
}

/// Folds a service's `env_file` entries into its `environment`.
///
/// Inline `environment` keys always win. Files are read in reverse
/// declaration order with each file replacing entries contributed by files
/// read before it, so the first-listed file wins among files. The
/// `env_file` field is removed afterwards.
///
/// # Errors
///
/// Returns [`Error::ResourceLookup`] if a file cannot be read, or if files
/// are referenced but no `lookup` was provided.
pub fn resolve_env_files(
    service: &mut RawService,
    file: &str,
    lookup: Option<&dyn ResourceLookup>,
) -> Result<()> {
    let Some(declared) = service.remove("env_file") else {
        return Ok(());
    };
    let env_files = string_list(&declared);
    let Some(first) = env_files.first() else {
        return Ok(());
    };
    let Some(lookup) = lookup else {
        return Err(Error::ResourceLookup {
            resource: first.clone(),
            reason: "no mechanism provided to load files".to_string(),
        });
    };

    let mut environment = environment_entries(service.get("environment"));
    let inline = environment.len();
    let mut from_files: HashMap<String, usize> = HashMap::new();

    for env_file in env_files.iter().rev() {
        let (contents, resolved) = lookup.lookup(env_file, file)?;
        let contents = String::from_utf8_lossy(&contents);
        let entries = parse_env_file(&contents);
        log::debug!("loaded {} entries from {resolved}", entries.len());

        for entry in entries {
            let key = entry_key(&entry).to_string();
            if environment[..inline].iter().any(|e| entry_key(e) == key) {
                continue;
            }
            match from_files.get(&key) {
                Some(&index) => environment[index] = entry,
                None => {
                    from_files.insert(key, environment.len());
                    environment.push(entry);
                }
            }
        }
    }

    service.insert(
        "environment".to_string(),
        Value::Sequence(environment.into_iter().map(Value::String).collect()),
    );
    Ok(())
}

/// Returns true for build contexts that point at a remote source.
#[must_use]
pub fn is_remote_context(context: &str) -> bool {
    REMOTE_PREFIXES
        .iter()
        .any(|prefix| context.starts_with(prefix))
}

/// Resolves a relative `build` context against the declaring file.
///
/// Handles both `build: ./dir` and `build: {context: ./dir}`. Remote
/// contexts, and every context when no lookup is available, are left as-is.
pub fn resolve_build_context(
    service: &mut RawService,
    file: &str,
    lookup: Option<&dyn ResourceLookup>,
) {
    let Some(lookup) = lookup else {
        return;
    };
    let resolve = |context: &mut String| {
        if !context.is_empty() && !is_remote_context(context) {
            *context = lookup.resolve_path(context, file);
        }
    };
    match service.get_mut("build") {
        Some(Value::String(context)) => resolve(context),
        Some(Value::Mapping(build)) => {
            if let Some(Value::String(context)) = build.get_mut("context") {
                resolve(context);
            }
        }
        _ => {}
    }
}
