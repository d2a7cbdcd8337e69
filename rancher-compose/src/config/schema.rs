//! Embedded JSON schemas and schema introspection.
//!
//! The versioned schema documents live next to this module as plain JSON
//! files and are compiled into the binary. [`FieldTypes`] flattens a schema
//! into a table from dotted field path to the JSON types the schema accepts
//! there, computed once so validation errors can name the expected types
//! without walking the schema again.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::config::raw::ComposeVersion;
use crate::error::{Error, Result};

/// Schema for version 1 documents.
pub const SCHEMA_V1: &str = include_str!("schemas/config_schema_v1.json");

/// Schema for version 2 documents.
pub const SCHEMA_V2: &str = include_str!("schemas/config_schema_v2.json");

/// Upper bound on `$ref` hops, guarding against reference cycles.
const MAX_REF_DEPTH: usize = 32;

/// Parses the embedded schema for `version`.
///
/// # Errors
///
/// Returns [`Error::Json`] if the embedded document is not valid JSON.
pub fn schema_document(version: ComposeVersion) -> Result<Json> {
    let text = match version {
        ComposeVersion::V1 => SCHEMA_V1,
        ComposeVersion::V2 => SCHEMA_V2,
    };
    Ok(serde_json::from_str(text)?)
}

/// Follows local `$ref` pointers until a concrete schema node is reached.
fn resolve<'a>(root: &'a Json, mut node: &'a Json) -> &'a Json {
    for _ in 0..MAX_REF_DEPTH {
        let Some(target) = node
            .get("$ref")
            .and_then(Json::as_str)
            .and_then(|r| r.strip_prefix('#'))
            .and_then(|pointer| root.pointer(pointer))
        else {
            return node;
        };
        node = target;
    }
    node
}

fn push_unique(out: &mut Vec<String>, value: &str) {
    if !out.iter().any(|existing| existing == value) {
        out.push(value.to_string());
    }
}

/// Collects the types a schema node accepts, expanding `$ref` and `oneOf`.
fn collect_types(root: &Json, node: &Json, out: &mut Vec<String>) {
    let node = resolve(root, node);
    match node.get("type") {
        Some(Json::String(t)) => push_unique(out, t),
        Some(Json::Array(types)) => {
            for t in types.iter().filter_map(Json::as_str) {
                push_unique(out, t);
            }
        }
        _ => {}
    }
    for keyword in ["oneOf", "anyOf", "allOf"] {
        if let Some(Json::Array(branches)) = node.get(keyword) {
            for branch in branches {
                collect_types(root, branch, out);
            }
        }
    }
}

/// Dotted field path to accepted JSON types.
///
/// Container children (`patternProperties`, `additionalProperties`,
/// `items`) are recorded under a `*` segment.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::schema::{schema_document, FieldTypes};
/// use rancher_compose::config::ComposeVersion;
///
/// let schema = schema_document(ComposeVersion::V2).unwrap();
/// let types = FieldTypes::from_schema(&schema);
/// assert_eq!(types.get("build").unwrap(), ["string", "object"]);
/// assert_eq!(types.lookup(&["ulimits", "nofile"]).unwrap(), ["integer", "string", "object"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FieldTypes {
    paths: HashMap<String, Vec<String>>,
}

impl FieldTypes {
    /// Builds the table from a schema whose `definitions.service` describes one service.
    #[must_use]
    pub fn from_schema(root: &Json) -> Self {
        let mut table = Self::default();
        if let Some(service) = root.pointer("/definitions/service") {
            table.walk(root, service, "");
        }
        table
    }

    fn record(&mut self, root: &Json, path: &str, node: &Json) {
        let entry = self.paths.entry(path.to_string()).or_default();
        collect_types(root, node, entry);
    }

    fn walk(&mut self, root: &Json, node: &Json, path: &str) {
        let node = resolve(root, node);
        let child = |name: &str| {
            if path.is_empty() {
                name.to_string()
            } else {
                format!("{path}.{name}")
            }
        };

        if let Some(Json::Object(properties)) = node.get("properties") {
            for (name, schema) in properties {
                let child_path = child(name);
                self.record(root, &child_path, schema);
                self.walk(root, schema, &child_path);
            }
        }
        if let Some(Json::Object(patterns)) = node.get("patternProperties") {
            for schema in patterns.values() {
                let child_path = child("*");
                self.record(root, &child_path, schema);
                self.walk(root, schema, &child_path);
            }
        }
        for keyword in ["additionalProperties", "items"] {
            if let Some(schema @ Json::Object(_)) = node.get(keyword) {
                let child_path = child("*");
                self.record(root, &child_path, schema);
                self.walk(root, schema, &child_path);
            }
        }
        for keyword in ["oneOf", "anyOf", "allOf"] {
            if let Some(Json::Array(branches)) = node.get(keyword) {
                for branch in branches {
                    self.walk(root, branch, path);
                }
            }
        }
    }

    /// Returns the accepted types for an exact dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&[String]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    /// Returns the accepted types for the deepest known prefix of `segments`.
    ///
    /// Segments that are not named in the schema (array indexes, map keys)
    /// match the `*` child of their parent.
    #[must_use]
    pub fn lookup(&self, segments: &[&str]) -> Option<&[String]> {
        let mut path = String::new();
        let mut found = None;
        for segment in segments {
            let join = |name: &str| {
                if path.is_empty() {
                    name.to_string()
                } else {
                    format!("{path}.{name}")
                }
            };
            let named = join(segment);
            let next = if self.paths.contains_key(&named) {
                named
            } else {
                let wildcard = join("*");
                if !self.paths.contains_key(&wildcard) {
                    break;
                }
                wildcard
            };
            found = self.get(&next);
            path = next;
        }
        found.filter(|types| !types.is_empty())
    }

    /// Number of recorded paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns true when the schema had no service definition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Parses a schema supplied as text, for callers providing alternates.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the text is not a JSON object.
pub fn parse_schema(text: &str) -> Result<Json> {
    let value: Json = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(Error::Schema {
            message: "schema must be a JSON object".to_string(),
        });
    }
    Ok(value)
}
