//! Schema validation of raw service maps.
//!
//! Each compose version has its own embedded JSON schema. The [`Validator`]
//! compiles both once, registers the custom `ports` and `expose` formats,
//! and reports every violation it finds instead of stopping at the first.

use std::collections::HashMap;
use std::fmt;

use jsonschema::Validator as CompiledSchema;
use serde_json::{Map, Number, Value as Json};
use serde_yaml::Value;

use crate::config::raw::{ComposeVersion, RawServiceMap};
use crate::config::schema::{schema_document, FieldTypes};
use crate::convert::ports::{parse_expose, parse_port_spec};
use crate::error::{Error, Result};

/// Message used when a service sets both an image and a build.
const MUTUALLY_EXCLUSIVE: &str = "image and build are mutually exclusive";

/// One schema violation, located by service and dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The offending service.
    pub service: String,
    /// Dotted path inside the service; empty for service-level problems.
    pub field: String,
    /// Human-readable description.
    pub message: String,
    /// JSON types the schema accepts at `field`, when known.
    pub valid_types: Vec<String>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}: {}", self.service, self.message)?;
        } else {
            write!(f, "{}.{}: {}", self.service, self.field, self.message)?;
        }
        if !self.valid_types.is_empty() {
            write!(f, " (expected: {})", self.valid_types.join(", "))?;
        }
        Ok(())
    }
}

struct VersionSchema {
    compiled: CompiledSchema,
    field_types: FieldTypes,
}

impl VersionSchema {
    fn compile(schema: &Json) -> Result<Self> {
        let compiled = jsonschema::options()
            .with_format("ports", |s: &str| parse_port_spec(s).is_ok())
            .with_format("expose", |s: &str| parse_expose(s).is_ok())
            .with_format("environment", |_: &str| true)
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| Error::Schema {
                message: e.to_string(),
            })?;
        Ok(Self {
            compiled,
            field_types: FieldTypes::from_schema(schema),
        })
    }
}

/// Validates service maps against the versioned compose schemas.
///
/// Construction compiles the schemas, so build one validator and share it.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{create_raw_config, Validator};
///
/// let validator = Validator::new().unwrap();
/// let raw = create_raw_config(b"web:\n  image: nginx\n  ports: [\"80:80\"]\n").unwrap();
/// assert!(validator.validate(raw.version, &raw.services).is_ok());
///
/// let raw = create_raw_config(b"web:\n  image: nginx\n  ports: [\"80:80:80:80\"]\n").unwrap();
/// let err = validator.validate(raw.version, &raw.services).unwrap_err();
/// assert_eq!(err.violations()[0].field, "ports.0");
/// ```
pub struct Validator {
    v1: VersionSchema,
    v2: VersionSchema,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("v1_fields", &self.v1.field_types.len())
            .field("v2_fields", &self.v2.field_types.len())
            .finish()
    }
}

impl Validator {
    /// Compiles the embedded version 1 and version 2 schemas.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if an embedded schema fails to compile.
    pub fn new() -> Result<Self> {
        Self::from_schemas(
            &schema_document(ComposeVersion::V1)?,
            &schema_document(ComposeVersion::V2)?,
        )
    }

    /// Compiles caller-supplied schemas in place of the embedded ones.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if either schema fails to compile.
    pub fn from_schemas(v1: &Json, v2: &Json) -> Result<Self> {
        Ok(Self {
            v1: VersionSchema::compile(v1)?,
            v2: VersionSchema::compile(v2)?,
        })
    }

    fn schema(&self, version: ComposeVersion) -> &VersionSchema {
        match version {
            ComposeVersion::V1 => &self.v1,
            ComposeVersion::V2 => &self.v2,
        }
    }

    /// Collects every violation in `services`.
    #[must_use]
    pub fn violations(&self, version: ComposeVersion, services: &RawServiceMap) -> Vec<Violation> {
        let schema = self.schema(version);
        let instance = services_to_json(services);

        let mut violations: Vec<Violation> = schema
            .compiled
            .iter_errors(&instance)
            .map(|err| {
                let pointer = err.instance_path().to_string();
                let segments = split_pointer(&pointer);
                let (service, field) = match segments.split_first() {
                    Some((service, field)) => (service.clone(), field.to_vec()),
                    None => (String::new(), Vec::new()),
                };

                let message = if field.is_empty() && sets_image_and_build(&instance, &service) {
                    MUTUALLY_EXCLUSIVE.to_string()
                } else {
                    err.to_string()
                };
                let lookup: Vec<&str> = field.iter().map(String::as_str).collect();
                let valid_types = if lookup.is_empty() {
                    Vec::new()
                } else {
                    schema
                        .field_types
                        .lookup(&lookup)
                        .map(<[String]>::to_vec)
                        .unwrap_or_default()
                };

                Violation {
                    service,
                    field: field.join("."),
                    message,
                    valid_types,
                }
            })
            .collect();

        violations.dedup();
        violations
    }

    /// Validates `services`, failing with every violation found.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaValidation`] when any violation exists.
    pub fn validate(&self, version: ComposeVersion, services: &RawServiceMap) -> Result<()> {
        let violations = self.violations(version, services);
        if violations.is_empty() {
            return Ok(());
        }
        for violation in &violations {
            log::debug!("schema violation: {violation}");
        }
        Err(Error::SchemaValidation { violations })
    }

    /// Returns the JSON types the schema accepts at a dotted field path.
    ///
    /// Unknown paths and numeric segments fall back to the deepest known
    /// prefix, so `ports.3` reports the element types of `ports`.
    #[must_use]
    pub fn valid_types(&self, version: ComposeVersion, path: &str) -> Vec<String> {
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        self.schema(version)
            .field_types
            .lookup(&segments)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }
}

fn sets_image_and_build(instance: &Json, service: &str) -> bool {
    let Some(fields) = instance.get(service).and_then(Json::as_object) else {
        return false;
    };
    fields.contains_key("image")
        && (fields.contains_key("build") || fields.contains_key("dockerfile"))
}

/// Splits a JSON pointer into unescaped segments.
fn split_pointer(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Converts YAML to JSON, stringifying non-string mapping keys.
pub(crate) fn yaml_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Json::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Json::Null, Json::Number)
            }
        }
        Value::String(s) => Json::String(s.clone()),
        Value::Sequence(items) => Json::Array(items.iter().map(yaml_to_json).collect()),
        Value::Mapping(map) => Json::Object(
            map.iter()
                .map(|(k, v)| {
                    let key = match k {
                        Value::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    (key, yaml_to_json(v))
                })
                .collect::<Map<String, Json>>(),
        ),
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn services_to_json(services: &RawServiceMap) -> Json {
    Json::Object(
        services
            .iter()
            .map(|(name, fields)| {
                let object = fields
                    .iter()
                    .map(|(field, value)| (field.clone(), yaml_to_json(value)))
                    .collect::<Map<String, Json>>();
                (name.clone(), Json::Object(object))
            })
            .collect(),
    )
}

/// Groups violations by service, preserving order within each service.
#[must_use]
pub fn violations_by_service(violations: &[Violation]) -> HashMap<&str, Vec<&Violation>> {
    let mut grouped: HashMap<&str, Vec<&Violation>> = HashMap::new();
    for violation in violations {
        grouped
            .entry(violation.service.as_str())
            .or_default()
            .push(violation);
    }
    grouped
}
