//! Error types for the rancher-compose library.
//!
//! Every stage of the merge and convert pipeline reports failures through the
//! single [`Error`] enum defined here. Errors raised while processing a
//! specific compose file are wrapped in [`Error::InFile`] so callers always
//! know which layer failed.

use thiserror::Error;

use crate::config::validator::Violation;

/// Result type alias for operations that may fail with a rancher-compose error.
///
/// # Examples
///
/// ```
/// use rancher_compose::{Error, Result};
///
/// fn example_operation() -> Result<&'static str> {
///     Ok("web")
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the rancher-compose library.
#[derive(Debug, Error)]
pub enum Error {
    /// The document is not valid YAML or does not have the expected shape.
    #[error("failed to parse compose document: {message} (only version 1 and 2 are supported)")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },

    /// The document declares a version other than 1 or 2.
    #[error("version {version} is not supported (only version 1 and 2 are supported)")]
    UnsupportedVersion {
        /// The declared version.
        version: String,
    },

    /// One or more services violate the versioned JSON schema.
    #[error("{}", format_violations(violations))]
    SchemaValidation {
        /// Every violation found, in document order.
        violations: Vec<Violation>,
    },

    /// A schema document could not be compiled.
    #[error("invalid schema document: {message}")]
    Schema {
        /// The compilation failure.
        message: String,
    },

    /// A referenced resource (env file, extended compose file) could not be loaded.
    #[error("failed to load '{resource}': {reason}")]
    ResourceLookup {
        /// The logical name of the resource.
        resource: String,
        /// Why the lookup failed.
        reason: String,
    },

    /// A value could not be converted into its API descriptor form.
    #[error("invalid {field} '{value}': {reason}")]
    Conversion {
        /// The field being converted (e.g. `ports`, `restart`).
        field: String,
        /// The offending raw value.
        value: String,
        /// Why the conversion failed.
        reason: String,
    },

    /// A `${...}` reference is malformed.
    #[error("invalid interpolation format for '{key}': \"{value}\"")]
    Interpolation {
        /// The field containing the reference.
        key: String,
        /// The raw value that failed to interpolate.
        value: String,
    },

    /// Text-level template expansion failed.
    #[error("failed to render template: {message}")]
    Template {
        /// The rendering failure.
        message: String,
    },

    /// An `extends` declaration could not be resolved.
    #[error("cannot extend service '{service}': {reason}")]
    Extends {
        /// The service declaring `extends`.
        service: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A service could not be turned into its typed configuration.
    #[error("service '{service}' is invalid: {message}")]
    InvalidService {
        /// The service name.
        service: String,
        /// Description of the problem.
        message: String,
    },

    /// A top-level volume, network, secret, host or dependency declaration
    /// could not be turned into its typed configuration.
    #[error("{kind} '{name}' is invalid: {message}")]
    InvalidDeclaration {
        /// The declaration group, such as `volume` or `network`.
        kind: String,
        /// The declared name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// A named service does not exist.
    #[error("no such service: {service}")]
    ServiceNotFound {
        /// The service that was requested.
        service: String,
    },

    /// An error raised while processing a specific compose file.
    #[error("{file}: {source}")]
    InFile {
        /// The compose file being processed.
        file: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON conversion error occurred.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_violations(violations: &[Violation]) -> String {
    match violations {
        [] => "schema validation failed".to_string(),
        [single] => format!("schema validation failed: {single}"),
        [first, rest @ ..] => format!(
            "schema validation failed: {first} (and {} more)",
            rest.len()
        ),
    }
}

impl Error {
    /// Wraps this error with the name of the file being processed.
    ///
    /// Already-wrapped errors are returned unchanged so the innermost file wins.
    #[must_use]
    pub fn in_file(self, file: &str) -> Self {
        match self {
            Self::InFile { .. } => self,
            other => Self::InFile {
                file: file.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error with any file context stripped.
    ///
    /// # Examples
    ///
    /// ```
    /// use rancher_compose::Error;
    ///
    /// let err = Error::Template { message: "boom".into() }.in_file("a.yml");
    /// assert!(matches!(err.root(), Error::Template { .. }));
    /// ```
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InFile { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the error is a schema validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::SchemaValidation { .. })
    }

    /// Returns the schema violations carried by this error, if any.
    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        match self.root() {
            Self::SchemaValidation { violations } => violations,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_mentions_supported_versions() {
        let err = Error::Parse {
            message: "mapping values are not allowed".to_string(),
        };
        let display = format!("{err}");
        assert!(display.contains("mapping values"));
        assert!(display.contains("only version 1 and 2 are supported"));
    }

    #[test]
    fn test_invalid_declaration_has_no_version_hint() {
        let err = Error::InvalidDeclaration {
            kind: "volume".to_string(),
            name: "data".to_string(),
            message: "invalid type: sequence, expected a string".to_string(),
        };
        let display = format!("{err}");
        assert!(display.starts_with("volume 'data' is invalid"));
        assert!(!display.contains("only version 1 and 2"));
    }

    #[test]
    fn test_unsupported_version_error() {
        let err = Error::UnsupportedVersion {
            version: "3".to_string(),
        };
        assert!(format!("{err}").contains("version 3 is not supported"));
    }

    #[test]
    fn test_conversion_error_carries_value() {
        let err = Error::Conversion {
            field: "restart".to_string(),
            value: "sometimes".to_string(),
            reason: "unknown policy".to_string(),
        };
        let display = format!("{err}");
        assert!(display.contains("restart"));
        assert!(display.contains("sometimes"));
    }

    #[test]
    fn test_in_file_wraps_once() {
        let err = Error::Template {
            message: "bad".to_string(),
        }
        .in_file("a.yml")
        .in_file("b.yml");
        let display = format!("{err}");
        assert!(display.starts_with("a.yml: "));
        assert!(!display.contains("b.yml"));
    }

    #[test]
    fn test_violations_through_file_context() {
        let err = Error::SchemaValidation {
            violations: vec![Violation {
                service: "web".to_string(),
                field: "ports".to_string(),
                message: "invalid".to_string(),
                valid_types: vec!["array".to_string()],
            }],
        }
        .in_file("docker-compose.yml");

        assert!(err.is_validation());
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].service, "web");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(format!("{err}").contains("I/O error"));
        assert!(!err.is_validation());
        assert!(err.violations().is_empty());
    }
}
