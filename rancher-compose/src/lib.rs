#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # rancher-compose
//!
//! A library for merging docker-compose style files and converting the
//! result into container API descriptors.
//!
//! This library parses version 1 and version 2 compose documents,
//! interpolates variables, validates services against the versioned JSON
//! schema, merges successive override layers field by field, and converts
//! merged services into container and host configuration.
//!
//! ## Core Types
//!
//! - [`Merger`]: The per-file merge pipeline
//! - [`ServiceConfigs`]: Services accumulated across layers
//! - [`Project`]: Multi-file loading plus conversion
//! - [`Validator`]: Versioned schema validation
//! - [`Error`] and [`Result`]: Error handling types
//! - [`Logger`] and [`LogLevel`]: Logging infrastructure
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//! use rancher_compose::{Merger, Project, Validator};
//!
//! let merger = Merger::new(Arc::new(Validator::new().unwrap()));
//! let mut project = Project::new("shop", merger);
//! project
//!     .parse_bytes("docker-compose.yml", b"web:\n  image: nginx\n  ports: ['80:80']\n")
//!     .unwrap();
//!
//! let descriptor = project.container_config("web").unwrap();
//! assert_eq!(descriptor.config.image.as_deref(), Some("nginx"));
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod project;

// Re-export key types at crate root for convenience
pub use config::{
    ComposeVersion, Config, MergeOptions, Merger, ServiceConfig, ServiceConfigs, Validator,
    Violation,
};
pub use convert::{convert, ContainerDescriptor, ConvertContext};
pub use error::{Error, Result};
pub use logging::{init_logger, LogLevel, Logger};
pub use lookup::{EnvironmentLookup, FileResourceLookup, MapEnvLookup, OsEnvLookup, ResourceLookup};
pub use project::Project;
