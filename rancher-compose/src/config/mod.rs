//! Compose file parsing, validation and merging.
//!
//! This module turns compose file layers into typed configuration:
//! - Raw YAML ingestion with version 1 / version 2 detection
//! - Variable interpolation and template expansion
//! - JSON schema validation with per-field type reporting
//! - `extends`, `env_file` and build context resolution
//! - Field-level merging of successive layers
//!
//! # Merge Precedence
//!
//! Layers are merged in the order they are given, later layers overriding
//! earlier ones:
//!
//! 1. Scalars in a later layer replace earlier values
//! 2. Maps are unioned key by key
//! 3. Lists are concatenated, except `links` and `volumes_from`
//! 4. `image` and `build` displace each other
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use rancher_compose::config::{Merger, ServiceConfigs, Validator};
//!
//! let merger = Merger::new(Arc::new(Validator::new().unwrap()));
//! let services = ServiceConfigs::new();
//!
//! let base = merger
//!     .merge(&services, "docker-compose.yml", b"web:\n  image: nginx\n  dns: [1.1.1.1]\n")
//!     .unwrap();
//! for (name, service) in base.services {
//!     services.add(name, service);
//! }
//!
//! let layer = merger
//!     .merge(&services, "rancher-compose.yml", b"web:\n  scale: 3\n  dns: [8.8.8.8]\n")
//!     .unwrap();
//! let web = &layer.services["web"];
//! assert_eq!(web.image, "nginx");
//! assert_eq!(web.dns.0, vec!["1.1.1.1", "8.8.8.8"]);
//! ```

pub mod extends;
pub mod frontend;
pub mod interpolation;
pub mod merge;
pub mod merger;
pub mod preprocess;
pub mod raw;
pub mod resources;
pub mod schema;
pub mod service_configs;
pub mod template;
pub mod types;
pub mod validator;
pub mod yaml_types;

#[cfg(all(test, feature = "property-tests"))]
mod proptests;

// Re-export key types at module root
pub use merge::ConfigMerger;
pub use merger::{MergeOptions, Merger};
pub use raw::{create_raw_config, ComposeVersion, RawConfig, RawService, RawServiceMap};
pub use service_configs::ServiceConfigs;
pub use template::{EnvironmentInfo, StackInfo};
pub use types::{
    Config, DependencyConfig, External, Healthcheck, HostConfig, LbConfig, Log, NetworkConfig,
    SecretConfig, ServiceConfig, VolumeConfig,
};
pub use validator::{Validator, Violation};
pub use yaml_types::{
    Build, Command, MaporColonSlice, MaporEqualSlice, MemStringOrInt, Networks, SliceorMap,
    StringOrInt, StringOrSlice, Ulimits,
};
