//! The merge pipeline for one compose file layer.
//!
//! [`Merger::merge`] takes the bytes of a compose file and the services
//! accumulated from earlier layers, and produces the typed [`Config`] for
//! this layer:
//!
//! 1. template expansion
//! 2. raw parsing and version detection
//! 3. interpolation of services, containers, volumes and networks
//! 4. preprocessing and numeric coercion
//! 5. schema validation
//! 6. per-service `env_file`, build context, front-end and `extends` resolution
//! 7. typing, then a raw-level merge against any existing service of the same name
//!
//! The accumulator is never modified here; committing the result is the
//! caller's decision (see [`crate::project::Project`]).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::config::extends::ServiceResolver;
use crate::config::interpolation::{interpolate_declarations, interpolate_services};
use crate::config::merge::ConfigMerger;
use crate::config::preprocess::{numeric_fields, preprocess_service_map, try_convert_strings_to_ints};
use crate::config::raw::{create_raw_config, to_raw_service, RawConfig, RawService, RawServiceMap};
use crate::config::service_configs::ServiceConfigs;
use crate::config::template::{apply_template, EnvironmentInfo, StackInfo};
use crate::config::types::{Config, ServiceConfig};
use crate::config::validator::Validator;
use crate::error::{Error, Result};
use crate::lookup::{EnvironmentLookup, ResourceLookup};

/// Switches for the optional pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Substitute `${VAR}` references.
    pub interpolate: bool,
    /// Validate services against the versioned schema.
    pub validate: bool,
    /// Render the file as a template before parsing.
    pub template: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            interpolate: true,
            validate: true,
            template: true,
        }
    }
}

/// Merges compose file layers into typed configuration.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rancher_compose::config::{Merger, ServiceConfigs, Validator};
///
/// let merger = Merger::new(Arc::new(Validator::new().unwrap()));
/// let existing = ServiceConfigs::new();
///
/// let config = merger
///     .merge(&existing, "docker-compose.yml", b"web:\n  image: nginx\n  restart: no\n")
///     .unwrap();
/// assert_eq!(config.services["web"].image, "nginx");
/// assert_eq!(config.services["web"].restart, "no");
/// ```
pub struct Merger {
    validator: Arc<Validator>,
    environment_lookup: Option<Arc<dyn EnvironmentLookup>>,
    resource_lookup: Option<Arc<dyn ResourceLookup>>,
    stack: StackInfo,
    environment: EnvironmentInfo,
    options: MergeOptions,
    numeric_fields: HashSet<&'static str>,
}

impl Merger {
    /// Creates a merger with no lookups and every stage enabled.
    #[must_use]
    pub fn new(validator: Arc<Validator>) -> Self {
        Self {
            validator,
            environment_lookup: None,
            resource_lookup: None,
            stack: StackInfo::default(),
            environment: EnvironmentInfo::default(),
            options: MergeOptions::default(),
            numeric_fields: numeric_fields(),
        }
    }

    /// Sets the source of interpolation variables.
    #[must_use]
    pub fn with_environment_lookup(mut self, lookup: Arc<dyn EnvironmentLookup>) -> Self {
        self.environment_lookup = Some(lookup);
        self
    }

    /// Sets the loader for `env_file`, `extends` and build context paths.
    #[must_use]
    pub fn with_resource_lookup(mut self, lookup: Arc<dyn ResourceLookup>) -> Self {
        self.resource_lookup = Some(lookup);
        self
    }

    /// Sets the stack exposed to templates.
    #[must_use]
    pub fn with_stack(mut self, stack: StackInfo) -> Self {
        self.stack = stack;
        self
    }

    /// Sets the environment exposed to templates.
    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentInfo) -> Self {
        self.environment = environment;
        self
    }

    /// Enables or disables optional stages.
    #[must_use]
    pub fn with_options(mut self, options: MergeOptions) -> Self {
        self.options = options;
        self
    }

    /// The shared schema validator.
    #[must_use]
    pub fn validator(&self) -> &Arc<Validator> {
        &self.validator
    }

    /// The configured environment lookup, if any.
    #[must_use]
    pub fn environment_lookup(&self) -> Option<&Arc<dyn EnvironmentLookup>> {
        self.environment_lookup.as_ref()
    }

    /// Merges one compose file over the services in `existing`.
    ///
    /// The returned [`Config`] holds every service declared by `file`,
    /// already merged with its counterpart in `existing`.
    ///
    /// # Errors
    ///
    /// Any pipeline failure, wrapped in [`Error::InFile`] naming `file`.
    pub fn merge(&self, existing: &ServiceConfigs, file: &str, contents: &[u8]) -> Result<Config> {
        self.merge_layer(existing, file, contents)
            .map_err(|err| err.in_file(file))
    }

    fn merge_layer(&self, existing: &ServiceConfigs, file: &str, contents: &[u8]) -> Result<Config> {
        let raw = self.load_raw(file, contents)?;

        let load = |other: &str, bytes: &[u8]| self.load_raw(other, bytes);
        let resolver = ServiceResolver::new(self.resource_lookup.as_deref(), &load);

        let mut services = BTreeMap::new();
        for name in raw.services.keys() {
            let resolved = resolver.resolve(&raw.services, raw.version, name, file)?;
            let mut config = to_service_config(name, resolved)?;
            if let Some(previous) = existing.get(name) {
                log::debug!("merging service '{name}' over existing definition");
                let merged = ConfigMerger::merge_service(
                    to_raw_map(name, &previous)?,
                    to_raw_map(name, &config)?,
                );
                config = to_service_config(name, merged)?;
            }
            ConfigMerger::adjust_values(&mut config);
            services.insert(name.clone(), config);
        }

        let mut containers = BTreeMap::new();
        for name in raw.containers.keys() {
            let resolved = resolver.resolve(&raw.containers, raw.version, name, file)?;
            let mut config = to_service_config(name, resolved)?;
            ConfigMerger::adjust_values(&mut config);
            containers.insert(name.clone(), config);
        }

        log::info!(
            "merged {} service(s) and {} container(s) from {file}",
            services.len(),
            containers.len()
        );

        Ok(Config {
            services,
            containers,
            dependencies: decode_all("dependency", raw.dependencies)?,
            volumes: decode_all("volume", raw.volumes)?,
            networks: decode_all("network", raw.networks)?,
            secrets: decode_all("secret", raw.secrets)?,
            hosts: decode_all("host", raw.hosts)?,
        })
    }

    /// Runs the file-level stages, producing validated raw maps.
    fn load_raw(&self, file: &str, contents: &[u8]) -> Result<RawConfig> {
        let contents = if self.options.template {
            apply_template(contents, &self.stack, &self.environment)?
        } else {
            contents.to_vec()
        };

        let mut raw = create_raw_config(&contents)?;
        log::debug!("{file}: detected version {}", raw.version);

        if self.options.interpolate {
            if let Some(lookup) = self.environment_lookup.as_deref() {
                interpolate_services(&mut raw.services, lookup)?;
                interpolate_services(&mut raw.containers, lookup)?;
                interpolate_declarations(&mut raw.volumes, lookup)?;
                interpolate_declarations(&mut raw.networks, lookup)?;
            }
        }

        raw.services = self.normalize(std::mem::take(&mut raw.services))?;
        raw.containers = self.normalize(std::mem::take(&mut raw.containers))?;

        if self.options.validate {
            self.validator.validate(raw.version, &raw.services)?;
            self.validator.validate(raw.version, &raw.containers)?;
        }
        Ok(raw)
    }

    fn normalize(&self, services: RawServiceMap) -> Result<RawServiceMap> {
        let services = preprocess_service_map(services)?;
        try_convert_strings_to_ints(services, &self.numeric_fields)
    }
}

fn to_service_config(name: &str, raw: RawService) -> Result<ServiceConfig> {
    let mapping: Mapping = raw
        .into_iter()
        .map(|(field, value)| (Value::String(field), value))
        .collect();
    serde_yaml::from_value(Value::Mapping(mapping)).map_err(|e| Error::InvalidService {
        service: name.to_string(),
        message: e.to_string(),
    })
}

fn to_raw_map(name: &str, config: &ServiceConfig) -> Result<RawService> {
    let value = serde_yaml::to_value(config).map_err(|e| Error::InvalidService {
        service: name.to_string(),
        message: e.to_string(),
    })?;
    to_raw_service(name, value)
}

/// Types a declaration map; `null` entries become defaults.
fn decode_all<T>(kind: &str, raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, T>>
where
    T: DeserializeOwned + Default,
{
    raw.into_iter()
        .map(|(name, value)| {
            let decoded = match value {
                Value::Null => T::default(),
                other => serde_yaml::from_value(other).map_err(|e| Error::InvalidDeclaration {
                    kind: kind.to_string(),
                    name: name.clone(),
                    message: e.to_string(),
                })?,
            };
            Ok((name, decoded))
        })
        .collect()
}
