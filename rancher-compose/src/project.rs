//! Multi-file project loading.
//!
//! A [`Project`] owns the accumulators for one run: every compose file layer
//! is merged against what earlier layers produced, and the result is only
//! committed once the whole layer merged successfully.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::config::merger::Merger;
use crate::config::service_configs::ServiceConfigs;
use crate::config::types::{
    Config, DependencyConfig, HostConfig, NetworkConfig, SecretConfig, ServiceConfig, VolumeConfig,
};
use crate::convert::{convert, ContainerDescriptor, ConvertContext};
use crate::error::{Error, Result};

/// Lowercases `name` and drops every character that is not alphanumeric,
/// `-` or `_`.
///
/// # Examples
///
/// ```
/// use rancher_compose::project::normalize_project_name;
///
/// assert_eq!(normalize_project_name("My App.v2"), "myappv2");
/// assert_eq!(normalize_project_name("web_stack-1"), "web_stack-1");
/// ```
#[must_use]
pub fn normalize_project_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// The merged state of a set of compose files.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rancher_compose::config::{Merger, Validator};
/// use rancher_compose::project::Project;
///
/// let merger = Merger::new(Arc::new(Validator::new().unwrap()));
/// let mut project = Project::new("demo", merger);
/// project.parse_bytes("docker-compose.yml", b"web:\n  image: nginx\n").unwrap();
/// project.parse_bytes("rancher-compose.yml", b"web:\n  scale: 2\n").unwrap();
///
/// let web = project.services().get("web").unwrap();
/// assert_eq!(web.image, "nginx");
/// assert_eq!(web.scale.map(|s| s.0), Some(2));
/// ```
pub struct Project {
    name: String,
    merger: Merger,
    files: Vec<String>,
    services: ServiceConfigs,
    containers: BTreeMap<String, ServiceConfig>,
    dependencies: BTreeMap<String, DependencyConfig>,
    volumes: BTreeMap<String, VolumeConfig>,
    networks: BTreeMap<String, NetworkConfig>,
    secrets: BTreeMap<String, SecretConfig>,
    hosts: BTreeMap<String, HostConfig>,
}

impl Project {
    /// Creates an empty project.
    #[must_use]
    pub fn new(name: impl Into<String>, merger: Merger) -> Self {
        Self {
            name: name.into(),
            merger,
            files: Vec::new(),
            services: ServiceConfigs::new(),
            containers: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            volumes: BTreeMap::new(),
            networks: BTreeMap::new(),
            secrets: BTreeMap::new(),
            hosts: BTreeMap::new(),
        }
    }

    /// Project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Files merged so far, in order.
    #[must_use]
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Reads and merges the compose file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InFile`] wrapping the I/O error or merge failure.
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        let file = path.display().to_string();
        let contents = fs::read(path).map_err(|err| Error::from(err).in_file(&file))?;
        self.parse_bytes(&file, &contents)
    }

    /// Merges `contents`, read from `file`, as the next layer.
    ///
    /// Nothing is committed if the layer fails.
    ///
    /// # Errors
    ///
    /// Any merge pipeline failure, wrapped in [`Error::InFile`].
    pub fn parse_bytes(&mut self, file: &str, contents: &[u8]) -> Result<()> {
        let config = self.merger.merge(&self.services, file, contents)?;
        self.commit(config);
        self.files.push(file.to_string());
        Ok(())
    }

    fn commit(&mut self, config: Config) {
        for (name, service) in config.services {
            self.services.add(name, service);
        }
        self.containers.extend(config.containers);
        self.dependencies.extend(config.dependencies);
        self.volumes.extend(config.volumes);
        self.networks.extend(config.networks);
        self.secrets.extend(config.secrets);
        self.hosts.extend(config.hosts);
    }

    /// Merged services.
    #[must_use]
    pub fn services(&self) -> &ServiceConfigs {
        &self.services
    }

    /// Standalone containers.
    #[must_use]
    pub fn containers(&self) -> &BTreeMap<String, ServiceConfig> {
        &self.containers
    }

    /// Volume declarations.
    #[must_use]
    pub fn volumes(&self) -> &BTreeMap<String, VolumeConfig> {
        &self.volumes
    }

    /// Network declarations.
    #[must_use]
    pub fn networks(&self) -> &BTreeMap<String, NetworkConfig> {
        &self.networks
    }

    /// Secret declarations.
    #[must_use]
    pub fn secrets(&self) -> &BTreeMap<String, SecretConfig> {
        &self.secrets
    }

    /// Host declarations.
    #[must_use]
    pub fn hosts(&self) -> &BTreeMap<String, HostConfig> {
        &self.hosts
    }

    /// Catalog dependencies.
    #[must_use]
    pub fn dependencies(&self) -> &BTreeMap<String, DependencyConfig> {
        &self.dependencies
    }

    /// The merged configuration of every layer so far.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            services: self.services.all(),
            containers: self.containers.clone(),
            dependencies: self.dependencies.clone(),
            volumes: self.volumes.clone(),
            networks: self.networks.clone(),
            secrets: self.secrets.clone(),
            hosts: self.hosts.clone(),
        }
    }

    fn convert_context(&self) -> ConvertContext<'_> {
        let ctx = ConvertContext::new(&self.name, &self.services);
        match self.merger.environment_lookup() {
            Some(lookup) => ctx.with_environment_lookup(&**lookup),
            None => ctx,
        }
    }

    /// Converts one service into its API descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceNotFound`] for unknown services, or the
    /// conversion failure wrapped with the service name.
    pub fn container_config(&self, service: &str) -> Result<ContainerDescriptor> {
        let config = self
            .services
            .get(service)
            .ok_or_else(|| Error::ServiceNotFound {
                service: service.to_string(),
            })?;
        convert(&config, &self.convert_context()).map_err(|err| Error::InvalidService {
            service: service.to_string(),
            message: err.to_string(),
        })
    }

    /// Converts every service, keyed by name.
    ///
    /// # Errors
    ///
    /// Returns the first conversion failure.
    pub fn container_configs(&self) -> Result<BTreeMap<String, ContainerDescriptor>> {
        self.services
            .keys()
            .into_iter()
            .map(|name| {
                let descriptor = self.container_config(&name)?;
                Ok((name, descriptor))
            })
            .collect()
    }
}
