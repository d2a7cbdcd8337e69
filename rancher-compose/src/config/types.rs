//! Typed configuration produced by the merge pipeline.
//!
//! [`ServiceConfig`] is the single canonical service shape for both compose
//! versions; version 1 documents are rewritten into it by the front-end in
//! [`crate::config::frontend`]. Every field is optional in the sense that an
//! unset field serializes to nothing, which is what lets typed configs be
//! turned back into raw maps and merged field by field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::config::yaml_types::{
    lenient_string, lenient_string_list, lenient_string_map, Build, Command, MaporColonSlice,
    MaporEqualSlice, MemStringOrInt, Networks, SliceorMap, StringOrInt, StringOrSlice, Ulimits,
};

/// Logging driver settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log driver name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub driver: String,
    /// Driver options.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "lenient_string_map")]
    pub options: BTreeMap<String, String>,
}

impl Log {
    /// Returns true when neither driver nor options are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.driver.is_empty() && self.options.is_empty()
    }
}

/// Docker-native container health check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Healthcheck {
    /// Test command; a string runs through the shell.
    #[serde(skip_serializing_if = "StringOrSlice::is_empty")]
    pub test: StringOrSlice,
    /// Time between checks, as a duration string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub interval: String,
    /// Time before a check is considered hung.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timeout: String,
    /// Consecutive failures before the container is unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<StringOrInt>,
    /// Grace period after start.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_period: String,
    /// Disables any health check inherited from the image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable: Option<bool>,
}

/// A load balancer routing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct PortRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub protocol: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub service: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub hostname: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub selector: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub container: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub environment: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub region: String,
}

/// Load balancer settings folded in from a `load_balancers` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbConfig {
    /// Routing rules.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_rules: Vec<PortRule>,
    /// Certificate names.
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_string_list")]
    pub certs: Vec<String>,
    /// Certificate served when no SNI match exists.
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub default_cert: String,
    /// Sticky session policy, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stickiness_policy: Option<Value>,
    /// Raw haproxy configuration appended to the generated one.
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub config: String,
}

/// Rancher-managed health check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct RancherHealthCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initializing_timeout: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reinitializing_timeout: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub request_line: String,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub strategy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recreate_on_quorum_strategy_config: Option<Value>,
}

/// Storage driver settings folded in from a `storage_drivers` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct StorageDriver {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub volume_access_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub block_device_path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_capabilities: Vec<String>,
}

/// Network driver settings folded in from a `network_drivers` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct NetworkDriver {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_network: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cni_config: Option<Value>,
}

/// Rolling upgrade parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct UpgradeStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_millis: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_first: Option<bool>,
}

/// A fully typed service definition.
///
/// Deserialized from a raw service map after interpolation, preprocessing,
/// `extends`/`env_file` resolution and version normalization.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::ServiceConfig;
///
/// let service: ServiceConfig = serde_yaml::from_str(
///     "image: nginx\nports: [\"80:80\"]\nenvironment:\n  FOO: bar\n",
/// )
/// .unwrap();
/// assert_eq!(service.image, "nginx");
/// assert_eq!(service.environment.0, vec!["FOO=bar"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Build::is_empty")]
    pub build: Build,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_add: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cap_drop: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cgroup_parent: String,
    #[serde(skip_serializing_if = "Command::is_empty")]
    pub command: Command,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_quota: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_period: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub cpuset: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(skip_serializing_if = "StringOrSlice::is_empty")]
    pub dns: StringOrSlice,
    #[serde(skip_serializing_if = "StringOrSlice::is_empty")]
    pub dns_opt: StringOrSlice,
    #[serde(skip_serializing_if = "StringOrSlice::is_empty")]
    pub dns_search: StringOrSlice,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domainname: String,
    #[serde(skip_serializing_if = "Command::is_empty")]
    pub entrypoint: Command,
    #[serde(skip_serializing_if = "MaporEqualSlice::is_empty")]
    pub environment: MaporEqualSlice,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_string_list")]
    pub expose: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_links: Vec<String>,
    #[serde(skip_serializing_if = "MaporColonSlice::is_empty")]
    pub extra_hosts: MaporColonSlice,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_string_list")]
    pub group_add: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipc: String,
    #[serde(skip_serializing_if = "SliceorMap::is_empty")]
    pub labels: SliceorMap,
    #[serde(skip_serializing_if = "MaporColonSlice::is_empty")]
    pub links: MaporColonSlice,
    #[serde(skip_serializing_if = "Log::is_empty")]
    pub logging: Log,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mac_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<MemStringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_reservation: Option<MemStringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memswap_limit: Option<MemStringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_swappiness: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network_mode: String,
    #[serde(skip_serializing_if = "Networks::is_empty")]
    pub networks: Networks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oom_kill_disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oom_score_adj: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pids_limit: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient_string_list")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub restart: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_opt: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shm_size: Option<MemStringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin_open: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stop_grace_period: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stop_signal: String,
    #[serde(skip_serializing_if = "SliceorMap::is_empty")]
    pub sysctls: SliceorMap,
    #[serde(skip_serializing_if = "StringOrSlice::is_empty")]
    pub tmpfs: StringOrSlice,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    #[serde(skip_serializing_if = "Ulimits::is_empty")]
    pub ulimits: Ulimits,
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub user: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub userns_mode: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uts: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub volume_driver: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub working_dir: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blkio_weight: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blkio_weight_device: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_read_bps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_read_iops: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_write_bps: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub device_write_iops: Vec<String>,

    // Rancher extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_min: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_max: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_increment: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain_ip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_on_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout_ms: Option<StringOrInt>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb_config: Option<LbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<RancherHealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_driver: Option<StorageDriver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_driver: Option<NetworkDriver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_strategy: Option<UpgradeStrategy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpu: Option<StringOrInt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<StringOrInt>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub userdata: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Value>,
}

/// Normalized `external` marker for volumes, networks and secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum External {
    /// `external: true` or `external: false`.
    Flag(bool),
    /// `external: {name: ...}`.
    Named {
        /// Name of the pre-existing resource.
        name: String,
    },
    /// Not declared.
    #[default]
    #[serde(skip)]
    Unset,
}

impl External {
    /// Returns true when the resource is managed outside the project.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Flag(true) | Self::Named { .. })
    }

    fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

/// A top-level volume declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Volume driver.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub driver: String,
    /// Driver options.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "lenient_string_map")]
    pub driver_opts: BTreeMap<String, String>,
    /// Whether the volume already exists outside the project.
    #[serde(skip_serializing_if = "External::is_unset")]
    pub external: External,
    /// Rancher: create one volume per container instead of one per stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_container: Option<bool>,
}

/// IPAM pool settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct IpamConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subnet: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ip_range: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub gateway: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aux_addresses: BTreeMap<String, String>,
}

/// IP address management for a network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ipam {
    /// IPAM driver.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub driver: String,
    /// Address pools.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config: Vec<IpamConfig>,
}

/// A top-level network declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Network driver.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub driver: String,
    /// Driver options.
    #[serde(skip_serializing_if = "BTreeMap::is_empty", deserialize_with = "lenient_string_map")]
    pub driver_opts: BTreeMap<String, String>,
    /// Whether the network already exists outside the project.
    #[serde(skip_serializing_if = "External::is_unset")]
    pub external: External,
    /// Address management.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipam: Option<Ipam>,
}

/// A top-level secret declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    /// File holding the secret value.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub file: String,
    /// Whether the secret already exists outside the project.
    #[serde(skip_serializing_if = "External::is_unset")]
    pub external: External,
}

/// A Rancher host template declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Number of hosts to create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<StringOrInt>,
    /// Host template name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host_template: String,
    /// Host labels.
    #[serde(skip_serializing_if = "SliceorMap::is_empty")]
    pub labels: SliceorMap,
    /// Driver-specific settings (`amazonec2Config`, ...).
    #[serde(flatten)]
    pub driver_config: BTreeMap<String, Value>,
}

/// A dependency on another catalog template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    /// Template name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub template: String,
    /// Template version.
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "lenient_string")]
    pub version: String,
}

/// The typed result of merging one compose file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
    /// Services defined or overridden by the file, merged with prior layers.
    pub services: BTreeMap<String, ServiceConfig>,
    /// Standalone containers defined by the file.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub containers: BTreeMap<String, ServiceConfig>,
    /// Catalog template dependencies.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, DependencyConfig>,
    /// Volume declarations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, VolumeConfig>,
    /// Network declarations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Secret declarations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretConfig>,
    /// Host declarations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hosts: BTreeMap<String, HostConfig>,
}
