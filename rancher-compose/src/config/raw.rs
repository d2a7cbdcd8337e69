//! Raw document ingestion and version detection.
//!
//! [`create_raw_config`] turns compose file bytes into a [`RawConfig`]: an
//! untyped, version-tagged view of the document in which every Rancher
//! resource group (load balancers, drivers, virtual machines, external
//! services, aliases) has been folded into the service map.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::config::yaml_types::scalar_to_string;
use crate::error::{Error, Result};

/// A single service's untyped field bag.
pub type RawService = BTreeMap<String, Value>;

/// Services keyed by name.
pub type RawServiceMap = BTreeMap<String, RawService>;

/// Top-level key reserved for catalog metadata in version 1 documents.
const CATALOG_KEY: &str = ".catalog";

/// Image forced onto external services.
pub const EXTERNAL_SERVICE_IMAGE: &str = "rancher/external-service";

/// Image forced onto promoted DNS aliases.
pub const DNS_SERVICE_IMAGE: &str = "rancher/dns-service";

/// Load balancer fields moved under `lb_config`.
const LB_CONFIG_FIELDS: &[&str] = &[
    "port_rules",
    "certs",
    "default_cert",
    "stickiness_policy",
    "config",
];

/// Storage driver fields moved under `storage_driver`.
const STORAGE_DRIVER_FIELDS: &[&str] = &[
    "name",
    "description",
    "scope",
    "volume_access_mode",
    "block_device_path",
    "volume_capabilities",
];

/// Network driver fields moved under `network_driver`.
const NETWORK_DRIVER_FIELDS: &[&str] = &[
    "name",
    "description",
    "default_network",
    "network_metadata",
    "cni_config",
];

/// Compose schema version of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposeVersion {
    /// Flat service map without a `services:` wrapper.
    V1,
    /// `version: "2"` with top-level `services`, `volumes`, `networks`.
    V2,
}

impl fmt::Display for ComposeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => write!(f, "1"),
            Self::V2 => write!(f, "2"),
        }
    }
}

/// A parsed, version-tagged compose document.
///
/// All resource groups have already been folded into `services`; the other
/// maps are never absent, only empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfig {
    /// Detected schema version.
    pub version: ComposeVersion,
    /// Services, including folded resource groups.
    pub services: RawServiceMap,
    /// Standalone containers.
    pub containers: RawServiceMap,
    /// Catalog template dependencies.
    pub dependencies: BTreeMap<String, Value>,
    /// Volume declarations.
    pub volumes: BTreeMap<String, Value>,
    /// Network declarations.
    pub networks: BTreeMap<String, Value>,
    /// Secret declarations.
    pub secrets: BTreeMap<String, Value>,
    /// Host declarations.
    pub hosts: BTreeMap<String, Value>,
}

impl RawConfig {
    fn empty(version: ComposeVersion) -> Self {
        Self {
            version,
            services: RawServiceMap::new(),
            containers: RawServiceMap::new(),
            dependencies: BTreeMap::new(),
            volumes: BTreeMap::new(),
            networks: BTreeMap::new(),
            secrets: BTreeMap::new(),
            hosts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionedDocument {
    version: Option<Value>,
    services: BTreeMap<String, Value>,
    containers: BTreeMap<String, Value>,
    load_balancers: BTreeMap<String, Value>,
    storage_drivers: BTreeMap<String, Value>,
    network_drivers: BTreeMap<String, Value>,
    virtual_machines: BTreeMap<String, Value>,
    external_services: BTreeMap<String, Value>,
    aliases: BTreeMap<String, Value>,
    dependencies: BTreeMap<String, Value>,
    volumes: BTreeMap<String, Value>,
    networks: BTreeMap<String, Value>,
    secrets: BTreeMap<String, Value>,
    hosts: BTreeMap<String, Value>,
}

/// Parses compose file bytes into a [`RawConfig`].
///
/// # Errors
///
/// Returns [`Error::Parse`] if the bytes are not a YAML mapping of the
/// expected shape, and [`Error::UnsupportedVersion`] for any version other
/// than absent, `1` or `2`.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{create_raw_config, ComposeVersion};
///
/// let raw = create_raw_config(b"web:\n  image: nginx\n").unwrap();
/// assert_eq!(raw.version, ComposeVersion::V1);
/// assert!(raw.services.contains_key("web"));
///
/// let err = create_raw_config(b"version: '3'\nservices: {}\n").unwrap_err();
/// assert!(err.to_string().contains("version 3 is not supported"));
/// ```
pub fn create_raw_config(contents: &[u8]) -> Result<RawConfig> {
    let document: Value = serde_yaml::from_slice(contents).map_err(parse_error)?;
    let document = match document {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    };

    let versioned: VersionedDocument =
        serde_yaml::from_value(document.clone()).map_err(parse_error)?;

    match detect_version(versioned.version.as_ref())? {
        ComposeVersion::V1 => parse_v1(document),
        ComposeVersion::V2 => parse_v2(versioned),
    }
}

fn parse_error(err: serde_yaml::Error) -> Error {
    Error::Parse {
        message: err.to_string(),
    }
}

fn detect_version(version: Option<&Value>) -> Result<ComposeVersion> {
    let declared = match version {
        None | Some(Value::Null) => return Ok(ComposeVersion::V1),
        Some(value) => scalar_to_string(value).unwrap_or_else(|| format!("{value:?}")),
    };
    match declared.as_str() {
        "1" => Ok(ComposeVersion::V1),
        "2" => Ok(ComposeVersion::V2),
        _ => Err(Error::UnsupportedVersion { version: declared }),
    }
}

fn parse_v1(document: Value) -> Result<RawConfig> {
    let Value::Mapping(mapping) = document else {
        return Err(Error::Parse {
            message: "top level must be a mapping of services".to_string(),
        });
    };

    let mut config = RawConfig::empty(ComposeVersion::V1);
    for (key, value) in mapping {
        let name = scalar_to_string(&key).ok_or_else(|| Error::Parse {
            message: format!("invalid service name {key:?}"),
        })?;
        if name == CATALOG_KEY || name == "version" {
            continue;
        }
        let service = to_raw_service(&name, value)?;
        config.services.insert(name, service);
    }
    Ok(config)
}

fn parse_v2(document: VersionedDocument) -> Result<RawConfig> {
    let mut config = RawConfig::empty(ComposeVersion::V2);

    config.services = to_raw_services(document.services)?;
    config.containers = to_raw_services(document.containers)?;

    for (name, value) in document.load_balancers {
        let mut service = to_raw_service(&name, value)?;
        transfer_fields(&mut service, "lb_config", LB_CONFIG_FIELDS);
        config.services.insert(name, service);
    }
    for (name, value) in document.storage_drivers {
        let mut service = to_raw_service(&name, value)?;
        transfer_fields(&mut service, "storage_driver", STORAGE_DRIVER_FIELDS);
        config.services.insert(name, service);
    }
    for (name, value) in document.network_drivers {
        let mut service = to_raw_service(&name, value)?;
        transfer_fields(&mut service, "network_driver", NETWORK_DRIVER_FIELDS);
        config.services.insert(name, service);
    }
    for (name, value) in document.virtual_machines {
        let service = to_raw_service(&name, value)?;
        config.services.insert(name, service);
    }
    for (name, value) in document.external_services {
        let mut service = to_raw_service(&name, value)?;
        service.insert(
            "image".to_string(),
            Value::String(EXTERNAL_SERVICE_IMAGE.to_string()),
        );
        config.services.insert(name, service);
    }
    for (name, value) in document.aliases {
        let mut service = to_raw_service(&name, value)?;
        let Some(targets) = service.remove("services") else {
            log::debug!("alias {name} has no services, skipping");
            continue;
        };
        service.insert("links".to_string(), targets);
        service.insert(
            "image".to_string(),
            Value::String(DNS_SERVICE_IMAGE.to_string()),
        );
        config.services.insert(name, service);
    }

    config.dependencies = document.dependencies;
    config.volumes = document.volumes;
    config.networks = document.networks;
    config.secrets = document.secrets;
    config.hosts = document.hosts;
    Ok(config)
}

fn to_raw_services(group: BTreeMap<String, Value>) -> Result<RawServiceMap> {
    group
        .into_iter()
        .map(|(name, value)| {
            let service = to_raw_service(&name, value)?;
            Ok((name, service))
        })
        .collect()
}

/// Converts one service value into a raw field map.
///
/// A null service is treated as an empty one.
pub(crate) fn to_raw_service(name: &str, value: Value) -> Result<RawService> {
    match value {
        Value::Null => Ok(RawService::new()),
        Value::Mapping(mapping) => mapping
            .into_iter()
            .map(|(key, value)| {
                let field = scalar_to_string(&key).ok_or_else(|| Error::Parse {
                    message: format!("service '{name}' has an invalid field name {key:?}"),
                })?;
                Ok((field, value))
            })
            .collect(),
        other => Err(Error::Parse {
            message: format!("service '{name}' must be a mapping, got {other:?}"),
        }),
    }
}

/// Moves the named top-level fields of `service` into the `target` sub-map.
fn transfer_fields(service: &mut RawService, target: &str, fields: &[&str]) {
    let mut nested = match service.remove(target) {
        Some(Value::Mapping(existing)) => existing,
        _ => Mapping::new(),
    };
    for field in fields {
        if let Some(value) = service.remove(*field) {
            nested.insert(Value::String((*field).to_string()), value);
        }
    }
    if !nested.is_empty() {
        service.insert(target.to_string(), Value::Mapping(nested));
    }
}
