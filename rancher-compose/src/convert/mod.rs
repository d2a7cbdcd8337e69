//! Conversion of typed services into container API descriptors.
//!
//! [`convert`] turns one merged [`ServiceConfig`] into the container config
//! and host config an orchestration client submits when creating a
//! container. Every malformed value (port spec, restart policy, device,
//! block IO entry, duration) is a hard error.

pub mod devices;
pub mod health;
pub mod ports;
pub mod resources;
pub mod restart;
pub mod volumes;

use std::collections::HashMap;

use bollard::container::Config as ContainerConfig;
use bollard::models::{HostConfig, HostConfigLogConfig, PortBinding};
use serde::Serialize;

use crate::config::service_configs::ServiceConfigs;
use crate::config::types::ServiceConfig;
use crate::error::Result;
use crate::lookup::EnvironmentLookup;

pub use ports::{collect_ports, PortSet};

/// Everything outside the service itself that conversion depends on.
#[derive(Clone, Copy)]
pub struct ConvertContext<'a> {
    /// Project name, used to derive container names.
    pub project_name: &'a str,
    /// Every service of the project, for `links` and `volumes_from`.
    pub services: &'a ServiceConfigs,
    /// Source for bare `KEY` environment entries.
    pub environment_lookup: Option<&'a dyn EnvironmentLookup>,
}

impl<'a> ConvertContext<'a> {
    /// Creates a context without an environment lookup.
    #[must_use]
    pub fn new(project_name: &'a str, services: &'a ServiceConfigs) -> Self {
        Self {
            project_name,
            services,
            environment_lookup: None,
        }
    }

    /// Sets the lookup consulted for bare environment entries.
    #[must_use]
    pub fn with_environment_lookup(mut self, lookup: &'a dyn EnvironmentLookup) -> Self {
        self.environment_lookup = Some(lookup);
        self
    }
}

/// The API descriptors for one service.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerDescriptor {
    /// Container-level settings.
    pub config: ContainerConfig<String>,
    /// Host-level settings.
    pub host_config: HostConfig,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn non_empty_list(values: &[String]) -> Option<Vec<String>> {
    (!values.is_empty()).then(|| values.to_vec())
}

/// Resolves bare entries and keeps the last value of each key.
///
/// A bare `KEY` takes its value from the lookup and is dropped when the
/// variable is unknown. Each key keeps the position of its first occurrence.
fn resolve_environment(
    service: &ServiceConfig,
    lookup: Option<&dyn EnvironmentLookup>,
) -> Vec<String> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for entry in &service.environment.0 {
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => {
                let Some(value) = lookup
                    .and_then(|lookup| lookup.lookup(entry, Some(service)).into_iter().next())
                else {
                    log::debug!("dropping unset environment variable {entry}");
                    continue;
                };
                (entry.clone(), value)
            }
        };
        match positions.get(&key) {
            Some(&index) => entries[index].1 = value,
            None => {
                positions.insert(key.clone(), entries.len());
                entries.push((key, value));
            }
        }
    }

    entries
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect()
}

fn stop_timeout_seconds(service: &ServiceConfig) -> Result<Option<i64>> {
    if service.stop_grace_period.is_empty() {
        return Ok(None);
    }
    let nanos = health::parse_duration("stop_grace_period", &service.stop_grace_period)?;
    Ok(Some(nanos / 1_000_000_000))
}

fn port_bindings(set: &PortSet) -> HashMap<String, Option<Vec<PortBinding>>> {
    set.bindings
        .iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .iter()
                .map(|binding| PortBinding {
                    host_ip: non_empty(&binding.host_ip),
                    host_port: non_empty(&binding.host_port),
                })
                .collect();
            (port.clone(), Some(bindings))
        })
        .collect()
}

fn build_host_config(
    service: &ServiceConfig,
    ctx: &ConvertContext<'_>,
    ports: &PortSet,
    binds: Vec<String>,
) -> Result<HostConfig> {
    let mut host = HostConfig {
        binds: (!binds.is_empty()).then_some(binds),
        port_bindings: (!ports.bindings.is_empty()).then(|| port_bindings(ports)),
        restart_policy: restart::parse_restart_policy(&service.restart)?,
        devices: (!service.devices.is_empty())
            .then(|| devices::parse_devices(&service.devices))
            .transpose()?,
        links: (!service.links.is_empty())
            .then(|| volumes::resolve_links(ctx.project_name, &service.links.0, ctx.services)),
        volumes_from: (!service.volumes_from.is_empty()).then(|| {
            volumes::resolve_volumes_from(ctx.project_name, &service.volumes_from, ctx.services)
        }),
        tmpfs: (!service.tmpfs.is_empty()).then(|| volumes::tmpfs_map(&service.tmpfs.0)),
        cap_add: non_empty_list(&service.cap_add),
        cap_drop: non_empty_list(&service.cap_drop),
        dns: non_empty_list(&service.dns.0),
        dns_options: non_empty_list(&service.dns_opt.0),
        dns_search: non_empty_list(&service.dns_search.0),
        extra_hosts: non_empty_list(&service.extra_hosts.0),
        group_add: non_empty_list(&service.group_add),
        security_opt: non_empty_list(&service.security_opt),
        network_mode: non_empty(&service.network_mode),
        pid_mode: non_empty(&service.pid),
        ipc_mode: non_empty(&service.ipc),
        uts_mode: non_empty(&service.uts),
        userns_mode: non_empty(&service.userns_mode),
        cgroup_parent: non_empty(&service.cgroup_parent),
        volume_driver: non_empty(&service.volume_driver),
        privileged: service.privileged,
        readonly_rootfs: service.read_only,
        shm_size: service.shm_size.map(|v| v.0),
        oom_score_adj: service.oom_score_adj.map(|v| v.0),
        sysctls: (!service.sysctls.is_empty())
            .then(|| service.sysctls.0.clone().into_iter().collect()),
        log_config: (!service.logging.is_empty()).then(|| HostConfigLogConfig {
            typ: non_empty(&service.logging.driver),
            config: Some(service.logging.options.clone().into_iter().collect()),
        }),
        ..Default::default()
    };
    resources::apply_resources(service, &mut host)?;
    Ok(host)
}

/// Converts a merged service into its container and host descriptors.
///
/// # Errors
///
/// Returns [`crate::Error::Conversion`] naming the offending field and value
/// for any malformed port, restart policy, device, block IO entry or
/// duration.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{ServiceConfig, ServiceConfigs};
/// use rancher_compose::convert::{convert, ConvertContext};
///
/// let service: ServiceConfig =
///     serde_yaml::from_str("image: nginx\nports: ['8080:80']\nrestart: always\n").unwrap();
/// let services = ServiceConfigs::new();
/// let descriptor = convert(&service, &ConvertContext::new("demo", &services)).unwrap();
///
/// assert_eq!(descriptor.config.image.as_deref(), Some("nginx"));
/// assert!(descriptor.config.labels.unwrap().is_empty());
/// let bindings = descriptor.host_config.port_bindings.unwrap();
/// assert_eq!(bindings["80/tcp"].as_ref().unwrap()[0].host_port.as_deref(), Some("8080"));
/// ```
pub fn convert(service: &ServiceConfig, ctx: &ConvertContext<'_>) -> Result<ContainerDescriptor> {
    let ports = collect_ports(&service.ports, &service.expose)?;
    let (binds, anonymous) = volumes::partition_volumes(&service.volumes);

    let exposed_ports: HashMap<String, HashMap<(), ()>> = ports
        .exposed
        .iter()
        .map(|port| (port.clone(), HashMap::new()))
        .collect();
    let volumes: HashMap<String, HashMap<(), ()>> = anonymous
        .into_iter()
        .map(|volume| (volume, HashMap::new()))
        .collect();
    let environment = resolve_environment(service, ctx.environment_lookup);
    let labels: HashMap<String, String> = service.labels.0.clone().into_iter().collect();

    let config = ContainerConfig {
        image: non_empty(&service.image),
        hostname: non_empty(&service.hostname),
        domainname: non_empty(&service.domainname),
        user: non_empty(&service.user),
        working_dir: non_empty(&service.working_dir),
        mac_address: non_empty(&service.mac_address),
        stop_signal: non_empty(&service.stop_signal),
        stop_timeout: stop_timeout_seconds(service)?.and_then(|secs| secs.try_into().ok()),
        tty: service.tty,
        open_stdin: service.stdin_open,
        cmd: non_empty_list(&service.command.0),
        entrypoint: non_empty_list(&service.entrypoint.0),
        env: (!environment.is_empty()).then_some(environment),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        volumes: (!volumes.is_empty()).then_some(volumes),
        labels: Some(labels),
        healthcheck: service
            .healthcheck
            .as_ref()
            .map(health::convert_healthcheck)
            .transpose()?,
        ..Default::default()
    };
    let host_config = build_host_config(service, ctx, &ports, binds)?;

    log::debug!(
        "converted service: {} exposed ports, {} binds",
        ports.exposed.len(),
        host_config.binds.as_ref().map_or(0, Vec::len)
    );
    Ok(ContainerDescriptor {
        config,
        host_config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::lookup::MapEnvLookup;
    use bollard::models::RestartPolicyNameEnum;

    fn service(yaml: &str) -> ServiceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn convert_yaml(yaml: &str) -> Result<ContainerDescriptor> {
        let services = ServiceConfigs::new();
        convert(&service(yaml), &ConvertContext::new("proj", &services))
    }

    #[test]
    fn test_minimal_service() {
        let descriptor = convert_yaml("image: redis").unwrap();
        assert_eq!(descriptor.config.image.as_deref(), Some("redis"));
        assert_eq!(descriptor.config.labels, Some(HashMap::new()));
        assert_eq!(descriptor.config.env, None);
        assert_eq!(descriptor.host_config.restart_policy, None);
    }

    #[test]
    fn test_full_service() {
        let descriptor = convert_yaml(
            "image: app\n\
             command: run --fast\n\
             ports: ['8080:80', '443']\n\
             expose: ['9000']\n\
             volumes: ['/data', './conf:/etc/app:ro']\n\
             restart: on-failure:2\n\
             devices: ['/dev/fuse']\n\
             tmpfs: /run\n\
             labels: {tier: web}\n\
             logging:\n  driver: syslog\n  options: {tag: app}\n\
             stop_grace_period: 1m\n",
        )
        .unwrap();
        let config = &descriptor.config;
        assert_eq!(
            config.cmd,
            Some(vec!["run".to_string(), "--fast".to_string()])
        );
        let exposed = config.exposed_ports.as_ref().unwrap();
        for port in ["80/tcp", "443/tcp", "9000/tcp"] {
            assert!(exposed.contains_key(port), "{port} missing");
        }
        assert!(config.volumes.as_ref().unwrap().contains_key("/data"));
        assert_eq!(config.labels.as_ref().unwrap()["tier"], "web");
        assert_eq!(config.stop_timeout, Some(60));

        let host = &descriptor.host_config;
        assert_eq!(host.binds, Some(vec!["./conf:/etc/app:ro".to_string()]));
        let bindings = host.port_bindings.as_ref().unwrap();
        assert!(bindings.contains_key("80/tcp"));
        assert!(!bindings.contains_key("443/tcp"));
        let policy = host.restart_policy.as_ref().unwrap();
        assert_eq!(policy.name, Some(RestartPolicyNameEnum::ON_FAILURE));
        assert_eq!(policy.maximum_retry_count, Some(2));
        assert_eq!(host.devices.as_ref().map(Vec::len), Some(1));
        assert_eq!(host.tmpfs.as_ref().unwrap()["/run"], "");
        let log_config = host.log_config.as_ref().unwrap();
        assert_eq!(log_config.typ.as_deref(), Some("syslog"));
    }

    #[test]
    fn test_environment_last_wins_and_bare_lookup() {
        let lookup = MapEnvLookup::new(HashMap::from([("HOME_DIR".to_string(), "/h".to_string())]));
        let services = ServiceConfigs::new();
        let ctx = ConvertContext::new("proj", &services).with_environment_lookup(&lookup);
        let service = service("environment: [A=1, B=2, A=3, HOME_DIR, MISSING]");

        let descriptor = convert(&service, &ctx).unwrap();
        assert_eq!(
            descriptor.config.env,
            Some(vec![
                "A=3".to_string(),
                "B=2".to_string(),
                "HOME_DIR=/h".to_string()
            ])
        );
    }

    #[test]
    fn test_links_and_volumes_from_use_project_names() {
        let services = ServiceConfigs::new();
        services.add("db", ServiceConfig::default());
        let ctx = ConvertContext::new("proj", &services);
        let descriptor = convert(&service("links: [db]\nvolumes_from: ['db:ro']"), &ctx).unwrap();
        assert_eq!(
            descriptor.host_config.links,
            Some(vec!["proj_db_1:db".to_string()])
        );
        assert_eq!(
            descriptor.host_config.volumes_from,
            Some(vec!["proj_db_1:ro".to_string()])
        );
    }

    #[test]
    fn test_errors_are_hard() {
        for yaml in [
            "ports: ['abc']",
            "restart: sometimes",
            "devices: ['/dev/a:rel']",
            "blkio_weight_device: ['/dev/sda:x']",
            "healthcheck:\n  interval: soon",
        ] {
            let err = convert_yaml(yaml).unwrap_err();
            assert!(matches!(err, Error::Conversion { .. }), "{yaml}: {err}");
        }
    }
}
