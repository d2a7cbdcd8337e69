//! Volume, `volumes_from`, link and tmpfs conversion.

use std::collections::HashMap;

use crate::config::service_configs::ServiceConfigs;

/// Splits volume entries into bind mounts and container-only volumes.
///
/// Entries containing `:` carry a source and are binds; the rest are
/// anonymous volumes. Declaration order is kept within each group.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::volumes::partition_volumes;
///
/// let volumes = vec![
///     "/data".to_string(),
///     "./src:/app:ro".to_string(),
///     "cache:/cache".to_string(),
/// ];
/// let (binds, anonymous) = partition_volumes(&volumes);
/// assert_eq!(binds, vec!["./src:/app:ro", "cache:/cache"]);
/// assert_eq!(anonymous, vec!["/data"]);
/// ```
#[must_use]
pub fn partition_volumes(volumes: &[String]) -> (Vec<String>, Vec<String>) {
    volumes.iter().cloned().partition(|volume| volume.contains(':'))
}

/// Name of the first container of `service`, honouring `container_name`.
fn container_name(project: &str, service: &str, services: &ServiceConfigs) -> Option<String> {
    let config = services.get(service)?;
    if config.container_name.is_empty() {
        Some(format!("{project}_{service}_1"))
    } else {
        Some(config.container_name)
    }
}

/// Resolves `volumes_from` entries to container names.
///
/// An entry is `name[:ro|:rw]`, optionally prefixed with `container:` or
/// `service:`. Names of project services become their container name;
/// anything else is taken as a literal container reference.
#[must_use]
pub fn resolve_volumes_from(
    project: &str,
    entries: &[String],
    services: &ServiceConfigs,
) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let entry = entry
                .strip_prefix("container:")
                .or_else(|| entry.strip_prefix("service:"))
                .unwrap_or(entry);
            let (name, mode) = match entry.rsplit_once(':') {
                Some((name, mode)) if mode == "ro" || mode == "rw" => (name, Some(mode)),
                _ => (entry, None),
            };
            let resolved =
                container_name(project, name, services).unwrap_or_else(|| name.to_string());
            match mode {
                Some(mode) => format!("{resolved}:{mode}"),
                None => resolved,
            }
        })
        .collect()
}

/// Turns `service[:alias]` links into `container:alias` pairs.
///
/// The alias defaults to the linked name.
#[must_use]
pub fn resolve_links(project: &str, links: &[String], services: &ServiceConfigs) -> Vec<String> {
    links
        .iter()
        .map(|link| {
            let (name, alias) = link.split_once(':').unwrap_or((link.as_str(), link.as_str()));
            let target = container_name(project, name, services).unwrap_or_else(|| name.to_string());
            format!("{target}:{alias}")
        })
        .collect()
}

/// Converts `path[:options]` tmpfs entries into a path to options map.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::volumes::tmpfs_map;
///
/// let map = tmpfs_map(&["/run".to_string(), "/tmp:size=64m,mode=1777".to_string()]);
/// assert_eq!(map["/run"], "");
/// assert_eq!(map["/tmp"], "size=64m,mode=1777");
/// ```
#[must_use]
pub fn tmpfs_map(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once(':') {
            Some((path, options)) => (path.to_string(), options.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ServiceConfig;

    fn services() -> ServiceConfigs {
        let services = ServiceConfigs::new();
        services.add("data", ServiceConfig::default());
        services.add(
            "named",
            ServiceConfig {
                container_name: "my-named".to_string(),
                ..Default::default()
            },
        );
        services
    }

    #[test]
    fn test_partition_preserves_order() {
        let volumes: Vec<String> = ["/a", "/x:/b", "/c", "v:/d"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let (binds, anonymous) = partition_volumes(&volumes);
        assert_eq!(binds, vec!["/x:/b", "v:/d"]);
        assert_eq!(anonymous, vec!["/a", "/c"]);
    }

    #[test]
    fn test_volumes_from_resolution() {
        let entries: Vec<String> = ["data", "named:ro", "external_box", "container:data:rw"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let resolved = resolve_volumes_from("proj", &entries, &services());
        assert_eq!(
            resolved,
            vec!["proj_data_1", "my-named:ro", "external_box", "proj_data_1:rw"]
        );
    }

    #[test]
    fn test_links_resolution() {
        let links = vec!["data".to_string(), "named:db".to_string(), "other:o".to_string()];
        let resolved = resolve_links("proj", &links, &services());
        assert_eq!(resolved, vec!["proj_data_1:data", "my-named:db", "other:o"]);
    }

    #[test]
    fn test_tmpfs_without_options() {
        let map = tmpfs_map(&["/run".to_string()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map["/run"], "");
    }
}
