//! Device mapping parsing.

use bollard::models::DeviceMapping;

use crate::error::{Error, Result};

const DEFAULT_PERMISSIONS: &str = "rwm";

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    Error::Conversion {
        field: "devices".to_string(),
        value: raw.to_string(),
        reason: reason.into(),
    }
}

fn valid_permissions(perms: &str) -> bool {
    !perms.is_empty() && perms.len() <= 3 && perms.chars().all(|c| "rwm".contains(c))
}

/// Parses `host[:container[:permissions]]` into a device mapping.
///
/// The container path defaults to the host path and permissions default to
/// `rwm`. A two-part entry whose second part is a permission string, such as
/// `/dev/sda:r`, is read as `host:permissions`.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for empty paths, relative container paths,
/// permissions outside `rwm`, or more than three parts.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::devices::parse_device;
///
/// let device = parse_device("/dev/fuse:/dev/fuse:rw").unwrap();
/// assert_eq!(device.path_in_container.as_deref(), Some("/dev/fuse"));
/// assert_eq!(device.cgroup_permissions.as_deref(), Some("rw"));
///
/// assert!(parse_device("/dev/fuse:fuse").is_err());
/// ```
pub fn parse_device(raw: &str) -> Result<DeviceMapping> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let (host, container, perms) = match parts.as_slice() {
        [host] => (*host, *host, DEFAULT_PERMISSIONS),
        [host, perms] if valid_permissions(perms) => (*host, *host, *perms),
        [host, container] => (*host, *container, DEFAULT_PERMISSIONS),
        [host, container, perms] => (*host, *container, *perms),
        _ => return Err(invalid(raw, "expected host[:container[:permissions]]")),
    };

    if host.is_empty() {
        return Err(invalid(raw, "missing host device path"));
    }
    if !container.starts_with('/') {
        return Err(invalid(raw, format!("container path '{container}' must be absolute")));
    }
    if !valid_permissions(perms) {
        return Err(invalid(raw, format!("invalid permissions '{perms}'")));
    }

    Ok(DeviceMapping {
        path_on_host: Some(host.to_string()),
        path_in_container: Some(container.to_string()),
        cgroup_permissions: Some(perms.to_string()),
    })
}

/// Parses every `devices` entry, failing on the first malformed one.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for the first entry [`parse_device`] rejects.
pub fn parse_devices(entries: &[String]) -> Result<Vec<DeviceMapping>> {
    entries.iter().map(|entry| parse_device(entry)).collect()
}
