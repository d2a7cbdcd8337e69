//! Resource limits: CPU, memory, block IO and ulimits.

use bollard::models::{HostConfig, ResourcesBlkioWeightDevice, ResourcesUlimits, ThrottleDevice};

use crate::config::types::ServiceConfig;
use crate::config::yaml_types::{parse_bytes, Ulimits};
use crate::error::{Error, Result};

fn invalid(field: &str, raw: &str, reason: impl Into<String>) -> Error {
    Error::Conversion {
        field: field.to_string(),
        value: raw.to_string(),
        reason: reason.into(),
    }
}

fn split_device<'a>(field: &str, raw: &'a str) -> Result<(&'a str, &'a str)> {
    raw.rsplit_once(':')
        .filter(|(path, value)| !path.is_empty() && !value.is_empty())
        .ok_or_else(|| invalid(field, raw, "expected path:value"))
}

/// Parses a `path:weight` block IO weight entry.
///
/// # Errors
///
/// Returns [`Error::Conversion`] when the entry has no colon or the weight
/// is not an unsigned 16-bit integer.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::resources::parse_weight_device;
///
/// let device = parse_weight_device("/dev/sda:300").unwrap();
/// assert_eq!(device.path.as_deref(), Some("/dev/sda"));
/// assert!(parse_weight_device("/dev/sda:70000").is_err());
/// ```
pub fn parse_weight_device(raw: &str) -> Result<ResourcesBlkioWeightDevice> {
    let (path, weight) = split_device("blkio_weight_device", raw)?;
    let weight: u16 = weight
        .parse()
        .map_err(|_| invalid("blkio_weight_device", raw, format!("invalid weight '{weight}'")))?;
    Ok(ResourcesBlkioWeightDevice {
        path: Some(path.to_string()),
        weight: Some(weight.into()),
    })
}

/// Parses a `path:rate` throttle entry.
///
/// Byte rates accept unit suffixes (`10mb`); IO rates must be plain integers.
///
/// # Errors
///
/// Returns [`Error::Conversion`] naming `field` for malformed entries.
pub fn parse_throttle_device(field: &str, raw: &str, bytes: bool) -> Result<ThrottleDevice> {
    let (path, rate) = split_device(field, raw)?;
    let rate = if bytes {
        parse_bytes(rate).map_err(|reason| invalid(field, raw, reason))?
    } else {
        rate.parse::<i64>()
            .map_err(|_| invalid(field, raw, format!("invalid rate '{rate}'")))?
    };
    if rate < 0 {
        return Err(invalid(field, raw, "rate must not be negative"));
    }
    Ok(ThrottleDevice {
        path: Some(path.to_string()),
        rate: Some(rate),
    })
}

fn throttle_list(field: &str, entries: &[String], bytes: bool) -> Result<Option<Vec<ThrottleDevice>>> {
    if entries.is_empty() {
        return Ok(None);
    }
    entries
        .iter()
        .map(|entry| parse_throttle_device(field, entry, bytes))
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn convert_ulimits(ulimits: &Ulimits) -> Option<Vec<ResourcesUlimits>> {
    if ulimits.is_empty() {
        return None;
    }
    Some(
        ulimits
            .0
            .iter()
            .map(|(name, limits)| ResourcesUlimits {
                name: Some(name.clone()),
                soft: Some(limits.soft),
                hard: Some(limits.hard),
            })
            .collect(),
    )
}

/// Copies the service's resource limits into `host`.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for malformed block IO entries or a blkio
/// weight outside the 16-bit range.
pub fn apply_resources(service: &ServiceConfig, host: &mut HostConfig) -> Result<()> {
    host.cpu_shares = service.cpu_shares.map(|v| v.0);
    host.cpu_period = service.cpu_period.map(|v| v.0);
    host.cpu_quota = service.cpu_quota.map(|v| v.0);
    if !service.cpuset.is_empty() {
        host.cpuset_cpus = Some(service.cpuset.clone());
    }

    host.memory = service.mem_limit.map(|v| v.0);
    host.memory_reservation = service.mem_reservation.map(|v| v.0);
    host.memory_swap = service.memswap_limit.map(|v| v.0);
    host.memory_swappiness = service.mem_swappiness.map(|v| v.0);
    host.oom_kill_disable = service.oom_kill_disable;
    host.pids_limit = service.pids_limit.map(|v| v.0);

    host.blkio_weight = service
        .blkio_weight
        .map(|v| {
            u16::try_from(v.0).map_err(|_| {
                invalid("blkio_weight", &v.0.to_string(), "weight must fit in 16 bits")
            })
        })
        .transpose()?;
    if !service.blkio_weight_device.is_empty() {
        host.blkio_weight_device = Some(
            service
                .blkio_weight_device
                .iter()
                .map(|entry| parse_weight_device(entry))
                .collect::<Result<Vec<_>>>()?,
        );
    }
    host.blkio_device_read_bps = throttle_list("device_read_bps", &service.device_read_bps, true)?;
    host.blkio_device_write_bps =
        throttle_list("device_write_bps", &service.device_write_bps, true)?;
    host.blkio_device_read_iops =
        throttle_list("device_read_iops", &service.device_read_iops, false)?;
    host.blkio_device_write_iops =
        throttle_list("device_write_iops", &service.device_write_iops, false)?;

    host.ulimits = convert_ulimits(&service.ulimits);
    Ok(())
}
