//! Port specification parsing.
//!
//! Accepts the docker port syntax: `[ip:][host_port:]container_port[/proto]`
//! where either port may be a `start-end` range and an IPv6 address must be
//! bracketed (`[::1]:8080:80`).

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use crate::error::{Error, Result};

/// Protocols docker accepts on a port spec.
const PROTOCOLS: &[&str] = &["tcp", "udp", "sctp"];

/// A host-side binding for one container port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostBinding {
    /// Interface to bind; empty for all interfaces.
    pub host_ip: String,
    /// Host port or range; empty lets the daemon choose.
    pub host_port: String,
}

/// One container port and how it is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Container port in `port/proto` form.
    pub container_port: String,
    /// Host binding, or `None` when the port is only exposed.
    pub binding: Option<HostBinding>,
}

/// Exposed ports and their host bindings, keyed by `port/proto`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    /// Every exposed container port.
    pub exposed: BTreeSet<String>,
    /// Host bindings for published ports.
    pub bindings: BTreeMap<String, Vec<HostBinding>>,
}

fn invalid(raw: &str, reason: impl Into<String>) -> Error {
    Error::Conversion {
        field: "ports".to_string(),
        value: raw.to_string(),
        reason: reason.into(),
    }
}

fn parse_port(raw: &str, part: &str) -> Result<u16> {
    match part.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid(raw, format!("invalid port '{part}'"))),
        Ok(port) => Ok(port),
    }
}

/// Parses `port` or `start-end` into an inclusive range.
fn parse_range(raw: &str, part: &str) -> Result<(u16, u16)> {
    match part.split_once('-') {
        Some((start, end)) => {
            let start = parse_port(raw, start)?;
            let end = parse_port(raw, end)?;
            if end < start {
                return Err(invalid(raw, format!("invalid range '{part}'")));
            }
            Ok((start, end))
        }
        None => {
            let port = parse_port(raw, part)?;
            Ok((port, port))
        }
    }
}

fn split_proto<'a>(raw: &str, spec: &'a str) -> Result<(&'a str, &'a str)> {
    match spec.rsplit_once('/') {
        Some((rest, proto)) => {
            let proto = if proto.is_empty() { "tcp" } else { proto };
            if !PROTOCOLS.contains(&proto) {
                return Err(invalid(raw, format!("unknown protocol '{proto}'")));
            }
            Ok((rest, proto))
        }
        None => Ok((spec, "tcp")),
    }
}

/// Splits `[ip:][host:]container` into its three parts.
fn split_parts<'a>(raw: &str, rest: &'a str) -> Result<(&'a str, &'a str, &'a str)> {
    if let Some(bracketed) = rest.strip_prefix('[') {
        let (ip, after) = bracketed
            .split_once(']')
            .ok_or_else(|| invalid(raw, "unterminated IPv6 address"))?;
        let after = after
            .strip_prefix(':')
            .ok_or_else(|| invalid(raw, "expected ':' after IPv6 address"))?;
        let (host, container) = after
            .split_once(':')
            .ok_or_else(|| invalid(raw, "missing container port"))?;
        return Ok((ip, host, container));
    }

    let parts: Vec<&str> = rest.split(':').collect();
    match parts.as_slice() {
        [container] => Ok(("", "", container)),
        [host, container] => Ok(("", host, container)),
        [ip, host, container] => Ok((ip, host, container)),
        _ => Err(invalid(raw, "too many colons")),
    }
}

/// Parses one `ports` entry into its container port mappings.
///
/// A range expands into one mapping per port. A host range paired with a
/// single container port keeps the range as the host port, letting the
/// daemon pick within it.
///
/// # Errors
///
/// Returns [`Error::Conversion`] for malformed specs.
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::ports::parse_port_spec;
///
/// let mappings = parse_port_spec("127.0.0.1:8080:80/udp").unwrap();
/// assert_eq!(mappings[0].container_port, "80/udp");
/// let binding = mappings[0].binding.as_ref().unwrap();
/// assert_eq!(binding.host_ip, "127.0.0.1");
/// assert_eq!(binding.host_port, "8080");
///
/// assert!(parse_port_spec("80:80:80:80").is_err());
/// ```
pub fn parse_port_spec(raw: &str) -> Result<Vec<PortMapping>> {
    let (rest, proto) = split_proto(raw, raw.trim())?;
    let (ip, host, container) = split_parts(raw, rest)?;

    if !ip.is_empty() && ip.parse::<IpAddr>().is_err() {
        return Err(invalid(raw, format!("invalid IP address '{ip}'")));
    }
    if container.is_empty() {
        return Err(invalid(raw, "missing container port"));
    }

    let (start, end) = parse_range(raw, container)?;
    let host_range = if host.is_empty() {
        None
    } else {
        Some(parse_range(raw, host)?)
    };

    if let Some((host_start, host_end)) = host_range {
        let container_len = end - start;
        let host_len = host_end - host_start;
        if container_len != host_len && container_len != 0 {
            return Err(invalid(raw, "host and container port ranges differ in size"));
        }
    }

    // Only a bare container port is left unpublished.
    let published = rest.contains(':');

    let mut mappings = Vec::new();
    for (offset, port) in (start..=end).enumerate() {
        let binding = if published {
            let host_port = match host_range {
                None => String::new(),
                Some((host_start, host_end)) if start == end && host_start != host_end => {
                    format!("{host_start}-{host_end}")
                }
                Some((host_start, _)) => {
                    let offset =
                        u16::try_from(offset).map_err(|_| invalid(raw, "range too large"))?;
                    (host_start + offset).to_string()
                }
            };
            Some(HostBinding {
                host_ip: ip.to_string(),
                host_port,
            })
        } else {
            None
        };
        mappings.push(PortMapping {
            container_port: format!("{port}/{proto}"),
            binding,
        });
    }
    Ok(mappings)
}

/// Parses one `expose` entry (`port`, `start-end`, optionally `/proto`).
///
/// # Errors
///
/// Returns [`Error::Conversion`] for malformed entries.
pub fn parse_expose(raw: &str) -> Result<Vec<String>> {
    let (rest, proto) = split_proto(raw, raw.trim())?;
    let (start, end) = parse_range(raw, rest).map_err(|_| Error::Conversion {
        field: "expose".to_string(),
        value: raw.to_string(),
        reason: "expected a port or port range".to_string(),
    })?;
    Ok((start..=end).map(|port| format!("{port}/{proto}")).collect())
}

/// Collects exposed ports and host bindings from `ports` and `expose` lists.
///
/// # Errors
///
/// Returns the first malformed entry as [`Error::Conversion`].
///
/// # Examples
///
/// ```
/// use rancher_compose::convert::ports::collect_ports;
///
/// let set = collect_ports(&["8080:80".to_string()], &["9000".to_string()]).unwrap();
/// assert!(set.exposed.contains("80/tcp"));
/// assert!(set.exposed.contains("9000/tcp"));
/// assert_eq!(set.bindings["80/tcp"][0].host_port, "8080");
/// assert!(!set.bindings.contains_key("9000/tcp"));
/// ```
pub fn collect_ports(ports: &[String], expose: &[String]) -> Result<PortSet> {
    let mut set = PortSet::default();
    for entry in ports {
        for mapping in parse_port_spec(entry)? {
            set.exposed.insert(mapping.container_port.clone());
            if let Some(binding) = mapping.binding {
                set.bindings
                    .entry(mapping.container_port)
                    .or_default()
                    .push(binding);
            }
        }
    }
    for entry in expose {
        set.exposed.extend(parse_expose(entry)?);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_port_only() {
        let mappings = parse_port_spec("80").unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].container_port, "80/tcp");
        assert_eq!(mappings[0].binding, None);
    }

    #[test]
    fn test_host_and_container() {
        let mappings = parse_port_spec("8080:80").unwrap();
        assert_eq!(
            mappings[0].binding,
            Some(HostBinding {
                host_ip: String::new(),
                host_port: "8080".to_string()
            })
        );
    }

    #[test]
    fn test_ip_with_ephemeral_host_port() {
        let mappings = parse_port_spec("127.0.0.1::80").unwrap();
        let binding = mappings[0].binding.as_ref().unwrap();
        assert_eq!(binding.host_ip, "127.0.0.1");
        assert_eq!(binding.host_port, "");
    }

    #[test]
    fn test_bracketed_ipv6() {
        let mappings = parse_port_spec("[::1]:8080:80/tcp").unwrap();
        let binding = mappings[0].binding.as_ref().unwrap();
        assert_eq!(binding.host_ip, "::1");
        assert_eq!(binding.host_port, "8080");
    }

    #[test]
    fn test_ranges_expand_pairwise() {
        let mappings = parse_port_spec("9000-9001:8000-8001").unwrap();
        assert_eq!(mappings.len(), 2);
        assert_eq!(mappings[1].container_port, "8001/tcp");
        assert_eq!(mappings[1].binding.as_ref().unwrap().host_port, "9001");
    }

    #[test]
    fn test_host_range_for_single_container_port() {
        let mappings = parse_port_spec("9000-9010:80").unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].binding.as_ref().unwrap().host_port, "9000-9010");
    }

    #[test]
    fn test_malformed_specs() {
        for bad in [
            "",
            "abc",
            "0",
            "70000",
            "80/icmp",
            "9000-9001:80-82",
            "300.1.1.1:80:80",
            "80-70",
            "[::1:80:80",
            "1:2:3:4",
        ] {
            assert!(parse_port_spec(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_expose_entries() {
        assert_eq!(parse_expose("3000").unwrap(), vec!["3000/tcp"]);
        assert_eq!(parse_expose("53/udp").unwrap(), vec!["53/udp"]);
        assert_eq!(parse_expose("5000-5001").unwrap().len(), 2);
        assert!(parse_expose("80:80").is_err());
    }

    #[test]
    fn test_collect_merges_bindings_for_same_port() {
        let set = collect_ports(
            &["8080:80".to_string(), "127.0.0.1:8081:80".to_string()],
            &[],
        )
        .unwrap();
        assert_eq!(set.exposed.len(), 1);
        assert_eq!(set.bindings["80/tcp"].len(), 2);
    }
}
