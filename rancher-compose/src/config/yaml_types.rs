//! Lenient YAML field shapes used by the typed service model.
//!
//! Compose files accept several spellings for the same field: a command may
//! be a string or a list, environment may be a map or `KEY=VALUE` list, and
//! so on. Each type here deserializes every accepted spelling into one
//! canonical representation and serializes back to that canonical form.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// Renders a scalar YAML value as a string, or `None` for null and collections.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn scalar_list<E: de::Error>(items: &[Value], what: &str) -> Result<Vec<String>, E> {
    items
        .iter()
        .map(|item| {
            scalar_to_string(item)
                .ok_or_else(|| E::custom(format!("{what} entries must be scalars, got {item:?}")))
        })
        .collect()
}

fn map_key<E: de::Error>(key: &Value) -> Result<String, E> {
    scalar_to_string(key).ok_or_else(|| E::custom(format!("invalid mapping key {key:?}")))
}

/// Deserializes a string that YAML may have typed as a bool or number.
///
/// `restart: no` written by hand often arrives as boolean `false`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        other => scalar_to_string(&other)
            .ok_or_else(|| de::Error::custom(format!("expected a string, got {other:?}"))),
    }
}

/// Deserializes a list of strings whose items may be numbers.
pub(crate) fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrSlice::deserialize(deserializer)?.0)
}

/// Deserializes a string map whose values may be numbers or booleans.
///
/// `max-file: 3` under `logging.options` and `size: 10` under `driver_opts`
/// arrive as integers. A null value becomes an empty string.
pub(crate) fn lenient_string_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BTreeMap::new()),
        Value::Mapping(map) => map
            .iter()
            .map(|(key, value)| -> Result<(String, String), D::Error> {
                let value = match value {
                    Value::Null => String::new(),
                    other => scalar_to_string(other).ok_or_else(|| {
                        let message = format!("option values must be scalars, got {other:?}");
                        <D::Error as de::Error>::custom(message)
                    })?,
                };
                Ok((map_key(key)?, value))
            })
            .collect(),
        other => Err(de::Error::custom(format!("expected a mapping, got {other:?}"))),
    }
}

/// A single string or a list of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringOrSlice(pub Vec<String>);

impl StringOrSlice {
    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for StringOrSlice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Sequence(items) => Ok(Self(scalar_list(&items, "list")?)),
            other => scalar_to_string(&other)
                .map(|s| Self(vec![s]))
                .ok_or_else(|| de::Error::custom("expected a string or a list of strings")),
        }
    }
}

impl Serialize for StringOrSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.0)
    }
}

/// A command given either as a shell string or as an argv list.
///
/// Strings are split with POSIX shell quoting rules.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::Command;
///
/// let cmd: Command = serde_yaml::from_str("nginx -g 'daemon off;'").unwrap();
/// assert_eq!(cmd.0, vec!["nginx", "-g", "daemon off;"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command(pub Vec<String>);

impl Command {
    /// Returns true when the command has no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Sequence(items) => Ok(Self(scalar_list(&items, "command")?)),
            other => {
                let line = scalar_to_string(&other)
                    .ok_or_else(|| de::Error::custom("expected a command string or list"))?;
                shlex::split(&line)
                    .map(Self)
                    .ok_or_else(|| de::Error::custom(format!("unbalanced quotes in command: {line}")))
            }
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.0)
    }
}

/// A map or a list of `KEY=VALUE` strings, normalized to the list form.
///
/// Map entries with a null value become a bare `KEY`, which leaves the value
/// to be filled from the environment at conversion time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaporEqualSlice(pub Vec<String>);

/// A map or a list of `KEY:VALUE` strings, normalized to the list form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaporColonSlice(pub Vec<String>);

fn map_or_sep_slice<'de, D: Deserializer<'de>>(
    deserializer: D,
    sep: char,
) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => scalar_list(&items, "list"),
        Value::Mapping(map) => map
            .iter()
            .map(|(k, v)| {
                let key = map_key(k)?;
                Ok(match scalar_to_string(v) {
                    Some(value) => format!("{key}{sep}{value}"),
                    None => key,
                })
            })
            .collect(),
        other => Err(de::Error::custom(format!(
            "expected a map or a list, got {other:?}"
        ))),
    }
}

impl MaporEqualSlice {
    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if an entry for `key` exists, with or without a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0
            .iter()
            .any(|entry| entry.split_once('=').map_or(entry.as_str(), |(k, _)| k) == key)
    }
}

impl<'de> Deserialize<'de> for MaporEqualSlice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        map_or_sep_slice(deserializer, '=').map(Self)
    }
}

impl Serialize for MaporEqualSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.0)
    }
}

impl MaporColonSlice {
    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for MaporColonSlice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        map_or_sep_slice(deserializer, ':').map(Self)
    }
}

impl Serialize for MaporColonSlice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.0)
    }
}

/// A list of `KEY=VALUE` strings or a map, normalized to the map form.
///
/// Used for labels, where later keys replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceorMap(pub BTreeMap<String, String>);

impl SliceorMap {
    /// Returns true when no entries are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for SliceorMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Sequence(items) => Ok(Self(
                scalar_list::<D::Error>(&items, "label")?
                    .into_iter()
                    .map(|entry| match entry.split_once('=') {
                        Some((k, v)) => (k.to_string(), v.to_string()),
                        None => (entry, String::new()),
                    })
                    .collect(),
            )),
            Value::Mapping(map) => map
                .iter()
                .map(|(k, v)| Ok((map_key(k)?, scalar_to_string(v).unwrap_or_default())))
                .collect::<Result<_, D::Error>>()
                .map(Self),
            other => Err(de::Error::custom(format!(
                "expected a map or a list, got {other:?}"
            ))),
        }
    }
}

impl Serialize for SliceorMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(&self.0)
    }
}

/// Parses a docker-style byte quantity such as `512m`, `1g` or `1024`.
///
/// Units are binary multiples and an optional trailing `b` is accepted.
///
/// # Errors
///
/// Returns a description of the problem when the string is not a quantity.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::yaml_types::parse_bytes;
///
/// assert_eq!(parse_bytes("512m").unwrap(), 512 * 1024 * 1024);
/// assert_eq!(parse_bytes("1GB").unwrap(), 1024 * 1024 * 1024);
/// assert_eq!(parse_bytes("100").unwrap(), 100);
/// assert!(parse_bytes("lots").is_err());
/// ```
pub fn parse_bytes(raw: &str) -> Result<i64, String> {
    let lower = raw.trim().to_ascii_lowercase();
    let trimmed = lower.strip_suffix('b').unwrap_or(&lower);
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let multiplier: f64 = match unit {
        "" => 1.0,
        "k" => 1024.0,
        "m" => 1024.0 * 1024.0,
        "g" => 1024.0 * 1024.0 * 1024.0,
        "t" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "p" => 1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return Err(format!("invalid size unit in '{raw}'")),
    };
    let quantity: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{raw}'"))?;
    #[allow(clippy::cast_possible_truncation)]
    Ok((quantity * multiplier) as i64)
}

/// A memory quantity given as bytes or as a unit-suffixed string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemStringOrInt(pub i64);

impl<'de> Deserialize<'de> for MemStringOrInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .map(Self)
                .ok_or_else(|| de::Error::custom(format!("invalid memory quantity {n}"))),
            Value::String(s) => parse_bytes(&s).map(Self).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected a memory quantity, got {other:?}"
            ))),
        }
    }
}

impl Serialize for MemStringOrInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// An integer that may have been written as a quoted string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringOrInt(pub i64);

impl<'de> Deserialize<'de> for StringOrInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .map(Self)
                .ok_or_else(|| de::Error::custom(format!("expected an integer, got {n}"))),
            Value::String(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|_| de::Error::custom(format!("expected an integer, got '{s}'"))),
            other => Err(de::Error::custom(format!(
                "expected an integer, got {other:?}"
            ))),
        }
    }
}

impl Serialize for StringOrInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// One resource limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UlimitLimits {
    /// Soft limit.
    pub soft: i64,
    /// Hard limit.
    pub hard: i64,
}

/// Resource limits keyed by name (`nofile`, `nproc`, ...).
///
/// Each entry is either a single number, applied to both soft and hard
/// limits, or a `{soft, hard}` map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ulimits(pub BTreeMap<String, UlimitLimits>);

impl Ulimits {
    /// Returns true when no limits are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Ulimits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct SoftHard {
            soft: StringOrInt,
            hard: StringOrInt,
        }

        let map = match Value::deserialize(deserializer)? {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(map) => map,
            other => {
                return Err(de::Error::custom(format!(
                    "ulimits must be a map, got {other:?}"
                )))
            }
        };

        let mut limits = BTreeMap::new();
        for (k, v) in map {
            let name = map_key::<D::Error>(&k)?;
            let entry = match v {
                Value::Mapping(_) => {
                    let pair: SoftHard = serde_yaml::from_value(v).map_err(de::Error::custom)?;
                    UlimitLimits {
                        soft: pair.soft.0,
                        hard: pair.hard.0,
                    }
                }
                other => {
                    let single: StringOrInt =
                        serde_yaml::from_value(other).map_err(de::Error::custom)?;
                    UlimitLimits {
                        soft: single.0,
                        hard: single.0,
                    }
                }
            };
            limits.insert(name, entry);
        }
        Ok(Self(limits))
    }
}

impl Serialize for Ulimits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct SoftHard {
            soft: i64,
            hard: i64,
        }

        serializer.collect_map(self.0.iter().map(|(name, l)| {
            (
                name,
                SoftHard {
                    soft: l.soft,
                    hard: l.hard,
                },
            )
        }))
    }
}

/// Per-network attachment settings for a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkAttachment {
    /// Extra DNS names for the container on this network.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Static IPv4 address.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipv4_address: String,
    /// Static IPv6 address.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ipv6_address: String,
}

/// Networks a service attaches to, from a list of names or a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Networks(pub BTreeMap<String, NetworkAttachment>);

impl Networks {
    /// Returns true when the service joins no networks explicitly.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Networks {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::Sequence(items) => Ok(Self(
                scalar_list::<D::Error>(&items, "network")?
                    .into_iter()
                    .map(|name| (name, NetworkAttachment::default()))
                    .collect(),
            )),
            Value::Mapping(map) => {
                let mut networks = BTreeMap::new();
                for (k, v) in map {
                    let attachment = if v.is_null() {
                        NetworkAttachment::default()
                    } else {
                        serde_yaml::from_value(v).map_err(de::Error::custom)?
                    };
                    networks.insert(map_key::<D::Error>(&k)?, attachment);
                }
                Ok(Self(networks))
            }
            other => Err(de::Error::custom(format!(
                "networks must be a list or a map, got {other:?}"
            ))),
        }
    }
}

impl Serialize for Networks {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(&self.0)
    }
}

/// Image build settings, from a context string or a map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Build {
    /// Build context path or remote URL.
    pub context: String,
    /// Dockerfile name relative to the context.
    pub dockerfile: String,
    /// Build arguments; `None` values are taken from the environment.
    pub args: BTreeMap<String, Option<String>>,
}

impl Build {
    /// Returns true when nothing about the build was specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context.is_empty() && self.dockerfile.is_empty() && self.args.is_empty()
    }
}

impl<'de> Deserialize<'de> for Build {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct BuildMap {
            context: String,
            dockerfile: String,
            args: MaporEqualSlice,
        }

        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::default()),
            Value::String(context) => Ok(Self {
                context,
                ..Self::default()
            }),
            v @ Value::Mapping(_) => {
                let map: BuildMap = serde_yaml::from_value(v).map_err(de::Error::custom)?;
                let args = map
                    .args
                    .0
                    .into_iter()
                    .map(|entry| match entry.split_once('=') {
                        Some((k, v)) => (k.to_string(), Some(v.to_string())),
                        None => (entry, None),
                    })
                    .collect();
                Ok(Self {
                    context: map.context,
                    dockerfile: map.dockerfile,
                    args,
                })
            }
            other => Err(de::Error::custom(format!(
                "build must be a string or a map, got {other:?}"
            ))),
        }
    }
}

impl Serialize for Build {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct BuildMap<'a> {
            #[serde(skip_serializing_if = "str::is_empty")]
            context: &'a str,
            #[serde(skip_serializing_if = "str::is_empty")]
            dockerfile: &'a str,
            #[serde(skip_serializing_if = "BTreeMap::is_empty")]
            args: &'a BTreeMap<String, Option<String>>,
        }

        if self.dockerfile.is_empty() && self.args.is_empty() {
            return serializer.serialize_str(&self.context);
        }
        BuildMap {
            context: &self.context,
            dockerfile: &self.dockerfile,
            args: &self.args,
        }
        .serialize(serializer)
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dockerfile.is_empty() {
            write!(f, "{}", self.context)
        } else {
            write!(f, "{} ({})", self.context, self.dockerfile)
        }
    }
}
