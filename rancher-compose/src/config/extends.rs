//! Per-service resolution: file-backed fields, version front-end and `extends`.
//!
//! A service may inherit from another one in the same file
//! (`extends: base`) or in a different file
//! (`extends: {service: base, file: common.yml}`). The base is resolved
//! first, including its own `extends`, and the extending service is then
//! merged over it.

use serde_yaml::Value;

use crate::config::frontend;
use crate::config::merge::ConfigMerger;
use crate::config::raw::{ComposeVersion, RawConfig, RawService, RawServiceMap};
use crate::config::resources::{resolve_build_context, resolve_env_files};
use crate::config::yaml_types::scalar_to_string;
use crate::error::{Error, Result};
use crate::lookup::ResourceLookup;

/// Fields a base service may not declare.
const NON_EXTENDABLE_FIELDS: &[&str] = &["links", "volumes_from"];

/// Loads another compose file up to the raw, validated stage.
pub(crate) type RawLoader<'a> = dyn Fn(&str, &[u8]) -> Result<RawConfig> + 'a;

/// A parsed `extends` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendsTarget {
    /// Name of the base service.
    pub service: String,
    /// File holding the base service, when not the current file.
    pub file: Option<String>,
}

impl ExtendsTarget {
    /// Parses the raw `extends` value of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extends`] if the value is neither a service name nor
    /// a map with a `service` key.
    pub fn parse(service: &str, value: &Value) -> Result<Self> {
        let invalid = |reason: &str| Error::Extends {
            service: service.to_string(),
            reason: reason.to_string(),
        };
        match value {
            Value::Mapping(map) => {
                let base = map
                    .get("service")
                    .and_then(scalar_to_string)
                    .ok_or_else(|| invalid("extends requires a 'service' key"))?;
                let file = map.get("file").and_then(scalar_to_string);
                Ok(Self {
                    service: base,
                    file,
                })
            }
            other => scalar_to_string(other)
                .map(|base| Self {
                    service: base,
                    file: None,
                })
                .ok_or_else(|| invalid("extends must be a service name or a map")),
        }
    }
}

/// Resolves services of one compose file into merge-ready raw maps.
pub(crate) struct ServiceResolver<'a> {
    resource_lookup: Option<&'a dyn ResourceLookup>,
    load: &'a RawLoader<'a>,
}

impl<'a> ServiceResolver<'a> {
    pub(crate) fn new(resource_lookup: Option<&'a dyn ResourceLookup>, load: &'a RawLoader<'a>) -> Self {
        Self {
            resource_lookup,
            load,
        }
    }

    /// Resolves service `name` of `services`, declared in `file`.
    pub(crate) fn resolve(
        &self,
        services: &RawServiceMap,
        version: ComposeVersion,
        name: &str,
        file: &str,
    ) -> Result<RawService> {
        let mut chain = Vec::new();
        self.resolve_inner(services, version, name, file, &mut chain)
    }

    fn resolve_inner(
        &self,
        services: &RawServiceMap,
        version: ComposeVersion,
        name: &str,
        file: &str,
        chain: &mut Vec<String>,
    ) -> Result<RawService> {
        let key = format!("{file}:{name}");
        if chain.contains(&key) {
            chain.push(key);
            return Err(Error::Extends {
                service: name.to_string(),
                reason: format!("circular reference: {}", chain.join(" -> ")),
            });
        }

        let mut service = services
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound {
                service: name.to_string(),
            })?;

        resolve_env_files(&mut service, file, self.resource_lookup)?;
        resolve_build_context(&mut service, file, self.resource_lookup);
        frontend::normalize(version, &mut service);

        let Some(extends) = service.remove("extends") else {
            return Ok(service);
        };
        let target = ExtendsTarget::parse(name, &extends)?;

        chain.push(key);
        let base = match &target.file {
            None => self.resolve_inner(services, version, &target.service, file, chain),
            Some(other) => self.resolve_external(other, &target.service, name, file, chain),
        }
        .map_err(|err| match err {
            Error::ServiceNotFound { service } => Error::Extends {
                service: name.to_string(),
                reason: format!("base service '{service}' not found"),
            },
            other => other,
        })?;
        chain.pop();

        if let Some(field) = NON_EXTENDABLE_FIELDS
            .iter()
            .find(|field| base.contains_key(**field))
        {
            return Err(Error::Extends {
                service: name.to_string(),
                reason: format!(
                    "base service '{}' declares '{field}' and cannot be extended",
                    target.service
                ),
            });
        }

        log::debug!("service '{name}' extends '{}'", target.service);
        Ok(ConfigMerger::merge_service(base, service))
    }

    fn resolve_external(
        &self,
        other: &str,
        base: &str,
        name: &str,
        file: &str,
        chain: &mut Vec<String>,
    ) -> Result<RawService> {
        let lookup = self.resource_lookup.ok_or_else(|| Error::ResourceLookup {
            resource: other.to_string(),
            reason: "no mechanism provided to load files".to_string(),
        })?;
        let (contents, resolved) = lookup.lookup(other, file)?;
        log::debug!("service '{name}' loads base file {resolved}");
        let raw = (self.load)(&resolved, &contents).map_err(|err| err.in_file(&resolved))?;
        self.resolve_inner(&raw.services, raw.version, base, &resolved, chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::raw::create_raw_config;
    use crate::lookup::MockResourceLookup;

    fn load(_: &str, contents: &[u8]) -> Result<RawConfig> {
        create_raw_config(contents)
    }

    fn resolve(yaml: &str, name: &str, lookup: Option<&dyn ResourceLookup>) -> Result<RawService> {
        let raw = create_raw_config(yaml.as_bytes()).unwrap();
        let resolver = ServiceResolver::new(lookup, &load);
        resolver.resolve(&raw.services, raw.version, name, "docker-compose.yml")
    }

    #[test]
    fn test_parse_target_forms() {
        let short = ExtendsTarget::parse("web", &Value::String("base".into())).unwrap();
        assert_eq!(short.service, "base");
        assert_eq!(short.file, None);

        let long: Value = serde_yaml::from_str("{service: base, file: common.yml}").unwrap();
        let long = ExtendsTarget::parse("web", &long).unwrap();
        assert_eq!(long.file.as_deref(), Some("common.yml"));

        let bad: Value = serde_yaml::from_str("{file: common.yml}").unwrap();
        assert!(ExtendsTarget::parse("web", &bad).is_err());
    }

    #[test]
    fn test_same_file_extends() {
        let service = resolve(
            "base:\n  image: nginx\n  environment: [A=1]\nweb:\n  extends: base\n  environment: [B=2]\n",
            "web",
            None,
        )
        .unwrap();
        assert_eq!(service["image"], Value::String("nginx".into()));
        assert_eq!(
            service["environment"],
            serde_yaml::from_str::<Value>("[A=1, B=2]").unwrap()
        );
        assert!(!service.contains_key("extends"));
    }

    #[test]
    fn test_chained_extends() {
        let service = resolve(
            "a:\n  image: a\n  tty: true\nb:\n  extends: a\n  privileged: true\nc:\n  extends: b\n  image: c\n",
            "c",
            None,
        )
        .unwrap();
        assert_eq!(service["image"], Value::String("c".into()));
        assert_eq!(service["tty"], Value::Bool(true));
        assert_eq!(service["privileged"], Value::Bool(true));
    }

    #[test]
    fn test_cycle_detected() {
        let err = resolve("a:\n  extends: b\nb:\n  extends: a\n", "a", None).unwrap_err();
        assert!(format!("{err}").contains("circular reference"));
    }

    #[test]
    fn test_missing_base() {
        let err = resolve("web:\n  extends: nothing\n", "web", None).unwrap_err();
        assert!(matches!(err, Error::Extends { ref service, .. } if service == "web"));
    }

    #[test]
    fn test_base_with_links_rejected() {
        let err = resolve(
            "db:\n  image: pg\nbase:\n  image: a\n  links: [db]\nweb:\n  extends: base\n",
            "web",
            None,
        )
        .unwrap_err();
        assert!(format!("{err}").contains("links"));
    }

    #[test]
    fn test_cross_file_extends() {
        let mut lookup = MockResourceLookup::new();
        lookup.expect_lookup().times(1).returning(|file, _| {
            assert_eq!(file, "common.yml");
            Ok((
                b"version: '2'\nservices:\n  app:\n    image: base\n    ports: ['80']\n".to_vec(),
                "/p/common.yml".to_string(),
            ))
        });

        let service = resolve(
            "web:\n  extends:\n    service: app\n    file: common.yml\n  ports: ['443']\n",
            "web",
            Some(&lookup),
        )
        .unwrap();
        assert_eq!(service["image"], Value::String("base".into()));
        assert_eq!(
            service["ports"],
            serde_yaml::from_str::<Value>("['80', '443']").unwrap()
        );
    }

    #[test]
    fn test_cross_file_without_lookup() {
        let err = resolve(
            "web:\n  extends:\n    service: app\n    file: common.yml\n",
            "web",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ResourceLookup { .. }));
    }

    #[test]
    fn test_v1_fields_normalized_during_resolution() {
        let service = resolve("web:\n  image: a\n  net: host\n", "web", None).unwrap();
        assert_eq!(service["network_mode"], Value::String("host".into()));
    }
}
