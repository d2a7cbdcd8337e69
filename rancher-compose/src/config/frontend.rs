//! Version front-ends onto the canonical service shape.
//!
//! Version 2 fields already match [`ServiceConfig`](crate::config::ServiceConfig).
//! Version 1 spells a few of them differently; [`normalize`] rewrites those
//! in place before typing and merging.

use serde_yaml::{Mapping, Value};

use crate::config::raw::{ComposeVersion, RawService};

/// Rewrites version-specific fields of `service` into the canonical shape.
///
/// For version 1:
/// - `dockerfile` moves into `build.dockerfile`
/// - `log_driver` and `log_opt` become `logging.driver` and `logging.options`
/// - `net` becomes `network_mode`
///
/// Version 2 services are left untouched.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{frontend, ComposeVersion, RawService};
/// use serde_yaml::Value;
///
/// let mut service: RawService = serde_yaml::from_str("build: .\ndockerfile: Dockerfile.dev\nnet: host\n").unwrap();
/// frontend::normalize(ComposeVersion::V1, &mut service);
/// assert_eq!(service["build"]["dockerfile"], Value::String("Dockerfile.dev".into()));
/// assert_eq!(service["network_mode"], Value::String("host".into()));
/// ```
pub fn normalize(version: ComposeVersion, service: &mut RawService) {
    if version == ComposeVersion::V2 {
        return;
    }

    if let Some(dockerfile) = service.remove("dockerfile") {
        let mut build = match service.remove("build") {
            Some(Value::Mapping(build)) => build,
            Some(context) => {
                let mut build = Mapping::new();
                build.insert(Value::String("context".into()), context);
                build
            }
            None => Mapping::new(),
        };
        build.insert(Value::String("dockerfile".into()), dockerfile);
        service.insert("build".to_string(), Value::Mapping(build));
    }

    let driver = service.remove("log_driver");
    let options = service.remove("log_opt");
    if driver.is_some() || options.is_some() {
        let mut logging = match service.remove("logging") {
            Some(Value::Mapping(logging)) => logging,
            _ => Mapping::new(),
        };
        if let Some(driver) = driver {
            logging.insert(Value::String("driver".into()), driver);
        }
        if let Some(options) = options {
            logging.insert(Value::String("options".into()), options);
        }
        service.insert("logging".to_string(), Value::Mapping(logging));
    }

    if let Some(net) = service.remove("net") {
        service.insert("network_mode".to_string(), net);
    }
}
