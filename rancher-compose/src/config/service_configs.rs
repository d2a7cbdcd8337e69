//! Thread-safe accumulator of services merged so far.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::types::ServiceConfig;

/// Name-keyed services accumulated across compose file layers.
///
/// Every accessor takes the read or write lock for the duration of the call
/// only, so a `ServiceConfigs` can be shared between threads behind an `Arc`.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{ServiceConfig, ServiceConfigs};
///
/// let configs = ServiceConfigs::new();
/// configs.add("web", ServiceConfig { image: "nginx".into(), ..Default::default() });
/// assert!(configs.has("web"));
/// assert_eq!(configs.get("web").unwrap().image, "nginx");
/// assert_eq!(configs.keys(), vec!["web"]);
/// ```
#[derive(Debug, Default)]
pub struct ServiceConfigs {
    inner: RwLock<BTreeMap<String, ServiceConfig>>,
}

impl ServiceConfigs {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ServiceConfig>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ServiceConfig>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if a service called `name` exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Returns a copy of the service called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ServiceConfig> {
        self.read().get(name).cloned()
    }

    /// Inserts or replaces a service.
    pub fn add(&self, name: impl Into<String>, config: ServiceConfig) {
        self.write().insert(name.into(), config);
    }

    /// Removes a service, returning it if it existed.
    pub fn remove(&self, name: &str) -> Option<ServiceConfig> {
        self.write().remove(name)
    }

    /// Service names in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// A snapshot of every service.
    #[must_use]
    pub fn all(&self) -> BTreeMap<String, ServiceConfig> {
        self.read().clone()
    }

    /// Number of services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true when no services have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl From<BTreeMap<String, ServiceConfig>> for ServiceConfigs {
    fn from(services: BTreeMap<String, ServiceConfig>) -> Self {
        Self {
            inner: RwLock::new(services),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn service(image: &str) -> ServiceConfig {
        ServiceConfig {
            image: image.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_add_get_remove() {
        let configs = ServiceConfigs::new();
        assert!(configs.is_empty());

        configs.add("web", service("nginx"));
        configs.add("web", service("httpd"));
        assert_eq!(configs.len(), 1);
        assert_eq!(configs.get("web").unwrap().image, "httpd");

        assert_eq!(configs.remove("web").unwrap().image, "httpd");
        assert!(!configs.has("web"));
        assert!(configs.get("web").is_none());
    }

    #[test]
    fn test_keys_sorted_and_snapshot() {
        let configs = ServiceConfigs::new();
        configs.add("web", service("a"));
        configs.add("db", service("b"));
        assert_eq!(configs.keys(), vec!["db", "web"]);

        let snapshot = configs.all();
        configs.remove("db");
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_concurrent_adds() {
        let configs = Arc::new(ServiceConfigs::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let configs = Arc::clone(&configs);
                thread::spawn(move || configs.add(format!("svc{i}"), service("img")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(configs.len(), 8);
    }
}
