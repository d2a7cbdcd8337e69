//! Field-level merge policy between two raw service maps.
//!
//! Merging happens on raw maps rather than typed structs so an override
//! layer only touches the fields it actually declares.

use serde_yaml::Value;

use crate::config::raw::RawService;
use crate::config::types::ServiceConfig;

/// Fields replaced wholesale by an override instead of concatenated.
pub const NO_MERGE_FIELDS: &[&str] = &["links", "volumes_from"];

/// Merges raw service maps according to compose override rules.
///
/// # Examples
///
/// ```
/// use rancher_compose::config::{ConfigMerger, RawService};
/// use serde_yaml::Value;
///
/// let mut base = RawService::new();
/// base.insert("build".into(), Value::String(".".into()));
/// base.insert("links".into(), serde_yaml::from_str("[a]").unwrap());
///
/// let mut layer = RawService::new();
/// layer.insert("image".into(), Value::String("nginx".into()));
/// layer.insert("links".into(), serde_yaml::from_str("[b]").unwrap());
///
/// let merged = ConfigMerger::merge_service(base, layer);
/// assert!(!merged.contains_key("build"));
/// assert_eq!(merged["links"], serde_yaml::from_str::<Value>("[b]").unwrap());
/// ```
pub struct ConfigMerger;

impl ConfigMerger {
    /// Merges `layer` over `base`.
    ///
    /// # Merging Rules
    ///
    /// - `image` in the layer drops any inherited `build` (and `dockerfile`);
    ///   `build` in the layer drops any inherited `image`
    /// - `links` and `volumes_from` are replaced
    /// - Fields present on both sides merge via [`ConfigMerger::merge_value`]
    /// - Fields only in the layer are adopted as-is
    #[must_use]
    pub fn merge_service(mut base: RawService, layer: RawService) -> RawService {
        if layer.contains_key("image") {
            base.remove("build");
            base.remove("dockerfile");
        }
        if layer.contains_key("build") {
            base.remove("image");
        }

        for (field, value) in layer {
            let merged = match base.remove(&field) {
                Some(existing) if !NO_MERGE_FIELDS.contains(&field.as_str()) => {
                    Self::merge_value(existing, value)
                }
                _ => value,
            };
            base.insert(field, merged);
        }
        base
    }

    /// Merges two raw values.
    ///
    /// Maps are unioned with recursive merging of shared keys, sequences are
    /// concatenated, and anything else is replaced by `layer`.
    #[must_use]
    pub fn merge_value(base: Value, layer: Value) -> Value {
        match (base, layer) {
            (Value::Mapping(mut base), Value::Mapping(layer)) => {
                for (key, value) in layer {
                    let merged = match base.remove(&key) {
                        Some(existing) => Self::merge_value(existing, value),
                        None => value,
                    };
                    base.insert(key, merged);
                }
                Value::Mapping(base)
            }
            (Value::Sequence(mut base), Value::Sequence(layer)) => {
                base.extend(layer);
                Value::Sequence(base)
            }
            (_, layer) => layer,
        }
    }

    /// Applies post-merge fixups to a typed service.
    ///
    /// A hand-written `restart: no` reaches the typed layer as boolean
    /// `false`; it is restored to the `no` policy here.
    pub fn adjust_values(config: &mut ServiceConfig) {
        if config.restart == "false" {
            config.restart = "no".to_string();
        }
    }
}
