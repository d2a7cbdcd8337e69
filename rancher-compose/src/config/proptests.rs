//! Property-based tests for the merge policy and interpolation.

use std::collections::HashMap;

use super::interpolation::interpolate_str;
use super::merge::{ConfigMerger, NO_MERGE_FIELDS};
use super::raw::RawService;
use proptest::prelude::*;
use serde_yaml::Value;

// Strategy for generating list entries
fn entry_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9.=]{1,12}"
}

fn list_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(entry_strategy(), 0..6)
}

fn sequence(items: &[String]) -> Value {
    Value::Sequence(items.iter().cloned().map(Value::String).collect())
}

fn service(field: &str, value: Value) -> RawService {
    let mut service = RawService::new();
    service.insert(field.to_string(), value);
    service
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 2000,
        .. ProptestConfig::default()
    })]

    // Generic list fields always concatenate, base first
    #[test]
    fn list_fields_concatenate(
        field in prop::sample::select(vec!["dns", "ports", "environment", "cap_add", "volumes"]),
        base in list_strategy(),
        layer in list_strategy(),
    ) {
        let merged = ConfigMerger::merge_service(
            service(field, sequence(&base)),
            service(field, sequence(&layer)),
        );
        let mut expected = base.clone();
        expected.extend(layer);
        prop_assert_eq!(&merged[field], &sequence(&expected));
    }

    // links and volumes_from are replaced, never concatenated
    #[test]
    fn no_merge_fields_replace(
        index in 0..NO_MERGE_FIELDS.len(),
        base in list_strategy(),
        layer in list_strategy(),
    ) {
        let field = NO_MERGE_FIELDS[index];
        let merged = ConfigMerger::merge_service(
            service(field, sequence(&base)),
            service(field, sequence(&layer)),
        );
        prop_assert_eq!(&merged[field], &sequence(&layer));
    }

    // Scalars from the layer always win
    #[test]
    fn scalar_override_wins(base in "[a-z]{1,10}", layer in "[a-z]{1,10}") {
        let merged = ConfigMerger::merge_service(
            service("hostname", Value::String(base)),
            service("hostname", Value::String(layer.clone())),
        );
        prop_assert_eq!(&merged["hostname"], &Value::String(layer));
    }

    // image and build never coexist after a layer sets one of them
    #[test]
    fn image_and_build_exclusive(image in "[a-z]{1,10}", context in "[a-z./]{1,10}", image_last in any::<bool>()) {
        let image_layer = service("image", Value::String(image));
        let build_layer = service("build", Value::String(context));
        let merged = if image_last {
            ConfigMerger::merge_service(build_layer, image_layer)
        } else {
            ConfigMerger::merge_service(image_layer, build_layer)
        };
        prop_assert!(merged.contains_key("image") != merged.contains_key("build"));
        prop_assert_eq!(merged.contains_key("image"), image_last);
    }

    // Strings without '$' pass through interpolation untouched
    #[test]
    fn interpolation_identity_without_dollar(text in "[^$]{0,40}") {
        let result = interpolate_str("field", &text, &HashMap::new()).unwrap();
        prop_assert_eq!(result, text);
    }

    // Unknown braced references survive verbatim
    #[test]
    fn unknown_references_pass_through(name in "[A-Z_][A-Z0-9_]{0,12}") {
        let text = format!("${{{name}}}");
        let result = interpolate_str("field", &text, &HashMap::new()).unwrap();
        prop_assert_eq!(result, text);
    }
}
