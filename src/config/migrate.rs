//! Migration of deprecated profile fields.
//!
//! Runs on the raw YAML document before typed deserialization, so adapters
//! only ever see the current field set.

use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Redis adapter keys that used to name the `redis-cli` executable.
const DEPRECATED_REDIS_UTILITY_KEYS: &[&str] = &["utility_path", "redis_cli_utility"];
const REDIS_UTILITY: &str = "redis-cli";

/// Strips deprecated redis utility keys from `mapping`, returning the last value found.
fn take_redis_utility(mapping: &mut Mapping, location: &str) -> Option<Value> {
    let mut found = None;
    for key in DEPRECATED_REDIS_UTILITY_KEYS {
        if let Some(value) = mapping.remove(*key) {
            warn!(
                "{}: `{}` is deprecated, use `utilities.{}` instead",
                location, key, REDIS_UTILITY
            );
            found = Some(value);
        }
    }
    found
}

fn is_redis(mapping: &Mapping) -> bool {
    mapping.get("type").and_then(Value::as_str) == Some("redis")
}

/// Rewrites deprecated fields in a profile document in place.
///
/// Returns the number of fields migrated.
pub fn migrate(document: &mut Value) -> usize {
    let Some(root) = document.as_mapping_mut() else {
        return 0;
    };

    let mut migrated = 0;
    let mut utility = None;

    if let Some(Value::Mapping(defaults)) = root.get_mut("defaults")
        && let Some(Value::Mapping(redis)) = defaults.get_mut("redis")
        && let Some(value) = take_redis_utility(redis, "defaults.redis")
    {
        migrated += 1;
        utility = Some(value);
    }

    if let Some(Value::Sequence(adapters)) = root.get_mut("adapters") {
        for (index, adapter) in adapters.iter_mut().enumerate() {
            let Value::Mapping(adapter) = adapter else {
                continue;
            };
            if !is_redis(adapter) {
                continue;
            }
            if let Some(value) = take_redis_utility(adapter, &format!("adapter {}", index + 1)) {
                migrated += 1;
                utility = Some(value);
            }
        }
    }

    if let Some(value) = utility {
        let utilities = root
            .entry(Value::from("utilities"))
            .or_insert(Value::Null);
        // `utilities:` with no entries parses as null.
        if utilities.is_null() {
            *utilities = Value::Mapping(Mapping::new());
        }
        match utilities {
            Value::Mapping(utilities) if utilities.contains_key(REDIS_UTILITY) => {
                warn!("utilities.{} is set; ignoring deprecated value", REDIS_UTILITY);
            }
            Value::Mapping(utilities) => {
                utilities.insert(Value::from(REDIS_UTILITY), value);
            }
            _ => {
                warn!("utilities is not a mapping; discarding deprecated {} value", REDIS_UTILITY);
            }
        }
    }

    migrated
}
