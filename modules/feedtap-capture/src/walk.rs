// Recursive lookups over GraphQL documents.
//
// Story payloads nest their fields at unstable depths, so lookups search the
// whole subtree. Searches never descend into `attached_story`: a re-shared
// story's fields belong to the original post, not to the wrapper.

use serde_json::Value;

const ATTACHED_STORY: &str = "attached_story";

/// First value stored under `key`, depth-first.
pub(crate) fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.iter()
                .filter(|(k, _)| k.as_str() != ATTACHED_STORY)
                .find_map(|(_, v)| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// First feedback object: the one carrying both `subscription_target_id` and
/// `reaction_count`.
pub(crate) fn find_feedback(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            if map.contains_key("subscription_target_id") && map.contains_key("reaction_count") {
                return Some(value);
            }
            map.iter()
                .filter(|(k, _)| k.as_str() != ATTACHED_STORY)
                .find_map(|(_, v)| find_feedback(v))
        }
        Value::Array(items) => items.iter().find_map(find_feedback),
        _ => None,
    }
}

/// Every integer stored under `key` anywhere in the subtree.
pub(crate) fn collect_i64(value: &Value, key: &str, out: &mut Vec<i64>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == ATTACHED_STORY {
                    continue;
                }
                if k == key {
                    if let Some(n) = v.as_i64() {
                        out.push(n);
                        continue;
                    }
                }
                collect_i64(v, key, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_i64(v, key, out);
            }
        }
        _ => {}
    }
}

/// Identifier fields arrive as strings but occasionally as bare numbers.
pub(crate) fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
