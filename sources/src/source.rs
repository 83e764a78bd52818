//! The [`Source`] trait and the path helpers every layer shares.
//!
//! A source reads raw settings from somewhere and returns them as a nested
//! [`Value::Map`] whose keys follow the field paths of the
//! [`CommandModel`]: subcommand and group names for the inner maps,
//! parameter names for the leaves.

use std::collections::BTreeMap;

use cligram_core::{CommandModel, Node, Value};

use crate::error::{Result, SourceError};

/// One configuration layer.
pub trait Source: Send + Sync {
    /// Short label used in logs and in [`LayerOrigin`](crate::LayerOrigin).
    fn name(&self) -> &str;

    /// Reads the layer, keyed by the field paths of `model`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the layer exists but cannot be read or
    /// one of its values cannot be decoded.
    fn read(&self, model: &CommandModel) -> Result<Value>;
}

/// Builds a nested map from `(dotted path, value)` entries.
///
/// # Examples
///
/// ```
/// use cligram_sources::nest;
/// use cligram_core::Value;
///
/// let nested = nest([("db.host".to_string(), Value::from("localhost")), ("debug".to_string(), Value::from(true))]);
/// assert_eq!(nested.get_path("db.host"), Some(&Value::from("localhost")));
/// ```
pub fn nest(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
    let mut root = BTreeMap::new();
    for (path, value) in entries {
        insert_path(&mut root, &path, value);
    }
    Value::Map(root)
}

fn insert_path(map: &mut BTreeMap<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(child, Value::Map(_)) {
                *child = Value::Map(BTreeMap::new());
            }
            if let Value::Map(inner) = child {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// Decodes one raw text value for `node`.
///
/// Sequence-valued parameters split the text on commas and decode each
/// item.
pub(crate) fn decode_raw(source_name: &str, key: &str, node: &Node, raw: &str) -> Result<Value> {
    let decode = |item: &str| {
        node.decode(item).map_err(|reason| SourceError::DecodeError {
            source_name: source_name.to_string(),
            key: key.to_string(),
            raw: item.to_string(),
            reason,
        })
    };
    if node.collects_sequence() {
        let items = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(decode)
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::List(items));
    }
    decode(raw)
}

/// Leaf paths of a nested map, in key order. Lists are leaves.
pub(crate) fn leaf_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_leaves(value, String::new(), &mut paths);
    paths
}

fn collect_leaves(value: &Value, prefix: String, out: &mut Vec<String>) {
    match value {
        Value::Map(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_leaves(child, path, out);
            }
        }
        _ if !prefix.is_empty() => out.push(prefix),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cligram_core::{CommandSchema, ParamSchema, ValueType};

    #[test]
    fn test_nest_builds_intermediate_maps() {
        let nested = nest([
            ("db.user.name".to_string(), Value::from("alice")),
            ("db.port".to_string(), Value::from(5432)),
            ("debug".to_string(), Value::from(true)),
        ]);
        assert_eq!(nested.get_path("db.user.name"), Some(&Value::from("alice")));
        assert_eq!(nested.get_path("db.port"), Some(&Value::Integer(5432)));
        assert_eq!(leaf_paths(&nested), vec!["db.port", "db.user.name", "debug"]);
    }

    #[test]
    fn test_decode_raw_splits_sequences() {
        let schema = CommandSchema::new("app")
            .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer).allow_multiple());
        let model = CommandModel::build(&schema).unwrap();
        let port = model.nodes().find(|n| n.name == "port").unwrap();

        let value = decode_raw("env", "APP_PORT", port, "80, 443").unwrap();
        assert_eq!(value, Value::List(vec![Value::Integer(80), Value::Integer(443)]));

        let err = decode_raw("env", "APP_PORT", port, "80,https").unwrap_err();
        assert!(err.to_string().contains("APP_PORT"), "{err}");
    }
}
