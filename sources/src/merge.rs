//! Value-tree merging with configurable conflict resolution.
//!
//! When the same field is set by several layers, [`merge_values`] combines
//! the two trees using a [`MergeStrategy`] to resolve conflicts. Maps are
//! always merged key by key; the strategy only decides leaf conflicts.
//!
//! # Example
//!
//! ```
//! use cligram_core::Value;
//! use cligram_sources::{MergeStrategy, merge_values, nest};
//!
//! let cli = nest([("db.host".to_string(), Value::from("myhost.com"))]);
//! let file = nest([
//!     ("db.host".to_string(), Value::from("localhost")),
//!     ("db.port".to_string(), Value::from(9999)),
//! ]);
//!
//! let merged = merge_values(&cli, &file, MergeStrategy::PreferBase);
//! assert_eq!(merged.get_path("db.host"), Some(&Value::from("myhost.com")));
//! assert_eq!(merged.get_path("db.port"), Some(&Value::from(9999)));
//! ```

use cligram_core::Value;

/// Merge behavior.
///
/// Controls how conflicts between a base and an overlay tree are resolved.
///
/// # Examples
///
/// ```
/// use cligram_core::Value;
/// use cligram_sources::{MergeStrategy, merge_values};
///
/// let base = Value::from(vec![Value::from("a")]);
/// let overlay = Value::from(vec![Value::from("b")]);
///
/// assert_eq!(merge_values(&base, &overlay, MergeStrategy::PreferBase), base);
/// assert_eq!(merge_values(&base, &overlay, MergeStrategy::PreferOverlay), overlay);
/// assert_eq!(
///     merge_values(&base, &overlay, MergeStrategy::Union),
///     Value::from(vec![Value::from("a"), Value::from("b")])
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Keep base values when conflicts occur.
    #[default]
    PreferBase,
    /// Keep overlay values when conflicts occur.
    PreferOverlay,
    /// Concatenate lists (without repeating items); overlay wins for other
    /// leaves.
    Union,
}

/// Merges two value trees into one.
pub fn merge_values(base: &Value, overlay: &Value, strategy: MergeStrategy) -> Value {
    match (base, overlay) {
        (Value::Map(base_map), Value::Map(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let value = match base_map.get(key) {
                    Some(base_value) => merge_values(base_value, overlay_value, strategy),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Map(merged)
        }
        (Value::List(base_items), Value::List(overlay_items)) if strategy == MergeStrategy::Union => {
            let mut items = base_items.clone();
            for item in overlay_items {
                if !items.contains(item) {
                    items.push(item.clone());
                }
            }
            Value::List(items)
        }
        _ => match strategy {
            MergeStrategy::PreferBase => base.clone(),
            MergeStrategy::PreferOverlay | MergeStrategy::Union => overlay.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::nest;

    fn entries(pairs: &[(&str, Value)]) -> Value {
        nest(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    #[test]
    fn test_merge_prefer_base_fills_gaps() {
        let base = entries(&[("db.host", Value::from("a")), ("debug", Value::from(true))]);
        let overlay = entries(&[("db.host", Value::from("b")), ("db.port", Value::from(1))]);
        let merged = merge_values(&base, &overlay, MergeStrategy::PreferBase);

        assert_eq!(merged.get_path("db.host"), Some(&Value::from("a")));
        assert_eq!(merged.get_path("db.port"), Some(&Value::Integer(1)));
        assert_eq!(merged.get_path("debug"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_merge_prefer_overlay() {
        let base = entries(&[("db.host", Value::from("a"))]);
        let overlay = entries(&[("db.host", Value::from("b"))]);
        let merged = merge_values(&base, &overlay, MergeStrategy::PreferOverlay);
        assert_eq!(merged.get_path("db.host"), Some(&Value::from("b")));
    }

    #[test]
    fn test_merge_union_deduplicates_lists() {
        let base = entries(&[("tags", Value::from(vec![Value::from("x"), Value::from("y")]))]);
        let overlay = entries(&[("tags", Value::from(vec![Value::from("y"), Value::from("z")]))]);
        let merged = merge_values(&base, &overlay, MergeStrategy::Union);
        assert_eq!(
            merged.get_path("tags"),
            Some(&Value::from(vec![Value::from("x"), Value::from("y"), Value::from("z")]))
        );
    }

    #[test]
    fn test_map_overrides_scalar_per_strategy() {
        let base = entries(&[("db", Value::from("flat"))]);
        let overlay = entries(&[("db.host", Value::from("h"))]);
        assert_eq!(merge_values(&base, &overlay, MergeStrategy::PreferBase), base);
        assert_eq!(merge_values(&base, &overlay, MergeStrategy::PreferOverlay), overlay);
    }
}
