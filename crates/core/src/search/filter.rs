//! Equality filtering for search and lookup.
//!
//! A [`Filter`] maps attribute names to exact-match values. A record matches
//! when every filter key is present on it with an equal value; the empty
//! filter matches every record.

use crate::record::{MetadataValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exact-match attribute filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter {
    conditions: BTreeMap<String, MetadataValue>,
}

impl Filter {
    /// Creates the empty filter, which matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.conditions.insert(key.to_string(), value.into());
        self
    }

    /// Returns `true` if the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns `true` if `record` satisfies every condition.
    pub fn matches(&self, record: &Record) -> bool {
        matches_filter(record, self)
    }
}

impl FromIterator<(String, MetadataValue)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, MetadataValue)>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

/// Check if a record matches the given filter.
/// Conditions are AND-ed; a missing attribute never matches.
pub fn matches_filter(record: &Record, filter: &Filter) -> bool {
    filter
        .conditions
        .iter()
        .all(|(key, expected)| record.get(key).is_some_and(|actual| actual.matches(expected)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit() -> Record {
        Record::with_embedding(vec![1.0, 2.0])
            .with("id", 1)
            .with("name", "apple")
            .with("ripe", true)
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(Filter::new().matches(&fruit()));
        assert!(Filter::new().matches(&Record::new()));
    }

    #[test]
    fn test_eq_string() {
        assert!(Filter::new().eq("name", "apple").matches(&fruit()));
        assert!(!Filter::new().eq("name", "pear").matches(&fruit()));
    }

    #[test]
    fn test_all_conditions_required() {
        let filter = Filter::new().eq("name", "apple").eq("ripe", false);
        assert!(!filter.matches(&fruit()));
        let filter = Filter::new().eq("name", "apple").eq("ripe", true);
        assert!(filter.matches(&fruit()));
    }

    #[test]
    fn test_missing_key_does_not_match() {
        assert!(!Filter::new().eq("color", "red").matches(&fruit()));
    }

    #[test]
    fn test_integer_matches_float() {
        assert!(Filter::new().eq("id", 1.0).matches(&fruit()));
        assert!(!Filter::new().eq("id", 2).matches(&fruit()));
    }

    #[test]
    fn test_no_cross_type_coercion() {
        assert!(!Filter::new().eq("id", "1").matches(&fruit()));
    }
}
