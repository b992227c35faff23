use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;

use crate::listing::compare::{cmp_to_bound, BoundSide};
use crate::models::entity::{scalar_text, Entity};
use crate::models::view::FacetValue;

/// Search text AND every active facet, over the configured searchable fields.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    searchable: Vec<String>,
}

impl FilterEngine {
    pub fn new(searchable: &[String]) -> Self {
        Self {
            searchable: searchable.to_vec(),
        }
    }

    /// Survivors in their original order.
    pub fn filter<'a>(
        &self,
        collection: &'a [Entity],
        search_text: &str,
        facets: &BTreeMap<String, FacetValue>,
    ) -> Vec<&'a Entity> {
        let needle = search_text.trim().to_lowercase();
        collection
            .iter()
            .filter(|entity| self.matches_search(entity, &needle))
            .filter(|entity| {
                facets
                    .iter()
                    .all(|(key, value)| matches_facet(entity, key, value))
            })
            .collect()
    }

    /// `needle` is already lower-cased; empty matches everything.
    fn matches_search(&self, entity: &Entity, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        self.searchable
            .iter()
            .filter_map(|field| entity.field(field))
            .any(|value| contains_text(value, needle))
    }
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Number(n) => n.to_string().contains(needle),
        Value::Array(items) => items.iter().any(|item| contains_text(item, needle)),
        _ => false,
    }
}

/// A missing field fails every facet except the `All` sentinel.
pub fn matches_facet(entity: &Entity, key: &str, facet: &FacetValue) -> bool {
    match facet {
        FacetValue::All => true,
        FacetValue::Equals { value } => entity
            .field(key)
            .is_some_and(|actual| equals_value(actual, value)),
        FacetValue::Range { min, max } => {
            let Some(actual) = entity.field(key) else {
                return false;
            };
            let within = |bound: &Option<String>, side: BoundSide, outside: Ordering| {
                bound.as_deref().map_or(true, |b| {
                    cmp_to_bound(actual, b, side).is_some_and(|o| o != outside)
                })
            };
            let above = within(min, BoundSide::Min, Ordering::Less);
            let below = within(max, BoundSide::Max, Ordering::Greater);
            above && below
        }
    }
}

fn equals_value(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| equals_value(item, expected)),
        other => scalar_text(other).is_some_and(|text| text == expected),
    }
}
