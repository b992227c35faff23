use std::cmp::Ordering;

use serde::Serialize;

use crate::listing::compare::SortKey;
use crate::listing::config::ListConfig;
use crate::models::entity::{scalar_text, Entity};
use crate::models::view::{PageWindow, SortDirection, SortSpec};

/// Bucket key for entities that lack the discriminant field.
pub const UNASSIGNED_BUCKET: &str = "unassigned";

/// Sorted copy of `filtered`. The input order is never touched; entities that
/// compare equal keep their filtered order. Missing keys sort last in both
/// directions.
pub fn project<'a>(
    filtered: &[&'a Entity],
    sort: Option<&SortSpec>,
    config: &ListConfig,
) -> Vec<&'a Entity> {
    let Some(sort) = sort else {
        return filtered.to_vec();
    };
    let kind = config.sort_kind(&sort.key);

    let mut keyed: Vec<(Option<SortKey>, &'a Entity)> = filtered
        .iter()
        .map(|entity| {
            let key = entity.field(&sort.key).map(|v| SortKey::of(v, kind));
            (key, *entity)
        })
        .collect();

    // slice::sort_by is stable
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => match sort.direction {
            SortDirection::Asc => a.compare(b),
            SortDirection::Desc => b.compare(a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, entity)| entity).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub key: String,
    pub count: usize,
}

/// Partitions `filtered` by `field`. Declared buckets come first (possibly
/// empty), then other observed values in first-seen order, then
/// `unassigned`. Every entity lands in exactly one bucket.
pub fn bucket_counts(filtered: &[&Entity], field: &str, declared: &[String]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = declared
        .iter()
        .map(|key| Bucket {
            key: key.clone(),
            count: 0,
        })
        .collect();
    let mut unassigned = 0;

    for entity in filtered {
        let Some(key) = entity.field(field).and_then(scalar_text) else {
            unassigned += 1;
            continue;
        };
        match buckets.iter_mut().find(|b| b.key == key) {
            Some(bucket) => bucket.count += 1,
            None => buckets.push(Bucket { key, count: 1 }),
        }
    }

    if unassigned > 0 {
        buckets.push(Bucket {
            key: UNASSIGNED_BUCKET.to_string(),
            count: unassigned,
        });
    }
    buckets
}

/// Size of an overlapping bucket such as favorites.
pub fn count_flagged(filtered: &[&Entity], field: &str) -> usize {
    filtered.iter().filter(|e| e.flag(field)).count()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// Cuts one window out of the projected rows. Without a window everything is
/// one page.
pub fn paginate<T: Clone>(projected: &[T], window: Option<PageWindow>) -> Page<T> {
    let total = projected.len();
    let Some(window) = window else {
        return Page {
            items: projected.to_vec(),
            total,
            page: 1,
            per_page: total,
            total_pages: 1,
        };
    };

    let per_page = window.per_page.max(1);
    let start = window.page.saturating_sub(1).saturating_mul(per_page);
    let items = projected
        .iter()
        .skip(start)
        .take(per_page)
        .cloned()
        .collect();

    Page {
        items,
        total,
        page: window.page,
        per_page,
        total_pages: total.div_ceil(per_page).max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::config::SortKind;
    use serde_json::json;

    fn entities(values: Vec<serde_json::Value>) -> Vec<Entity> {
        values
            .into_iter()
            .map(|v| Entity::from_value(v).unwrap())
            .collect()
    }

    fn ids(entities: &[&Entity]) -> Vec<String> {
        entities.iter().map(|e| e.id.to_string()).collect()
    }

    fn config() -> ListConfig {
        ListConfig::builder("test", "/test")
            .sort_field("date", SortKind::Date)
            .sort_field("name", SortKind::Text)
            .sort_field("amount", SortKind::Number)
            .build()
    }

    #[test]
    fn test_sort_by_date_ascending() {
        let collection = entities(vec![
            json!({"id": "1", "date": "2024-02-01"}),
            json!({"id": "2", "date": "2024-01-01"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let projected = project(&filtered, Some(&SortSpec::asc("date")), &config());
        assert_eq!(ids(&projected), ["2", "1"]);
        assert_eq!(ids(&filtered), ["1", "2"]);
    }

    #[test]
    fn test_date_sort_uses_timestamps_not_text() {
        let collection = entities(vec![
            json!({"id": "1", "date": "2024-01-01T10:00:00+05:00"}),
            json!({"id": "2", "date": "2024-01-01T06:00:00Z"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let projected = project(&filtered, Some(&SortSpec::desc("date")), &config());
        assert_eq!(ids(&projected), ["2", "1"]);
    }

    #[test]
    fn test_sort_is_stable_in_both_directions() {
        let collection = entities(vec![
            json!({"id": "a", "name": "Sara"}),
            json!({"id": "b", "name": "Ahmed"}),
            json!({"id": "c", "name": "sara"}),
            json!({"id": "d", "name": "Sara"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let asc = project(&filtered, Some(&SortSpec::asc("name")), &config());
        assert_eq!(ids(&asc), ["b", "a", "d", "c"]);
        let desc = project(&filtered, Some(&SortSpec::desc("name")), &config());
        assert_eq!(ids(&desc), ["c", "a", "d", "b"]);
    }

    #[test]
    fn test_numeric_sort_is_not_lexical() {
        let collection = entities(vec![
            json!({"id": "1", "amount": 900}),
            json!({"id": "2", "amount": "1200"}),
            json!({"id": "3", "amount": 85.5}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let projected = project(&filtered, Some(&SortSpec::asc("amount")), &config());
        assert_eq!(ids(&projected), ["3", "1", "2"]);
    }

    #[test]
    fn test_missing_sort_key_goes_last() {
        let collection = entities(vec![
            json!({"id": "1"}),
            json!({"id": "2", "date": "2024-01-01"}),
            json!({"id": "3", "date": "2024-03-01"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let asc = project(&filtered, Some(&SortSpec::asc("date")), &config());
        assert_eq!(ids(&asc), ["2", "3", "1"]);
        let desc = project(&filtered, Some(&SortSpec::desc("date")), &config());
        assert_eq!(ids(&desc), ["3", "2", "1"]);
    }

    #[test]
    fn test_projection_is_a_permutation() {
        let collection = entities(vec![
            json!({"id": "1", "name": "b"}),
            json!({"id": "2"}),
            json!({"id": "3", "name": 7}),
            json!({"id": "4", "name": "a"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let projected = project(&filtered, Some(&SortSpec::desc("name")), &config());
        let mut a = ids(&projected);
        let mut b = ids(&filtered);
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_sort_keeps_filtered_order() {
        let collection = entities(vec![json!({"id": "2"}), json!({"id": "1"})]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        assert_eq!(ids(&project(&filtered, None, &config())), ["2", "1"]);
    }

    #[test]
    fn test_bucket_counts_sum_to_filtered_size() {
        let collection = entities(vec![
            json!({"id": "1", "status": "NEW"}),
            json!({"id": "2", "status": "SIGNED"}),
            json!({"id": "3", "status": "NEW"}),
            json!({"id": "4", "status": "LEGACY"}),
            json!({"id": "5"}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        let declared = vec!["NEW".to_string(), "SIGNED".to_string(), "LOST".to_string()];
        let buckets = bucket_counts(&filtered, "status", &declared);

        let keys: Vec<_> = buckets.iter().map(|b| b.key.as_str()).collect();
        assert_eq!(keys, ["NEW", "SIGNED", "LOST", "LEGACY", UNASSIGNED_BUCKET]);
        let counts: Vec<_> = buckets.iter().map(|b| b.count).collect();
        assert_eq!(counts, [2, 1, 0, 1, 1]);
        assert_eq!(counts.iter().sum::<usize>(), filtered.len());
    }

    #[test]
    fn test_flag_count_overlaps_partition() {
        let collection = entities(vec![
            json!({"id": "1", "status": "NEW", "favorite": true}),
            json!({"id": "2", "status": "NEW"}),
            json!({"id": "3", "status": "SIGNED", "favorite": true}),
        ]);
        let filtered: Vec<&Entity> = collection.iter().collect();
        assert_eq!(count_flagged(&filtered, "favorite"), 2);
    }

    #[test]
    fn test_paginate_windows() {
        let rows: Vec<u32> = (1..=25).collect();
        let page = paginate(&rows, Some(PageWindow::new(3, 10)));
        assert_eq!(page.items, (21..=25).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 25);

        let past_end = paginate(&rows, Some(PageWindow::new(9, 10)));
        assert!(past_end.items.is_empty());

        let whole = paginate(&rows, None);
        assert_eq!(whole.items.len(), 25);
        assert_eq!(whole.total_pages, 1);
    }

    #[test]
    fn test_paginate_empty() {
        let rows: Vec<u32> = Vec::new();
        let page = paginate(&rows, Some(PageWindow::new(1, 10)));
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }
}
