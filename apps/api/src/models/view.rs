use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const ALL_SENTINEL: &str = "all";
pub const SEARCH_PARAM: &str = "q";
pub const SORT_PARAM: &str = "sort";
pub const DIRECTION_PARAM: &str = "dir";
pub const PAGE_PARAM: &str = "page";
pub const PER_PAGE_PARAM: &str = "per_page";

/// Value selected for one facet. Plain data so the whole filter state can be
/// written to a URL or persisted and read back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FacetValue {
    /// The `"all"` sentinel: no constraint from this facet.
    All,
    Equals { value: String },
    /// Inclusive bounds; `None` leaves that side open.
    Range {
        min: Option<String>,
        max: Option<String>,
    },
}

impl FacetValue {
    pub fn equals(value: impl Into<String>) -> Self {
        Self::Equals {
            value: value.into(),
        }
    }

    pub fn range(min: Option<&str>, max: Option<&str>) -> Self {
        Self::Range {
            min: min.map(str::to_string),
            max: max.map(str::to_string),
        }
    }

    /// Parses the URL form. `min..max` is only read as a range for range facets.
    pub fn parse(raw: &str, is_range: bool) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(ALL_SENTINEL) {
            return Self::All;
        }
        if is_range {
            if let Some((min, max)) = raw.split_once("..") {
                fn bound(s: &str) -> Option<&str> {
                    Some(s.trim()).filter(|s| !s.is_empty())
                }
                return Self::range(bound(min), bound(max));
            }
        }
        Self::equals(raw)
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_SENTINEL),
            Self::Equals { value } => f.write_str(value),
            Self::Range { min, max } => write!(
                f,
                "{}..{}",
                min.as_deref().unwrap_or(""),
                max.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Search text plus active facets. An absent facet key means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub facets: BTreeMap<String, FacetValue>,
}

impl FilterState {
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_facet(mut self, key: impl Into<String>, value: FacetValue) -> Self {
        self.facets.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Some(Self::Asc),
            "desc" | "newest" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 1-based page window over the projected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: usize,
    pub per_page: usize,
}

impl PageWindow {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }
}

/// Everything a list page asks of a controller in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub filter: FilterState,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub page: Option<PageWindow>,
}

impl ViewQuery {
    /// URL form of the query. Parsing lives with the resource config, which
    /// knows which keys are facets and which facets are ranges.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.filter.search.is_empty() {
            pairs.push((SEARCH_PARAM.to_string(), self.filter.search.clone()));
        }
        for (key, value) in &self.filter.facets {
            pairs.push((key.clone(), value.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push((SORT_PARAM.to_string(), sort.key.clone()));
            pairs.push((
                DIRECTION_PARAM.to_string(),
                sort.direction.as_str().to_string(),
            ));
        }
        if let Some(window) = self.page {
            pairs.push((PAGE_PARAM.to_string(), window.page.to_string()));
            pairs.push((PER_PAGE_PARAM.to_string(), window.per_page.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_sentinel_any_case() {
        assert_eq!(FacetValue::parse("ALL", false), FacetValue::All);
        assert_eq!(FacetValue::parse(" all ", true), FacetValue::All);
    }

    #[test]
    fn test_parse_range_open_bounds() {
        assert_eq!(
            FacetValue::parse("..500", true),
            FacetValue::range(None, Some("500"))
        );
        assert_eq!(
            FacetValue::parse("2024-01-01..", true),
            FacetValue::range(Some("2024-01-01"), None)
        );
    }

    #[test]
    fn test_exact_facet_keeps_dots() {
        assert_eq!(
            FacetValue::parse("v1..v2", false),
            FacetValue::equals("v1..v2")
        );
    }

    #[test]
    fn test_query_pairs_render_facets_and_sort() {
        let query = ViewQuery {
            filter: FilterState::default()
                .with_search("ahm")
                .with_facet("amount", FacetValue::range(Some("10"), None))
                .with_facet("status", FacetValue::equals("SIGNED")),
            sort: Some(SortSpec::desc("created_at")),
            page: Some(PageWindow::new(2, 10)),
        };
        let pairs = query.to_query_pairs();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("q"), Some("ahm"));
        assert_eq!(get("amount"), Some("10.."));
        assert_eq!(get("status"), Some("SIGNED"));
        assert_eq!(get("dir"), Some("desc"));
        assert_eq!(get("page"), Some("2"));
    }

    #[test]
    fn test_filter_state_json_round_trip() {
        let state = FilterState::default()
            .with_search("sara")
            .with_facet("status", FacetValue::All);
        let json = serde_json::to_string(&state).unwrap();
        let back: FilterState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_page_window_clamps_to_one() {
        let window = PageWindow::new(0, 0);
        assert_eq!((window.page, window.per_page), (1, 1));
    }
}
