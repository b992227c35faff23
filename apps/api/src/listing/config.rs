use thiserror::Error;

use crate::labels::StatusCatalog;
use crate::models::view::{
    FacetValue, FilterState, PageWindow, SortDirection, SortSpec, ViewQuery, DIRECTION_PARAM,
    PAGE_PARAM, PER_PAGE_PARAM, SEARCH_PARAM, SORT_PARAM,
};

pub const DEFAULT_PER_PAGE: usize = 20;
pub const MAX_PER_PAGE: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Exact,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetDef {
    pub key: String,
    pub kind: FacetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Date,
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub key: String,
    pub kind: SortKind,
}

/// Partition scheme used for tab counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDef {
    pub field: String,
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct StatusBinding {
    pub field: &'static str,
    pub catalog: &'static StatusCatalog,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown filter key '{0}'")]
    UnknownFacet(String),

    #[error("Unknown sort key '{0}'")]
    UnknownSort(String),

    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

/// Per-page declaration of how a resource is searched, filtered, sorted,
/// grouped and validated.
#[derive(Debug, Clone)]
pub struct ListConfig {
    pub name: String,
    pub endpoint: String,
    pub searchable: Vec<String>,
    pub facets: Vec<FacetDef>,
    pub sort_fields: Vec<SortField>,
    pub default_sort: Option<SortSpec>,
    pub group: Option<GroupDef>,
    pub flags: Vec<String>,
    pub required: Vec<String>,
    pub status: Option<StatusBinding>,
    pub per_page: usize,
}

impl ListConfig {
    pub fn builder(name: &str, endpoint: &str) -> ListConfigBuilder {
        ListConfigBuilder {
            config: ListConfig {
                name: name.to_string(),
                endpoint: endpoint.to_string(),
                searchable: Vec::new(),
                facets: Vec::new(),
                sort_fields: Vec::new(),
                default_sort: None,
                group: None,
                flags: Vec::new(),
                required: Vec::new(),
                status: None,
                per_page: DEFAULT_PER_PAGE,
            },
        }
    }

    pub fn facet(&self, key: &str) -> Option<&FacetDef> {
        self.facets.iter().find(|f| f.key == key)
    }

    pub fn sort_kind(&self, key: &str) -> Option<SortKind> {
        self.sort_fields
            .iter()
            .find(|s| s.key == key)
            .map(|s| s.kind)
    }

    pub fn is_flag(&self, field: &str) -> bool {
        self.flags.iter().any(|f| f == field)
    }

    /// Reads a view query from URL pairs. Only declared facets and sort keys
    /// are accepted; `locale` is left for the caller.
    pub fn parse_query<'a, I>(&self, pairs: I) -> Result<ViewQuery, QueryError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = FilterState::default();
        let mut sort_key: Option<String> = None;
        let mut direction: Option<SortDirection> = None;
        let mut page: Option<usize> = None;
        let mut per_page: Option<usize> = None;

        for (key, value) in pairs {
            match key {
                SEARCH_PARAM => filter = filter.with_search(value),
                SORT_PARAM => {
                    if self.sort_kind(value).is_none() {
                        return Err(QueryError::UnknownSort(value.to_string()));
                    }
                    sort_key = Some(value.to_string());
                }
                DIRECTION_PARAM => {
                    direction = Some(SortDirection::parse(value).ok_or_else(|| {
                        QueryError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                        }
                    })?);
                }
                PAGE_PARAM => page = Some(parse_count(key, value)?),
                PER_PAGE_PARAM => per_page = Some(parse_count(key, value)?.min(MAX_PER_PAGE)),
                "locale" => {}
                _ => {
                    let facet = self
                        .facet(key)
                        .ok_or_else(|| QueryError::UnknownFacet(key.to_string()))?;
                    let value = FacetValue::parse(value, facet.kind == FacetKind::Range);
                    filter = filter.with_facet(key, self.canonical_facet(key, value));
                }
            }
        }

        let sort = match (sort_key, direction) {
            (Some(key), direction) => Some(SortSpec {
                key,
                direction: direction.unwrap_or_default(),
            }),
            (None, Some(direction)) => self.default_sort.clone().map(|mut s| {
                s.direction = direction;
                s
            }),
            (None, None) => self.default_sort.clone(),
        };

        let page = match (page, per_page) {
            (None, None) => None,
            (page, per_page) => Some(PageWindow::new(
                page.unwrap_or(1),
                per_page.unwrap_or(self.per_page),
            )),
        };

        Ok(ViewQuery { filter, sort, page })
    }

    /// Stored statuses are canonical codes, so a status facet given as a
    /// label in either language is rewritten to its code.
    fn canonical_facet(&self, key: &str, value: FacetValue) -> FacetValue {
        match (self.status, value) {
            (Some(binding), FacetValue::Equals { value }) if binding.field == key => {
                match binding.catalog.canonicalize(&value) {
                    Some(code) => FacetValue::equals(code),
                    None => FacetValue::Equals { value },
                }
            }
            (_, value) => value,
        }
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, QueryError> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| QueryError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

pub struct ListConfigBuilder {
    config: ListConfig,
}

impl ListConfigBuilder {
    pub fn search(mut self, fields: &[&str]) -> Self {
        self.config
            .searchable
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn facet(mut self, key: &str) -> Self {
        self.config.facets.push(FacetDef {
            key: key.to_string(),
            kind: FacetKind::Exact,
        });
        self
    }

    pub fn range_facet(mut self, key: &str) -> Self {
        self.config.facets.push(FacetDef {
            key: key.to_string(),
            kind: FacetKind::Range,
        });
        self
    }

    pub fn sort_field(mut self, key: &str, kind: SortKind) -> Self {
        self.config.sort_fields.push(SortField {
            key: key.to_string(),
            kind,
        });
        self
    }

    pub fn default_sort(mut self, spec: SortSpec) -> Self {
        self.config.default_sort = Some(spec);
        self
    }

    pub fn group_by(mut self, field: &str, buckets: &[&str]) -> Self {
        self.config.group = Some(GroupDef {
            field: field.to_string(),
            buckets: buckets.iter().map(|b| b.to_string()).collect(),
        });
        self
    }

    pub fn flag(mut self, field: &str) -> Self {
        self.config.flags.push(field.to_string());
        self
    }

    pub fn require(mut self, fields: &[&str]) -> Self {
        self.config
            .required
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Binds a status field to its catalog; also groups by that field using
    /// the catalog's codes unless a grouping was already declared.
    pub fn status(mut self, field: &'static str, catalog: &'static StatusCatalog) -> Self {
        self.config.status = Some(StatusBinding { field, catalog });
        if self.config.group.is_none() {
            self.config.group = Some(GroupDef {
                field: field.to_string(),
                buckets: catalog.codes().map(str::to_string).collect(),
            });
        }
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.config.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn build(self) -> ListConfig {
        self.config
    }
}
