use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::labels::{
    CANDIDATE_STATUS, CLIENT_STATUS, CONTRACT_STATUS, INTERVIEW_STATUS, JOB_STATUS,
    PAYMENT_STATUS, REMINDER_STATUS,
};
use crate::listing::config::{ListConfig, SortKind};
use crate::models::view::SortSpec;

/// Every list page the dashboards render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Clients,
    Jobs,
    Candidates,
    Interviews,
    Contracts,
    Reminders,
    Archive,
    Revenue,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Clients,
        Resource::Jobs,
        Resource::Candidates,
        Resource::Interviews,
        Resource::Contracts,
        Resource::Reminders,
        Resource::Archive,
        Resource::Revenue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Clients => "clients",
            Resource::Jobs => "jobs",
            Resource::Candidates => "candidates",
            Resource::Interviews => "interviews",
            Resource::Contracts => "contracts",
            Resource::Reminders => "reminders",
            Resource::Archive => "archive",
            Resource::Revenue => "revenue",
        }
    }

    /// Upstream collection endpoint, relative to the backend base URL.
    pub fn endpoint(self) -> &'static str {
        match self {
            Resource::Clients => "/clients",
            Resource::Jobs => "/jobs",
            Resource::Candidates => "/candidates",
            Resource::Interviews => "/interviews",
            Resource::Contracts => "/contracts",
            Resource::Reminders => "/reminders",
            Resource::Archive => "/archive",
            Resource::Revenue => "/revenue",
        }
    }

    pub fn config(self, per_page: usize) -> ListConfig {
        let builder = ListConfig::builder(self.as_str(), self.endpoint()).per_page(per_page);
        match self {
            Resource::Clients => builder
                .search(&["name", "email", "phone", "company"])
                .facet("status")
                .facet("industry")
                .facet("owner_id")
                .range_facet("created_at")
                .sort_field("created_at", SortKind::Date)
                .sort_field("name", SortKind::Text)
                .default_sort(SortSpec::desc("created_at"))
                .status("status", &CLIENT_STATUS)
                .flag("favorite")
                .require(&["name"])
                .build(),
            Resource::Jobs => builder
                .search(&["title", "client_name", "location"])
                .facet("status")
                .facet("client_id")
                .facet("employment_type")
                .range_facet("salary")
                .sort_field("created_at", SortKind::Date)
                .sort_field("title", SortKind::Text)
                .sort_field("salary", SortKind::Number)
                .default_sort(SortSpec::desc("created_at"))
                .status("status", &JOB_STATUS)
                .flag("favorite")
                .require(&["title", "client_id"])
                .build(),
            Resource::Candidates => builder
                .search(&["name", "email", "phone", "skills"])
                .facet("status")
                .facet("job_id")
                .facet("skills")
                .facet("nationality")
                .range_facet("experience_years")
                .sort_field("created_at", SortKind::Date)
                .sort_field("name", SortKind::Text)
                .sort_field("experience_years", SortKind::Number)
                .default_sort(SortSpec::desc("created_at"))
                .status("status", &CANDIDATE_STATUS)
                .flag("favorite")
                .require(&["name", "email"])
                .build(),
            Resource::Interviews => builder
                .search(&["candidate_name", "job_title", "interviewer_name"])
                .facet("status")
                .facet("interviewer_id")
                .facet("job_id")
                .range_facet("scheduled_at")
                .sort_field("scheduled_at", SortKind::Date)
                .sort_field("candidate_name", SortKind::Text)
                .default_sort(SortSpec::asc("scheduled_at"))
                .status("status", &INTERVIEW_STATUS)
                .require(&["candidate_id", "scheduled_at"])
                .build(),
            Resource::Contracts => builder
                .search(&["title", "client_name"])
                .facet("status")
                .facet("client_id")
                .range_facet("value")
                .range_facet("end_date")
                .sort_field("start_date", SortKind::Date)
                .sort_field("end_date", SortKind::Date)
                .sort_field("value", SortKind::Number)
                .default_sort(SortSpec::desc("start_date"))
                .status("status", &CONTRACT_STATUS)
                .require(&["title", "client_id"])
                .build(),
            Resource::Reminders => builder
                .search(&["title", "note"])
                .facet("status")
                .facet("assignee_id")
                .range_facet("due_date")
                .sort_field("due_date", SortKind::Date)
                .default_sort(SortSpec::asc("due_date"))
                .status("status", &REMINDER_STATUS)
                .flag("pinned")
                .require(&["title", "due_date"])
                .build(),
            Resource::Archive => builder
                .search(&["name", "kind", "reason"])
                .facet("kind")
                .range_facet("archived_at")
                .sort_field("archived_at", SortKind::Date)
                .sort_field("name", SortKind::Text)
                .default_sort(SortSpec::desc("archived_at"))
                .group_by("kind", &["client", "job", "candidate", "contract"])
                .build(),
            Resource::Revenue => builder
                .search(&["client_name", "invoice_number"])
                .facet("status")
                .facet("client_id")
                .facet("month")
                .range_facet("amount")
                .range_facet("date")
                .sort_field("date", SortKind::Date)
                .sort_field("amount", SortKind::Number)
                .default_sort(SortSpec::desc("date"))
                .status("status", &PAYMENT_STATUS)
                .require(&["client_id", "amount"])
                .build(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resource::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("Unknown resource '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_names_round_trip() {
        for resource in Resource::ALL {
            assert_eq!(resource.as_str().parse::<Resource>().unwrap(), resource);
        }
        assert!("payroll".parse::<Resource>().is_err());
    }

    #[test]
    fn test_default_sort_keys_are_declared_sort_fields() {
        for resource in Resource::ALL {
            let config = resource.config(20);
            if let Some(sort) = &config.default_sort {
                assert!(
                    config.sort_kind(&sort.key).is_some(),
                    "{resource}: default sort '{}' not declared",
                    sort.key
                );
            }
        }
    }

    #[test]
    fn test_status_field_is_a_facet_wherever_bound() {
        for resource in Resource::ALL {
            let config = resource.config(20);
            if let Some(binding) = config.status {
                assert!(config.facet(binding.field).is_some(), "{resource}");
            }
        }
    }

    #[test]
    fn test_every_resource_groups_its_rows() {
        for resource in Resource::ALL {
            assert!(resource.config(20).group.is_some(), "{resource}");
        }
    }
}
