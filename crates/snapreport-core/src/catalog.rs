use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::model::QueryDefinition;

// (name, label, sql). Order is the order sections appear in the report.
const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "contributions_by_type",
        "The Flogo community has built a ton of things!",
        "select type, count(type) as num from acts group by type",
    ),
    (
        "distinct_authors",
        "Looking at the community we have",
        "SELECT COUNT(DISTINCT author) as Users FROM acts",
    ),
    (
        "distinct_non_tibco_authors",
        "Looking at the people that do not have \"TIBCO\" in their name (_but they still could be employees..._)",
        "SELECT COUNT(DISTINCT author) as 'Users' FROM acts WHERE author NOT LIKE '%TIBCO%' COLLATE NOCASE",
    ),
    (
        "leaderboard",
        "The Flogo Leaderboard:",
        "select author, count(author) as num from acts group by author order by num desc limit 5",
    ),
    (
        "leaderboard_community",
        "If we remove the \"Unknown\" contributions and contributions from people that identify as \"TIBCO Software Inc.\" the leaderboard is:",
        "select author, count(author) as num from acts where author not in ('Unknown','Your Name <you.name@example.org>') and author not like 'TIBCO Software%' group by author order by num desc limit 5",
    ),
];

/// The fixed, ordered list of queries a run executes.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryCatalog {
    pub queries: Vec<QueryDefinition>,
}

impl QueryCatalog {
    pub fn builtin() -> Self {
        Self {
            queries: BUILTIN
                .iter()
                .map(|(name, label, sql)| QueryDefinition::new(*name, *label, *sql))
                .collect(),
        }
    }

    /// Parse a catalog of the form `queries: [{name, label, sql}, ...]`.
    pub fn from_yaml_str(s: &str) -> Result<Self, CatalogError> {
        let catalog: QueryCatalog = serde_yaml::from_str(s)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.queries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for q in &self.queries {
            if !seen.insert(q.name.as_str()) {
                return Err(CatalogError::DuplicateName(q.name.clone()));
            }
            if q.sql.trim().is_empty() {
                return Err(CatalogError::EmptySql(q.name.clone()));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryDefinition> {
        self.queries.iter()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}
