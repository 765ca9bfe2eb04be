//! Record types returned by the insights backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// A record type bound to one backend collection.
pub trait Insight: Clone + Send + Sync + 'static {
    const ENTITY: EntityType;

    /// Stable identifier of the record.
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OrganizationInsight {
    pub organization_id: String,
    pub organization_name: String,
    pub project_count: u64,
    pub user_count: u64,
    pub active_users: u64,
    pub total_cost: f64,
    pub engagement_score: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectInsight {
    pub project_id: String,
    pub project_name: String,
    pub organization_id: String,
    pub user_count: u64,
    pub active_users: u64,
    pub total_cost: f64,
    pub request_count: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInsight {
    pub user_id: String,
    pub email: Option<String>,
    pub organization_id: String,
    pub project_count: u64,
    pub request_count: u64,
    pub total_cost: f64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Insight for OrganizationInsight {
    const ENTITY: EntityType = EntityType::Organization;

    fn key(&self) -> &str {
        &self.organization_id
    }
}

impl Insight for ProjectInsight {
    const ENTITY: EntityType = EntityType::Project;

    fn key(&self) -> &str {
        &self.project_id
    }
}

impl Insight for UserInsight {
    const ENTITY: EntityType = EntityType::User;

    fn key(&self) -> &str {
        &self.user_id
    }
}

/// Sum of a per-record cost across a slice of records.
#[must_use]
pub fn total_cost<T, F: Fn(&T) -> f64>(records: &[T], cost: F) -> f64 {
    records.iter().map(cost).sum()
}
