//! Public status pages: a denormalized, client-facing view of a project.
//!
//! Refreshed after every assignment. A failed refresh never undoes the
//! assignment that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DistributionStatus, Project, ProductionStatus, ProjectId};

/// What a client sees about their project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPage {
    pub project_id: ProjectId,
    pub project_name: String,
    pub client_name: Option<String>,
    pub producer_name: Option<String>,
    pub status: ProductionStatus,
    pub distribution_status: DistributionStatus,
    pub refreshed_at: DateTime<Utc>,
}

impl StatusPage {
    pub fn from_project(project: &Project, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            project_id: project.id,
            project_name: project.name.clone(),
            client_name: project.client_name.clone(),
            producer_name: project.producer_name.clone(),
            status: project.status,
            distribution_status: project.distribution_status,
            refreshed_at,
        }
    }
}

/// Rebuilds the public status page of a project from its current row.
#[async_trait]
pub trait StatusPageSync: Send + Sync {
    async fn resync(&self, id: ProjectId) -> Result<()>;
}

/// Status pages disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStatusPages;

#[async_trait]
impl StatusPageSync for NoStatusPages {
    async fn resync(&self, id: ProjectId) -> Result<()> {
        tracing::debug!(project = %id, "status pages disabled, skipping resync");
        Ok(())
    }
}
