//! Project table: queue reads, workload aggregation, conditional assignment,
//! and the LISTEN-based change feed.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PROJECTS_CHANGED_CHANNEL;
use crate::error::{Error, Result};
use crate::model::*;
use crate::storage::{ChangeFeed, ProjectStore};

const PROJECT_COLUMNS: &str = "id, name, client_name, distribution_status, suggested_producer_id, \
     total_points, base_points, producer_id, producer_name, assigned_by_leader_id, assigned_at, \
     status, created_at, updated_at";

const LISTENER_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

fn queued_statuses() -> Vec<String> {
    DistributionStatus::QUEUED
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn terminal_statuses() -> Vec<String> {
    ProductionStatus::TERMINAL
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[async_trait]
impl ProjectStore for super::Db {
    async fn insert_project(&self, new: NewProject) -> Result<Project> {
        new.validate()?;
        let distribution_status = new.initial_distribution_status();
        let row: ProjectRow = sqlx::query_as(&format!(
            "INSERT INTO projects (id, name, client_name, distribution_status, suggested_producer_id, total_points, base_points, status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.client_name)
        .bind(distribution_status.as_str())
        .bind(new.suggested_producer.map(|p| p.0))
        .bind(new.total_points)
        .bind(new.base_points)
        .bind(ProductionStatus::INITIAL.as_str())
        .fetch_one(self.pool())
        .await?;

        row.try_into_project()
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("project {id}")))?
            .try_into_project()
    }

    async fn queued_projects(&self) -> Result<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects
             WHERE distribution_status = ANY($1)
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(queued_statuses())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(ProjectRow::try_into_project).collect()
    }

    async fn active_load(&self, producer: ProducerId) -> Result<ActiveLoad> {
        // Weight mirrors model::weight: total, else base, else 1.
        let (count, points): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*)::BIGINT,
                    COALESCE(SUM(COALESCE(NULLIF(total_points, 0), NULLIF(base_points, 0), 1)), 0)::BIGINT
             FROM projects
             WHERE producer_id = $1 AND status <> ALL($2)",
        )
        .bind(producer.0)
        .bind(terminal_statuses())
        .fetch_one(self.pool())
        .await?;

        Ok(ActiveLoad {
            active_projects: u32::try_from(count).unwrap_or(u32::MAX),
            total_points: points,
        })
    }

    async fn assign_if_queued(&self, assignment: &Assignment) -> Result<bool> {
        let rows_affected = sqlx::query(
            "UPDATE projects
             SET producer_id = $1, producer_name = $2, distribution_status = $3,
                 assigned_by_leader_id = $4, assigned_at = $5, status = $6, updated_at = now()
             WHERE id = $7 AND distribution_status = ANY($8)",
        )
        .bind(assignment.producer_id.0)
        .bind(&assignment.producer_name)
        .bind(DistributionStatus::Assigned.as_str())
        .bind(assignment.leader_id.0)
        .bind(assignment.assigned_at)
        .bind(ProductionStatus::INITIAL.as_str())
        .bind(assignment.project_id.0)
        .bind(queued_statuses())
        .execute(self.pool())
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn set_production_status(
        &self,
        id: ProjectId,
        status: ProductionStatus,
    ) -> Result<Project> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!(
            "UPDATE projects SET status = $1, updated_at = now() WHERE id = $2
             RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(status.as_str())
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.ok_or_else(|| Error::NotFound(format!("project {id}")))?
            .try_into_project()
    }

    async fn changes(&self) -> Result<ChangeFeed> {
        let mut listener = PgListener::connect_with(self.pool()).await?;
        listener.listen(PROJECTS_CHANGED_CHANNEL).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => {
                        debug!("change feed dropped, closing listener");
                        return;
                    }
                    notif = listener.recv() => match notif {
                        Ok(_) => {
                            if tx.send(()).is_err() {
                                return;
                            }
                        }
                        // PgListener reconnects on the next recv; a change may
                        // have been missed, so wake the consumer anyway.
                        Err(e) => {
                            warn!("PgListener error: {e}, forcing refresh");
                            if tx.send(()).is_err() {
                                return;
                            }
                            tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                        }
                    }
                }
            }
        });

        Ok(ChangeFeed::new(rx))
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    name: String,
    client_name: Option<String>,
    distribution_status: String,
    suggested_producer_id: Option<Uuid>,
    total_points: Option<i32>,
    base_points: Option<i32>,
    producer_id: Option<Uuid>,
    producer_name: Option<String>,
    assigned_by_leader_id: Option<Uuid>,
    assigned_at: Option<chrono::DateTime<chrono::Utc>>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project> {
        Ok(Project {
            id: ProjectId(self.id),
            name: self.name,
            client_name: self.client_name,
            distribution_status: self.distribution_status.parse()?,
            suggested_producer_id: self.suggested_producer_id.map(CollaboratorId),
            total_points: self.total_points,
            base_points: self.base_points,
            producer_id: self.producer_id.map(CollaboratorId),
            producer_name: self.producer_name,
            assigned_by_leader_id: self.assigned_by_leader_id.map(CollaboratorId),
            assigned_at: self.assigned_at,
            status: self.status.parse()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
