//! Status page upserts into `project_status_pages`.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::ProjectId;
use crate::status_page::StatusPageSync;

#[async_trait]
impl StatusPageSync for super::Db {
    async fn resync(&self, id: ProjectId) -> Result<()> {
        // Rebuilt from the live row so a stale caller copy can't leak out.
        sqlx::query(
            "INSERT INTO project_status_pages
                 (project_id, project_name, client_name, producer_name, status, distribution_status, refreshed_at)
             SELECT id, name, client_name, producer_name, status, distribution_status, now()
             FROM projects WHERE id = $1
             ON CONFLICT (project_id) DO UPDATE SET
                 project_name = EXCLUDED.project_name,
                 client_name = EXCLUDED.client_name,
                 producer_name = EXCLUDED.producer_name,
                 status = EXCLUDED.status,
                 distribution_status = EXCLUDED.distribution_status,
                 refreshed_at = EXCLUDED.refreshed_at",
        )
        .bind(id.0)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

impl super::Db {
    /// Read back a published status page.
    pub async fn get_status_page(
        &self,
        id: ProjectId,
    ) -> Result<Option<crate::status_page::StatusPage>> {
        let row: Option<StatusPageRow> = sqlx::query_as(
            "SELECT project_id, project_name, client_name, producer_name, status, distribution_status, refreshed_at
             FROM project_status_pages WHERE project_id = $1",
        )
        .bind(id.0)
        .fetch_optional(self.pool())
        .await?;

        row.map(StatusPageRow::try_into_page).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct StatusPageRow {
    project_id: uuid::Uuid,
    project_name: String,
    client_name: Option<String>,
    producer_name: Option<String>,
    status: String,
    distribution_status: String,
    refreshed_at: chrono::DateTime<chrono::Utc>,
}

impl StatusPageRow {
    fn try_into_page(self) -> Result<crate::status_page::StatusPage> {
        Ok(crate::status_page::StatusPage {
            project_id: ProjectId(self.project_id),
            project_name: self.project_name,
            client_name: self.client_name,
            producer_name: self.producer_name,
            status: self.status.parse()?,
            distribution_status: self.distribution_status.parse()?,
            refreshed_at: self.refreshed_at,
        })
    }
}
