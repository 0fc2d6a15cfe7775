//! Sector and collaborator directory.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::*;
use crate::storage::{CollaboratorDirectory, sector_matches};

#[async_trait]
impl CollaboratorDirectory for super::Db {
    async fn create_sector(&self, name: &str) -> Result<Sector> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO sectors (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(self.pool())
            .await?;
        Ok(Sector {
            id: SectorId(id),
            name: name.to_string(),
        })
    }

    async fn create_collaborator(
        &self,
        name: &str,
        sector: Option<SectorId>,
        active: bool,
    ) -> Result<Collaborator> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO collaborators (id, name, sector_id, active) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(name)
            .bind(sector.map(|s| s.0))
            .bind(active)
            .execute(self.pool())
            .await?;
        Ok(Collaborator {
            id: CollaboratorId(id),
            name: name.to_string(),
            sector_id: sector,
            active,
        })
    }

    async fn find_sector(&self, names: &[String]) -> Result<Option<Sector>> {
        // The sector table is small; matching in Rust keeps case folding
        // independent of the database collation.
        let rows: Vec<(Uuid, String)> =
            sqlx::query_as("SELECT id, name FROM sectors ORDER BY created_at ASC, id ASC")
                .fetch_all(self.pool())
                .await?;

        Ok(rows
            .into_iter()
            .find(|(_, name)| sector_matches(name, names))
            .map(|(id, name)| Sector {
                id: SectorId(id),
                name,
            }))
    }

    async fn active_members(&self, sector: SectorId) -> Result<Vec<Collaborator>> {
        let rows: Vec<(Uuid, String, Option<Uuid>, bool)> = sqlx::query_as(
            "SELECT id, name, sector_id, active FROM collaborators
             WHERE sector_id = $1 AND active
             ORDER BY name ASC, id ASC",
        )
        .bind(sector.0)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, sector_id, active)| Collaborator {
                id: CollaboratorId(id),
                name,
                sector_id: sector_id.map(SectorId),
                active,
            })
            .collect())
    }

    async fn collaborator_name(&self, id: CollaboratorId) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT name FROM collaborators WHERE id = $1")
            .bind(id.0)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(|(name,)| name))
    }
}
