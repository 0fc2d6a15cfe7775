//! Storage seams for the distribution core.
//!
//! The balancer only needs a handful of queries against the project table
//! and the collaborator directory. `Db` implements them on Postgres,
//! `MemoryStore` implements them in-process for tests and dry runs.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::model::*;

pub use memory::MemoryStore;

/// Project table operations.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a new project into the distribution queue.
    async fn insert_project(&self, new: NewProject) -> Result<Project>;

    /// Fetch one project. `Error::NotFound` if it does not exist.
    async fn get_project(&self, id: ProjectId) -> Result<Project>;

    /// Projects in `pending` or `suggested`, oldest first.
    async fn queued_projects(&self) -> Result<Vec<Project>>;

    /// Count and weight of the producer's non-terminal projects.
    async fn active_load(&self, producer: ProducerId) -> Result<ActiveLoad>;

    /// Write the assignment only if the project is still queued.
    ///
    /// Returns `false` when no row matched (already assigned or missing).
    async fn assign_if_queued(&self, assignment: &Assignment) -> Result<bool>;

    /// Move a project along the production workflow.
    async fn set_production_status(&self, id: ProjectId, status: ProductionStatus)
    -> Result<Project>;

    /// Notifications for any insert, update or delete on the project table.
    async fn changes(&self) -> Result<ChangeFeed>;
}

/// Sector and collaborator lookups.
#[async_trait]
pub trait CollaboratorDirectory: Send + Sync {
    async fn create_sector(&self, name: &str) -> Result<Sector>;

    async fn create_collaborator(
        &self,
        name: &str,
        sector: Option<SectorId>,
        active: bool,
    ) -> Result<Collaborator>;

    /// First sector whose name matches one of `names`, ignoring case.
    async fn find_sector(&self, names: &[String]) -> Result<Option<Sector>>;

    /// Active members of a sector, ordered by name then id.
    async fn active_members(&self, sector: SectorId) -> Result<Vec<Collaborator>>;

    async fn collaborator_name(&self, id: CollaboratorId) -> Result<Option<String>>;
}

/// Payload-free change notifications. Consumers re-query on every wake.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: mpsc::UnboundedReceiver<()>,
}

impl ChangeFeed {
    pub fn new(rx: mpsc::UnboundedReceiver<()>) -> Self {
        Self { rx }
    }

    /// Wait for the next change. Notifications that piled up meanwhile are
    /// folded into this one. `None` once the source is gone.
    pub async fn next(&mut self) -> Option<()> {
        self.rx.recv().await?;
        while self.rx.try_recv().is_ok() {}
        Some(())
    }
}

/// Case-insensitive sector name match, Unicode aware ("PRODUÇÃO" matches
/// "produção"). Done in Rust because Postgres `lower()` only folds ASCII
/// under the C collation.
pub(crate) fn sector_matches(sector_name: &str, wanted: &[String]) -> bool {
    let name = sector_name.trim().to_lowercase();
    wanted.iter().any(|w| w.trim().to_lowercase() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sector_match_folds_non_ascii_case() {
        let wanted = names(&["produção", "production"]);
        assert!(sector_matches("PRODUÇÃO", &wanted));
        assert!(sector_matches("  Produção ", &wanted));
        assert!(sector_matches("Production", &wanted));
        assert!(!sector_matches("Atendimento", &wanted));
    }

    #[test]
    fn sector_match_trims_wanted_names() {
        assert!(sector_matches("produção", &names(&[" PRODUÇÃO  "])));
        assert!(!sector_matches("produção", &[]));
    }
}
