//! In-process store with the same semantics as the Postgres one.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use super::{ChangeFeed, CollaboratorDirectory, ProjectStore, sector_matches};
use crate::error::{Error, Result};
use crate::model::*;
use crate::status_page::{StatusPage, StatusPageSync};

#[derive(Default)]
struct Inner {
    /// Insertion sequence, breaks `created_at` ties.
    seq: u64,
    projects: HashMap<ProjectId, (u64, Project)>,
    sectors: Vec<Sector>,
    collaborators: Vec<Collaborator>,
    pages: HashMap<ProjectId, StatusPage>,
    listeners: Vec<mpsc::UnboundedSender<()>>,
    failing_writes: HashSet<ProjectId>,
    fail_reads: bool,
    failed_reads: u64,
}

impl Inner {
    fn check_read(&mut self) -> Result<()> {
        if self.fail_reads {
            self.failed_reads += 1;
            return Err(Error::Other("read from project table failed".to_string()));
        }
        Ok(())
    }

    fn notify(&mut self) {
        self.listeners.retain(|tx| tx.send(()).is_ok());
    }

    fn project_mut(&mut self, id: ProjectId) -> Result<&mut Project> {
        self.projects
            .get_mut(&id)
            .map(|(_, p)| p)
            .ok_or_else(|| Error::NotFound(format!("project {id}")))
    }
}

/// In-memory project table, directory and status pages.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("memory store lock poisoned".to_string()))
    }

    /// Make every later write to this project fail like a lost connection.
    pub fn fail_writes_for(&self, id: ProjectId) -> Result<()> {
        self.lock()?.failing_writes.insert(id);
        Ok(())
    }

    /// Make queue and workload reads fail until switched back off.
    pub fn set_fail_reads(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_reads = fail;
        Ok(())
    }

    /// Number of reads rejected while failing.
    pub fn failed_reads(&self) -> Result<u64> {
        Ok(self.lock()?.failed_reads)
    }

    /// Last status page published for a project.
    pub fn status_page(&self, id: ProjectId) -> Result<Option<StatusPage>> {
        Ok(self.lock()?.pages.get(&id).cloned())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, new: NewProject) -> Result<Project> {
        new.validate()?;
        let now = Utc::now();
        let project = Project {
            id: ProjectId::new(),
            distribution_status: new.initial_distribution_status(),
            name: new.name,
            client_name: new.client_name,
            suggested_producer_id: new.suggested_producer,
            total_points: new.total_points,
            base_points: new.base_points,
            producer_id: None,
            producer_name: None,
            assigned_by_leader_id: None,
            assigned_at: None,
            status: ProductionStatus::INITIAL,
            created_at: now,
            updated_at: now,
        };

        let mut inner = self.lock()?;
        inner.seq += 1;
        let seq = inner.seq;
        inner.projects.insert(project.id, (seq, project.clone()));
        inner.notify();
        Ok(project)
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project> {
        let inner = self.lock()?;
        inner
            .projects
            .get(&id)
            .map(|(_, p)| p.clone())
            .ok_or_else(|| Error::NotFound(format!("project {id}")))
    }

    async fn queued_projects(&self) -> Result<Vec<Project>> {
        let mut inner = self.lock()?;
        inner.check_read()?;
        let mut queued: Vec<_> = inner
            .projects
            .values()
            .filter(|(_, p)| p.distribution_status.is_queued())
            .collect();
        queued.sort_by_key(|(seq, p)| (p.created_at, *seq));
        Ok(queued.into_iter().map(|(_, p)| p.clone()).collect())
    }

    async fn active_load(&self, producer: ProducerId) -> Result<ActiveLoad> {
        let mut inner = self.lock()?;
        inner.check_read()?;
        Ok(inner
            .projects
            .values()
            .map(|(_, p)| p)
            .filter(|p| p.producer_id == Some(producer) && p.is_active())
            .fold(ActiveLoad::default(), |acc, p| ActiveLoad {
                active_projects: acc.active_projects + 1,
                total_points: acc.total_points + p.weight(),
            }))
    }

    async fn assign_if_queued(&self, assignment: &Assignment) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.failing_writes.contains(&assignment.project_id) {
            return Err(Error::Other(format!(
                "write to project {} failed",
                assignment.project_id
            )));
        }
        let Some((_, project)) = inner.projects.get_mut(&assignment.project_id) else {
            return Ok(false);
        };
        if !project.distribution_status.is_queued() {
            return Ok(false);
        }

        project.producer_id = Some(assignment.producer_id);
        project.producer_name = Some(assignment.producer_name.clone());
        project.distribution_status = DistributionStatus::Assigned;
        project.assigned_by_leader_id = Some(assignment.leader_id);
        project.assigned_at = Some(assignment.assigned_at);
        project.status = ProductionStatus::INITIAL;
        project.updated_at = Utc::now();
        inner.notify();
        Ok(true)
    }

    async fn set_production_status(
        &self,
        id: ProjectId,
        status: ProductionStatus,
    ) -> Result<Project> {
        let mut inner = self.lock()?;
        let project = inner.project_mut(id)?;
        project.status = status;
        project.updated_at = Utc::now();
        let updated = project.clone();
        inner.notify();
        Ok(updated)
    }

    async fn changes(&self) -> Result<ChangeFeed> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock()?.listeners.push(tx);
        Ok(ChangeFeed::new(rx))
    }
}

#[async_trait]
impl CollaboratorDirectory for MemoryStore {
    async fn create_sector(&self, name: &str) -> Result<Sector> {
        let sector = Sector {
            id: SectorId::new(),
            name: name.to_string(),
        };
        self.lock()?.sectors.push(sector.clone());
        Ok(sector)
    }

    async fn create_collaborator(
        &self,
        name: &str,
        sector: Option<SectorId>,
        active: bool,
    ) -> Result<Collaborator> {
        let collaborator = Collaborator {
            id: CollaboratorId::new(),
            name: name.to_string(),
            sector_id: sector,
            active,
        };
        self.lock()?.collaborators.push(collaborator.clone());
        Ok(collaborator)
    }

    async fn find_sector(&self, names: &[String]) -> Result<Option<Sector>> {
        let inner = self.lock()?;
        Ok(inner
            .sectors
            .iter()
            .find(|s| sector_matches(&s.name, names))
            .cloned())
    }

    async fn active_members(&self, sector: SectorId) -> Result<Vec<Collaborator>> {
        let inner = self.lock()?;
        let mut members: Vec<Collaborator> = inner
            .collaborators
            .iter()
            .filter(|c| c.active && c.sector_id == Some(sector))
            .cloned()
            .collect();
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn collaborator_name(&self, id: CollaboratorId) -> Result<Option<String>> {
        let inner = self.lock()?;
        Ok(inner
            .collaborators
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone()))
    }
}

#[async_trait]
impl StatusPageSync for MemoryStore {
    async fn resync(&self, id: ProjectId) -> Result<()> {
        let mut inner = self.lock()?;
        let project = inner.project_mut(id)?.clone();
        inner.pages.insert(id, StatusPage::from_project(&project, Utc::now()));
        Ok(())
    }
}
