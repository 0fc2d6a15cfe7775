//! Production distribution: the project queue, producer workload, and
//! manual or least-loaded assignment.

pub mod balance;
pub mod subscription;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use opentelemetry::KeyValue;
use tokio::sync::watch;
use tracing::{Instrument, info, warn};

use crate::config::default_production_sectors;
use crate::error::{Error, Result};
use crate::model::*;
use crate::status_page::StatusPageSync;
use crate::storage::{CollaboratorDirectory, ProjectStore};
use crate::telemetry::distribution::{record_assignment, start_assignment_span};
use crate::telemetry::metrics;

pub use balance::least_loaded;
pub use subscription::{QueueSubscription, QueueWatch};

/// Configuration for the distributor.
#[derive(Debug, Clone)]
pub struct DistributionConfig {
    /// Names the production sector may go by, matched ignoring case.
    pub production_sectors: Vec<String>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            production_sectors: default_production_sectors(),
        }
    }
}

/// A project the bulk run could not assign.
#[derive(Debug)]
pub struct BatchFailure {
    pub project_id: ProjectId,
    pub error: Error,
}

/// Outcome of a bulk auto-assign run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Assignments written, in processing order.
    pub assigned: Vec<Assignment>,
    /// Queued projects left for a leader (suggested).
    pub skipped: usize,
    /// Projects whose assignment failed; the run continued past them.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Number of projects actually assigned.
    pub fn count(&self) -> usize {
        self.assigned.len()
    }
}

/// The distribution service. Holds the store and the status page
/// collaborator; cheap to clone.
pub struct Distributor<S> {
    store: Arc<S>,
    status_pages: Arc<dyn StatusPageSync>,
    config: DistributionConfig,
}

impl<S> Clone for Distributor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            status_pages: Arc::clone(&self.status_pages),
            config: self.config.clone(),
        }
    }
}

impl<S> Distributor<S>
where
    S: ProjectStore + CollaboratorDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        status_pages: Arc<dyn StatusPageSync>,
        config: DistributionConfig,
    ) -> Self {
        Self {
            store,
            status_pages,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Intake & workflow
    // -----------------------------------------------------------------------

    /// Put a new project in the queue, `suggested` if it carries a hint.
    pub async fn submit_project(&self, new: NewProject) -> Result<Project> {
        let project = self.store.insert_project(new).await?;
        metrics::projects_submitted().add(
            1,
            &[KeyValue::new(
                "distribution_status",
                project.distribution_status.as_str(),
            )],
        );
        info!(
            project = %project.id,
            distribution_status = %project.distribution_status,
            "project submitted"
        );
        Ok(project)
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project> {
        self.store.get_project(id).await
    }

    /// Advance the production workflow. Terminal statuses drop the project
    /// out of its producer's workload.
    pub async fn set_production_status(
        &self,
        id: ProjectId,
        status: ProductionStatus,
    ) -> Result<Project> {
        let project = self.store.set_production_status(id, status).await?;
        info!(project = %id, %status, "production status changed");
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Projects still awaiting a producer, oldest first.
    pub async fn queue(&self) -> Result<Vec<Project>> {
        self.store.queued_projects().await
    }

    /// Call `callback` with the queue now and after every change to the
    /// project table.
    pub async fn subscribe<F>(&self, mut callback: F) -> Result<QueueSubscription>
    where
        F: FnMut(Vec<Project>) + Send + 'static,
    {
        // Listen before the first read so no change slips in between.
        let feed = self.store.changes().await?;
        callback(self.queue().await?);
        Ok(subscription::spawn_refresh_loop(
            Arc::clone(&self.store),
            feed,
            callback,
        ))
    }

    /// Like [`Distributor::subscribe`], exposed as a watch channel.
    pub async fn watch_queue(&self) -> Result<QueueWatch> {
        let (tx, mut rx) = watch::channel(Vec::new());
        let subscription = self
            .subscribe(move |queue| {
                tx.send_replace(queue);
            })
            .await?;
        // The initial snapshot is current, not a change.
        rx.borrow_and_update();
        Ok(QueueWatch::new(rx, subscription))
    }

    // -----------------------------------------------------------------------
    // Workload
    // -----------------------------------------------------------------------

    /// Active project count and points of one producer.
    pub async fn workload_of(&self, producer: ProducerId) -> Result<Workload> {
        let load = self.store.active_load(producer).await?;
        let producer_name = self
            .store
            .collaborator_name(producer)
            .await?
            .unwrap_or_default();
        Ok(Workload {
            producer_id: producer,
            producer_name,
            active_projects: load.active_projects,
            total_points: load.total_points,
        })
    }

    /// Workload of each producer, in input order.
    pub async fn workload_of_all(&self, producers: &[ProducerId]) -> Result<Vec<Workload>> {
        let mut workloads = Vec::with_capacity(producers.len());
        for producer in producers {
            workloads.push(self.workload_of(*producer).await?);
        }
        Ok(workloads)
    }

    /// Active members of the production sector, ordered by name.
    pub async fn eligible_producers(&self) -> Result<Vec<Collaborator>> {
        let sector = self
            .store
            .find_sector(&self.config.production_sectors)
            .await?
            .ok_or_else(|| Error::SectorNotFound(self.config.production_sectors.clone()))?;
        self.store.active_members(sector.id).await
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Bind a project to a producer on a leader's decision.
    ///
    /// Fails with `AlreadyAssigned` if the project left the queue before the
    /// write; nothing is overwritten in that case.
    pub async fn assign(
        &self,
        project_id: ProjectId,
        producer: &ProducerRef,
        leader: LeaderId,
    ) -> Result<Assignment> {
        self.write_assignment(project_id, producer, leader, "manual")
            .await
    }

    /// Assign one project to the least-loaded of `eligible`.
    ///
    /// Returns `Ok(None)` when the project carries a producer suggestion;
    /// those wait for a leader.
    pub async fn auto_assign(
        &self,
        project_id: ProjectId,
        eligible: &[ProducerId],
        leader: LeaderId,
    ) -> Result<Option<Assignment>> {
        // Fresh read, never a caller's copy.
        let project = self.store.get_project(project_id).await?;

        if project.is_suggestion_locked() {
            info!(project = %project_id, "producer suggested, leaving for manual assignment");
            metrics::auto_skipped().add(1, &[KeyValue::new("reason", "suggested")]);
            return Ok(None);
        }
        if !project.distribution_status.is_queued() {
            return Err(Error::AlreadyAssigned(project_id));
        }

        let workloads = self.workload_of_all(eligible).await?;
        let chosen = least_loaded(&workloads).ok_or(Error::NoProducersAvailable)?;
        let producer = ProducerRef {
            id: chosen.producer_id,
            name: chosen.producer_name.clone(),
        };

        self.write_assignment(project_id, &producer, leader, "auto")
            .await
            .map(Some)
    }

    /// Drain every `pending` project, one at a time, each to whoever is least
    /// loaded at that moment.
    ///
    /// A failing project is recorded and skipped; the rest still run.
    pub async fn auto_assign_all_pending(
        &self,
        eligible: &[ProducerId],
        leader: LeaderId,
    ) -> Result<BatchReport> {
        let started = Instant::now();
        let queue = self.queue().await?;
        let mut report = BatchReport::default();

        let (pending, suggested): (Vec<Project>, Vec<Project>) = queue
            .into_iter()
            .partition(|p| p.distribution_status == DistributionStatus::Pending);
        report.skipped = suggested.len();

        if pending.is_empty() {
            return Ok(report);
        }
        if eligible.is_empty() {
            return Err(Error::NoProducersAvailable);
        }

        // Sequential on purpose: each assignment feeds the next workload read.
        for project in pending {
            match self.auto_assign(project.id, eligible, leader).await {
                Ok(Some(assignment)) => report.assigned.push(assignment),
                Ok(None) => report.skipped += 1,
                Err(error) => {
                    warn!(project = %project.id, "auto-assign failed, continuing: {error}");
                    report.failures.push(BatchFailure {
                        project_id: project.id,
                        error,
                    });
                }
            }
        }

        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "distribution.auto_assign_all")],
        );
        info!(
            assigned = report.count(),
            skipped = report.skipped,
            failed = report.failures.len(),
            "bulk auto-assign finished"
        );
        Ok(report)
    }

    /// [`Distributor::auto_assign_all_pending`] over the whole production pool.
    pub async fn auto_assign_all_pending_to_pool(&self, leader: LeaderId) -> Result<BatchReport> {
        let pool: Vec<ProducerId> = self
            .eligible_producers()
            .await?
            .iter()
            .map(|c| c.id)
            .collect();
        self.auto_assign_all_pending(&pool, leader).await
    }

    async fn write_assignment(
        &self,
        project_id: ProjectId,
        producer: &ProducerRef,
        leader: LeaderId,
        mode: &'static str,
    ) -> Result<Assignment> {
        let span = start_assignment_span(mode, &project_id);

        async {
            let started = Instant::now();
            let assignment = Assignment {
                project_id,
                producer_id: producer.id,
                producer_name: producer.name.clone(),
                leader_id: leader,
                assigned_at: Utc::now(),
            };

            if !self.store.assign_if_queued(&assignment).await? {
                metrics::assignment_conflicts().add(1, &[]);
                // NotFound for a missing project, otherwise a lost race.
                self.store.get_project(project_id).await?;
                warn!(project = %project_id, "project already left the queue");
                return Err(Error::AlreadyAssigned(project_id));
            }

            record_assignment(&span, &producer.id);
            metrics::assignments().add(1, &[KeyValue::new("mode", mode)]);
            metrics::operation_duration_ms().record(
                started.elapsed().as_secs_f64() * 1000.0,
                &[KeyValue::new("operation", "distribution.assign")],
            );

            if let Err(e) = self.status_pages.resync(project_id).await {
                warn!(project = %project_id, "status page resync failed: {e}");
            }

            Ok(assignment)
        }
        .instrument(span.clone())
        .await
    }
}
