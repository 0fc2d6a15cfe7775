//! Core data model.
//!
//! A project is a unit of production work waiting to be bound to a producer.
//! Producers are collaborators of the production sector. Workload is derived
//! from the points of a producer's unfinished projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Newtype for project IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub Uuid);

impl ProjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Newtype for collaborator IDs. Producers and leaders are both collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollaboratorId(pub Uuid);

impl CollaboratorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CollaboratorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CollaboratorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

pub type ProducerId = CollaboratorId;
pub type LeaderId = CollaboratorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectorId(pub Uuid);

impl SectorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SectorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Distribution status
// ---------------------------------------------------------------------------

/// Where a project stands in the distribution queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    /// Waiting for a producer, eligible for automatic assignment.
    Pending,
    /// Waiting for a leader to confirm the suggested producer.
    Suggested,
    /// Bound to a producer. Terminal for distribution.
    Assigned,
}

impl DistributionStatus {
    /// Statuses that keep a project in the distribution queue.
    pub const QUEUED: [DistributionStatus; 2] =
        [DistributionStatus::Pending, DistributionStatus::Suggested];

    pub fn is_queued(self) -> bool {
        Self::QUEUED.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistributionStatus::Pending => "pending",
            DistributionStatus::Suggested => "suggested",
            DistributionStatus::Assigned => "assigned",
        }
    }
}

impl std::fmt::Display for DistributionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for DistributionStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DistributionStatus::Pending),
            "suggested" => Ok(DistributionStatus::Suggested),
            "assigned" => Ok(DistributionStatus::Assigned),
            other => Err(Error::InvalidStatus(format!("distribution status {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Production status
// ---------------------------------------------------------------------------

/// Production workflow status, independent of distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    /// Awaiting the producer. Every assignment resets to this.
    Aguardando,
    EmProducao,
    EmRevisao,
    /// Delivered to the client. Terminal.
    Entregue,
    /// Closed. Terminal.
    Concluido,
}

impl ProductionStatus {
    pub const INITIAL: ProductionStatus = ProductionStatus::Aguardando;

    /// Statuses that no longer count towards a producer's workload.
    pub const TERMINAL: [ProductionStatus; 2] =
        [ProductionStatus::Entregue, ProductionStatus::Concluido];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProductionStatus::Aguardando => "aguardando",
            ProductionStatus::EmProducao => "em_producao",
            ProductionStatus::EmRevisao => "em_revisao",
            ProductionStatus::Entregue => "entregue",
            ProductionStatus::Concluido => "concluido",
        }
    }
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for ProductionStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "aguardando" => Ok(ProductionStatus::Aguardando),
            "em_producao" => Ok(ProductionStatus::EmProducao),
            "em_revisao" => Ok(ProductionStatus::EmRevisao),
            "entregue" => Ok(ProductionStatus::Entregue),
            "concluido" => Ok(ProductionStatus::Concluido),
            other => Err(Error::InvalidStatus(format!("production status {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A production project, distribution-relevant fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub client_name: Option<String>,

    pub distribution_status: DistributionStatus,
    /// Non-binding hint set at creation. Blocks automatic assignment
    /// while the project is `suggested`.
    pub suggested_producer_id: Option<ProducerId>,

    pub total_points: Option<i32>,
    pub base_points: Option<i32>,

    pub producer_id: Option<ProducerId>,
    pub producer_name: Option<String>,
    pub assigned_by_leader_id: Option<LeaderId>,
    pub assigned_at: Option<DateTime<Utc>>,

    pub status: ProductionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Points this project adds to its producer's workload.
    pub fn weight(&self) -> i64 {
        weight(self.total_points, self.base_points)
    }

    /// Suggested with a hint: only a leader may assign it.
    pub fn is_suggestion_locked(&self) -> bool {
        self.distribution_status == DistributionStatus::Suggested
            && self.suggested_producer_id.is_some()
    }

    /// Counts towards its producer's workload.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// `total_points` if set and non-zero, else `base_points` if set and
/// non-zero, else 1. Every active project weighs at least something.
pub fn weight(total_points: Option<i32>, base_points: Option<i32>) -> i64 {
    total_points
        .filter(|p| *p != 0)
        .or(base_points.filter(|p| *p != 0))
        .map_or(1, i64::from)
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// An organizational sector ("Produção", "Comercial", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: SectorId,
    pub name: String,
}

/// A staff member. Active members of the production sector are producers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub name: String,
    pub sector_id: Option<SectorId>,
    pub active: bool,
}

/// The producer an assignment targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerRef {
    pub id: ProducerId,
    pub name: String,
}

impl From<&Collaborator> for ProducerRef {
    fn from(c: &Collaborator) -> Self {
        Self {
            id: c.id,
            name: c.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Assignment & workload
// ---------------------------------------------------------------------------

/// What an assignment wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub project_id: ProjectId,
    pub producer_id: ProducerId,
    pub producer_name: String,
    pub leader_id: LeaderId,
    pub assigned_at: DateTime<Utc>,
}

/// Raw load figures for one producer, as aggregated by a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveLoad {
    pub active_projects: u32,
    pub total_points: i64,
}

/// Point-weighted load of one producer's unfinished projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub producer_id: ProducerId,
    /// Empty when the directory has no name for the producer.
    pub producer_name: String,
    pub active_projects: u32,
    pub total_points: i64,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for new projects entering the distribution queue.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub(crate) name: String,
    pub(crate) client_name: Option<String>,
    pub(crate) total_points: Option<i32>,
    pub(crate) base_points: Option<i32>,
    pub(crate) suggested_producer: Option<ProducerId>,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client_name: None,
            total_points: None,
            base_points: None,
            suggested_producer: None,
        }
    }

    pub fn client(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    pub fn total_points(mut self, points: i32) -> Self {
        self.total_points = Some(points);
        self
    }

    pub fn base_points(mut self, points: i32) -> Self {
        self.base_points = Some(points);
        self
    }

    pub fn suggest(mut self, producer: ProducerId) -> Self {
        self.suggested_producer = Some(producer);
        self
    }

    /// `suggested` when created with a hint, `pending` otherwise.
    pub fn initial_distribution_status(&self) -> DistributionStatus {
        if self.suggested_producer.is_some() {
            DistributionStatus::Suggested
        } else {
            DistributionStatus::Pending
        }
    }

    /// Reject negative points before they reach a store.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("total_points", self.total_points),
            ("base_points", self.base_points),
        ];
        for (field, points) in fields {
            if let Some(p) = points.filter(|p| *p < 0) {
                return Err(Error::InvalidPoints(format!("{field} is {p}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_rejects_negative_points() {
        assert!(NewProject::new("a").total_points(0).base_points(8).validate().is_ok());
        assert!(matches!(
            NewProject::new("a").total_points(-50).validate(),
            Err(Error::InvalidPoints(_))
        ));
        assert!(matches!(
            NewProject::new("a").base_points(-1).validate(),
            Err(Error::InvalidPoints(_))
        ));
    }

    #[test]
    fn weight_falls_back_to_one() {
        assert_eq!(weight(None, None), 1);
        assert_eq!(weight(Some(0), Some(0)), 1);
    }

    #[test]
    fn weight_prefers_total_then_base() {
        assert_eq!(weight(Some(0), Some(5)), 5);
        assert_eq!(weight(None, Some(5)), 5);
        assert_eq!(weight(Some(3), Some(9)), 3);
    }

    #[test]
    fn statuses_round_trip_through_text() {
        for s in [
            DistributionStatus::Pending,
            DistributionStatus::Suggested,
            DistributionStatus::Assigned,
        ] {
            assert_eq!(s.as_str().parse::<DistributionStatus>().unwrap(), s);
        }
        assert!("done".parse::<ProductionStatus>().is_err());
        assert!(ProductionStatus::Concluido.is_terminal());
        assert!(!ProductionStatus::EmRevisao.is_terminal());
    }

    #[test]
    fn hint_makes_project_suggested() {
        let new = NewProject::new("Logo").suggest(CollaboratorId::new());
        assert_eq!(new.initial_distribution_status(), DistributionStatus::Suggested);
        assert_eq!(
            NewProject::new("Site").initial_distribution_status(),
            DistributionStatus::Pending
        );
    }
}
