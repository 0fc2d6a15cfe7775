//! Error types for nobre-hub.

use crate::model::ProjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    /// The project left the distribution queue before the write landed.
    #[error("project {0} is no longer awaiting distribution")]
    AlreadyAssigned(ProjectId),

    #[error("no producers available for distribution")]
    NoProducersAvailable,

    #[error("production sector not found (looked for {0:?})")]
    SectorNotFound(Vec<String>),

    /// Points must not be negative.
    #[error("invalid points: {0}")]
    InvalidPoints(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Business conditions the caller should report as such, not as faults.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            Error::NoProducersAvailable
                | Error::AlreadyAssigned(_)
                | Error::NotFound(_)
                | Error::InvalidPoints(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
