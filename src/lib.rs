//! # nobre-hub
//!
//! Production distribution core for the Nobre Hub platform.
//!
//! Keeps a queue of projects awaiting a producer, computes point-weighted
//! producer workload, and assigns projects either on a leader's choice or
//! to the least-loaded producer. Backed by Postgres (sqlx, LISTEN/NOTIFY)
//! or an in-memory store, with OpenTelemetry observability.

pub mod config;
pub mod db;
pub mod distribution;
pub mod error;
pub mod model;
pub mod status_page;
pub mod storage;
pub mod telemetry;
