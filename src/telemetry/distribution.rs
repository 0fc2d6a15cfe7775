//! Assignment span helpers.

use tracing::Span;

use crate::model::{ProducerId, ProjectId};

/// Start a span around one assignment decision.
///
/// `distribution.producer` is declared empty and filled by
/// [`record_assignment`] once a producer is chosen.
pub fn start_assignment_span(mode: &str, project_id: &ProjectId) -> Span {
    tracing::info_span!(
        "distribution.assign",
        "distribution.mode" = mode,
        "distribution.project" = %project_id.0,
        "distribution.producer" = tracing::field::Empty,
    )
}

/// Record the chosen producer on the span and emit an event under it.
pub fn record_assignment(span: &Span, producer_id: &ProducerId) {
    span.record("distribution.producer", tracing::field::display(producer_id.0));
    span.in_scope(|| {
        tracing::info!(producer = %producer_id, "assigned");
    });
}
