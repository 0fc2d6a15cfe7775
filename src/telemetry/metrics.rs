//! Metric instrument factories for nobre-hub.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"nobre-hub"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for nobre-hub instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("nobre-hub")
}

/// Counter: projects entering the distribution queue.
/// Labels: `distribution_status` ("pending" | "suggested").
pub fn projects_submitted() -> Counter<u64> {
    meter()
        .u64_counter("nobre.projects.submitted")
        .with_description("Number of projects submitted for distribution")
        .build()
}

/// Counter: successful assignments.
/// Labels: `mode` ("manual" | "auto").
pub fn assignments() -> Counter<u64> {
    meter()
        .u64_counter("nobre.distribution.assignments")
        .with_description("Number of projects assigned to a producer")
        .build()
}

/// Counter: projects the automatic balancer left alone.
/// Labels: `reason`.
pub fn auto_skipped() -> Counter<u64> {
    meter()
        .u64_counter("nobre.distribution.auto_skipped")
        .with_description("Projects skipped by automatic assignment")
        .build()
}

/// Counter: assignments rejected because the project left the queue first.
pub fn assignment_conflicts() -> Counter<u64> {
    meter()
        .u64_counter("nobre.distribution.assignment_conflicts")
        .with_description("Conditional assignment writes that matched no queued row")
        .build()
}

/// Counter: queue refreshes triggered by change notifications.
/// Labels: `result` ("ok" | "error").
pub fn queue_refreshes() -> Counter<u64> {
    meter()
        .u64_counter("nobre.distribution.queue_refreshes")
        .with_description("Distribution queue re-reads after a change")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("nobre.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
