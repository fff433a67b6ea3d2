//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate, handlers, database client produce:
//!     → logging.rs (tracing events with structured fields)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log collection
//!     → Prometheus scrape on observability.metrics_address
//! ```

pub mod logging;
pub mod metrics;
