//! Request middleware.

pub mod gate;
pub mod metrics;

pub use gate::gate_middleware;
pub use metrics::metrics_middleware;
