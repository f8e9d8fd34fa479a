//! Observability Module
//!
//! - `tracing`: log subscriber setup (text or JSON, `RUST_LOG` filtering)
//! - `events`: one structured log function per domain event
//! - `metrics`: Prometheus counters and gauges for commands, peers and the ring

pub mod events;
pub mod metrics;
pub mod tracing;

pub use metrics::init_metrics;
pub use tracing::{init_tracing, LogFormat, TracingConfig};
