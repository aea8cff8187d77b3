//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers, gate sweeper, dispatcher produce:
//!     → logging.rs (structured log events, request id in the trace span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
