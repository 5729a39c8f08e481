//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events; precise rejection causes)
//!     → metrics.rs (rejection and degradation counters)
//!
//! Consumers:
//!     → stdout log aggregation
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request IDs are attached by tower-http and appear in every request span
//! - Metric updates are plain counter increments

pub mod logging;
pub mod metrics;
