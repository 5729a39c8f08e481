//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to shared store:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On failure: caller degrades to the in-memory path or fails open
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external store call has a deadline
//! - A dependency outage must never stall a request

pub mod timeouts;
