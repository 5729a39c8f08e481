//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Connect optional shared store → Build limiters → Listen
//!
//! Background (sweeper.rs):
//!     One periodic sweep per limiter, plus the revocation table purge
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → server drains, sweepers exit
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use sweeper::{spawn_periodic, spawn_sweeper, Sweep, SweepHandle};
