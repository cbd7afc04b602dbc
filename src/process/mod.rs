// src/process/mod.rs

//! Process bookkeeping and termination.
//!
//! - [`tracker`] holds the keyed registry of live managed processes.
//! - [`group`] abstracts process-tree signalling per platform.
//! - [`terminator`] implements the SIGTERM -> SIGKILL -> evict escalation.

pub mod group;
pub mod terminator;
pub mod tracker;

pub use group::{KillSignal, ProcessGroup, platform_group, signal_child};
pub use terminator::{EscalationPolicy, TerminationOutcome, Terminator};
pub use tracker::{ManagedProcess, ProcessTracker};
