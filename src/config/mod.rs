// src/config/mod.rs

//! Configuration loading and validation for scriptrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate value ranges before a `ManagerConfig` is handed out (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    CaptureSection, EscalationSection, ManagerConfig, RawConfigFile, RelaySection,
};
