// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the parsed commands, using
//! `tokio::process::Command` under `sh -c`, and reporting back through the
//! manager's event sink.
//!
//! - [`env`] implements the layered environment policy.
//! - [`shell`] builds and spawns the `sh -c` command.
//! - [`pipe`] turns stdout/stderr into UTF-8 chunks.
//! - [`driver`] owns a tracked child: forwards output, observes exit,
//!   deregisters it.
//! - [`sequential`], [`persistent`] and [`capture`] are the three execution
//!   modes, implemented as methods on [`crate::ScriptManager`].

pub mod capture;
pub mod driver;
pub mod env;
pub mod persistent;
pub mod pipe;
pub mod sequential;
pub mod shell;

pub use driver::ProcessExit;
pub use env::{COLOR_OVERLAY, apply_env, layered_env};
pub use persistent::PersistentHandle;
pub use shell::{shell_command, spawn_shell};
