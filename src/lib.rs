// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod manager;
pub mod parse;
pub mod process;
pub mod relay;
pub mod types;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::cli::{CliArgs, CliCommand, HookArgs, KeyedRunArgs, ScriptArgs};
use crate::config::{ManagerConfig, load_or_default};
use crate::relay::{ConsoleFormat, ConsoleSink, EventBus, NullSink, Relay};

pub use crate::exec::PersistentHandle;
pub use crate::manager::{CapturePolicy, ScriptManager};
pub use crate::parse::{join_commands, parse_commands};
pub use crate::relay::EventSink;
pub use crate::types::{CaptureOutcome, EnvMap, ExecutionKey, KeyedEvent, RunOutcome, ScriptEvent};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the event relay (console renderer + event bus)
/// - the script manager
/// - Ctrl-C handling
///
/// Returns whether the requested run succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_or_default(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;

    match args.command {
        CliCommand::Parse(script) => {
            for command in parse_commands(&read_scripts(&script)?) {
                println!("{command}");
            }
            Ok(true)
        }
        CliCommand::Run(run_args) => run_sequential(&cfg, run_args).await,
        CliCommand::Serve(run_args) => serve(&cfg, run_args).await,
        CliCommand::Hook(hook_args) => run_hook(&cfg, hook_args).await,
    }
}

/// Script text from `--file` arguments first, then positional scripts.
fn read_scripts(args: &ScriptArgs) -> Result<Vec<String>> {
    let mut scripts = Vec::with_capacity(args.files.len() + args.scripts.len());
    for path in &args.files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading script file {}", path.display()))?;
        scripts.push(text);
    }
    scripts.extend(args.scripts.iter().cloned());
    Ok(scripts)
}

/// Config `[env]` overlaid with `--env` pairs.
fn merged_extra_env(cfg: &ManagerConfig, args: &KeyedRunArgs) -> EnvMap {
    let mut env = cfg.env.clone();
    env.extend(args.env.iter().cloned());
    env
}

fn build_manager(cfg: &ManagerConfig, json: bool) -> (ScriptManager, Arc<EventBus>) {
    let format = if json {
        ConsoleFormat::Json
    } else {
        ConsoleFormat::Text
    };
    let bus = Arc::new(EventBus::new(cfg.relay.bus_capacity));
    let relay = Relay::new()
        .with_sink(Arc::new(ConsoleSink::new(format)))
        .with_sink(bus.clone());
    (ScriptManager::new(cfg, Arc::new(relay)), bus)
}

async fn run_sequential(cfg: &ManagerConfig, args: KeyedRunArgs) -> Result<bool> {
    let scripts = read_scripts(&args.script)?;
    let extra_env = merged_extra_env(cfg, &args);
    let (manager, _bus) = build_manager(cfg, args.json);

    // Ctrl-C kills whatever command is currently running under the key,
    // which ends the sequential run with a failure.
    {
        let manager = manager.clone();
        let key = args.key.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!(key = %key, "Ctrl-C received; stopping current command");
            manager.kill_process(&key).await;
        });
    }

    let outcome = manager
        .run_sequential(&scripts, &args.cwd, &args.key, Some(&extra_env))
        .await;

    if let Some(error) = &outcome.error {
        eprintln!("scriptrun: {error}");
    }
    Ok(outcome.success)
}

async fn serve(cfg: &ManagerConfig, args: KeyedRunArgs) -> Result<bool> {
    let scripts = read_scripts(&args.script)?;
    let extra_env = merged_extra_env(cfg, &args);
    let (manager, bus) = build_manager(cfg, args.json);

    // Subscribe before spawning so the terminal event cannot be missed.
    let mut events = bus.subscribe(&args.key);
    let handle = manager
        .run_persistent(&scripts, &args.cwd, &args.key, Some(&extra_env))
        .await;
    info!(key = %args.key, pid = ?handle.pid(), "persistent process started");

    let success = tokio::select! {
        ended = async {
            loop {
                match events.recv().await {
                    Ok(ScriptEvent::Done) => break true,
                    Ok(ScriptEvent::Error { .. }) => break false,
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => debug!(skipped = n, "event subscriber lagged"),
                    Err(RecvError::Closed) => break false,
                }
            }
        } => ended,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                eprintln!("failed to listen for Ctrl+C: {e}");
            }
            info!(key = %args.key, "Ctrl-C received; stopping persistent process");
            handle.kill().await;
            true
        }
    };

    manager.kill_all();
    Ok(success)
}

async fn run_hook(cfg: &ManagerConfig, args: HookArgs) -> Result<bool> {
    let scripts = read_scripts(&args.script)?;
    // Hooks buffer their output; nothing is streamed.
    let manager = ScriptManager::new(cfg, Arc::new(NullSink));

    let outcome = manager
        .run_and_wait(&scripts, &args.cwd, args.timeout_ms.map(Duration::from_millis))
        .await;

    print!("{}", outcome.output);
    if let Some(error) = &outcome.error {
        eprintln!("scriptrun: {error}");
    }
    Ok(outcome.success)
}
