//! Reachability monitor with an operator console.
//!
//! Runs on both ESP32 and host platforms:
//! - **Host**: `cargo run --bin monitor -- monitor.json`
//! - **ESP32**: `cargo espflash flash --bin monitor --features esp32 --release`
//!   (the configuration is compiled in from `monitor.json`)
//!
//! Every configured ping component gets its own [`PingMonitor`]; every
//! output is logged. Type `help` on the console for commands.

use log::{error, info};
use reachability_rs_esp32::console::{spawn_line_reader, Command, IteratorSet, HELP_TEXT};
use reachability_rs_esp32::sink::LogSinkFactory;
use reachability_rs_esp32::{
    LoadError, MonitorConfig, MonitorError, MonitorHandle, PingMonitor, TcpProber,
};
use std::io::Write;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration file read on the host when no path is given.
#[cfg(not(feature = "esp32"))]
const DEFAULT_CONFIG_PATH: &str = "monitor.json";

/// Console lines buffered between the reader thread and the main task.
const CONSOLE_QUEUE: usize = 16;

// ESP32: Initialize ESP-IDF before anything else
#[cfg(feature = "esp32")]
fn platform_init() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("ESP-IDF initialized");
}

// Host: Just initialize env_logger
#[cfg(not(feature = "esp32"))]
fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(feature = "esp32")]
fn load_config() -> Result<MonitorConfig, LoadError> {
    MonitorConfig::from_json(include_str!("../../monitor.json"))
}

#[cfg(not(feature = "esp32"))]
fn load_config() -> Result<MonitorConfig, LoadError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    info!("Loading configuration from {}", path);
    MonitorConfig::load(&path)
}

#[cfg(not(feature = "esp32"))]
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

// The board runs until reset.
#[cfg(feature = "esp32")]
async fn shutdown_signal() {
    std::future::pending::<()>().await;
}

fn print_line(msg: &str) {
    println!("{}", msg);
    let _ = std::io::stdout().flush();
}

fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    platform_init();

    info!("=== Reachability monitor starting ===");

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let pings = match config.build_pings(&mut LogSinkFactory) {
        Ok(pings) => pings,
        Err(e) => {
            error!("Invalid ping configuration: {}", e);
            std::process::exit(1);
        }
    };
    let mut iterators = match config.build_rotations() {
        Ok(iterators) => iterators,
        Err(e) => {
            error!("Invalid rotation configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let prober = TcpProber::new(config.probe_port);
    let monitors: Vec<MonitorHandle> = pings
        .into_iter()
        .map(|aggregator| PingMonitor::new(aggregator, prober).spawn(&cancel))
        .collect();
    info!(
        "{} ping components, {} iterators",
        monitors.len(),
        iterators.len()
    );

    let (line_tx, mut lines) = mpsc::channel(CONSOLE_QUEUE);
    // Detached: a read blocked on an idle terminal must not hold up exit.
    spawn_line_reader(std::io::BufReader::new(std::io::stdin()), line_tx);

    print_line("");
    print_line("=== Reachability Console ===");
    print_line("Type 'help' for commands");
    print_line("");
    print_prompt();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                print_line("\nShutting down...");
                break;
            }
            Some(line) = lines.recv() => {
                handle_command(Command::parse(&line), &monitors, &mut iterators).await;
                print_prompt();
            }
        }
    }

    cancel.cancel();
    for handle in monitors {
        let name = handle.name().to_string();
        match handle.shutdown().await {
            Ok(aggregator) => {
                let a = aggregator.availability();
                info!("[{}] final: {}/{} reachable", name, a.count, a.total);
            }
            Err(e) => error!("[{}] {}", name, e),
        }
    }

    info!("Shutdown complete");
}

async fn handle_command(cmd: Command, monitors: &[MonitorHandle], iterators: &mut IteratorSet) {
    match cmd {
        Command::Next { .. }
        | Command::Prev { .. }
        | Command::Jump { .. }
        | Command::Reset { .. } => {
            if let Some(result) = iterators.apply(&cmd) {
                print_line(&result);
            }
        }
        Command::Enable { target } => set_enabled(monitors, &target, true).await,
        Command::Disable { target } => set_enabled(monitors, &target, false).await,
        Command::List => print_line(&iterators.format_list()),
        Command::Status => print_line(&format_status(monitors)),
        Command::Help => print_line(HELP_TEXT),
        Command::Unknown(msg) => {
            if !msg.is_empty() {
                print_line(&msg);
            }
        }
    }
}

/// Switch `target` in every ping component that has it.
async fn set_enabled(monitors: &[MonitorHandle], target: &str, enabled: bool) {
    let verb = if enabled { "enabled" } else { "disabled" };
    let mut found = false;
    for handle in monitors {
        match handle.set_enabled(target, enabled).await {
            Ok(true) => print_line(&format!("{}/{} {}", handle.name(), target, verb)),
            Ok(false) => print_line(&format!("{}/{} already {}", handle.name(), target, verb)),
            Err(MonitorError::UnknownTarget(_)) => continue,
            Err(e) => print_line(&format!("{}: {}", handle.name(), e)),
        }
        found = true;
    }
    if !found {
        print_line(&format!("Unknown target: {}", target));
    }
}

fn format_status(monitors: &[MonitorHandle]) -> String {
    if monitors.is_empty() {
        return "No ping components configured.".to_string();
    }

    let mut output = String::from("Reachability:\n");
    for handle in monitors {
        let a = handle.availability();
        output.push_str(&format!(
            "  {}: {}/{} reachable (none={} some={} all={})\n",
            handle.name(),
            a.count,
            a.total,
            a.none,
            a.some,
            a.all
        ));
        output.push_str(&format!(
            "    targets: {}\n",
            handle.target_names().collect::<Vec<_>>().join(", ")
        ));
    }
    output
}
