//! Binary entrypoint for the meshlink CLI.
//!
//! Commands:
//! - `init` - write a starter `meshlink.toml`
//! - `run [--port <path>]` - connect to a radio and keep the session alive until Ctrl-C
//! - `probe --port <path> [-b <baud>] [--timeout <s>]` - run the handshake once and print a JSON report
//!
//! See the library crate docs for module-level details: `meshlink::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use meshlink::config::Config;

#[derive(Parser)]
#[command(name = "meshlink")]
#[command(about = "Session engine for Meshtastic radios")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "meshlink.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Connect to a device and keep the session running
    Run {
        /// Meshtastic device port (e.g., /dev/ttyUSB0); overrides the config
        #[arg(short, long)]
        port: Option<String>,
    },
    /// Connect once, wait for the handshake and report the outcome as JSON
    Probe {
        /// Device serial port
        #[arg(short, long)]
        port: String,
        /// Baud rate
        #[arg(short = 'b', long, default_value_t = 115200)]
        baud: u32,
        /// Seconds to wait before giving up
        #[arg(short, long, default_value_t = 10)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            info!("Writing default configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Run { port } => {
            let config = match pre_config {
                Some(c) => c,
                None => {
                    warn!("No usable config at {}; using defaults", cli.config);
                    Config::default()
                }
            };
            info!("Starting meshlink v{}", env!("CARGO_PKG_VERSION"));
            #[cfg(not(feature = "serial"))]
            {
                let _ = (port, config);
                error!("Run requires the 'serial' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "serial")]
            run_session(config, port).await?;
        }
        Commands::Probe {
            port,
            baud,
            timeout,
        } => {
            #[cfg(not(feature = "serial"))]
            {
                let _ = (port, baud, timeout);
                error!("Probe requires the 'serial' feature");
                std::process::exit(2);
            }
            #[cfg(feature = "serial")]
            {
                let ok = probe(pre_config.unwrap_or_default(), port, baud, timeout).await?;
                std::process::exit(if ok { 0 } else { 1 });
            }
        }
    }

    Ok(())
}

#[cfg(feature = "serial")]
async fn run_session(config: Config, port: Option<String>) -> Result<()> {
    use meshlink::notify::LogNotifier;
    use meshlink::session::{Session, SessionRunner};
    use meshlink::storage::MemoryRepository;
    use meshlink::transport::{DeviceId, SerialTransport};

    let chosen_port = port.unwrap_or_else(|| config.transport.port.clone());
    let repo = match &config.storage.snapshot_path {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            MemoryRepository::with_snapshot(path)?
        }
        None => MemoryRepository::new(),
    };
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let transport = SerialTransport::new(chosen_port.clone(), config.transport.baud_rate, events_tx);
    let session = Session::new(transport, repo, LogNotifier, config.tunings());
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let runner = runner.with_flush_interval(std::time::Duration::from_secs(
        config.storage.flush_interval_secs.max(1),
    ));
    let task = tokio::spawn(runner.run());

    if let Err(e) = handle.connect(DeviceId(chosen_port.clone())).await {
        error!("Failed to connect to {}: {}", chosen_port, e);
    }

    let mut status = handle.status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("Session runner exited");
                    break;
                }
                let s = status.borrow().clone();
                info!(
                    "Link {:?}, handshake {:?}{}",
                    s.phase,
                    s.handshake,
                    s.last_error
                        .as_deref()
                        .map(|e| format!(" (last error: {})", e))
                        .unwrap_or_default()
                );
            }
        }
    }

    handle.shutdown();
    let session = task.await?;
    info!(
        "Session stopped with {} nodes known",
        meshlink::storage::Repository::nodes(session.repository()).len()
    );
    Ok(())
}

#[cfg(feature = "serial")]
async fn probe(mut config: Config, port: String, baud: u32, timeout: u64) -> Result<bool> {
    use meshlink::notify::LogNotifier;
    use meshlink::session::{HandshakePhase, LinkPhase, Session, SessionRunner};
    use meshlink::storage::MemoryRepository;
    use meshlink::transport::{DeviceId, SerialTransport};
    use tokio::time::{timeout_at, Duration, Instant};

    config.session.auto_reconnect = false;
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let transport = SerialTransport::new(port.clone(), baud, events_tx);
    let session = Session::new(transport, MemoryRepository::new(), LogNotifier, config.tunings());
    let (runner, handle) = SessionRunner::new(session, events_rx);
    let task = tokio::spawn(runner.run());

    info!("Probing {} @ {} baud", port, baud);
    handle.connect(DeviceId(port)).await?;

    let deadline = Instant::now() + Duration::from_secs(timeout);
    let mut status = handle.status();
    let outcome = timeout_at(deadline, async {
        loop {
            {
                let s = status.borrow();
                let synced = s.subscribed && s.handshake == HandshakePhase::Complete;
                let failed = s.handshake == HandshakePhase::Failed
                    || s.invalid_version
                    || (s.phase == LinkPhase::Disconnected && s.last_error.is_some());
                if synced || failed {
                    return synced;
                }
            }
            if status.changed().await.is_err() {
                return false;
            }
        }
    })
    .await
    .unwrap_or(false);

    let final_status = handle.current_status();
    handle.shutdown();
    let session = task.await?;
    if !outcome && meshlink::metrics::snapshot().frames_received == 0 {
        warn!("No protobuf frames received. Device may not be in PROTO serial mode. Enable with: meshtastic --set serial.enabled true --set serial.mode PROTO");
    }
    let payload = serde_json::json!({
        "status": if outcome { "ok" } else { "incomplete" },
        "connection": final_status,
        "node_count": meshlink::storage::Repository::nodes(session.repository()).len(),
        "metrics": meshlink::metrics::snapshot(),
        "timeout_seconds": timeout,
    });
    println!("{}", payload);
    Ok(outcome)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity wins over the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });
    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
