//! Binary entrypoint for the thinkgear CLI.
//!
//! Commands:
//! - `listen [--port <path>] [--no-persist]` - stream from a headset, log events, persist band samples
//! - `replay <capture> [--persist]` - decode a raw byte capture through the same pipeline
//! - `dump <file.freq>` - print persisted band samples as JSON lines
//! - `init` - create a starter `config.toml`
//!
//! See the library crate docs for module‑level details: `thinkgear::`.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use thinkgear::config::{Config, OutputConfig};
use thinkgear::emitter::sample_file::{SampleReader, SampleWriter};
use thinkgear::emitter::{EventSink, LogSink, SampleFileSink};
use thinkgear::protocol::errors::SessionError;
use thinkgear::protocol::source::ReaderSource;
use thinkgear::session::{Session, SessionSummary};

#[derive(Parser)]
#[command(name = "thinkgear")]
#[command(about = "Decoder for NeuroSky ThinkGear EEG headset streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream from the headset until Ctrl-C or the link drops
    Listen {
        /// Serial port of the dongle (e.g., /dev/rfcomm0, COM3)
        #[arg(short, long)]
        port: Option<String>,

        /// Do not write a .freq sample file for this session
        #[arg(long)]
        no_persist: bool,
    },
    /// Decode a raw byte capture file
    Replay {
        /// File holding bytes exactly as read from the port
        capture: String,

        /// Write band samples to a .freq file like `listen` does
        #[arg(long)]
        persist: bool,
    },
    /// Print a .freq sample file as JSON lines
    Dump {
        file: String,
    },
    /// Write a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command {
        Commands::Init => None,
        _ => Some(load_config(&cli.config).await?),
    };
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Listen { port, no_persist } => {
            let mut config = config.unwrap_or_default();
            if let Some(p) = port {
                config.device.port = p;
            }
            if no_persist {
                config.output.persist_bands = false;
            }
            config.validate()?;
            info!("Starting thinkgear v{}", env!("CARGO_PKG_VERSION"));
            let summary = listen(config).await?;
            report(&summary);
        }
        Commands::Replay { capture, persist } => {
            let mut config = config.unwrap_or_default();
            config.output.persist_bands = persist;
            let summary = tokio::task::spawn_blocking(move || -> Result<SessionSummary> {
                let file = File::open(&capture)
                    .with_context(|| format!("Failed to open capture {}", capture))?;
                let sink = make_sink(&config.output)?;
                let mut session =
                    Session::new(ReaderSource::new(BufReader::new(file)), sink, &config.decoder);
                finish(session.run())
            })
            .await??;
            report(&summary);
        }
        Commands::Dump { file } => {
            let reader = SampleReader::open(Path::new(&file))
                .with_context(|| format!("Failed to open sample file {}", file))?;
            for record in reader {
                println!("{}", serde_json::to_string(&record?)?);
            }
        }
        Commands::Init => {
            info!("Initializing new configuration");
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
    }

    Ok(())
}

/// Missing config file means defaults; a file that fails to parse is an error.
async fn load_config(path: &str) -> Result<Config> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        Config::load(path).await
    } else {
        Ok(Config::default())
    }
}

fn make_sink(output: &OutputConfig) -> Result<Box<dyn EventSink + Send>> {
    if !output.persist_bands {
        return Ok(Box::new(LogSink));
    }
    let writer = SampleWriter::create_in(Path::new(&output.dir), chrono::Utc::now())
        .with_context(|| format!("Failed to create sample file in {}", output.dir))?;
    info!("Writing band samples to {}", writer.path().display());
    Ok(Box::new(SampleFileSink::new(writer)))
}

#[cfg(feature = "serial")]
async fn listen(config: Config) -> Result<SessionSummary> {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use thinkgear::protocol::serial::SerialSource;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            flag.store(true, Ordering::Relaxed);
        }
    });

    tokio::task::spawn_blocking(move || -> Result<SessionSummary> {
        let source = SerialSource::open(&config.device, shutdown)?;
        info!("Connected to ThinkGear device on {}", source.name());
        let sink = make_sink(&config.output)?;
        let mut session = Session::new(source, sink, &config.decoder);
        finish(session.run())
    })
    .await?
}

#[cfg(not(feature = "serial"))]
async fn listen(_config: Config) -> Result<SessionSummary> {
    anyhow::bail!("listen requires the 'serial' feature; rebuild with --features serial")
}

/// Report the partial session before a failure is propagated.
fn finish(result: Result<SessionSummary, SessionError>) -> Result<SessionSummary> {
    result.map_err(|e| {
        report(e.summary());
        e.into()
    })
}

fn report(summary: &SessionSummary) {
    let c = &summary.counters;
    if c.malformed() > 0 || c.truncated_payloads > 0 {
        warn!(
            "{} malformed packets, {} truncated payloads",
            c.malformed(),
            c.truncated_payloads
        );
    }
    info!(
        "Final state: poor_signal={} attention={} meditation={}",
        summary.state.poor_signal, summary.state.attention, summary.state.meditation
    );
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .map(|c| c.logging.level_filter())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let log_file = config.as_ref().and_then(|c| c.logging.file.clone());
    if let Some(file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file)
        {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));

            // Check if stdout is a terminal (TTY) - if so, write to both file and console
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
            let _ = builder.try_init();
            return;
        }
    }
    builder.format(|fmt, record| {
        writeln!(
            fmt,
            "{} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.args()
        )
    });
    let _ = builder.try_init();
}
