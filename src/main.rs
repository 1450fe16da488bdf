//! LabMon - lab computer usage from access logs.
//!
//! Imports log files, prints ranked reports and serves the HTTP API.

use clap::{Parser, Subcommand};
use labmon::config::{parse_limit, EngineConfig};
use labmon::database::Database;
use labmon::ingest::{collect_log_files, import_sources};
use labmon::store::{AggregateKind, AggregateRequest, EventStore, InvertOutcome, RankedView};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "labmon", version, about = "Lab computer usage from access logs")]
struct Cli {
    /// Database file (default: <data dir>/labmon/usage.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API until Ctrl+C (default)
    Serve {
        /// Port to listen on (overrides the stored setting)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import access log files or directories of .log files
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print a ranked aggregate as JSON
    Report {
        /// computer-usage, users-per-computer, users-per-room, time-per-room or percent-per-room
        kind: AggregateKind,

        /// Smallest values first
        #[arg(long)]
        ascending: bool,

        /// Number of rows, or "none" for all
        #[arg(long)]
        limit: Option<String>,
    },
    /// Delete every stored event and imported source
    Clear,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("labmon=info")),
        )
        .init();

    let cli = Cli::parse();

    let db = match &cli.db {
        Some(path) => Database::open_at(path)?,
        None => Database::open()?,
    };
    let config = EngineConfig::load(&db)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(db, config, port),
        Command::Import { files } => {
            let files = collect_log_files(&files)?;
            let report = import_sources(&db, &files);

            println!(
                "Imported {} file(s), skipped {}: {} events read, {} new",
                report.imported.len(),
                report.already_imported.len(),
                report.events_read,
                report.events_stored
            );
            for source in &report.already_imported {
                println!("   already imported: {}", source);
            }
            for failure in &report.failed {
                eprintln!("   failed: {} ({})", failure.source, failure.message);
            }

            if !report.failed.is_empty() {
                return Err(format!("{} source(s) failed to import", report.failed.len()).into());
            }
            Ok(())
        }
        Command::Report {
            kind,
            ascending,
            limit,
        } => {
            let limit = match limit {
                Some(text) => parse_limit(&text)
                    .ok_or_else(|| format!("invalid limit: {text}"))?,
                None => config.display_limit,
            };

            let mut view = RankedView::new(limit);
            let request = AggregateRequest::new(kind, config.pairing_rules());
            let mut ranked = view.show(&db, request)?;
            if ascending {
                if let InvertOutcome::Redisplayed(inverted) = view.invert(&db)? {
                    ranked = inverted;
                }
            }

            println!("{}", serde_json::to_string_pretty(&ranked)?);
            Ok(())
        }
        Command::Clear => {
            db.clear()?;
            println!("Cleared all events and imported sources");
            Ok(())
        }
    }
}

fn serve(
    db: Database,
    mut config: EngineConfig,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        config.server_port = port;
    }

    let events = db.event_count()?;
    let server = labmon::server::start_server(Arc::new(db), config);

    println!(
        "LabMon API on http://127.0.0.1:{} ({} events stored)",
        config.server_port, events
    );
    println!("   GET /api/aggregates/:kind - Ranked usage");
    println!("   GET /api/history/...      - Usage over time");
    println!("   WS  /ws                   - Data change notifications");
    println!("Press Ctrl+C to stop.");

    let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })?;

    // Wake up on Ctrl+C, or when the server thread gives up
    loop {
        match shutdown_rx.recv_timeout(std::time::Duration::from_millis(500)) {
            Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) if server.is_finished() => {
                return Err("HTTP server stopped unexpectedly".into());
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    tracing::info!("Shutdown signal received");
    Ok(())
}
