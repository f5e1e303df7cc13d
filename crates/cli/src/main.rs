//! CLI for the teamsync record access synchronizer.
//!
//! Pipeline: load directory snapshot -> apply state change(s) -> report -> write back.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use teamsync_core::{RecordId, RecordState, StateChangeNotification, SyncConfig};
use teamsync_directory::{DirectorySnapshot, MemoryDirectory};
use teamsync_engine::reporter::SyncReport;
use teamsync_engine::sink::json_stream::JsonStreamSink;
use teamsync_engine::sink::{GrantChangeRow, SyncSummaryRow};
use teamsync_engine::AccessSynchronizer;

#[derive(Parser, Debug)]
#[command(name = "teamsync", version, about = "Record access team synchronizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Well-known names the synchronizer resolves on every notification.
#[derive(Args, Debug)]
struct NameArgs {
    #[arg(long, env = "TEAMSYNC_TEMPLATE_NAME", default_value = teamsync_core::types::DEFAULT_TEMPLATE_NAME)]
    template_name: String,

    #[arg(long, env = "TEAMSYNC_TEAM_NAME", default_value = teamsync_core::types::DEFAULT_TEAM_NAME)]
    team_name: String,
}

impl NameArgs {
    fn into_config(self) -> SyncConfig {
        SyncConfig::new(self.template_name, self.team_name)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply one record state change to a directory snapshot.
    Sync {
        #[arg(short, long)]
        directory: PathBuf,

        #[arg(short, long)]
        record: RecordId,

        /// New state: active | inactive (or state code 0 | 1).
        #[arg(short, long)]
        state: RecordState,

        /// Pre-change state. Defaults to the state stored in the snapshot.
        #[arg(long)]
        previous_state: Option<RecordState>,

        /// Run the full sync even if the state did not change.
        #[arg(long, default_value_t = false)]
        force: bool,

        #[arg(long, default_value_t = false)]
        json: bool,

        /// Sink output: "ndjson" writes NDJSON to stdout,
        /// "ndjson:/path/to/file" writes to file.
        #[arg(long)]
        sink: Option<String>,

        /// Save the updated directory back to the snapshot file.
        #[arg(long, default_value_t = false)]
        write_back: bool,

        #[command(flatten)]
        names: NameArgs,
    },

    /// Replay a file of NDJSON notifications, serialized per record.
    Replay {
        #[arg(short, long)]
        directory: PathBuf,

        #[arg(short, long)]
        events: PathBuf,

        #[arg(long, default_value_t = teamsync_engine::batch::DEFAULT_CONCURRENCY)]
        concurrency: usize,

        #[arg(long, default_value_t = false)]
        write_back: bool,

        #[command(flatten)]
        names: NameArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            directory,
            record,
            state,
            previous_state,
            force,
            json,
            sink,
            write_back,
            names,
        } => {
            let t0 = Instant::now();
            let config = names.into_config();
            tracing::info!(
                directory = %directory.display(),
                record_id = %record,
                state = %state,
                template = %config.template_name,
                team = %config.team_name,
                "starting sync"
            );

            let dir = Arc::new(MemoryDirectory::from_snapshot(DirectorySnapshot::load(
                &directory,
            )?));

            // The host flips the state before it notifies.
            let stored = dir.set_record_state(record, state).await;
            if stored.is_none() {
                tracing::warn!(record_id = %record, "record not present in snapshot");
            }

            let mut notification = StateChangeNotification::new(record, state);
            if !force {
                if let Some(prev) = previous_state.or(stored) {
                    notification = notification.with_previous(prev);
                }
            }

            let sync = AccessSynchronizer::new(dir.clone(), config);
            let outcome = sync.on_state_change(notification).await?;
            let report = SyncReport::build(&outcome, t0.elapsed());

            if let Some(ref sink_spec) = sink {
                let (summary, changes) = report.to_rows();
                write_sink(sink_spec, &summary, &changes)?;
                eprint!("{}", report.render());
            } else if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", report.render());
            }

            if write_back {
                dir.snapshot().await.save(&directory)?;
                tracing::info!(directory = %directory.display(), "snapshot written");
            }
        }

        Commands::Replay {
            directory,
            events,
            concurrency,
            write_back,
            names,
        } => {
            let t0 = Instant::now();
            let dir = Arc::new(MemoryDirectory::from_snapshot(DirectorySnapshot::load(
                &directory,
            )?));
            let notifications = read_notifications(&events)?;
            tracing::info!(events = notifications.len(), "loaded notifications");

            let sync = Arc::new(AccessSynchronizer::new(dir.clone(), names.into_config()));
            let report = teamsync_engine::run_batch_with_store(
                sync,
                dir.clone(),
                notifications,
                concurrency,
            )
            .await;

            for entry in &report.entries {
                match &entry.result {
                    Ok(outcome) => {
                        let (granted, revoked) = outcome
                            .delta
                            .as_ref()
                            .map_or((0, 0), |d| (d.grants.len(), d.revocations.len()));
                        println!(
                            "#{:<4} {} {:<8} ok  {:?} (+{granted} -{revoked})",
                            entry.index, entry.notification.record_id, entry.notification.new_state, outcome.action
                        );
                    }
                    Err(e) => println!(
                        "#{:<4} {} {:<8} ERR {e}",
                        entry.index, entry.notification.record_id, entry.notification.new_state
                    ),
                }
            }

            tracing::info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                elapsed_ms = t0.elapsed().as_millis(),
                "replay complete"
            );

            if write_back {
                dir.snapshot().await.save(&directory)?;
                tracing::info!(directory = %directory.display(), "snapshot written");
            }

            if report.failed() > 0 || report.panicked > 0 {
                return Err(format!(
                    "{} of {} notifications failed",
                    report.failed() + report.panicked,
                    report.entries.len() + report.panicked
                )
                .into());
            }
        }
    }

    Ok(())
}

/// One JSON notification per line; blank lines are skipped.
fn read_notifications(path: &Path) -> Result<Vec<StateChangeNotification>, Box<dyn std::error::Error>> {
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let mut out = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let n = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {e}", path.display(), lineno + 1))?;
        out.push(n);
    }
    Ok(out)
}

fn write_sink(
    sink_spec: &str,
    summary: &SyncSummaryRow,
    changes: &[GrantChangeRow],
) -> Result<(), Box<dyn std::error::Error>> {
    if sink_spec == "ndjson" {
        let mut s = JsonStreamSink::stdout();
        s.write_summary(summary)?;
        s.write_changes(changes)?;
        let n = s.finish()?;
        tracing::info!(rows = n, "ndjson sink: wrote to stdout");
    } else if let Some(path) = sink_spec.strip_prefix("ndjson:") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        let mut s = JsonStreamSink::new(file);
        s.write_summary(summary)?;
        s.write_changes(changes)?;
        let n = s.finish()?;
        tracing::info!(rows = n, path, "ndjson sink: wrote to file");
    } else {
        eprintln!("Unknown sink: {sink_spec}. Use 'ndjson' or 'ndjson:/path'");
    }
    Ok(())
}
