use anyhow::{Context, Result};
use augur_core::AugurConfig;
use augur_limbic::{run_heartbeat, HeartbeatConfig, Threshold};
use augur_memory::{CycleCoordinator, CycleReport, RawCycleInput};
use clap::{Parser, Subcommand};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

mod logging;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "AUGUR_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding persisted engine state (overrides config)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single cycle from a JSON input file and print the report
    Cycle {
        /// Cycle input: metrics, stimuli, adjustments, market, timestamp
        input: PathBuf,
    },
    /// Run the heartbeat, one cycle per tick
    Run {
        /// Directory polled for cycle input files, one consumed per tick
        #[arg(long)]
        inbox: Option<PathBuf>,
        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },
    /// Show the current emotional state, weights and prophecy accuracy
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Print the adaptive thresholds derived from current averages
    Thresholds,
    /// Delete all persisted state
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    // Config messages go to stderr until logging is configured
    let config = logging::bootstrap(|| load_config(&cli));
    let _guard = logging::init(&config.logging);

    let mut coordinator = CycleCoordinator::open(config.engine.clone());

    match cli.command {
        Command::Cycle { input } => {
            let raw = read_input(&input)?;
            let report = coordinator.run_raw(raw)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Run { inbox, once } => {
            let mut heartbeat = HeartbeatConfig::from_secs(config.engine.heartbeat_secs);
            if once {
                heartbeat = heartbeat.with_max_cycles(1);
            }
            if let Some(dir) = &inbox {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create inbox {}", dir.display()))?;
            }
            info!(
                "Augur heartbeat every {:?}{}",
                heartbeat.interval,
                inbox
                    .as_ref()
                    .map(|d| format!(", inbox {}", d.display()))
                    .unwrap_or_default()
            );

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for ctrl-c: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            let ran = run_heartbeat(
                &heartbeat,
                |_| tick(&mut coordinator, inbox.as_deref()).map(|_| ()),
                shutdown,
            )
            .await;
            info!("Heartbeat stopped after {} cycles", ran);
        }
        Command::Status { json } => print_status(&coordinator, json)?,
        Command::Thresholds => {
            let thresholds = coordinator.thresholds();
            for t in Threshold::ALL {
                println!("{:<20} {:>16.4}", t.as_str(), thresholds.get(t));
            }
        }
        Command::Reset => {
            let removed = coordinator.reset()?;
            println!(
                "Removed {} state files from {}",
                removed,
                config.engine.data_dir.display()
            );
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> AugurConfig {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = AugurConfig::load_or_default(path);
    if let Some(dir) = &cli.data_dir {
        config.engine.data_dir = dir.clone();
    }
    config
}

/// `./augur.toml` if present, otherwise the per-user config directory.
fn default_config_path() -> PathBuf {
    let local = PathBuf::from("augur.toml");
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|d| d.join("augur").join("config.toml"))
        .unwrap_or(local)
}

fn read_input(path: &Path) -> Result<RawCycleInput> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cycle input {}", path.display()))?;
    let raw: RawCycleInput = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse cycle input {}", path.display()))?;
    Ok(raw.with_source(input_key(path, &content)))
}

/// File name plus a content hash, so a rewritten file with the same name
/// counts as new input.
fn input_key(path: &Path, content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{}#{:016x}", name, hasher.finish())
}

/// One heartbeat tick: consume the oldest inbox file, or run an idle cycle
/// so decay keeps flowing when nothing arrives.
fn tick(coordinator: &mut CycleCoordinator, inbox: Option<&Path>) -> Result<CycleReport> {
    let Some(dir) = inbox else {
        return coordinator.run_raw(RawCycleInput::default());
    };
    let Some(path) = next_inbox_file(dir)? else {
        return coordinator.run_raw(RawCycleInput::default());
    };

    match read_input(&path) {
        Ok(raw) if raw.source.as_deref().is_some_and(|k| coordinator.already_applied(k)) => {
            // Persisted before a crash cut the archive step short
            info!("{} was already applied, archiving", path.display());
            archive(&path, dir, "processed")?;
            tick(coordinator, inbox)
        }
        Ok(raw) => {
            let report = coordinator.run_raw(raw)?;
            archive(&path, dir, "processed")?;
            Ok(report)
        }
        Err(e) => {
            warn!("Skipping bad inbox file: {:#}", e);
            archive(&path, dir, "failed")?;
            coordinator.run_raw(RawCycleInput::default())
        }
    }
}

fn next_inbox_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read inbox {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files.into_iter().next())
}

fn archive(path: &Path, inbox: &Path, bucket: &str) -> Result<()> {
    let target_dir = inbox.join(bucket);
    fs::create_dir_all(&target_dir)?;
    let name = path
        .file_name()
        .context("Inbox entry has no file name")?;
    fs::rename(path, target_dir.join(name))
        .with_context(|| format!("Failed to move {} to {}", path.display(), bucket))?;
    Ok(())
}

fn print_status(coordinator: &CycleCoordinator, json: bool) -> Result<()> {
    let engine = coordinator.engine();
    if json {
        let weights: serde_json::Map<String, serde_json::Value> = engine
            .weights
            .iter()
            .map(|(k, w)| (k.as_str().to_string(), serde_json::json!(w)))
            .collect();
        let status = serde_json::json!({
            "cycle": engine.meta.cycle,
            "streak": engine.meta.streak,
            "state": engine.emotion,
            "weights": weights,
            "stats": {
                "total_evaluations": engine.stats.total_evaluations,
                "correct_evaluations": engine.stats.correct_evaluations,
                "accuracy": engine.stats.accuracy(),
            },
            "pending_snapshots": engine.ledger.snapshots().iter().filter(|s| !s.evaluated).count(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Cycle:     {}", engine.meta.cycle);
    println!("Feeling:   {}", engine.emotion.describe());
    println!(
        "Streak:    {} x{}",
        engine.meta.streak.emotion, engine.meta.streak.length
    );
    println!("Emotions:");
    for (e, v) in engine.emotion.emotions.iter() {
        println!(
            "  {:<13} {:.3}  (mood {:.3})",
            e.name(),
            v,
            engine.emotion.mood.get(e)
        );
    }
    match engine.stats.accuracy() {
        Some(acc) => println!(
            "Prophecy:  {}/{} correct ({:.1}%)",
            engine.stats.correct_evaluations,
            engine.stats.total_evaluations,
            acc * 100.0
        ),
        None => println!("Prophecy:  no evaluations yet"),
    }
    let tuned: Vec<_> = engine
        .weights
        .iter()
        .filter(|(_, w)| (w - 1.0).abs() > 0.001)
        .collect();
    if !tuned.is_empty() {
        println!("Tuned weights:");
        for (k, w) in tuned {
            println!("  {:<28} {:.3}", k.as_str(), w);
        }
    }
    Ok(())
}
