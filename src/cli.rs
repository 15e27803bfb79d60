use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use otwatch::agent::TrackingAgent;
use otwatch::baseline::Baseline;
use otwatch::capture::{self, Pipeline};
use otwatch::config::Config;
use otwatch::safety::KillSwitch;
use otwatch::sink::{EventSink, SinkTarget};
use otwatch::zones::ZoneRegistry;

#[derive(Parser)]
#[command(name = "otwatch")]
#[command(author, version, about = "Passive OT/ICS network monitor")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Observe live traffic on the configured interface
    Observe {
        /// Interface to capture on (overrides the config)
        #[arg(short, long)]
        interface: Option<String>,
    },

    /// Replay a capture file through the full pipeline
    Replay {
        /// Capture file to replay
        #[arg(short, long)]
        file: PathBuf,

        /// Append emitted documents to this file instead of the
        /// configured sink
        #[arg(short, long)]
        sink: Option<PathBuf>,
    },

    /// Learn a baseline from a capture file and print it as JSON
    Baseline {
        /// Capture file to learn from
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Derive a segmentation policy document from a capture file
    Policy {
        /// Capture file to learn from
        #[arg(short, long)]
        file: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Observe { interface } => cmd_observe(config, interface),
        Commands::Replay { file, sink } => cmd_replay(config, &file, sink),
        Commands::Baseline { file } => cmd_baseline(config, &file),
        Commands::Policy { file, output } => cmd_policy(config, &file, output),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

/// Assembles the agent from the configured zones, baseline and role
/// overrides. A configured file that does not exist degrades to the
/// empty default with a warning; a malformed one is a hard error.
fn build_agent(config: &Config) -> Result<TrackingAgent> {
    let zones = match &config.zones_file {
        Some(path) if path.exists() => ZoneRegistry::load_file(path)?,
        Some(path) => {
            warn!(
                "Zones file {} not found; zonal checks disabled",
                path.display()
            );
            ZoneRegistry::default()
        }
        None => ZoneRegistry::default(),
    };

    let baseline = match &config.baseline_file {
        Some(path) if path.exists() => Baseline::load_file(path)?,
        Some(path) => {
            warn!(
                "Baseline file {} not found; function-code checks disabled",
                path.display()
            );
            Baseline::default()
        }
        None => Baseline::default(),
    };

    let mut agent = TrackingAgent::new(zones, baseline);
    if !config.role_overrides.is_empty() {
        agent.load_role_overrides(config.role_overrides.clone());
    }
    Ok(agent)
}

fn report_stats(pipeline: &Pipeline) {
    let stats = pipeline.stats();
    info!(
        "Processed {} packets: {} frames, {} alerts, {} assets, {} flows",
        stats.packets,
        stats.frames,
        stats.alerts,
        pipeline.agent().tracker().inventory().len(),
        pipeline.agent().tracker().flow_count()
    );
}

fn cmd_observe(mut config: Config, interface: Option<String>) -> Result<()> {
    if interface.is_some() {
        config.capture.interface = interface;
    }

    let agent = build_agent(&config)?;
    let sink = EventSink::open(config.sink.target.clone())?;
    info!("Emitting to {}", sink.describe());
    let mut pipeline = Pipeline::new(
        agent,
        sink,
        config.sink.emit_frames,
        &config.safety,
        KillSwitch::from_env(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install shutdown handler")?;

    capture::run_live(&config.capture, &shutdown, |data, ts| {
        pipeline.handle_packet(data, ts)
    })?;

    pipeline.flush();
    report_stats(&pipeline);
    Ok(())
}

fn cmd_replay(config: Config, file: &Path, sink_override: Option<PathBuf>) -> Result<()> {
    let agent = build_agent(&config)?;
    let target = match sink_override {
        Some(path) => SinkTarget::File { path },
        None => config.sink.target.clone(),
    };
    let sink = EventSink::open(target)?;
    let mut pipeline = Pipeline::new(
        agent,
        sink,
        config.sink.emit_frames,
        &config.safety,
        KillSwitch::from_env(),
    );

    capture::run_file(file, |data, ts| pipeline.handle_packet(data, ts))?;

    pipeline.flush();
    report_stats(&pipeline);
    Ok(())
}

fn cmd_baseline(config: Config, file: &Path) -> Result<()> {
    let mut agent = build_agent(&config)?;
    capture::run_file(file, |data, ts| {
        if let Some(frame) = capture::frame_from_packet(data, ts) {
            agent.ingest_frame(&frame);
        }
    })?;

    let rows = agent.tracker().baseline();
    info!("Learned {} flows from {}", rows.len(), file.display());
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "flows": rows }))?
    );
    Ok(())
}

fn cmd_policy(config: Config, file: &Path, output: Option<PathBuf>) -> Result<()> {
    let mut agent = build_agent(&config)?;
    capture::run_file(file, |data, ts| {
        if let Some(frame) = capture::frame_from_packet(data, ts) {
            agent.ingest_frame(&frame);
        }
    })?;

    let doc = agent.tracker().policy_document();
    let yaml = serde_yaml::to_string(&doc)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &yaml)
                .with_context(|| format!("Failed to write policy to {}", path.display()))?;
            println!("Policy written to {}", path.display());
        }
        None => {
            println!("{}", yaml);
        }
    }
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let toml_str = Config::generate_default()?;

    match output {
        Some(path) => {
            std::fs::write(&path, &toml_str)?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            println!("{}", toml_str);
        }
    }

    Ok(())
}
