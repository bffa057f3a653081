mod dispatch;
mod transport;

use anyhow::{Context, Result};
use arogya_lib::{
    config::{read_config, MonitorConfig, SourceKind},
    source::{open_source, parse_sample, SampleSource, ScriptedSource},
    Acquisition, Monitor,
};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::info;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::dispatch::Dispatcher;

#[derive(Parser)]
#[command(
    name = "arogya",
    version,
    about = "AROGYA: bedside vital-sign monitor"
)]
struct Cli {
    /// Logging verbosity (e.g., debug, info, warn)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sensor transport, overriding the config file
    #[arg(long, global = true)]
    source: Option<SourceChoice>,

    /// Sensor device node (implies --source device)
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// Sensor bridge address host:port (implies --source tcp)
    #[arg(long, global = true)]
    addr: Option<String>,

    /// Seed for reproducible vitals
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SourceChoice {
    Disconnected,
    Synthetic,
    Device,
    Tcp,
}

impl From<SourceChoice> for SourceKind {
    fn from(choice: SourceChoice) -> Self {
        match choice {
            SourceChoice::Disconnected => SourceKind::Disconnected,
            SourceChoice::Synthetic => SourceKind::Synthetic,
            SourceChoice::Device => SourceKind::Device,
            SourceChoice::Tcp => SourceKind::Tcp,
        }
    }
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Answer JSON requests on stdin/stdout while sampling in the background (default)
    Serve,
    /// Register a patient, monitor for a few polls, and print each report
    Probe {
        #[arg(long, default_value = "Probe Patient")]
        name: String,
        #[arg(long, default_value_t = 0)]
        age: u32,
        #[arg(long, default_value = "")]
        sex: String,
        /// Number of vitals requests to issue
        #[arg(long, default_value_t = 5)]
        polls: usize,
        /// Delay before each vitals request
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
        /// Replay newline-delimited samples instead of reading the sensor
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Write the history export CSV here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    let command = cli.command.take().unwrap_or(Command::Serve);

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let config = load_config(&cli)?;
    let monitor = Arc::new(Monitor::from_config(&config));

    match command {
        Command::Serve => cmd_serve(&monitor, &config),
        Command::Probe {
            name,
            age,
            sex,
            polls,
            interval_ms,
            replay,
            out,
        } => cmd_probe(
            &monitor,
            &config,
            &name,
            age,
            &sex,
            polls,
            Duration::from_millis(interval_ms),
            replay.as_deref(),
            out.as_deref(),
        ),
    }
}

fn load_config(cli: &Cli) -> Result<MonitorConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => read_config(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(path) = &cli.device {
        config.source.kind = SourceKind::Device;
        config.source.path = Some(path.clone());
    }
    if let Some(addr) = &cli.addr {
        config.source.kind = SourceKind::Tcp;
        config.source.addr = Some(addr.clone());
    }
    if let Some(choice) = cli.source {
        config.source.kind = choice.into();
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_serve(monitor: &Arc<Monitor>, config: &MonitorConfig) -> Result<()> {
    let source = open_source(&config.source, config.seed);
    let acquisition = Acquisition::spawn(monitor.clone(), source, config.poll_interval())
        .context("starting acquisition thread")?;

    let dispatcher = Dispatcher::new(monitor);
    dispatcher.log_summary();
    let served = transport::run_stdio(&dispatcher);

    acquisition.stop();
    served
}

fn replay_source(path: &Path) -> Result<ScriptedSource> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ScriptedSource::new(text.lines().map(parse_sample)))
}

#[allow(clippy::too_many_arguments)]
fn cmd_probe(
    monitor: &Arc<Monitor>,
    config: &MonitorConfig,
    name: &str,
    age: u32,
    sex: &str,
    polls: usize,
    interval: Duration,
    replay: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let source: Box<dyn SampleSource> = match replay {
        Some(path) => Box::new(replay_source(path)?),
        None => open_source(&config.source, config.seed),
    };
    let id = monitor.register_patient(name, age, sex);
    monitor.start_monitoring();
    let acquisition = Acquisition::spawn(monitor.clone(), source, config.poll_interval())
        .context("starting acquisition thread")?;

    for _ in 0..polls {
        std::thread::sleep(interval);
        let report = monitor.compute_vitals()?;
        println!("{}", serde_json::to_string(&report)?);
    }

    monitor.stop_monitoring();
    let stored = acquisition.stop();
    info!("probe for patient {} stored {} samples", id, stored);

    if let Some(path) = out {
        let export = monitor.export_history()?;
        export.write_to(path)?;
        info!("wrote {} rows to {}", export.rows.len(), path.display());
    }
    Ok(())
}
