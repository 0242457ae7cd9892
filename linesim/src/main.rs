//! Manufacturing line simulation application.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use clap::Parser;
use eyre::WrapErr;

use linesim::{CsvReporter, LineConfig, LogReporter, ProgressReporter, Report, Simulation};

/// What to print after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::ToString)]
#[strum(serialize_all = "snake_case")]
enum ReportMode {
    /// Time and counters.
    Summary,
    /// Time, counters, and the contents of both queues.
    Full,
    /// Nothing; only the final summary is printed.
    Quiet,
}

/// Runs the manufacturing line simulation.
#[derive(Parser)]
#[clap(version, author)]
struct Opt {
    /// Path to a JSON file with the simulation configuration. Missing fields take default values.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Seed to use for random number generator.
    #[clap(short, long)]
    seed: Option<u64>,

    /// Stop after this many jobs have been completed or scrapped.
    #[clap(long)]
    stop_limit: Option<usize>,

    /// Mean time between arrivals in minutes.
    #[clap(long)]
    mean_interarrival: Option<f64>,

    /// Generate at most this many jobs.
    #[clap(long)]
    max_arrivals: Option<usize>,

    /// Time of the first arrival in minutes.
    #[clap(long)]
    first_arrival: Option<f64>,

    /// Per-tick report: summary, full, or quiet.
    #[clap(long, default_value = "summary")]
    report: ReportMode,

    /// Write per-tick counters to this CSV file.
    #[clap(long)]
    trace_output: Option<PathBuf>,

    /// Show a progress bar.
    #[clap(long)]
    progress: bool,

    /// Verbosity.
    #[clap(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[clap(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[clap(long)]
    no_stderr: bool,
}

impl Opt {
    /// Loads the configuration file, if any, and applies the overrides given in the command line.
    fn line_config(&self) -> eyre::Result<LineConfig> {
        let mut config = if let Some(path) = &self.config {
            let file = File::open(path)
                .wrap_err_with(|| format!("unable to open config: {}", path.display()))?;
            LineConfig::from_reader(BufReader::new(file))
                .wrap_err_with(|| format!("invalid config: {}", path.display()))?
        } else {
            LineConfig::default()
        };
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(stop_limit) = self.stop_limit {
            config.stop_limit = stop_limit;
        }
        if let Some(mean) = self.mean_interarrival {
            config.mean_interarrival = mean;
        }
        if self.max_arrivals.is_some() {
            config.max_arrivals = self.max_arrivals;
        }
        if self.first_arrival.is_some() {
            config.first_arrival = self.first_arrival;
        }
        config.validate().wrap_err("invalid config")?;
        Ok(config)
    }

    fn reporters(&self, config: &LineConfig) -> eyre::Result<Vec<Box<dyn Report>>> {
        let mut reporters: Vec<Box<dyn Report>> = Vec::new();
        match self.report {
            ReportMode::Summary => reporters.push(Box::new(LogReporter::new())),
            ReportMode::Full => reporters.push(Box::new(LogReporter::new().with_queues())),
            ReportMode::Quiet => {}
        }
        if let Some(path) = &self.trace_output {
            let file = File::create(path)
                .wrap_err_with(|| format!("unable to create trace output: {}", path.display()))?;
            reporters.push(Box::new(CsvReporter::new(io::BufWriter::new(file))));
        }
        if self.progress {
            reporters.push(Box::new(ProgressReporter::new(config.stop_limit)));
        }
        Ok(reporters)
    }
}

/// Set up a logger based on the given user options.
fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        0 if opt.report != ReportMode::Quiet => log::LevelFilter::Info,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::parse();
    set_up_logger(&opt)?;
    let config = opt.line_config()?;
    let mut reporters = opt.reporters(&config)?;
    let mut simulation = Simulation::new(&config)?;
    let summary = simulation.run(&mut reporters)?;
    serde_json::to_writer_pretty(io::stdout(), &summary)?;
    println!();
    Ok(())
}
