//! Command-line interface for the Holodeck log pipeline.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::OutputConfig;
use crate::core::filenames::FilenameClassifier;
use crate::core::writers::OutputTable;
use crate::processors::catalog::{self, Catalog, CatalogError};
use crate::processors::export::{self, ExportStats};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "holodeck-pipeline")]
#[command(about = "Holodeck navigation task log pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Explicit log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_parser = parse_level_filter)]
    log_level: Option<log::LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the CSV tables for every qualifying individual
    Generate {
        /// Folder containing the subject data
        path: PathBuf,

        #[command(flatten)]
        selection: TableSelection,

        #[command(flatten)]
        criteria: Criteria,

        /// Output directory (defaults to a timestamped folder in the working directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Catalog the input files and report individuals, trials and rejected files
    Catalog {
        /// Folder containing the subject data
        path: PathBuf,

        #[command(flatten)]
        criteria: Criteria,
    },
}

/// Output table flags. Giving none selects the configured tables.
#[derive(Args, Debug, Default)]
struct TableSelection {
    /// Generate study_path.csv
    #[arg(long)]
    study_path: bool,
    /// Generate study_look.csv
    #[arg(long)]
    study_look: bool,
    /// Generate test_path.csv
    #[arg(long)]
    test_path: bool,
    /// Generate test_look.csv
    #[arg(long)]
    test_look: bool,
    /// Generate practice_path.csv
    #[arg(long)]
    practice_path: bool,
    /// Generate practice_look.csv
    #[arg(long)]
    practice_look: bool,
    /// Generate 2d_test.csv
    #[arg(long = "test-2d")]
    test_2d: bool,
    /// Generate vr_test.csv
    #[arg(long)]
    test_vr: bool,
}

impl TableSelection {
    fn as_outputs(&self) -> OutputConfig {
        OutputConfig {
            study_path: self.study_path,
            study_look: self.study_look,
            test_path: self.test_path,
            test_look: self.test_look,
            practice_path: self.practice_path,
            practice_look: self.practice_look,
            test_2d: self.test_2d,
            test_vr: self.test_vr,
        }
    }

    /// Explicit flags win; otherwise fall back to `configured`, and to every
    /// table if that selects nothing either.
    fn resolve(&self, configured: OutputConfig) -> OutputConfig {
        let flags = self.as_outputs();
        if !flags.is_empty() {
            flags
        } else if !configured.is_empty() {
            configured
        } else {
            info!("No output tables selected. Defaulting to all tables.");
            OutputConfig::all()
        }
    }
}

/// Trial inclusion overrides.
#[derive(Args, Debug, Default)]
struct Criteria {
    /// Keep trials that lack some of the expected files
    #[arg(long)]
    include_incomplete_trials: bool,

    /// Minimum number of qualifying trials per individual
    #[arg(long)]
    min_num_trials: Option<usize>,
}

impl Criteria {
    fn apply(&self, config: &mut PipelineConfig) {
        if self.include_incomplete_trials {
            config.catalog.exclude_incomplete_trials = false;
        }
        if let Some(min) = self.min_num_trials {
            config.catalog.min_num_trials = min;
        }
    }
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over `len` items
fn create_progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn parse_level_filter(value: &str) -> std::result::Result<log::LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level '{}'", value))
}

fn log_level(cli: &Cli) -> log::LevelFilter {
    cli.log_level.unwrap_or(match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    })
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging (must come first)
    env_logger::Builder::new()
        .filter_level(log_level(&cli))
        .format_timestamp_secs()
        .init();

    // Load config
    let mut config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match &cli.command {
        Commands::Generate {
            path,
            selection,
            criteria,
            output_dir,
        } => {
            criteria.apply(&mut config);
            config.outputs = selection.resolve(config.outputs);
            cmd_generate(path, output_dir.as_deref(), &config)
        }
        Commands::Catalog { path, criteria } => {
            criteria.apply(&mut config);
            cmd_catalog(path, &config)
        }
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Discover and catalog the files under `path`.
fn catalog_directory(path: &Path, config: &PipelineConfig) -> Result<Catalog> {
    let classifier = FilenameClassifier::new(&config.classifier)
        .context("Invalid file classification pattern in config")?;

    let spinner = create_spinner("Scanning input directory...");
    let files = catalog::discover_files(path);
    spinner.finish_and_clear();

    if files.is_empty() {
        return Err(CatalogError::EmptyInputSet).with_context(|| {
            format!(
                "No files found in {}. Closing without creation of output files",
                path.display()
            )
        });
    }

    info!(
        "Found {} files. Attempting to catalog filenames by Individual, Trial, and Phase",
        files.len()
    );

    let catalog = catalog::catalog_files(&files, &classifier, &config.catalog)?;

    for file in &catalog.excluded {
        debug!("{} was excluded.", file.display());
    }

    Ok(catalog)
}

/// Create `dir`, reusing it if it already exists.
fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        info!("Output directory ({}) already exists. Continuing...", dir.display());
        return Ok(());
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    info!("Output directory ({}) created.", dir.display());
    Ok(())
}

fn default_output_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    Ok(cwd.join(chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()))
}

fn cmd_generate(path: &Path, output_dir: Option<&Path>, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let catalog = catalog_directory(path, config)?;

    let output_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_output_dir()?,
    };
    prepare_output_dir(&output_dir)?;

    info!("Creating output files.");
    let mut writers = export::open_csv_writers(&output_dir, &config.outputs)
        .context("Failed to create output files")?;

    info!("Parsing input files.");
    let progress = create_progress(catalog.individuals.len());
    let mut stats = ExportStats::default();
    for individual in &catalog.individuals {
        progress.set_message(format!("subject {}", individual.subject_id));
        let individual_stats = export::export_individual(individual, &mut writers)
            .with_context(|| format!("Failed writing rows for subject {}", individual.subject_id))?;
        stats.merge(individual_stats);
        progress.inc(1);
    }
    progress.finish_and_clear();
    info!("Done parsing input files.");

    export::close_writers(&mut writers).context("Failed to close output files")?;
    info!("Parsing complete.");

    let mut items = vec![
        ("Input directory", path.display().to_string()),
        ("Output directory", output_dir.display().to_string()),
        ("Individuals", catalog.individuals.len().to_string()),
        ("Trials", stats.trials.to_string()),
        ("Excluded files", catalog.excluded.len().to_string()),
        ("Non-matching files", catalog.non_matching.len().to_string()),
        ("Skipped tables", stats.skipped.to_string()),
    ];
    items.extend(row_counts(&stats.rows, &config.outputs));
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Generation Complete", &items);
    Ok(())
}

fn row_counts(
    rows: &BTreeMap<OutputTable, usize>,
    outputs: &OutputConfig,
) -> Vec<(&'static str, String)> {
    OutputTable::selected(outputs)
        .into_iter()
        .map(|table| {
            let count = rows.get(&table).copied().unwrap_or(0);
            (table.file_name(), count.to_string())
        })
        .collect()
}

fn cmd_catalog(path: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let catalog = catalog_directory(path, config)?;

    for individual in &catalog.individuals {
        println!("Subject {}", individual.subject_id);
        for trial in &individual.trials {
            let state = if trial.is_complete() { "complete" } else { "incomplete" };
            println!("  Trial {} ({}, {} files)", trial.num, state, trial.files().len());
        }
    }

    for file in &catalog.non_matching {
        println!("Non-matching: {}", file.display());
    }

    let trials: usize = catalog.individuals.iter().map(|i| i.trials.len()).sum();

    print_summary(
        "Catalog Complete",
        &[
            ("Input directory", path.display().to_string()),
            ("Individuals", catalog.individuals.len().to_string()),
            ("Trials", trials.to_string()),
            ("Min trials", config.catalog.min_num_trials.to_string()),
            (
                "Exclude incomplete",
                config.catalog.exclude_incomplete_trials.to_string(),
            ),
            ("Excluded files", catalog.excluded.len().to_string()),
            ("Non-matching files", catalog.non_matching.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}
