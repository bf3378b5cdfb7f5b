use anyhow::{Context, Result};
use clap::Parser;
use modstat::cli::{Cli, Command, OutputFormat};
use modstat::config::StatConfig;
use modstat::corpus::Corpus;
use modstat::module_index::ModuleIndex;
use modstat::ranking::{self, RankingReport};
use modstat::record::ScriptRecord;
use modstat::usage::UsageCounters;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber: stderr by default, or append to a file
fn init_tracing(level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<StatConfig> {
    match path {
        Some(path) => StatConfig::from_toml(path),
        None => StatConfig::embedded(),
    }
}

fn run_index(config: &StatConfig, output: &Path, tuples: bool) -> Result<()> {
    let index = ModuleIndex::build(config);
    let result = if tuples {
        index.write_tuples(output)
    } else {
        index.write_executables(output)
    };
    let written = result
        .with_context(|| format!("Failed to write executable table: {}", output.display()))?;
    println!("{} executables written to {}", written, output.display());
    Ok(())
}

struct ScanOptions {
    dir: PathBuf,
    executables: Option<PathBuf>,
    top: usize,
    shuffle: bool,
    seed: u64,
    limit: Option<usize>,
    jobs: usize,
    format: OutputFormat,
    output: Option<PathBuf>,
    versions: bool,
}

fn run_scan(config: &StatConfig, opts: ScanOptions) -> Result<()> {
    ranking::check_top(opts.top)?;

    let mut index = ModuleIndex::new();
    index.scan_available(config);
    match &opts.executables {
        Some(table) => {
            index
                .load_table(table)
                .with_context(|| format!("Failed to load executable table: {}", table.display()))?;
        }
        None => index.walk_executables(config),
    }

    let mut corpus = Corpus::discover(&opts.dir, config)
        .with_context(|| format!("Failed to discover job scripts in {}", opts.dir.display()))?;
    if opts.shuffle {
        corpus = corpus.shuffle(opts.seed);
    }
    if let Some(limit) = opts.limit {
        corpus = corpus.limit(limit);
    }

    let mut counters = UsageCounters::seeded(&index);
    let summary = corpus.scan_parallel(&index, &mut counters, opts.jobs)?;

    let report = if opts.versions {
        RankingReport::from_ranked(ranking::top_versions(&counters, opts.top)?)
    } else {
        RankingReport::from_counter(counters.modules(), opts.top)?
    };

    let rendered = match opts.format {
        OutputFormat::Text => report.to_text(),
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "summary": summary,
            "ranking": report.rows,
            "counts": counters.snapshot(),
        }))?,
    };

    match &opts.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write ranking: {}", path.display()))?;
            println!("{}", summary.to_text());
        }
        None => {
            print!("{}", rendered);
            if opts.format == OutputFormat::Text {
                println!();
                println!("{}", summary.to_text());
            }
        }
    }
    Ok(())
}

fn run_inspect(config: &StatConfig, script: &Path, format: OutputFormat) -> Result<()> {
    let record = ScriptRecord::open_with(
        script,
        &config.script_extension,
        &config.record_extension,
        config.baseline_epoch,
    )
    .with_context(|| format!("Failed to open job {}", script.display()))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let attrs = &record.attributes;
    println!("Script:    {}", record.script_path.display());
    println!("Record:    {}", record.record_path.display());
    println!("Job:       {}", attrs.jobid.as_deref().unwrap_or("-"));
    println!("Queue:     {}", attrs.queue.as_deref().unwrap_or("-"));
    println!("Nodes:     {}", attrs.nodes.as_deref().unwrap_or("-"));
    println!("Cores:     {} per node", attrs.cores_per_node());
    if let Some(machine) = attrs.machine() {
        println!("Machine:   {}", machine);
    }
    println!("Toolchain: {}", record.analysis.toolchain());
    println!("Loaded:");
    for (module, version) in record.analysis.loaded() {
        match version {
            Some(version) => println!("  {}/{}", module, version),
            None => println!("  {}", module),
        }
    }
    println!("Called:");
    for token in record.analysis.called() {
        println!("  {}", token);
    }
    println!("Used:");
    for name in record.analysis.used().keys() {
        println!("  {}", name);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_level.as_deref(), args.log_file.as_deref())?;

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Index { output, tuples } => run_index(&config, &output, tuples),
        Command::Scan {
            dir,
            executables,
            top,
            shuffle,
            seed,
            limit,
            jobs,
            format,
            output,
            versions,
        } => run_scan(
            &config,
            ScanOptions {
                dir,
                executables,
                top,
                shuffle,
                seed,
                limit,
                jobs,
                format,
                output,
                versions,
            },
        ),
        Command::Inspect { script, format } => run_inspect(&config, &script, format),
    }
}
