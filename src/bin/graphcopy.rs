//! Command-line entry point: copies one SQLite-backed graph store into another.
#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use graphcopy::{
    ConsoleProgress, CopyError, CopyOptions, GraphStoreError, ProgressSink, SilentProgress,
    SourceGuard, SqliteGraph, SqliteReader, SqliteWriter, TransferStats, VerificationReport,
    copy_database,
    options::{DEFAULT_BATCH_SIZE, DEFAULT_WRITER_CONCURRENCY, parse_key_list},
    safety::verify_copy,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "graphcopy",
    version,
    about = "Copy every node and relationship of one graph store into another"
)]
struct Cli {
    #[arg(long, env = "GRAPHCOPY_SOURCE", value_name = "PATH", help = "Source store file")]
    source: PathBuf,

    #[arg(
        long,
        env = "GRAPHCOPY_SOURCE_DATABASE",
        value_name = "NAME",
        help = "Name of the database hosted by the source store"
    )]
    source_database: String,

    #[arg(
        long,
        env = "GRAPHCOPY_TARGET",
        value_name = "PATH",
        help = "Target store file, created when missing"
    )]
    target: PathBuf,

    #[arg(
        long,
        env = "GRAPHCOPY_TARGET_DATABASE",
        value_name = "NAME",
        help = "Name of the database hosted by the target store"
    )]
    target_database: String,

    #[arg(
        long,
        env = "GRAPHCOPY_EXCLUDE_NODE_PROPERTIES",
        value_name = "key1,key2",
        help = "Node property keys that are not copied"
    )]
    exclude_node_properties: Option<String>,

    #[arg(
        long,
        env = "GRAPHCOPY_EXCLUDE_RELATIONSHIP_PROPERTIES",
        value_name = "key1,key2",
        help = "Relationship property keys that are not copied"
    )]
    exclude_relationship_properties: Option<String>,

    #[arg(
        long,
        env = "GRAPHCOPY_BATCH_SIZE",
        default_value_t = DEFAULT_BATCH_SIZE,
        help = "Entities per write batch"
    )]
    batch_size: usize,

    #[arg(
        long,
        env = "GRAPHCOPY_WORKERS",
        default_value_t = DEFAULT_WRITER_CONCURRENCY,
        help = "Concurrent batch writers"
    )]
    workers: usize,

    #[arg(
        long,
        env = "GRAPHCOPY_RELATIONSHIP_WORKERS",
        help = "Concurrent relationship batch writers (defaults to --workers)"
    )]
    relationship_workers: Option<usize>,

    #[arg(
        long,
        env = "GRAPHCOPY_LOCK_SOURCE_DATABASE",
        help = "Hold the source database read-only while copying"
    )]
    lock_source_database: bool,

    #[arg(
        long,
        env = "GRAPHCOPY_VERIFY",
        help = "Check the target after the copy and compare totals with the source"
    )]
    verify: bool,

    #[arg(
        long,
        value_enum,
        env = "GRAPHCOPY_FORMAT",
        default_value_t = OutputFormat::Text,
        help = "Output format of the final report"
    )]
    format: OutputFormat,

    #[arg(
        long,
        short,
        env = "GRAPHCOPY_QUIET",
        help = "Hide progress bars and informational logs"
    )]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error(transparent)]
    Store(#[from] GraphStoreError),
    #[error("unable to encode report: {0}")]
    Report(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Copy(CopyError::InvalidOptions(_)) => ExitCode::from(2),
            _ => ExitCode::from(1),
        }
    }
}

#[derive(Debug, Serialize)]
struct CopyReport<'a> {
    source_database: &'a str,
    target_database: &'a str,
    stats: TransferStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<VerificationReport>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);
    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "copy.failed");
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "graphcopy=warn" } else { "graphcopy=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let options = build_options(cli)?;

    let source = SqliteGraph::open_existing(&cli.source)?;
    if source.catalog_entry(&cli.source_database)?.is_none() {
        return Err(CopyError::DatabaseNotFound(cli.source_database.clone()).into());
    }
    let target = SqliteGraph::open(&cli.target)?;
    target.register_database(&cli.target_database)?;
    info!(
        source = %cli.source.display(),
        source_database = %cli.source_database,
        target = %cli.target.display(),
        target_database = %cli.target_database,
        "copy.open"
    );

    let reader = SqliteReader::new(&source);
    let writer = SqliteWriter::new(target);
    let guard = if cli.lock_source_database {
        SourceGuard::locking(&source, cli.source_database.clone())
    } else {
        SourceGuard::Unguarded
    };
    let progress: Box<dyn ProgressSink> = if cli.quiet {
        Box::new(SilentProgress)
    } else {
        Box::new(ConsoleProgress::new())
    };

    let stats = copy_database(&guard, &reader, &writer, &options, progress.as_ref())?;

    let verification = if cli.verify {
        Some(verify_copy(&source, &writer.graph())?)
    } else {
        None
    };
    let failed_verification = verification
        .as_ref()
        .is_some_and(VerificationReport::has_issues);

    let report = CopyReport {
        source_database: &cli.source_database,
        target_database: &cli.target_database,
        stats,
        verification,
    };
    emit(cli.format, &report)?;

    Ok(if failed_verification {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn build_options(cli: &Cli) -> Result<CopyOptions, CopyError> {
    let mut builder = CopyOptions::builder()
        .batch_size(cli.batch_size)
        .workers(cli.workers);
    if let Some(keys) = &cli.exclude_node_properties {
        builder = builder.exclude_node_properties(parse_key_list(keys));
    }
    if let Some(keys) = &cli.exclude_relationship_properties {
        builder = builder.exclude_relationship_properties(parse_key_list(keys));
    }
    if let Some(workers) = cli.relationship_workers {
        builder = builder.relationship_workers(workers);
    }
    builder.build()
}

fn emit(format: OutputFormat, report: &CopyReport<'_>) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)?;
            println!("{json}");
        }
        OutputFormat::Text => print_text(report),
    }
    Ok(())
}

fn print_text(report: &CopyReport<'_>) {
    println!(
        "Copied {} nodes and {} relationships from {} to {}",
        report.stats.nodes_written,
        report.stats.relationships_written,
        report.source_database,
        report.target_database
    );
    println!(
        "  node_batches={} relationship_batches={}",
        report.stats.node_batches, report.stats.relationship_batches
    );
    if let Some(verification) = &report.verification {
        let target = &verification.target;
        println!("Verification:");
        println!(
            "  source_nodes={} target_nodes={} source_relationships={} target_relationships={}",
            verification.source_nodes,
            target.total_nodes,
            verification.source_relationships,
            target.total_relationships
        );
        println!(
            "  orphan_relationships={} orphan_labels={} duplicate_relationships={}",
            target.orphan_relationships, target.orphan_labels, target.duplicate_relationships
        );
        println!(
            "  status={}",
            if verification.has_issues() { "issues found" } else { "ok" }
        );
    }
}
