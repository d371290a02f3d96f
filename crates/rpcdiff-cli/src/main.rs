//! rpcdiff
//!
//! Sends the same JSON-RPC calls to several endpoints, diffs the answers,
//! checks them against the API spec, and writes a JSON report.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rpcdiff_config::{load_api_spec, load_config, CompareConfig};
use rpcdiff_core::{expand_methods, Classification, ComparisonReport, ComparisonRunner};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Compare JSON-RPC responses across endpoints
#[derive(Debug, Parser)]
#[command(name = "rpcdiff", version)]
struct Args {
    /// Run configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// OpenRPC document, path or http(s) URL
    #[arg(long, value_name = "PATH|URL")]
    api_spec: Option<String>,

    /// Variant table file
    #[arg(long, value_name = "FILE")]
    variants: Option<PathBuf>,

    /// Report directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Skip result schema validation
    #[arg(long)]
    no_schema: bool,

    /// Send JSON-RPC batches of this many calls
    #[arg(long)]
    batch_size: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// Exit with status 1 when any comparison is not a match
    #[arg(long)]
    fail_on_diff: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    let mut config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    apply_args(&mut config, &args)?;
    config.validate()?;

    let spec = match config.api_spec_source() {
        Some(source) => Some(load_api_spec(&source).await?),
        None => None,
    };
    let variants = config.variant_table()?;
    let methods = config.methods_to_compare(spec.as_ref(), &variants);
    if methods.is_empty() {
        bail!("nothing to compare: configure `methods`, `api_spec` or `variants`");
    }

    let descriptors = expand_methods(&methods, &variants, spec.as_ref());
    info!(
        methods = methods.len(),
        calls = descriptors.len(),
        "Expanded comparison calls"
    );

    let runner = ComparisonRunner::new(config.registry()?, spec.as_ref(), config.run_settings())?;
    let report = runner.run(descriptors).await;
    log_summary(&report);

    let output = config.output_path();
    let path = report
        .write_json(&output)
        .await
        .with_context(|| format!("writing report to {}", output.display()))?;
    info!(path = %path.display(), "Wrote comparison report");

    if args.fail_on_diff && !report.summary.all_matched() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Command-line flags win over the config file
fn apply_args(config: &mut CompareConfig, args: &Args) -> Result<()> {
    if let Some(source) = &args.api_spec {
        config.api_spec = Some(if source.starts_with("http://") || source.starts_with("https://") {
            source.clone()
        } else {
            from_cwd(Path::new(source))?.display().to_string()
        });
    }
    if let Some(path) = &args.variants {
        config.variants = Some(from_cwd(path)?);
    }
    if let Some(path) = &args.output {
        config.output_dir = from_cwd(path)?;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if args.no_schema {
        config.validate_schema = false;
    }
    Ok(())
}

// Paths given on the command line are relative to the working directory,
// not to the config file.
fn from_cwd(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn log_summary(report: &ComparisonReport) {
    for record in report
        .records
        .iter()
        .filter(|record| record.classification != Classification::Match)
    {
        warn!(
            call = %record.descriptor.variant_label,
            classification = %record.classification,
            diffs = record.diffs.len(),
            schema_violations = record.schema_violations.len(),
            call_errors = record.call_errors.len(),
            "Mismatch"
        );
    }

    for (namespace, summary) in &report.namespaces {
        info!(
            namespace = %namespace,
            methods = summary.total_methods,
            comparisons = summary.total_comparisons,
            matches = summary.matches,
            differences = summary.differences,
            schema_errors = summary.schema_errors,
            call_errors = summary.call_errors,
            "Namespace summary"
        );
    }

    let summary = &report.summary;
    info!(
        methods = summary.total_methods,
        comparisons = summary.total_comparisons,
        matches = summary.matches,
        differences = summary.differences,
        schema_errors = summary.schema_errors,
        call_errors = summary.call_errors,
        "Comparison finished"
    );
}
