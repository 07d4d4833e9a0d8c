//! fedavg-aggregate: combine site ciphertexts into one encrypted mean
//!
//! Never sees plaintext weights. Counts are read from each input's
//! `.count.txt` sidecar. Nothing is written unless the whole aggregation
//! succeeds; on success the aggregate and `<output>.record.json` are
//! published.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::{debug, info};

use fedavg_he::cli::{finish, init_tracing};
use fedavg_he::io::{read_count, record_path, stage_record, Publication};
use fedavg_he::protocol::await_participants;
use fedavg_he::{
    aggregate, AggregationMode, Ciphertext, CryptoContext, DeploymentConfig, SiteCiphertext,
};

#[derive(Parser)]
#[command(name = "fedavg-aggregate")]
#[command(about = "Homomorphically average encrypted site weights")]
#[command(version)]
struct Args {
    /// Shared context file
    context: PathBuf,

    /// Output file for the aggregated ciphertext
    output: PathBuf,

    /// Aggregation mode: simple or weighted
    mode: String,

    /// Site ciphertext files
    inputs: Vec<PathBuf>,

    /// Wait up to this many seconds for missing input files
    #[arg(long)]
    wait_secs: Option<u64>,

    /// JSON deployment configuration (join timeout and poll interval)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.verbose) {
        eprintln!("error: {e:?}");
        return ExitCode::FAILURE;
    }
    finish(run(args))
}

fn run(args: Args) -> Result<()> {
    let mode: AggregationMode = args.mode.parse()?;
    let config = DeploymentConfig::load_or_default(args.config.as_deref())
        .wrap_err("failed to load deployment configuration")?;
    let timeout = args
        .wait_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.join_timeout());

    let ctx: CryptoContext = CryptoContext::load(&args.context)
        .wrap_err_with(|| format!("failed to load context {}", args.context.display()))?;

    info!("Mode: {mode}");
    info!("Inputs: {}", args.inputs.len());
    await_participants(&args.inputs, timeout, config.join_poll())
        .wrap_err("not every site delivered a ciphertext")?;

    let sites = args
        .inputs
        .iter()
        .map(|path| {
            let ciphertext = Ciphertext::load(path)
                .wrap_err_with(|| format!("failed to load ciphertext {}", path.display()))?;
            let count = read_count(path)
                .wrap_err_with(|| format!("failed to read count for {}", path.display()))?;
            debug!(path = %path.display(), ?count, "loaded input");
            Ok(SiteCiphertext { ciphertext, count })
        })
        .collect::<Result<Vec<_>>>()?;

    let start = Instant::now();
    let (aggregated, record) = aggregate(&ctx, mode, &sites).wrap_err("aggregation failed")?;
    info!("Aggregation time: {:.2?}", start.elapsed());

    let mut publication = Publication::new();
    aggregated
        .stage(&mut publication, &args.output)
        .wrap_err_with(|| format!("failed to write {}", args.output.display()))?;
    stage_record(&mut publication, &args.output, &record)
        .wrap_err("failed to write aggregation record")?;
    publication
        .commit()
        .wrap_err_with(|| format!("failed to publish {}", args.output.display()))?;

    println!("Aggregate: {}", args.output.display());
    println!("Record:    {}", record_path(&args.output).display());
    println!("Mode:      {mode}");
    println!("Sites:     {}", record.participants);
    if let Some(total) = record.total_weight {
        println!("Total weight: {total}");
    }
    Ok(())
}
