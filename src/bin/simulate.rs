//! fedavg-simulate: run a whole federated round in one process
//!
//! Every `--site` CSV is encrypted (in parallel), aggregated and decrypted
//! with a fresh key pair. With `--out-dir` the public artifacts and the
//! result CSV are also written; the secret key never leaves memory.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::info;

use fedavg_he::cli::{finish, init_tracing};
use fedavg_he::io::{read_weights_csv, stage_count, stage_record, stage_result_csv, Publication};
use fedavg_he::protocol::{encrypt_sites, encrypt_sites_seeded, WEIGHT_COLUMNS};
use fedavg_he::{AggregationMode, CryptoContext, DeploymentConfig, FederatedRound};

#[derive(Parser)]
#[command(name = "fedavg-simulate")]
#[command(about = "Run key generation, encryption, aggregation and decryption end to end")]
#[command(version)]
struct Args {
    /// Site weight CSV; repeat once per site
    #[arg(long = "site", required = true)]
    sites: Vec<PathBuf>,

    /// Aggregation mode: simple or weighted
    #[arg(long, default_value = "weighted")]
    mode: String,

    /// Write context, public key, ciphertexts, aggregate and result here
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JSON deployment configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the faster N = 8192 parameter set
    #[arg(long)]
    fast: bool,

    /// Seed for reproducible site encryption (testing only)
    #[arg(long)]
    seed: Option<u64>,

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
    let params = if args.fast {
        fedavg_he::CkksParams::fedavg_n8192()
    } else {
        DeploymentConfig::load_or_default(args.config.as_deref())
            .wrap_err("failed to load deployment configuration")?
            .params()?
    };

    let inputs = args
        .sites
        .iter()
        .map(|path| {
            read_weights_csv(path)
                .wrap_err_with(|| format!("failed to read weights from {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let total_start = Instant::now();
    let ctx: CryptoContext =
        CryptoContext::from_params(params).wrap_err("failed to build context")?;
    let mut round =
        FederatedRound::new(ctx.clone(), inputs.len()).wrap_err("failed to start round")?;
    info!("Stage: {}", round.stage().as_str());

    let start = Instant::now();
    let encrypted = match args.seed {
        Some(seed) => encrypt_sites_seeded(&ctx, round.public_key(), &inputs, seed),
        None => encrypt_sites(&ctx, round.public_key(), &inputs),
    }
    .wrap_err("site encryption failed")?;
    info!(
        "Encrypted {} sites in {:.2?}",
        encrypted.len(),
        start.elapsed()
    );

    // every artifact of the round is published together once decryption succeeds
    let mut publication = Publication::new();
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create output directory {}", dir.display()))?;
        ctx.stage(&mut publication, &dir.join("context.bin"))?;
        round
            .public_key()
            .stage(&mut publication, &dir.join("public.key"))?;
        for (i, site) in encrypted.iter().enumerate() {
            let path = dir.join(format!("site_{i}.ct"));
            site.ciphertext.stage(&mut publication, &path)?;
            if let Some(count) = site.count {
                stage_count(&mut publication, &path, count)?;
            }
        }
    }

    for site in encrypted {
        round.submit(site)?;
    }
    info!(
        "Stage: {} ({} submitted)",
        round.stage().as_str(),
        round.submitted()
    );

    let aggregated = round
        .aggregate(mode)
        .wrap_err("aggregation failed")?
        .clone();
    info!("Stage: {}", round.stage().as_str());
    let record = round.record().cloned();

    let result = round.decrypt().wrap_err("decryption failed")?.clone();
    info!("Stage: {}", round.stage().as_str());
    info!("Total round time: {:.2?}", total_start.elapsed());

    if let Some(dir) = &args.out_dir {
        let aggregate_path = dir.join("aggregate.ct");
        aggregated.stage(&mut publication, &aggregate_path)?;
        if let Some(record) = &record {
            stage_record(&mut publication, &aggregate_path, record)?;
        }
        stage_result_csv(&mut publication, &dir.join("result.csv"), &result)?;
        publication
            .commit()
            .wrap_err("failed to publish round artifacts")?;
        info!("Artifacts written to {}", dir.display());
    }

    println!();
    println!("=== Federated Round ({mode}, {} sites) ===", inputs.len());
    for (name, value) in WEIGHT_COLUMNS.iter().zip(result.weights) {
        println!("{name:>10}: {value:.10}");
    }
    println!("Context:    {}", result.context.short());
    println!("Key epoch:  {}", result.public_key.short());
    Ok(())
}
