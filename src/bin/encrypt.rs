//! fedavg-encrypt: encrypt one site's weight vector
//!
//! Reads a wide or long CSV, encrypts the five weights under the shared
//! public key and writes the ciphertext. A sample count (from `--count` or
//! the CSV's count column) is written to `<output>.count.txt`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::info;

use fedavg_he::cli::{finish, init_tracing};
use fedavg_he::io::{count_sidecar_path, read_weights_csv, stage_count, Publication};
use fedavg_he::{encrypt_weights, CryptoContext, PublicKey, SampleCount};

#[derive(Parser)]
#[command(name = "fedavg-encrypt")]
#[command(about = "Encrypt a site's model weights for secure aggregation")]
#[command(version)]
struct Args {
    /// Shared context file
    context: PathBuf,

    /// Public key file
    public_key: PathBuf,

    /// Weight CSV (w1,w2,w3,w4,intercept[,count] or Feature/Coefficient)
    input: PathBuf,

    /// Output ciphertext file
    output: PathBuf,

    /// Sample count; overrides a count column in the CSV
    #[arg(long)]
    count: Option<SampleCount>,

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
    let ctx: CryptoContext = CryptoContext::load(&args.context)
        .wrap_err_with(|| format!("failed to load context {}", args.context.display()))?;
    let public_key = PublicKey::load(&ctx, &args.public_key)
        .wrap_err_with(|| format!("failed to load public key {}", args.public_key.display()))?;

    let (weights, csv_count) = read_weights_csv(&args.input)
        .wrap_err_with(|| format!("failed to read weights from {}", args.input.display()))?;
    let count = args.count.or(csv_count);
    info!("Weights: {:?}", weights.values());
    match count {
        Some(c) => info!("Sample count: {c}"),
        None => info!("No sample count"),
    }

    let site = encrypt_weights(&ctx, &public_key, &weights, count).wrap_err("encryption failed")?;
    info!("Intercept: {}", weights.intercept());

    let sidecar = count_sidecar_path(&args.output);
    let mut publication = Publication::new();
    site.ciphertext
        .stage(&mut publication, &args.output)
        .wrap_err_with(|| format!("failed to write {}", args.output.display()))?;
    match site.count {
        Some(count) => stage_count(&mut publication, &args.output, count)
            .wrap_err("failed to write count sidecar")?,
        // a sidecar left from an earlier run would attach a stale count
        None => publication.remove_on_commit(&sidecar),
    }
    publication
        .commit()
        .wrap_err_with(|| format!("failed to publish {}", args.output.display()))?;

    println!("Ciphertext: {}", args.output.display());
    if site.count.is_some() {
        println!("Count:      {}", sidecar.display());
    }
    println!("Level:      {}", site.ciphertext.level(&ctx));
    Ok(())
}
