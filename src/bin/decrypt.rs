//! fedavg-decrypt: custodian-side decryption of the aggregate

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing::info;

use fedavg_he::cli::{finish, init_tracing};
use fedavg_he::io::write_result_csv;
use fedavg_he::protocol::WEIGHT_COLUMNS;
use fedavg_he::{decrypt_result, Ciphertext, CryptoContext, KeyCustodian};

#[derive(Parser)]
#[command(name = "fedavg-decrypt")]
#[command(about = "Decrypt the aggregated model weights")]
#[command(version)]
struct Args {
    /// Shared context file
    context: PathBuf,

    /// Secret key file
    secret_key: PathBuf,

    /// Aggregated ciphertext file
    aggregate: PathBuf,

    /// Output CSV (w1,w2,w3,w4,intercept)
    output: PathBuf,

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
    let custodian = KeyCustodian::load(&ctx, &args.secret_key)
        .wrap_err_with(|| format!("failed to load secret key {}", args.secret_key.display()))?;
    let aggregated = Ciphertext::load(&args.aggregate)
        .wrap_err_with(|| format!("failed to load aggregate {}", args.aggregate.display()))?;

    let result = decrypt_result(&ctx, &custodian, &aggregated).wrap_err("decryption failed")?;
    write_result_csv(&args.output, &result)
        .wrap_err_with(|| format!("failed to write {}", args.output.display()))?;
    info!("Result written to {}", args.output.display());

    println!();
    println!("=== Aggregated Weights ===");
    for (name, value) in WEIGHT_COLUMNS.iter().zip(result.weights) {
        println!("{name:>10}: {value:.10}");
    }
    println!("Aggregate:  {}", result.aggregate.short());
    println!("Context:    {}", result.context.short());
    println!("Key epoch:  {}", result.public_key.short());
    Ok(())
}
