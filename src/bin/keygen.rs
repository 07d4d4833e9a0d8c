//! fedavg-keygen: create the shared context and the key pair for one epoch
//!
//! Writes `context.bin`, `public.key` and `secret.key` into the output
//! directory. The public key and context go to every site; the secret key
//! stays with the custodian.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use fedavg_he::cli::{finish, init_tracing};
use fedavg_he::io::Publication;
use fedavg_he::protocol::{generate_keypair, generate_keypair_seeded};
use fedavg_he::{CryptoContext, DeploymentConfig};

#[derive(Parser)]
#[command(name = "fedavg-keygen")]
#[command(about = "Generate the CKKS context and key pair for a federated round")]
#[command(version)]
struct Args {
    /// Directory for context.bin, public.key and secret.key
    #[arg(long, default_value = "fedavg_keys")]
    out_dir: PathBuf,

    /// Ring dimension (power of two, 1024..=32768)
    #[arg(long)]
    ring_dim: Option<usize>,

    /// Modulus chain bit sizes, base prime first (e.g. 60,40,40,60)
    #[arg(long, value_delimiter = ',')]
    modulus_bits: Option<Vec<u32>>,

    /// Encoding scale exponent (Δ = 2^scale_bits)
    #[arg(long)]
    scale_bits: Option<u32>,

    /// JSON deployment configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deterministic key generation seed (testing only)
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
    let mut config = DeploymentConfig::load_or_default(args.config.as_deref())
        .wrap_err("failed to load deployment configuration")?;
    if let Some(n) = args.ring_dim {
        config.ring_dimension = n;
    }
    if let Some(bits) = args.modulus_bits {
        config.modulus_bits = bits;
    }
    if let Some(bits) = args.scale_bits {
        config.scale_bits = bits;
    }
    let params = config.params().wrap_err("invalid CKKS parameters")?;

    info!("Ring dimension: {}", params.ring_dim);
    info!(
        "Modulus chain: {:?} ({} bits)",
        params.modulus_bits,
        params.total_bits()
    );
    info!("Scale: 2^{}", params.scale_bits);

    let start = Instant::now();
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?;
    pb.set_style(style);
    pb.set_message("Building context and generating keys...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let ctx: CryptoContext =
        CryptoContext::from_params(params).wrap_err("failed to build context")?;
    let (public_key, custodian) = match args.seed {
        Some(seed) => generate_keypair_seeded(&ctx, seed),
        None => generate_keypair(&ctx),
    }
    .wrap_err("key generation failed")?;

    pb.finish_with_message("Keys generated");
    info!("Key generation time: {:.2?}", start.elapsed());

    fs::create_dir_all(&args.out_dir)
        .wrap_err_with(|| format!("failed to create {}", args.out_dir.display()))?;

    let context_path = args.out_dir.join("context.bin");
    let public_path = args.out_dir.join("public.key");
    let secret_path = args.out_dir.join("secret.key");

    // the three files appear together or not at all
    let mut publication = Publication::new();
    ctx.stage(&mut publication, &context_path)
        .wrap_err_with(|| format!("failed to write {}", context_path.display()))?;
    public_key
        .stage(&mut publication, &public_path)
        .wrap_err_with(|| format!("failed to write {}", public_path.display()))?;
    info!("Saving secret key (keep this secure!)...");
    custodian
        .stage(&mut publication, &secret_path)
        .wrap_err_with(|| format!("failed to write {}", secret_path.display()))?;
    publication
        .commit()
        .wrap_err_with(|| format!("failed to publish keys to {}", args.out_dir.display()))?;

    println!();
    println!("=== Keys Generated ===");
    println!("Context:     {}", context_path.display());
    println!("Public key:  {}", public_path.display());
    println!("Secret key:  {}", secret_path.display());
    println!("Context fingerprint:    {}", ctx.fingerprint());
    println!("Public key fingerprint: {}", public_key.fingerprint());

    Ok(())
}
