//! Shared plumbing for the command-line tools

use crate::error::FedError;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber; `verbose` raises the level to DEBUG
pub fn init_tracing(verbose: bool) -> eyre::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Exit status for a failed run: the code of the first `FedError` in the chain, else 1
pub fn exit_code(report: &eyre::Report) -> u8 {
    report
        .chain()
        .find_map(|cause| cause.downcast_ref::<FedError>())
        .map_or(1, FedError::exit_code)
}

/// Report the outcome of `main` and turn it into a process status
pub fn finish(result: eyre::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            let code = exit_code(&report);
            error!(code, "{report:#}");
            ExitCode::from(code)
        }
    }
}
