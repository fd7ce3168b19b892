//! CLI error types.

use coinpilot_domain::{CredentialError, DomainError, ErrorKind};
use coinpilot_exec::{AllocationReport, ExecError, FailedLeg};
use thiserror::Error;

/// CLI-level errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Execution error
    #[error("{0}")]
    Exec(#[from] ExecError),

    /// Credential could not be loaded
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Bad command-line input
    #[error("Invalid input: {0}")]
    Input(#[from] DomainError),

    /// A basket buy stopped partway; earlier legs were submitted
    #[error(
        "Allocation stopped at {code} after {} submitted leg(s) [{}], {skipped} skipped: {source}",
        .submitted.len(),
        .submitted.join(", ")
    )]
    PartialAllocation {
        /// `PAIR:TXID` of each submitted leg
        submitted: Vec<String>,
        code: String,
        skipped: usize,
        source: ExecError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),
}

impl CliError {
    /// Error kind reported on exit; `None` for configuration problems.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CliError::Exec(e) => Some(e.kind()),
            CliError::PartialAllocation { source, .. } => Some(source.kind()),
            CliError::Credential(_) => Some(ErrorKind::Credential),
            CliError::Input(_) => Some(ErrorKind::Validation),
            CliError::Config(_) | CliError::Logging(_) => None,
        }
    }
}

impl CliError {
    /// Error for an allocation that stopped at `failed`.
    pub fn partial_allocation(report: &AllocationReport, failed: FailedLeg) -> Self {
        let submitted = report
            .submitted
            .iter()
            .map(|r| {
                let txid = r.confirmation.primary_txid().unwrap_or("-");
                format!("{}:{}", r.pair_symbol, txid)
            })
            .collect();
        CliError::PartialAllocation {
            submitted,
            code: failed.leg.code,
            skipped: report.skipped.len(),
            source: failed.error,
        }
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
