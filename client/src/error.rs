use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// Failures surfaced by account resolution and deposit submission.
///
/// Resolution errors abort the whole bootstrap cycle and leave the client
/// retryable. `SubmissionError` is only propagated when the submitter runs in
/// strict mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdoError {
    #[error("{kind} account {address} is missing or undecodable")]
    AccountNotFound { address: Pubkey, kind: &'static str },

    #[error("ledger transport failure: {0}")]
    TransportError(String),

    #[error("could not create token account for mint {mint}: {reason}")]
    AccountCreationFailed { mint: Pubkey, reason: String },

    #[error("deposit submission failed: {0}")]
    SubmissionError(String),

    #[error("wallet is not connected")]
    WalletNotConnected,
}

impl IdoError {
    pub fn not_found(address: Pubkey, kind: &'static str) -> Self {
        IdoError::AccountNotFound { address, kind }
    }
}

impl From<solana_client::client_error::ClientError> for IdoError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        IdoError::TransportError(err.to_string())
    }
}

pub type IdoResult<T> = std::result::Result<T, IdoError>;
