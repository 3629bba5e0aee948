use thiserror::Error;
use uuid::Uuid;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} not found")]
    NotFound(String),

    /// The account cannot obtain an access token until the user re-authorizes.
    #[error("credentials for account {account_id} need re-authorization: {reason}")]
    CredentialRefresh { account_id: Uuid, reason: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("storage failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    pub fn not_found(what: impl Into<String>) -> Self {
        SyncError::NotFound(what.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Provider(e) => e.is_retryable(),
            SyncError::Store(_) => true,
            SyncError::NotFound(_) | SyncError::CredentialRefresh { .. } => false,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
