//! Access-token lifecycle for connected accounts.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use super::error::{SyncError, SyncResult};
use crate::models::ConnectedAccount;
use crate::provider::{CalendarProvider, ProviderError};
use crate::store::SyncStore;

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Bearer token for provider calls. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

pub struct TokenManager {
    store: Arc<dyn SyncStore>,
    provider: Arc<dyn CalendarProvider>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn SyncStore>, provider: Arc<dyn CalendarProvider>) -> Self {
        Self { store, provider }
    }

    /// Return a usable access token, refreshing it first if it is missing or
    /// about to expire.
    ///
    /// No lock is taken: two concurrent refreshes for one account both
    /// succeed and the later write wins.
    pub async fn ensure_valid_access_token(
        &self,
        account: &ConnectedAccount,
    ) -> SyncResult<AccessToken> {
        let threshold = Utc::now() + Duration::seconds(EXPIRY_SKEW_SECS);

        if let (Some(token), Some(expires_at)) = (&account.access_token, account.token_expires_at) {
            if expires_at > threshold {
                return Ok(AccessToken::new(token.clone()));
            }
        }

        let refresh_token =
            account
                .refresh_token
                .as_deref()
                .ok_or_else(|| SyncError::CredentialRefresh {
                    account_id: account.id,
                    reason: "no refresh token stored".to_string(),
                })?;

        tracing::debug!(account_id = %account.id, "Refreshing access token");

        let grant = match self.provider.exchange_refresh_token(refresh_token).await {
            Ok(grant) => grant,
            Err(e @ ProviderError::RefreshRejected { .. }) if !e.is_retryable() => {
                tracing::warn!(account_id = %account.id, "Refresh token rejected: {}", e);
                return Err(SyncError::CredentialRefresh {
                    account_id: account.id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(SyncError::Provider(e)),
        };

        let expires_at = Utc::now() + Duration::seconds(grant.expires_in);
        self.store
            .update_account_tokens(
                account.id,
                &grant.access_token,
                expires_at,
                grant.refresh_token.as_deref(),
            )
            .await?;

        tracing::info!(account_id = %account.id, %expires_at, "Access token refreshed");
        Ok(AccessToken::new(grant.access_token))
    }

    /// Forget the expiry of a token the provider rejected, so the next call
    /// to `ensure_valid_access_token` refreshes it. Failures are logged only.
    pub async fn expire_access_token(&self, account_id: Uuid) {
        tracing::warn!(%account_id, "Provider rejected access token, marking it expired");
        if let Err(e) = self.store.expire_access_token(account_id).await {
            tracing::error!(%account_id, "Failed to expire access token: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{FakeProvider, ProviderCall};
    use crate::provider::TokenGrant;
    use crate::store::MemoryStore;

    fn account(expires_in_secs: i64, refresh: Option<&str>) -> ConnectedAccount {
        let now = Utc::now();
        ConnectedAccount {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            provider: "google".to_string(),
            provider_account_id: "user@example.com".to_string(),
            access_token: Some("stored-token".to_string()),
            refresh_token: refresh.map(str::to_string),
            token_expires_at: Some(now + Duration::seconds(expires_in_secs)),
            scope: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_fresh_token_returned_without_network_call() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let manager = TokenManager::new(store.clone(), provider.clone());

        let token = manager
            .ensure_valid_access_token(&account(3600, Some("r")))
            .await
            .unwrap();

        assert_eq!(token.as_str(), "stored-token");
        assert!(provider.calls().is_empty());
        assert_eq!(store.token_update_count().await, 0);
    }

    #[tokio::test]
    async fn test_token_inside_skew_is_refreshed_and_persisted() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let acct = account(30, Some("refresh-1"));
        store.insert_account(acct.clone()).await;
        provider.push_refresh(Ok(TokenGrant {
            access_token: "new-token".to_string(),
            expires_in: 3600,
            refresh_token: Some("refresh-2".to_string()),
            scope: None,
        }));

        let manager = TokenManager::new(store.clone(), provider.clone());
        let token = manager.ensure_valid_access_token(&acct).await.unwrap();

        assert_eq!(token.as_str(), "new-token");
        assert_eq!(
            provider.calls(),
            vec![ProviderCall::Refresh("refresh-1".to_string())]
        );
        let stored = store.get_connected_account(acct.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("new-token"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-2"));
        assert!(stored.token_expires_at.unwrap() > Utc::now() + Duration::seconds(3000));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_needs_reauthorization() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let manager = TokenManager::new(store, provider.clone());

        let err = manager
            .ensure_valid_access_token(&account(-10, None))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::CredentialRefresh { .. }));
        assert!(!err.is_retryable());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_refresh_keeps_account_active() {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(FakeProvider::new());
        let acct = account(-10, Some("revoked"));
        store.insert_account(acct.clone()).await;
        provider.push_refresh(Err(ProviderError::RefreshRejected {
            status: 400,
            message: "invalid_grant".to_string(),
        }));

        let manager = TokenManager::new(store.clone(), provider);
        let err = manager.ensure_valid_access_token(&acct).await.unwrap_err();

        assert!(matches!(err, SyncError::CredentialRefresh { .. }));
        let stored = store.get_connected_account(acct.id).await.unwrap().unwrap();
        assert!(stored.is_active);
        assert_eq!(stored.access_token.as_deref(), Some("stored-token"));
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("ya29.secret");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
