use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider refused the signup (email taken, weak password, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("identity provider unreachable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("identity provider is not configured")]
    NotConfigured,
}

/// IdentityProvider
///
/// The external account system. This service never stores credentials: it
/// asks the provider to create the account and mirrors the returned id as a
/// local profile.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account and returns its id.
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError>;
}

/// Minimal shape of the provider's `/auth/v1/signup` response.
#[derive(Deserialize)]
struct SignUpResponse {
    id: Uuid,
}

/// SupabaseIdentityProvider
///
/// Talks to a Supabase-compatible auth endpoint over HTTP.
#[derive(Clone)]
pub struct SupabaseIdentityProvider {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl SupabaseIdentityProvider {
    pub fn new(base_url: Option<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Uuid, IdentityError> {
        let (Some(base_url), Some(api_key)) = (&self.base_url, &self.api_key) else {
            return Err(IdentityError::NotConfigured);
        };

        let response = self
            .client
            .post(format!("{}/auth/v1/signup", base_url))
            .header("apikey", api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "identity provider rejected signup");
            return Err(IdentityError::Rejected(if reason.is_empty() {
                status.to_string()
            } else {
                reason
            }));
        }

        let account = response.json::<SignUpResponse>().await?;
        Ok(account.id)
    }
}

/// MockIdentityProvider
///
/// Issues random ids without any network traffic. Used in tests and in local
/// mode when no provider is configured.
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    /// When true, every signup is rejected.
    pub should_reject: bool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_rejecting() -> Self {
        Self {
            should_reject: true,
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Uuid, IdentityError> {
        if self.should_reject {
            return Err(IdentityError::Rejected("Mock rejection".to_string()));
        }
        Ok(Uuid::new_v4())
    }
}

pub type IdentityState = Arc<dyn IdentityProvider>;
