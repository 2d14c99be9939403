//! Identity providers.
//!
//! Authentication is delegated wholesale: the portal only needs to know
//! whether a sign-in or sign-out succeeded, and on failure the provider's
//! own message.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::remote::postgrest::error_message;

/// Tokens granted by a successful password sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

/// Failure reported by the identity provider, shown to the user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;
}

/// Supabase auth service (`/auth/v1`).
#[derive(Debug, Clone)]
pub struct SupabaseAuth {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    async fn failure(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ProviderError::new(error_message(&body, status))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    #[tracing::instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, ProviderError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|error| ProviderError::new(error.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|error| ProviderError::new(error.to_string()))?;
        Ok(ProviderSession {
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }

    #[tracing::instrument(skip(self, access_token))]
    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|error| ProviderError::new(error.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(())
    }
}

/// One configured account, for running the portal without Supabase.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    email: String,
    password: String,
    token_lifetime: i64,
}

impl StaticIdentity {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            token_lifetime: 60 * 60,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, ProviderError> {
        if !email.eq_ignore_ascii_case(&self.email) || password != self.password {
            return Err(ProviderError::new("Invalid login credentials"));
        }
        Ok(ProviderSession {
            user_id: self.email.clone(),
            email: self.email.clone(),
            access_token: uuid::Uuid::new_v4().to_string(),
            expires_in: self.token_lifetime,
        })
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_identity_accepts_configured_account_only() {
        let identity = StaticIdentity::new("hsr@oxfordhouse.org", "pw");

        let session = identity
            .sign_in_with_password("HSR@oxfordhouse.org", "pw")
            .await
            .unwrap();
        assert_eq!(session.email, "hsr@oxfordhouse.org");
        assert_eq!(session.expires_in, 3600);

        let error = identity
            .sign_in_with_password("hsr@oxfordhouse.org", "nope")
            .await
            .unwrap_err();
        assert_eq!(error.message, "Invalid login credentials");
    }

    #[test]
    fn token_response_tolerates_missing_email() {
        let token: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","token_type":"bearer","expires_in":3600,"refresh_token":"r","user":{"id":"u"}}"#,
        )
        .unwrap();
        assert_eq!(token.user.id, "u");
        assert_eq!(token.user.email, None);
    }
}
