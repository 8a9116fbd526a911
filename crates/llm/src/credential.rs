//! Credential Bridge (spec §4.3): produces the bearer token attached to every
//! upstream Vertex AI call. The core depends only on the [`CredentialProvider`]
//! trait, never on a concrete credential source, so tests can supply a fake
//! and the binary can swap the backing implementation without touching
//! dispatch or translation.

use async_trait::async_trait;
use secrecy::SecretString;

/// Errors producing a bearer token (spec §7, `Auth` class — always fatal to
/// the request, never retried across regions: spec §4.6 "auth failures are
/// terminal, not retryable").
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    TokenUnavailable(String),
}

/// Supplies a fresh bearer token on demand. Implementations are responsible
/// for their own caching/refresh; the core never caches a token itself (spec
/// §4.3 "the core does not cache credentials; it asks on every attempt and
/// trusts the provider to make that cheap").
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn token(&self) -> Result<SecretString, AuthError>;
}

/// Default [`CredentialProvider`] backed by Application Default Credentials,
/// as resolved by `google-cloud-auth` (metadata server, workload identity,
/// `GOOGLE_APPLICATION_CREDENTIALS`, or `gcloud auth application-default
/// login`, tried in that order — spec §4.3 "credential source is
/// environment-determined, not configured").
pub struct GoogleCloudCredentialProvider {
    inner: google_cloud_auth::token::DefaultTokenSourceProvider,
}

impl GoogleCloudCredentialProvider {
    pub async fn new() -> Result<Self, AuthError> {
        let config = google_cloud_auth::project::Config::default()
            .with_scopes(&["https://www.googleapis.com/auth/cloud-platform"]);
        let inner = google_cloud_auth::token::DefaultTokenSourceProvider::new(config)
            .await
            .map_err(|e| AuthError::TokenUnavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl CredentialProvider for GoogleCloudCredentialProvider {
    async fn token(&self) -> Result<SecretString, AuthError> {
        use google_cloud_token::{TokenSource, TokenSourceProvider as _};

        let token = self
            .inner
            .token_source()
            .token()
            .await
            .map_err(|e| AuthError::TokenUnavailable(e.to_string()))?;
        Ok(SecretString::from(token))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A [`CredentialProvider`] returning a fixed token, or an error when the
    /// fixture is constructed with `None`.
    pub struct FixedCredentialProvider(pub Option<&'static str>);

    #[async_trait]
    impl CredentialProvider for FixedCredentialProvider {
        async fn token(&self) -> Result<SecretString, AuthError> {
            match self.0 {
                Some(token) => Ok(SecretString::from(token.to_string())),
                None => Err(AuthError::TokenUnavailable("no token configured in fixture".to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FixedCredentialProvider;
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn fixed_provider_returns_configured_token() {
        let provider = FixedCredentialProvider(Some("test-token"));
        let token = provider.token().await.unwrap();
        assert_eq!(token.expose_secret(), "test-token");
    }

    #[tokio::test]
    async fn fixed_provider_without_token_errors() {
        let provider = FixedCredentialProvider(None);
        assert!(provider.token().await.is_err());
    }
}
