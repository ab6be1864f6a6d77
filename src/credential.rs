//! Bearer credential and the providers that obtain it
//!
//! The fetch engine only needs a non-empty token string. How it is obtained
//! (hidden prompt, environment variable, fixed value) is up to the provider.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt;

/// A non-empty bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token, trimming surrounding whitespace.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(Error::MissingCredential);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

/// Something that can produce a [`Credential`] or fail.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn credential(&self) -> Result<Credential>;
}

/// Prompts on the terminal without echoing the input.
///
/// Preferred over command-line arguments so the token never lands in shell
/// history.
#[derive(Debug, Clone)]
pub struct PromptProvider {
    prompt: String,
}

impl PromptProvider {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl Default for PromptProvider {
    fn default() -> Self {
        Self::new("Webex access token (admin or compliance officer): ")
    }
}

#[async_trait]
impl CredentialProvider for PromptProvider {
    async fn credential(&self) -> Result<Credential> {
        let prompt = self.prompt.clone();
        let token = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .map_err(|e| Error::Other(format!("Credential prompt failed: {e}")))??;
        Credential::new(token)
    }
}

/// Reads the token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvProvider {
    var: String,
}

impl EnvProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl CredentialProvider for EnvProvider {
    async fn credential(&self) -> Result<Credential> {
        match std::env::var(&self.var) {
            Ok(token) => Credential::new(token),
            Err(_) => Err(Error::MissingCredential),
        }
    }
}

/// A fixed token, mostly for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticProvider(Credential);

impl StaticProvider {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Credential::new(token).map(Self)
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    async fn credential(&self) -> Result<Credential> {
        Ok(self.0.clone())
    }
}
