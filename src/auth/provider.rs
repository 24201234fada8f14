//! Identity provider boundary.

use async_trait::async_trait;
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Third-party sign-in providers offered on the login form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OAuthProvider {
    Google,
    GitHub,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::Google, OAuthProvider::GitHub];

    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::GitHub => "github",
        }
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::GitHub),
            _ => Err(format!("Unknown sign-in provider '{}'", s)),
        }
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OAuthProvider::Google => write!(f, "Google"),
            OAuthProvider::GitHub => write!(f, "GitHub"),
        }
    }
}

/// Opaque credential issued by the identity provider.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        SessionToken(value.into())
    }

    pub fn generate() -> Self {
        let value: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        SessionToken(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionToken(***)")
    }
}

/// What the provider hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub token: SessionToken,
    /// Human readable identity (email, or provider account name).
    pub identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account with this email already exists")]
    AccountExists,

    #[error("Identity provider is unavailable")]
    ProviderUnavailable,

    #[error("Identity provider did not answer in time")]
    Timeout,
}

/// External identity service.
///
/// Calls may suspend for an unbounded time; callers are expected to bound
/// them with their own timeout.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Sign in an existing account.
    async fn authenticate(&self, email: &str, password: &str)
        -> Result<AuthGrant, AuthenticationError>;

    /// Create an account and sign it in.
    async fn register(&self, email: &str, password: &str) -> Result<AuthGrant, AuthenticationError>;

    async fn authenticate_with_provider(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthGrant, AuthenticationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens() {
        let a = SessionToken::generate();
        let b = SessionToken::generate();
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = SessionToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }

    #[test]
    fn test_oauth_provider_parse() {
        assert_eq!("Google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
        assert_eq!("GITHUB".parse::<OAuthProvider>(), Ok(OAuthProvider::GitHub));
        assert!("myspace".parse::<OAuthProvider>().is_err());
        for provider in OAuthProvider::ALL {
            assert_eq!(provider.as_str().parse::<OAuthProvider>(), Ok(provider));
        }
    }
}
