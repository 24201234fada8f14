//! In-process identity provider.
//!
//! Stands in for a real identity service: accounts live in memory, passwords
//! are stored as argon2 hashes and every call waits a configurable latency.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use super::provider::{AuthGrant, AuthenticationError, IdentityProvider, OAuthProvider, SessionToken};

mod cloudmagnet_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn hash(plain: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("{}", err))
    }

    pub fn verify(plain: &str, target_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(target_hash).map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct SimulatedIdentityProvider {
    latency: Duration,
    available: AtomicBool,
    /// Normalized email -> argon2 hash
    accounts: Mutex<HashMap<String, String>>,
}

impl SimulatedIdentityProvider {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            available: AtomicBool::new(true),
            accounts: Mutex::new(HashMap::new()),
        }
    }

    /// Registers an account up front, hashing synchronously.
    pub fn with_account(self, email: &str, password: &str) -> Result<Self> {
        let hash = cloudmagnet_argon2::hash(password)?;
        self.lock_accounts().insert(normalize_email(email), hash);
        Ok(self)
    }

    /// Toggle availability; an unavailable provider fails every call.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn account_count(&self) -> usize {
        self.lock_accounts().len()
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.accounts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_round_trip(&self) -> Result<(), AuthenticationError> {
        tokio::time::sleep(self.latency).await;
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AuthenticationError::ProviderUnavailable)
        }
    }

    fn grant(identity: String) -> AuthGrant {
        AuthGrant {
            token: SessionToken::generate(),
            identity,
        }
    }
}

#[async_trait]
impl IdentityProvider for SimulatedIdentityProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, AuthenticationError> {
        self.simulate_round_trip().await?;

        let key = normalize_email(email);
        let stored_hash = self
            .lock_accounts()
            .get(&key)
            .cloned()
            .ok_or(AuthenticationError::InvalidCredentials)?;

        let plain = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || cloudmagnet_argon2::verify(&plain, &stored_hash))
                .await;

        match verified {
            Ok(Ok(true)) => {
                debug!("Authenticated {}", key);
                Ok(Self::grant(key))
            }
            Ok(Ok(false)) => Err(AuthenticationError::InvalidCredentials),
            Ok(Err(e)) => {
                warn!("Could not verify password for {}: {}", key, e);
                Err(AuthenticationError::ProviderUnavailable)
            }
            Err(e) => {
                warn!("Password verification task failed: {}", e);
                Err(AuthenticationError::ProviderUnavailable)
            }
        }
    }

    async fn register(&self, email: &str, password: &str) -> Result<AuthGrant, AuthenticationError> {
        self.simulate_round_trip().await?;

        let key = normalize_email(email);
        if self.lock_accounts().contains_key(&key) {
            return Err(AuthenticationError::AccountExists);
        }

        let plain = password.to_string();
        let hash = match tokio::task::spawn_blocking(move || cloudmagnet_argon2::hash(&plain)).await
        {
            Ok(Ok(hash)) => hash,
            Ok(Err(e)) => {
                warn!("Could not hash password for {}: {}", key, e);
                return Err(AuthenticationError::ProviderUnavailable);
            }
            Err(e) => {
                warn!("Password hashing task failed: {}", e);
                return Err(AuthenticationError::ProviderUnavailable);
            }
        };

        let mut accounts = self.lock_accounts();
        if accounts.contains_key(&key) {
            return Err(AuthenticationError::AccountExists);
        }
        accounts.insert(key.clone(), hash);
        debug!("Registered {}", key);
        Ok(Self::grant(key))
    }

    async fn authenticate_with_provider(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthGrant, AuthenticationError> {
        self.simulate_round_trip().await?;
        Ok(Self::grant(format!("{} account", provider)))
    }
}
