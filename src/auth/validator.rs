//! Credential form validation.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Which form the credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Login,
    Signup,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Login => "login",
            AuthMode::Signup => "signup",
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(AuthMode::Login),
            "signup" => Ok(AuthMode::Signup),
            _ => Err(format!("Unknown auth mode '{}'", s)),
        }
    }
}

/// Form field that can be reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Email,
    Password,
}

impl std::fmt::Display for CredentialField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialField::Email => write!(f, "email"),
            CredentialField::Password => write!(f, "password"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all fields ({0} is empty)")]
    MissingField(CredentialField),

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Raw values typed into the login/signup form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialInput {
    pub email: String,
    pub password: String,
    /// Only present on the signup form.
    pub confirm_password: Option<String>,
}

impl CredentialInput {
    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            confirm_password: None,
        }
    }

    pub fn signup(
        email: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            confirm_password: Some(confirm_password.into()),
        }
    }

    pub fn validate(&self, mode: AuthMode) -> Result<(), ValidationError> {
        validate(
            mode,
            &self.email,
            &self.password,
            self.confirm_password.as_deref(),
        )
    }
}

// Passwords never end up in logs.
impl std::fmt::Debug for CredentialInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInput")
            .field("email", &self.email)
            .field("password", &"***")
            .field(
                "confirm_password",
                &self.confirm_password.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// Checks the form before anything is sent to the identity provider.
///
/// Email is checked before password, so an entirely empty form reports the
/// email field. In signup mode an absent confirmation never matches.
pub fn validate(
    mode: AuthMode,
    email: &str,
    password: &str,
    confirm_password: Option<&str>,
) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField(CredentialField::Email));
    }
    if password.is_empty() {
        return Err(ValidationError::MissingField(CredentialField::Password));
    }
    if mode == AuthMode::Signup && confirm_password != Some(password) {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}
