//! Credential validation and the sign-in flow.

mod controller;
mod provider;
mod simulated_provider;
mod validator;

pub use controller::{
    AuthError, AuthOutcome, AuthPhase, AuthSessionController, Redirect, Session, SignInMethod,
    DEFAULT_AUTH_TIMEOUT,
};
#[cfg(feature = "mock")]
pub use provider::MockIdentityProvider;
pub use provider::{AuthGrant, AuthenticationError, IdentityProvider, OAuthProvider, SessionToken};
pub use simulated_provider::SimulatedIdentityProvider;
pub use validator::{validate, AuthMode, CredentialField, CredentialInput, ValidationError};
