//! Sign-in state machine behind the login/signup form.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::provider::{AuthGrant, AuthenticationError, IdentityProvider, OAuthProvider, SessionToken};
use super::validator::{AuthMode, CredentialInput, ValidationError};
use crate::notifications::{AppEvent, AuthEvent, EventBus};

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Idle,
    Validating,
    Authenticating,
    Succeeded,
    /// Only ever published as an event. The stored phase settles right
    /// away, so [`AuthSessionController::phase`] never returns it.
    Failed,
}

impl AuthPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthPhase::Idle => "idle",
            AuthPhase::Validating => "validating",
            AuthPhase::Authenticating => "authenticating",
            AuthPhase::Succeeded => "succeeded",
            AuthPhase::Failed => "failed",
        }
    }

    /// An attempt is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, AuthPhase::Validating | AuthPhase::Authenticating)
    }
}

impl std::fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    #[error("A sign-in attempt is already in progress")]
    InProgress,

    #[error("The sign-in attempt was abandoned")]
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInMethod {
    Login,
    Signup,
    OAuth(OAuthProvider),
}

impl From<AuthMode> for SignInMethod {
    fn from(mode: AuthMode) -> Self {
        match mode {
            AuthMode::Login => SignInMethod::Login,
            AuthMode::Signup => SignInMethod::Signup,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: SessionToken,
    pub identity: String,
    pub method: SignInMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    Dashboard,
}

/// Successful sign-in: the session plus where the user goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub session: Session,
    pub redirect: Redirect,
}

struct ControllerState {
    phase: AuthPhase,
    /// Bumped on every new attempt and on abandonment.
    epoch: u64,
    session: Option<Session>,
    last_error: Option<AuthError>,
}

impl ControllerState {
    /// Back to the resting phase after an attempt ends without a new session.
    fn settle(&mut self) {
        self.phase = if self.session.is_some() {
            AuthPhase::Succeeded
        } else {
            AuthPhase::Idle
        };
    }
}

/// Drives `Idle -> Validating -> Authenticating -> Succeeded | Failed`.
///
/// At most one attempt runs at a time. Responses belonging to an abandoned
/// attempt (explicit [`abandon`](Self::abandon) or a dropped future) are
/// discarded and never produce a session.
pub struct AuthSessionController {
    provider: Arc<dyn IdentityProvider>,
    events: EventBus,
    timeout: Duration,
    state: Mutex<ControllerState>,
}

/// Returns the controller to Idle if the attempt future is dropped mid-flight.
struct AttemptGuard<'a> {
    controller: &'a AuthSessionController,
    epoch: u64,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.controller.abandon_epoch(self.epoch);
    }
}

impl AuthSessionController {
    pub fn new(provider: Arc<dyn IdentityProvider>, events: EventBus) -> Self {
        Self {
            provider,
            events,
            timeout: DEFAULT_AUTH_TIMEOUT,
            state: Mutex::new(ControllerState {
                phase: AuthPhase::Idle,
                epoch: 0,
                session: None,
                last_error: None,
            }),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn phase(&self) -> AuthPhase {
        self.lock_state().phase
    }

    pub fn session(&self) -> Option<Session> {
        self.lock_state().session.clone()
    }

    pub fn last_error(&self) -> Option<AuthError> {
        self.lock_state().last_error.clone()
    }

    /// Validates the form and, if it passes, signs in (login) or creates the
    /// account (signup).
    pub async fn submit(
        &self,
        mode: AuthMode,
        input: &CredentialInput,
    ) -> Result<AuthOutcome, AuthError> {
        let epoch = self.begin_attempt(AuthPhase::Validating)?;
        let _guard = AttemptGuard {
            controller: self,
            epoch,
        };

        if let Err(e) = input.validate(mode) {
            debug!("Credential validation failed: {}", e);
            return Err(self.fail(epoch, e.into()));
        }

        self.advance(epoch, AuthPhase::Authenticating)?;
        let provider = self.provider.clone();
        let result = self
            .bounded(async {
                match mode {
                    AuthMode::Login => provider.authenticate(&input.email, &input.password).await,
                    AuthMode::Signup => provider.register(&input.email, &input.password).await,
                }
            })
            .await;

        self.finish(epoch, result, mode.into())
    }

    /// Third-party sign-in; same machine as [`submit`](Self::submit) minus
    /// the form validation.
    pub async fn login_with_provider(
        &self,
        provider: OAuthProvider,
    ) -> Result<AuthOutcome, AuthError> {
        let epoch = self.begin_attempt(AuthPhase::Authenticating)?;
        let _guard = AttemptGuard {
            controller: self,
            epoch,
        };

        let identity_provider = self.provider.clone();
        let result = self
            .bounded(identity_provider.authenticate_with_provider(provider))
            .await;

        self.finish(epoch, result, SignInMethod::OAuth(provider))
    }

    /// Drops the in-flight attempt, if any. The controller goes back to Idle,
    /// or to Succeeded when a session from an earlier sign-in is still held.
    pub fn abandon(&self) -> bool {
        let epoch = self.lock_state().epoch;
        self.abandon_epoch(epoch)
    }

    /// Destroys the current session.
    pub fn logout(&self) -> bool {
        let signed_out = {
            let mut state = self.lock_state();
            let had_session = state.session.take().is_some();
            if state.phase == AuthPhase::Succeeded {
                state.phase = AuthPhase::Idle;
            }
            had_session
        };
        if signed_out {
            info!("Signed out");
            self.publish_all(vec![
                AuthEvent::SignedOut,
                AuthEvent::PhaseChanged(AuthPhase::Idle),
            ]);
        }
        signed_out
    }

    fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish_all(&self, events: Vec<AuthEvent>) {
        for event in events {
            self.events.publish(AppEvent::Auth(event));
        }
    }

    async fn bounded<F>(&self, call: F) -> Result<AuthGrant, AuthenticationError>
    where
        F: Future<Output = Result<AuthGrant, AuthenticationError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Identity provider {} did not answer within {:?}",
                    self.provider.name(),
                    self.timeout
                );
                Err(AuthenticationError::Timeout)
            }
        }
    }

    fn begin_attempt(&self, phase: AuthPhase) -> Result<u64, AuthError> {
        let epoch = {
            let mut state = self.lock_state();
            if state.phase.is_busy() {
                debug!("Rejecting sign-in attempt, one is already {}", state.phase);
                return Err(AuthError::InProgress);
            }
            if state.session.is_some() {
                debug!("Sign-in attempt started while signed in, session kept until it succeeds");
            }
            state.epoch += 1;
            state.phase = phase;
            state.last_error = None;
            state.epoch
        };
        self.publish_all(vec![AuthEvent::PhaseChanged(phase)]);
        Ok(epoch)
    }

    fn advance(&self, epoch: u64, phase: AuthPhase) -> Result<(), AuthError> {
        {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                return Err(AuthError::Abandoned);
            }
            state.phase = phase;
        }
        self.publish_all(vec![AuthEvent::PhaseChanged(phase)]);
        Ok(())
    }

    fn fail(&self, epoch: u64, error: AuthError) -> AuthError {
        let settled = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                return AuthError::Abandoned;
            }
            state.settle();
            state.last_error = Some(error.clone());
            state.phase
        };
        self.publish_all(vec![
            AuthEvent::PhaseChanged(AuthPhase::Failed),
            AuthEvent::Failed(error.clone()),
            AuthEvent::PhaseChanged(settled),
        ]);
        error
    }

    fn finish(
        &self,
        epoch: u64,
        result: Result<AuthGrant, AuthenticationError>,
        method: SignInMethod,
    ) -> Result<AuthOutcome, AuthError> {
        let grant = match result {
            Ok(grant) => grant,
            Err(e) => {
                info!("Sign-in failed: {}", e);
                return Err(self.fail(epoch, e.into()));
            }
        };

        let session = {
            let mut state = self.lock_state();
            if state.epoch != epoch {
                debug!("Discarding provider response for abandoned attempt {}", epoch);
                return Err(AuthError::Abandoned);
            }
            let session = Session {
                token: grant.token,
                identity: grant.identity,
                method,
                created_at: Utc::now(),
            };
            state.phase = AuthPhase::Succeeded;
            state.session = Some(session.clone());
            session
        };

        info!("Signed in as {}", session.identity);
        self.publish_all(vec![
            AuthEvent::PhaseChanged(AuthPhase::Succeeded),
            AuthEvent::SignedIn {
                identity: session.identity.clone(),
                method,
            },
        ]);
        Ok(AuthOutcome {
            session,
            redirect: Redirect::Dashboard,
        })
    }

    fn abandon_epoch(&self, epoch: u64) -> bool {
        let settled = {
            let mut state = self.lock_state();
            if state.epoch != epoch || !state.phase.is_busy() {
                return false;
            }
            state.epoch += 1;
            state.settle();
            state.phase
        };
        debug!("Sign-in attempt {} abandoned", epoch);
        self.publish_all(vec![
            AuthEvent::Abandoned,
            AuthEvent::PhaseChanged(settled),
        ]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialField;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Answers every call with `outcome`, optionally waiting on `gate` first.
    struct ScriptedProvider {
        outcome: Mutex<Result<AuthGrant, AuthenticationError>>,
        gate: Option<Arc<Notify>>,
        hang: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn answering(outcome: Result<AuthGrant, AuthenticationError>) -> Self {
            Self {
                outcome: Mutex::new(outcome),
                gate: None,
                hang: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn ok() -> Self {
            Self::answering(Ok(AuthGrant {
                token: SessionToken::new("token"),
                identity: "me@example.com".to_string(),
            }))
        }

        fn set_outcome(&self, outcome: Result<AuthGrant, AuthenticationError>) {
            *self.outcome.lock().unwrap() = outcome;
        }

        fn gated(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        async fn answer(&self) -> Result<AuthGrant, AuthenticationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let outcome = self.outcome.lock().unwrap().clone();
            outcome
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn authenticate(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<AuthGrant, AuthenticationError> {
            self.answer().await
        }

        async fn register(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<AuthGrant, AuthenticationError> {
            self.answer().await
        }

        async fn authenticate_with_provider(
            &self,
            provider: OAuthProvider,
        ) -> Result<AuthGrant, AuthenticationError> {
            self.answer().await.map(|grant| AuthGrant {
                identity: provider.to_string(),
                ..grant
            })
        }
    }

    fn controller(provider: Arc<ScriptedProvider>) -> Arc<AuthSessionController> {
        Arc::new(AuthSessionController::new(provider, EventBus::new()))
    }

    async fn wait_for_phase(controller: &AuthSessionController, phase: AuthPhase) {
        while controller.phase() != phase {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let provider = Arc::new(ScriptedProvider::ok());
        let controller = controller(provider.clone());

        let outcome = controller
            .submit(
                AuthMode::Login,
                &CredentialInput::login("me@example.com", "pw"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.redirect, Redirect::Dashboard);
        assert_eq!(outcome.session.identity, "me@example.com");
        assert_eq!(outcome.session.method, SignInMethod::Login);
        assert_eq!(controller.phase(), AuthPhase::Succeeded);
        assert_eq!(controller.session(), Some(outcome.session));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_provider() {
        let provider = Arc::new(ScriptedProvider::ok());
        let controller = controller(provider.clone());

        let result = controller
            .submit(AuthMode::Login, &CredentialInput::login("", "pw"))
            .await;
        assert_eq!(
            result,
            Err(AuthError::Validation(ValidationError::MissingField(
                CredentialField::Email
            )))
        );

        let result = controller
            .submit(
                AuthMode::Signup,
                &CredentialInput::signup("me@example.com", "a", "b"),
            )
            .await;
        assert_eq!(
            result,
            Err(AuthError::Validation(ValidationError::PasswordMismatch))
        );

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.phase(), AuthPhase::Idle);
        assert_eq!(
            controller.last_error(),
            Some(AuthError::Validation(ValidationError::PasswordMismatch))
        );
    }

    #[tokio::test]
    async fn test_provider_failure_returns_to_idle() {
        let provider = Arc::new(ScriptedProvider::answering(Err(
            AuthenticationError::InvalidCredentials,
        )));
        let controller = controller(provider);

        let result = controller
            .submit(
                AuthMode::Login,
                &CredentialInput::login("me@example.com", "pw"),
            )
            .await;

        assert_eq!(
            result,
            Err(AuthError::Authentication(
                AuthenticationError::InvalidCredentials
            ))
        );
        assert_eq!(controller.phase(), AuthPhase::Idle);
        assert!(controller.session().is_none());
    }

    #[tokio::test]
    async fn test_single_flight() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::ok().gated(gate.clone()));
        let controller = controller(provider.clone());

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .submit(
                        AuthMode::Login,
                        &CredentialInput::login("me@example.com", "pw"),
                    )
                    .await
            })
        };
        wait_for_phase(&controller, AuthPhase::Authenticating).await;

        let second = controller
            .submit(
                AuthMode::Login,
                &CredentialInput::login("me@example.com", "pw"),
            )
            .await;
        assert_eq!(second, Err(AuthError::InProgress));
        assert_eq!(
            controller.login_with_provider(OAuthProvider::Google).await,
            Err(AuthError::InProgress)
        );

        gate.notify_one();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout() {
        let provider = Arc::new(ScriptedProvider::ok().hanging());
        let controller = Arc::new(
            AuthSessionController::new(provider, EventBus::new())
                .with_timeout(Duration::from_secs(5)),
        );

        let result = controller.login_with_provider(OAuthProvider::GitHub).await;

        assert_eq!(
            result,
            Err(AuthError::Authentication(AuthenticationError::Timeout))
        );
        assert_eq!(controller.phase(), AuthPhase::Idle);
    }

    #[tokio::test]
    async fn test_abandon_discards_late_response() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::ok().gated(gate.clone()));
        let controller = controller(provider);

        let attempt = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.login_with_provider(OAuthProvider::Google).await })
        };
        wait_for_phase(&controller, AuthPhase::Authenticating).await;

        assert!(controller.abandon());
        assert_eq!(controller.phase(), AuthPhase::Idle);
        assert!(!controller.abandon());

        gate.notify_one();
        assert_eq!(attempt.await.unwrap(), Err(AuthError::Abandoned));
        assert!(controller.session().is_none());
        assert_eq!(controller.phase(), AuthPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_attempt_returns_to_idle() {
        let provider = Arc::new(ScriptedProvider::ok().hanging());
        let controller = controller(provider);

        let input = CredentialInput::login("me@example.com", "pw");
        let dropped = tokio::time::timeout(
            Duration::from_millis(10),
            controller.submit(AuthMode::Login, &input),
        )
        .await;

        assert!(dropped.is_err());
        assert_eq!(controller.phase(), AuthPhase::Idle);
    }

    #[tokio::test]
    async fn test_logout() {
        let controller = controller(Arc::new(ScriptedProvider::ok()));
        let mut rx = controller.events.subscribe();

        assert!(!controller.logout());
        controller
            .login_with_provider(OAuthProvider::GitHub)
            .await
            .unwrap();
        assert_eq!(controller.session().unwrap().identity, "GitHub");

        assert!(controller.logout());
        assert!(controller.session().is_none());
        assert_eq!(controller.phase(), AuthPhase::Idle);

        let mut saw_signed_out = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AppEvent::Auth(AuthEvent::SignedOut)) {
                saw_signed_out = true;
            }
        }
        assert!(saw_signed_out);
    }

    #[tokio::test]
    async fn test_failed_attempt_keeps_existing_session() {
        let provider = Arc::new(ScriptedProvider::ok());
        let controller = controller(provider.clone());
        let signed_in = controller
            .login_with_provider(OAuthProvider::Google)
            .await
            .unwrap()
            .session;

        let result = controller
            .submit(AuthMode::Login, &CredentialInput::login("", "pw"))
            .await;
        assert_eq!(
            result,
            Err(AuthError::Validation(ValidationError::MissingField(
                CredentialField::Email
            )))
        );
        assert_eq!(controller.session(), Some(signed_in.clone()));
        assert_eq!(controller.phase(), AuthPhase::Succeeded);

        provider.set_outcome(Err(AuthenticationError::InvalidCredentials));
        let result = controller
            .submit(
                AuthMode::Login,
                &CredentialInput::login("me@example.com", "wrong"),
            )
            .await;
        assert_eq!(
            result,
            Err(AuthError::Authentication(
                AuthenticationError::InvalidCredentials
            ))
        );
        assert_eq!(controller.session(), Some(signed_in));
        assert_eq!(controller.phase(), AuthPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_abandoned_attempt_keeps_existing_session() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::ok().gated(gate.clone()));
        let controller = controller(provider);

        gate.notify_one();
        let signed_in = controller
            .login_with_provider(OAuthProvider::GitHub)
            .await
            .unwrap()
            .session;

        let attempt = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.login_with_provider(OAuthProvider::Google).await })
        };
        wait_for_phase(&controller, AuthPhase::Authenticating).await;
        assert!(controller.abandon());
        assert_eq!(controller.phase(), AuthPhase::Succeeded);

        gate.notify_one();
        assert_eq!(attempt.await.unwrap(), Err(AuthError::Abandoned));
        assert_eq!(controller.session(), Some(signed_in));
    }

    #[tokio::test]
    async fn test_successful_attempt_replaces_session() {
        let controller = controller(Arc::new(ScriptedProvider::ok()));
        controller
            .login_with_provider(OAuthProvider::GitHub)
            .await
            .unwrap();
        controller
            .login_with_provider(OAuthProvider::Google)
            .await
            .unwrap();
        assert_eq!(controller.session().unwrap().identity, "Google");
    }

    #[tokio::test]
    async fn test_failure_event_sequence() {
        let controller = controller(Arc::new(ScriptedProvider::ok()));
        let mut rx = controller.events.subscribe();

        let _ = controller
            .submit(
                AuthMode::Signup,
                &CredentialInput::signup("me@example.com", "a", "b"),
            )
            .await;

        let mut events = Vec::new();
        while let Ok(AppEvent::Auth(event)) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                AuthEvent::PhaseChanged(AuthPhase::Validating),
                AuthEvent::PhaseChanged(AuthPhase::Failed),
                AuthEvent::Failed(AuthError::Validation(ValidationError::PasswordMismatch)),
                AuthEvent::PhaseChanged(AuthPhase::Idle),
            ]
        );
    }
}
