//! Event types published on the [`EventBus`](super::EventBus).

use crate::auth::{AuthError, AuthPhase, SignInMethod};
use crate::cloud::CloudProvider;
use crate::downloads::{DownloadId, DownloadRecord, DownloadStatus, QueueError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Info,
    Destructive,
}

/// Short user-facing message, the kind a UI shows as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub variant: NoticeVariant,
}

impl Notice {
    fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Info,
        }
    }

    fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: NoticeVariant::Destructive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    PhaseChanged(AuthPhase),
    SignedIn {
        identity: String,
        method: SignInMethod,
    },
    Failed(AuthError),
    Abandoned,
    SignedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    DownloadAdded(DownloadRecord),
    ProgressUpdated {
        id: DownloadId,
        percent: u8,
        speed_bytes_per_sec: u64,
        eta_seconds: u64,
    },
    StatusChanged {
        id: DownloadId,
        status: DownloadStatus,
    },
    DownloadCompleted(DownloadRecord),
    DownloadFailed {
        id: DownloadId,
        reason: String,
    },
    DownloadRemoved {
        id: DownloadId,
    },
    SubmissionFailed(QueueError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CloudEvent {
    Connected(CloudProvider),
    Disconnected(CloudProvider),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    Auth(AuthEvent),
    Queue(QueueEvent),
    Cloud(CloudEvent),
}

impl AppEvent {
    /// The notice to show for this event, if it is worth one.
    ///
    /// Phase changes and progress ticks are state, not news, and yield none.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            AppEvent::Auth(event) => auth_notice(event),
            AppEvent::Queue(event) => queue_notice(event),
            AppEvent::Cloud(CloudEvent::Connected(provider)) => Some(Notice::info(
                "Cloud connected",
                format!("{} is now connected", provider),
            )),
            AppEvent::Cloud(CloudEvent::Disconnected(provider)) => Some(Notice::info(
                "Cloud disconnected",
                format!("{} has been disconnected", provider),
            )),
        }
    }
}

fn auth_notice(event: &AuthEvent) -> Option<Notice> {
    match event {
        AuthEvent::PhaseChanged(_) => None,
        AuthEvent::SignedIn { method, .. } => Some(match method {
            SignInMethod::Login => {
                Notice::info("Welcome back!", "You have been signed in successfully.")
            }
            SignInMethod::Signup => Notice::info(
                "Account created!",
                "Your account has been created. Welcome to CloudMagnet!",
            ),
            SignInMethod::OAuth(provider) => {
                Notice::info("Welcome back!", format!("Signed in with {}.", provider))
            }
        }),
        AuthEvent::Failed(AuthError::Validation(e)) => {
            Some(Notice::error("Error", e.to_string()))
        }
        AuthEvent::Failed(e) => Some(Notice::error("Sign-in failed", e.to_string())),
        AuthEvent::Abandoned => None,
        AuthEvent::SignedOut => Some(Notice::info("Signed out", "See you soon.")),
    }
}

fn queue_notice(event: &QueueEvent) -> Option<Notice> {
    match event {
        QueueEvent::DownloadAdded(_) => Some(Notice::info(
            "Download Added",
            "Your download has been added to the queue",
        )),
        QueueEvent::DownloadCompleted(record) => Some(Notice::info(
            "Download Completed",
            match &record.cloud_destination_path {
                Some(path) => format!("{} was saved to {}", record.name, path),
                None => format!("{} has finished downloading", record.name),
            },
        )),
        QueueEvent::DownloadFailed { reason, .. } => {
            Some(Notice::error("Download Failed", reason.clone()))
        }
        QueueEvent::SubmissionFailed(QueueError::EmptyInput)
        | QueueEvent::SubmissionFailed(QueueError::InvalidMagnetLink(_)) => Some(Notice::error(
            "Error",
            "Please enter a valid magnet link",
        )),
        QueueEvent::SubmissionFailed(QueueError::Abandoned) => None,
        QueueEvent::SubmissionFailed(e) => Some(Notice::error("Error", e.to_string())),
        QueueEvent::ProgressUpdated { .. }
        | QueueEvent::StatusChanged { .. }
        | QueueEvent::DownloadRemoved { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticationError, OAuthProvider, ValidationError};

    #[test]
    fn test_auth_notices() {
        let login = AppEvent::Auth(AuthEvent::SignedIn {
            identity: "me@example.com".to_string(),
            method: SignInMethod::Login,
        });
        assert_eq!(login.notice().unwrap().title, "Welcome back!");

        let signup = AppEvent::Auth(AuthEvent::SignedIn {
            identity: "me@example.com".to_string(),
            method: SignInMethod::Signup,
        });
        assert_eq!(signup.notice().unwrap().title, "Account created!");

        let oauth = AppEvent::Auth(AuthEvent::SignedIn {
            identity: "GitHub account".to_string(),
            method: SignInMethod::OAuth(OAuthProvider::GitHub),
        });
        assert!(oauth.notice().unwrap().description.contains("GitHub"));

        let mismatch = AppEvent::Auth(AuthEvent::Failed(AuthError::Validation(
            ValidationError::PasswordMismatch,
        )));
        let notice = mismatch.notice().unwrap();
        assert_eq!(notice.description, "Passwords do not match");
        assert_eq!(notice.variant, NoticeVariant::Destructive);

        let timeout = AppEvent::Auth(AuthEvent::Failed(AuthError::Authentication(
            AuthenticationError::Timeout,
        )));
        assert_eq!(timeout.notice().unwrap().variant, NoticeVariant::Destructive);

        assert!(AppEvent::Auth(AuthEvent::PhaseChanged(AuthPhase::Validating))
            .notice()
            .is_none());
    }

    #[test]
    fn test_submission_notices() {
        let empty = AppEvent::Queue(QueueEvent::SubmissionFailed(QueueError::EmptyInput));
        assert_eq!(
            empty.notice().unwrap().description,
            "Please enter a valid magnet link"
        );

        let abandoned = AppEvent::Queue(QueueEvent::SubmissionFailed(QueueError::Abandoned));
        assert!(abandoned.notice().is_none());
    }
}
