//! Error and retry-policy types for the storybook domain.
//!
//! [`StorybookError`] covers conditions that stop a workflow (generation,
//! library edits, account changes). The port traits have their own error
//! types, [`ContentError`] for the generative content service and
//! [`StoreError`] for the backend, which infrastructure crates map their
//! transport failures into.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: rate-limit responses, provider 5xx, transport timeouts.
/// - `NonRetryable` errors: rejected prompts, bad credentials, malformed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::ContentGenerator`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContentError {
    /// The provider answered 429.
    #[error("Generation rate limited")]
    RateLimited {
        /// Server-provided hint, when the response carried one.
        retry_after: Option<Duration>,
    },

    /// The provider answered with a non-success status.
    #[error("Generation provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The request never produced an HTTP response (DNS, TLS, timeout).
    #[error("Generation transport error: {0}")]
    Transport(String),

    /// The response did not have the expected structure.
    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    /// The provider's safety filter refused the prompt or the output.
    #[error("Generation blocked: {reason}")]
    Blocked { reason: String },

    /// The story came back with fewer pages than were requested.
    #[error("Story has {actual} pages, expected {expected}")]
    IncompleteStory { expected: u32, actual: u32 },

    /// The response was well formed but did not contain the requested payload.
    #[error("Generation response contained no {what}")]
    MissingContent { what: &'static str },
}

impl ContentError {
    /// Retry classification used by the back-off loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Provider { status, .. } if *status >= 500 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            // Models occasionally answer short or with text only.
            Self::MissingContent { .. } | Self::IncompleteStory { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Provider { .. } | Self::MalformedResponse(_) | Self::Blocked { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

/// Failures reported by the backend ports ([`crate::AuthProvider`],
/// [`crate::BookRepository`], [`crate::ProfileRepository`], [`crate::ObjectStore`]).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    /// Missing, expired, or rejected credentials.
    #[error("Not authorised: {0}")]
    Unauthorized(String),

    /// Authenticated, but row-level security denied the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A unique constraint or upload collision.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Backend transport error: {0}")]
    Transport(String),

    /// A row or payload could not be mapped onto a domain type.
    #[error("Could not decode backend data: {0}")]
    Decode(String),
}

impl StoreError {
    /// Retry classification; only transient failures are retryable.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Provider { status, .. } if *status >= 500 || *status == 429 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Transport(_) => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow errors
// ---------------------------------------------------------------------------

/// Errors that stop a storybook workflow.
#[derive(Debug, Error)]
pub enum StorybookError {
    /// A wizard field or credential failed validation.
    #[error("Invalid {field}: {reason}")]
    InvalidParameters {
        field: &'static str,
        reason: String,
    },

    /// The text model returned fewer pages than were requested.
    #[error("Story has {actual} pages, expected {expected}")]
    StoryShape { expected: u32, actual: u32 },

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The operation needs a signed-in session and there is none.
    #[error("Not signed in")]
    NotSignedIn,

    /// The signed-in user lacks the role the operation requires.
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// The runtime configuration is invalid; produced at load time.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl From<StorybookError> for ContentError {
    /// Folds story-parsing failures back into the port's error type.
    fn from(err: StorybookError) -> Self {
        match err {
            StorybookError::Content(e) => e,
            StorybookError::StoryShape { expected, actual } => {
                Self::IncompleteStory { expected, actual }
            }
            other => Self::MalformedResponse(other.to_string()),
        }
    }
}

impl StorybookError {
    /// Retry classification, delegating to the wrapped port error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Content(e) => e.retry_policy(),
            Self::Store(e) => e.retry_policy(),
            _ => RetryPolicy::NonRetryable,
        }
    }
}
