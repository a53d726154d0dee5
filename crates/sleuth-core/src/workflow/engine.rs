//! The submission state machine.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::notification::Notification;
use super::outcome::SubmissionOutcome;
use super::request::{SubmissionRequest, ToolKind};
use crate::config::DEFAULT_NOTIFICATION_SECS;
use crate::presenter;
use crate::request::{RequestClient, RequestError};
use crate::session::{SessionStatus, SessionView};

/// Failure message for an attempt dropped before it settled.
pub const CANCELLED_MESSAGE: &str = "submission was cancelled";

/// Why a submission was refused before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionViolation {
    /// The theory is blank.
    #[error("theory must not be empty")]
    EmptyTheory,
    /// A submission from this workflow is still in flight.
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    /// The session is not authenticated.
    #[error("connect a wallet and sign in before submitting")]
    NotAuthenticated,
}

/// Errors from [`SubmissionWorkflow::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// Refused locally; workflow state is unchanged.
    #[error("submission refused: {0}")]
    Precondition(#[from] PreconditionViolation),

    /// The backend call failed; the workflow is now `Failed`.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The workflow was reset or resubmitted while this attempt was in
    /// flight; its result was dropped.
    #[error("submission was discarded before it completed")]
    Discarded,
}

/// Position of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    /// Nothing submitted, or reset.
    #[default]
    Idle,
    /// A request is in flight.
    Submitting,
    /// The backend answered.
    Succeeded(SubmissionOutcome),
    /// The submission failed.
    Failed {
        /// Human-readable reason.
        message: String,
    },
}

impl WorkflowState {
    /// Short state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Succeeded(_) => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: WorkflowState,
    attempt: u64,
    notification: Option<Notification>,
}

/// One tool's submit-and-await-evaluation cycle.
///
/// ```text
/// Idle ──submit──► Submitting ──► Succeeded(outcome)
///   ▲                   │    └──► Failed { message }
///   └──────reset────────┴──────────────┘
/// ```
///
/// At most one submission is in flight; a second `submit` while
/// `Submitting` is refused, not queued. Submitting again from `Succeeded` or
/// `Failed` starts a fresh attempt.
#[derive(Debug)]
pub struct SubmissionWorkflow {
    kind: ToolKind,
    client: RequestClient,
    session: SessionView,
    notification_window: Duration,
    inner: Mutex<Inner>,
}

impl SubmissionWorkflow {
    /// Creates an idle workflow for `kind`.
    #[must_use]
    pub fn new(kind: ToolKind, client: RequestClient, session: SessionView) -> Self {
        Self {
            kind,
            client,
            session,
            notification_window: Duration::from_secs(DEFAULT_NOTIFICATION_SECS),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Overrides how long notifications stay visible.
    #[must_use]
    pub const fn with_notification_window(mut self, window: Duration) -> Self {
        self.notification_window = window;
        self
    }

    /// Tool this workflow submits to.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        self.kind
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WorkflowState {
        self.lock().state.clone()
    }

    /// Whether a request is in flight.
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        matches!(self.lock().state, WorkflowState::Submitting)
    }

    /// The notification raised by the last settled attempt, while it is
    /// still visible.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        self.lock()
            .notification
            .as_ref()
            .filter(|notification| notification.is_visible())
            .cloned()
    }

    /// Submits `request` and waits for the evaluation.
    ///
    /// Preconditions are checked in order (in flight, blank theory,
    /// authentication). A refused submission makes no network call and
    /// leaves the state as it was.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Precondition`] when refused locally
    /// - [`WorkflowError::Request`] when the call or decoding failed
    /// - [`WorkflowError::Discarded`] when [`Self::reset`] ran meanwhile
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        let attempt = self.begin(&request)?;
        let mut guard = AttemptGuard {
            workflow: self,
            attempt,
            armed: true,
        };
        info!(tool = %self.kind, case_id = request.case_id(), attempt, "submitting");

        let result = self
            .client
            .post_json::<_, serde_json::Value>(self.kind.path(), &request)
            .await
            .and_then(|body| SubmissionOutcome::from_value(self.kind, body));
        guard.armed = false;

        let mut inner = self.lock();
        if inner.attempt != attempt || inner.state != WorkflowState::Submitting {
            debug!(tool = %self.kind, attempt, "discarding result of abandoned submission");
            return Err(WorkflowError::Discarded);
        }

        match result {
            Ok(outcome) => {
                info!(
                    tool = %self.kind,
                    rank = outcome.rank(),
                    accepted = outcome.is_accepted(),
                    "submission evaluated"
                );
                let (kind, message) = presenter::notification_for(&outcome);
                inner.notification = Some(Notification::new(kind, message, self.notification_window));
                inner.state = WorkflowState::Succeeded(outcome.clone());
                Ok(outcome)
            },
            Err(error) => {
                warn!(tool = %self.kind, error = %error, "submission failed");
                let message = error.to_string();
                let (kind, text) = presenter::failure_notification(&message);
                inner.notification = Some(Notification::new(kind, text, self.notification_window));
                inner.state = WorkflowState::Failed { message };
                Err(error.into())
            },
        }
    }

    /// Returns to `Idle`. An in-flight result arriving later is dropped.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state == WorkflowState::Submitting {
            debug!(tool = %self.kind, attempt = inner.attempt, "abandoning in-flight submission");
        }
        inner.attempt += 1;
        inner.state = WorkflowState::Idle;
        inner.notification = None;
    }

    fn begin(&self, request: &SubmissionRequest) -> Result<u64, PreconditionViolation> {
        let mut inner = self.lock();
        if inner.state == WorkflowState::Submitting {
            return Err(PreconditionViolation::AlreadySubmitting);
        }
        request.validate()?;
        if self.session.status() != SessionStatus::Authenticated {
            return Err(PreconditionViolation::NotAuthenticated);
        }

        inner.attempt += 1;
        inner.state = WorkflowState::Submitting;
        inner.notification = None;
        Ok(inner.attempt)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fails an attempt whose `submit` future was dropped before the response
/// arrived, so the workflow does not stay `Submitting`.
struct AttemptGuard<'a> {
    workflow: &'a SubmissionWorkflow,
    attempt: u64,
    armed: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let workflow = self.workflow;
        let mut inner = workflow.lock();
        if inner.attempt != self.attempt || inner.state != WorkflowState::Submitting {
            return;
        }
        warn!(tool = %workflow.kind, attempt = self.attempt, "submission cancelled before it settled");
        let (kind, text) = presenter::failure_notification(CANCELLED_MESSAGE);
        inner.notification = Some(Notification::new(kind, text, workflow.notification_window));
        inner.state = WorkflowState::Failed {
            message: CANCELLED_MESSAGE.to_string(),
        };
    }
}
