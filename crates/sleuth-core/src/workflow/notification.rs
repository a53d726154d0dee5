//! Transient notifications raised when a submission settles.

use std::time::Duration;

use tokio::time::Instant;

/// Tone of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The backend accepted the submission.
    Success,
    /// The submission failed or was refused.
    Error,
}

/// A message shown for a fixed window after a submission settles.
///
/// Purely presentational: the workflow state it describes persists after the
/// notification expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    kind: NotificationKind,
    message: String,
    raised_at: Instant,
    window: Duration,
}

impl Notification {
    /// Raises a notification now.
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>, window: Duration) -> Self {
        Self {
            kind,
            message: message.into(),
            raised_at: Instant::now(),
            window,
        }
    }

    /// Tone.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        self.kind
    }

    /// Text to display.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// When the notification stops being shown.
    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.raised_at + self.window
    }

    /// Whether it should still be shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_visible_at(Instant::now())
    }

    /// Whether it should be shown at `now`.
    #[must_use]
    pub fn is_visible_at(&self, now: Instant) -> bool {
        now < self.expires_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_window() {
        let notification = Notification::new(
            NotificationKind::Success,
            "Bias analysis complete!",
            Duration::from_secs(3),
        );
        assert!(notification.is_visible());

        tokio::time::advance(Duration::from_millis(2_999)).await;
        assert!(notification.is_visible());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!notification.is_visible());
        assert_eq!(notification.message(), "Bias analysis complete!");
    }
}
