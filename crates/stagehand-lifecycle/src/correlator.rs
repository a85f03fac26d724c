//! Rendezvous between a waiting caller and the notification dispatch thread.
//!
//! Notifications delivered before the caller starts waiting are buffered in
//! the channel, so a terminal notification racing ahead of
//! [`NotificationCorrelator::await_terminal`] is never lost.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::channel::{NOTIFICATION_TARGET, NotificationSink};
use crate::notification::{LifecycleNotification, TaskName, TaskStatus};

/// Reasons a wait ended without a terminal notification for the task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CorrelationError {
    /// Nothing terminal arrived within the wait bound.
    #[error("no terminal {task} notification within {}s", waited.as_secs())]
    Timeout {
        /// Task being waited for.
        task: TaskName,
        /// Bound that elapsed.
        waited: Duration,
    },

    /// A different task reported failure while the wait was in progress.
    #[error("{received} failed while waiting for {expected}: {message}")]
    UnexpectedTask {
        /// Task being waited for.
        expected: TaskName,
        /// Task that reported the failure.
        received: TaskName,
        /// Message carried by the failure.
        message: String,
    },
}

impl CorrelationError {
    /// Task the caller was waiting for.
    #[must_use]
    pub const fn task(&self) -> TaskName {
        match self {
            Self::Timeout { task, .. } => *task,
            Self::UnexpectedTask { expected, .. } => *expected,
        }
    }
}

/// Single-producer, single-consumer handoff of lifecycle notifications.
///
/// The correlator keeps a sender of its own, so the stream never closes
/// while a caller is waiting.
#[derive(Debug)]
pub struct NotificationCorrelator {
    wait_bound: Duration,
    sender: Sender<LifecycleNotification>,
    receiver: Receiver<LifecycleNotification>,
}

impl NotificationCorrelator {
    /// Builds a correlator that waits at most `wait_bound` per task.
    #[must_use]
    pub fn new(wait_bound: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            wait_bound,
            sender,
            receiver,
        }
    }

    /// Configured wait bound.
    #[must_use]
    pub const fn wait_bound(&self) -> Duration {
        self.wait_bound
    }

    /// Creates a listener handle feeding this correlator.
    #[must_use]
    pub fn sink(&self) -> NotificationSink {
        NotificationSink::new(self.sender.clone())
    }

    /// Discards anything left over from an earlier command.
    ///
    /// Returns the number of notifications dropped.
    pub fn reset(&self) -> usize {
        let dropped = self.receiver.try_iter().count();
        if dropped > 0 {
            debug!(
                target: NOTIFICATION_TARGET,
                dropped,
                "discarded stale notifications"
            );
        }
        dropped
    }

    /// Blocks until a terminal notification for `expected` arrives.
    ///
    /// Non-terminal notifications and completions of other tasks are skipped.
    /// A failure reported for another task ends the wait.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelationError::Timeout`] once the wait bound elapses and
    /// [`CorrelationError::UnexpectedTask`] when another task fails.
    pub fn await_terminal(
        &self,
        expected: TaskName,
    ) -> Result<LifecycleNotification, CorrelationError> {
        let deadline = Instant::now().checked_add(self.wait_bound);
        loop {
            let notification = self.next(expected, deadline)?;
            if notification.concludes(expected) {
                return Ok(notification);
            }
            if notification.task != expected && notification.status == TaskStatus::Failed {
                return Err(CorrelationError::UnexpectedTask {
                    expected,
                    received: notification.task,
                    message: notification.message,
                });
            }
            debug!(
                target: NOTIFICATION_TARGET,
                expected = %expected,
                task = %notification.task,
                status = %notification.status,
                "skipping non-concluding notification"
            );
        }
    }

    /// Takes the next notification, preferring anything already queued over
    /// the deadline check.
    fn next(
        &self,
        task: TaskName,
        deadline: Option<Instant>,
    ) -> Result<LifecycleNotification, CorrelationError> {
        if let Ok(notification) = self.receiver.try_recv() {
            return Ok(notification);
        }
        let remaining = deadline.map_or(self.wait_bound, |limit| {
            limit.saturating_duration_since(Instant::now())
        });
        self.receiver
            .recv_timeout(remaining)
            .map_err(|_| CorrelationError::Timeout {
                task,
                waited: self.wait_bound,
            })
    }
}
