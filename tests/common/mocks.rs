//! Mock collaborators for the integration tests.

use async_trait::async_trait;
use cvault::mail::{CodeMailer, CodePurpose, MailError};
use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCode {
    pub destination: String,
    pub code: String,
    pub purpose: CodePurpose,
}

/// Mailer that remembers every code instead of sending it.
///
/// With `failing()` it still records the attempt but reports a relay error.
/// With `slow()` every send stalls first, like a relay near its timeout.
///
/// Handlers deliver from a spawned task, so the readers below yield to the
/// runtime before looking.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentCode>>,
    fail: bool,
    delay: Option<Duration>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Lets pending delivery tasks run.
    async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn sent(&self) -> Vec<SentCode> {
        self.settle().await;
        self.sent.lock().clone()
    }

    pub async fn count_for(&self, destination: &str) -> usize {
        self.settle().await;
        self.sent
            .lock()
            .iter()
            .filter(|s| s.destination == destination)
            .count()
    }

    /// The most recent code sent to `destination`.
    pub async fn last_code_for(&self, destination: &str) -> String {
        self.settle().await;
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|s| s.destination == destination)
            .map(|s| s.code.clone())
            .unwrap_or_else(|| panic!("no code was sent to {}", destination))
    }
}

#[async_trait]
impl CodeMailer for RecordingMailer {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), MailError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.sent.lock().push(SentCode {
            destination: destination.to_string(),
            code: code.to_string(),
            purpose,
        });

        if self.fail {
            Err(MailError::Rejected(503))
        } else {
            Ok(())
        }
    }
}
