//! One-time confirmation codes.
//!
//! Codes are short-lived six-digit numbers keyed by email, used both to
//! verify a freshly registered account and for passwordless login. Each key
//! holds at most one live code: issuing again replaces the previous one.

use crate::auth::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Number of decimal digits in a code.
pub const CODE_LENGTH: usize = 6;

const CODE_SPACE: u32 = 1_000_000;

/// Why a code was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// No live code for the key (never issued, already used, or swept).
    #[error("no confirmation code pending")]
    NotFound,

    /// The code outlived its window; the entry has been evicted.
    #[error("confirmation code expired")]
    Expired,

    /// Wrong code. The pending code stays valid for another attempt.
    #[error("confirmation code mismatch")]
    Mismatch,
}

#[derive(Debug)]
struct CodeEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// In-memory registry of pending confirmation codes.
///
/// Owned by the service instance and shared behind an `Arc`. A single mutex
/// serializes every operation, so an issue racing a verify on the same key
/// never exposes a half-written entry, and two verifies racing with the right
/// code produce exactly one success. Random generation happens before the
/// lock is taken.
pub struct ConfirmationCodeRegistry {
    entries: Mutex<HashMap<String, CodeEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ConfirmationCodeRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Generates a code for `key`, replacing any pending one, and returns it.
    ///
    /// Delivering the code is the caller's job.
    pub fn issue(&self, key: &str) -> String {
        let code = generate_code();
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let replaced = self
            .entries
            .lock()
            .insert(
                key.to_string(),
                CodeEntry {
                    code: code.clone(),
                    expires_at,
                },
            )
            .is_some();

        debug!(replaced, %expires_at, "Issued confirmation code");
        code
    }

    /// Checks `candidate` against the pending code for `key`.
    ///
    /// A match consumes the code. An expired entry is evicted. A mismatch
    /// leaves the entry in place.
    pub fn consume(&self, key: &str, candidate: &str) -> Result<(), CodeError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let entry = entries.get(key).ok_or(CodeError::NotFound)?;

        if now > entry.expires_at {
            entries.remove(key);
            return Err(CodeError::Expired);
        }

        if bool::from(entry.code.as_bytes().ct_eq(candidate.trim().as_bytes())) {
            entries.remove(key);
            Ok(())
        } else {
            Err(CodeError::Mismatch)
        }
    }

    /// Boolean form of [`consume`](Self::consume).
    pub fn verify(&self, key: &str, candidate: &str) -> bool {
        self.consume(key, candidate).is_ok()
    }

    /// Evicts every expired entry and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    /// Number of pending entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns a task that sweeps expired codes every `every`.
    ///
    /// The task holds a weak reference and ends once the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.sweep_expired();
                if evicted > 0 {
                    debug!(evicted, "Swept expired confirmation codes");
                }
            }
        })
    }
}

fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(0..CODE_SPACE);
    format!("{:0width$}", n, width = CODE_LENGTH)
}
