// Pending request store - at most one in-flight obfuscation request per chat

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::staging::StagedSource;
use crate::telegram::RequesterId;

/// How long a security code stays valid after the prompt is sent.
pub const CODE_TTL_SECS: i64 = 60;

/// One unconfirmed obfuscation request awaiting its security code.
///
/// Records are immutable once created; the only mutation is removal from the
/// store (consumption, expiry, or supersession by a newer request).
#[derive(Debug)]
pub struct PendingRequest {
    pub requester: RequesterId,
    pub file_name: String,
    pub security_code: String,
    pub expires_at: DateTime<Utc>,
    pub staged: StagedSource,
}

impl PendingRequest {
    /// Build a record expiring [`CODE_TTL_SECS`] after `now`. The expiry is
    /// fixed at creation and never extended.
    pub fn new(
        requester: RequesterId,
        file_name: String,
        security_code: String,
        staged: StagedSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            requester,
            file_name,
            security_code,
            expires_at: now + Duration::seconds(CODE_TTL_SECS),
            staged,
        }
    }

    /// Drop the record and delete its staged file.
    pub async fn discard(self) {
        self.staged.release().await;
    }
}

/// Read-only view of a record, enough to validate a reply without taking
/// ownership of the staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub security_code: String,
    pub expires_at: DateTime<Utc>,
}

/// What [`PendingStore::resolve`]'s callback wants done with the entry it
/// was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Remove the entry and hand the record to the caller for use.
    Consume,
    /// Remove the entry and hand the record to the caller for cleanup.
    Discard,
    /// Leave the entry in place.
    Keep,
}

/// Result of [`PendingStore::resolve`], mirroring the [`Decision`] that was
/// applied (or [`Resolution::Absent`] when there was no entry to judge).
#[derive(Debug)]
pub enum Resolution {
    Consumed(PendingRequest),
    Discarded(PendingRequest),
    Kept,
    Absent,
}

/// Keyed store holding at most one [`PendingRequest`] per requester.
///
/// The store exclusively owns each record and its staged file for the
/// record's lifetime. Handlers run as independent tasks, so access to one
/// key is serialized through the mutex; the lock is never held across an
/// await point.
#[derive(Debug, Default)]
pub struct PendingStore {
    inner: Mutex<HashMap<RequesterId, PendingRequest>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `record` as the sole entry for its requester.
    ///
    /// A prior unconsumed record for the same requester is superseded and its
    /// staged file is released here, so rapid repeated requests cannot leak
    /// temp storage.
    pub async fn put(&self, record: PendingRequest) {
        let requester = record.requester;
        let superseded = self.inner.lock().await.insert(requester, record);
        if let Some(previous) = superseded {
            warn!(%requester, file = %previous.file_name, "superseding unconsumed pending request");
            previous.discard().await;
        }
        debug!(%requester, "pending request stored");
    }

    /// Read-only lookup. No side effects.
    pub async fn peek(&self, requester: RequesterId) -> Option<PendingSnapshot> {
        self.inner
            .lock()
            .await
            .get(&requester)
            .map(|record| PendingSnapshot {
                security_code: record.security_code.clone(),
                expires_at: record.expires_at,
            })
    }

    /// Remove the entry and hand ownership of the record to the caller.
    pub async fn take(&self, requester: RequesterId) -> Option<PendingRequest> {
        self.inner.lock().await.remove(&requester)
    }

    /// Judge the requester's entry and apply the callback's [`Decision`]
    /// under a single lock acquisition.
    ///
    /// Because lookup and removal happen atomically, a concurrent `put` for
    /// the same requester can only land strictly before or strictly after
    /// the judgement; it can never swap the record between the compare and
    /// the take. Removed records are returned rather than discarded here so
    /// the file deletion stays outside the critical section.
    pub async fn resolve<F>(&self, requester: RequesterId, decide: F) -> Resolution
    where
        F: FnOnce(&PendingRequest) -> Decision,
    {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.remove(&requester) else {
            return Resolution::Absent;
        };
        match decide(&record) {
            Decision::Consume => Resolution::Consumed(record),
            Decision::Discard => Resolution::Discarded(record),
            Decision::Keep => {
                inner.insert(requester, record);
                Resolution::Kept
            }
        }
    }

    /// Remove the entry if present, releasing its staged file. No-op when
    /// absent.
    pub async fn remove(&self, requester: RequesterId) {
        if let Some(record) = self.take(requester).await {
            record.discard().await;
        }
    }

    pub async fn contains(&self, requester: RequesterId) -> bool {
        self.inner.lock().await.contains_key(&requester)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
