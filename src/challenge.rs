// Challenge validation - decides what an incoming text reply means for a
// requester's pending record

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::pending::{Decision, PendingRequest, PendingStore, Resolution};
use crate::telegram::RequesterId;

/// Outcome of checking a text reply against the pending store.
#[derive(Debug)]
pub enum ChallengeOutcome {
    /// The reply matched in time. The record has been consumed from the
    /// store; the caller owns it and is responsible for running the
    /// transformation and releasing the staged file.
    Accepted(PendingRequest),
    /// Non-empty reply that does not match. The record stays untouched and
    /// the caller must not respond (only the exact code triggers anything).
    Rejected,
    /// The code's validity window has passed. The record and its staged file
    /// have been cleaned up.
    Expired,
    /// Nothing pending for this requester. The common case for ordinary chat
    /// traffic.
    NoPending,
}

/// Validate `submitted` for `requester` at time `now`.
///
/// Comparison is case-insensitive on the submitted side (codes are generated
/// upper-case) and ignores surrounding whitespace. An empty submission never
/// matches. Consumption on acceptance happens here, before any transformation
/// starts, which is what makes each code strictly single-use.
///
/// Compare and consume run under one store lock, so a reply can only ever
/// consume the exact record it was checked against. A concurrent superseding
/// request either lands first (and the old code is then a plain mismatch) or
/// lands after consumption; it can never be claimed by the old code.
pub async fn validate(
    store: &PendingStore,
    requester: RequesterId,
    submitted: &str,
    now: DateTime<Utc>,
) -> ChallengeOutcome {
    let submitted = submitted.trim().to_ascii_uppercase();

    let resolution = store
        .resolve(requester, |record| {
            if now > record.expires_at {
                Decision::Discard
            } else if submitted.is_empty() || submitted != record.security_code {
                Decision::Keep
            } else {
                Decision::Consume
            }
        })
        .await;

    match resolution {
        Resolution::Absent => ChallengeOutcome::NoPending,
        Resolution::Consumed(record) => ChallengeOutcome::Accepted(record),
        Resolution::Discarded(record) => {
            debug!(%requester, "security code expired, cleaning up pending request");
            record.discard().await;
            ChallengeOutcome::Expired
        }
        Resolution::Kept => {
            debug!(%requester, "reply does not match security code, ignoring");
            ChallengeOutcome::Rejected
        }
    }
}
