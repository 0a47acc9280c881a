// # Update Memo
//
// Process-local record of the last desired state that was fully applied.
//
// ## Purpose
//
// Lets the engine skip reconciliation when a cycle computes exactly the
// record set it published last time. The memo only ever describes a cycle
// that finished without error.
//
// ## Crash Behavior
//
// - Not persisted; a restart always reconciles from scratch
// - Entries older than the configured maximum age are ignored, so drift made
//   outside this process is still repaired periodically

use sha1::{Digest, Sha1};

use crate::record::NamedRecord;

/// Digest of a desired record set (top record first, then sub-records)
pub fn desired_state_digest(top: &NamedRecord, subs: &[NamedRecord]) -> String {
    let mut hasher = Sha1::new();
    for record in std::iter::once(top).chain(subs) {
        hasher.update(record.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(record.content().as_bytes());
        hasher.update([b'\n']);
    }
    hex::encode(hasher.finalize())
}

/// Last successfully applied desired state
#[derive(Debug, Clone, Default)]
pub struct UpdateMemo {
    last: Option<MemoEntry>,
}

#[derive(Debug, Clone)]
struct MemoEntry {
    digest: String,
    applied_at: chrono::DateTime<chrono::Utc>,
}

impl UpdateMemo {
    /// Create an empty memo
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `digest` was applied successfully just now
    pub fn record(&mut self, digest: impl Into<String>) {
        self.last = Some(MemoEntry {
            digest: digest.into(),
            applied_at: chrono::Utc::now(),
        });
    }

    /// Whether `digest` was applied within `max_age`
    ///
    /// A zero `max_age` never matches.
    pub fn is_fresh(&self, digest: &str, max_age: chrono::Duration) -> bool {
        match &self.last {
            Some(entry) if entry.digest == digest => {
                chrono::Utc::now().signed_duration_since(entry.applied_at) < max_age
            }
            _ => false,
        }
    }

    /// Digest of the last applied state, if any
    pub fn last_digest(&self) -> Option<&str> {
        self.last.as_ref().map(|entry| entry.digest.as_str())
    }

    /// Forget the last applied state
    pub fn clear(&mut self) {
        self.last = None;
    }
}
