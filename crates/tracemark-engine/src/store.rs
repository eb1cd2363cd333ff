use anyhow::Result;
use tracemark_db::Database;
use tracemark_types::models::{ContentFingerprint, ContentKind};
use uuid::Uuid;

/// Which stored fingerprints a lookup considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchScope {
    /// Only fingerprints captured while their owner held protection.
    Protected,
    Any,
}

/// Read side of fingerprint storage used by the matcher.
///
/// Lookups are a full scan of one kind, oldest first. The stored digest
/// column leaves room for an exact-match index later.
pub trait FingerprintStore: Send + Sync {
    fn candidates(
        &self,
        kind: ContentKind,
        exclude_owner: Uuid,
        scope: MatchScope,
    ) -> Result<Vec<ContentFingerprint>>;
}

impl FingerprintStore for Database {
    fn candidates(
        &self,
        kind: ContentKind,
        exclude_owner: Uuid,
        scope: MatchScope,
    ) -> Result<Vec<ContentFingerprint>> {
        self.fingerprint_candidates(kind, exclude_owner, scope == MatchScope::Protected)
    }
}
