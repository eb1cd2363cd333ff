use std::sync::Arc;

use anyhow::Result;
use tracemark_fingerprint::similarity_with;
use tracemark_types::models::{ContentFingerprint, SimilarityMatch};

use crate::store::{FingerprintStore, MatchScope};

/// Scores a new fingerprint against stored ones of the same kind.
#[derive(Clone)]
pub struct SimilarityMatcher {
    store: Arc<dyn FingerprintStore>,
    limit: usize,
    video_tolerance_ms: u64,
}

impl SimilarityMatcher {
    pub fn new(store: Arc<dyn FingerprintStore>, limit: usize, video_tolerance_ms: u64) -> Self {
        Self {
            store,
            limit,
            video_tolerance_ms,
        }
    }

    /// Best matches first, at most `limit`. Content from the same owner is
    /// never compared.
    pub fn find_matches(
        &self,
        fingerprint: &ContentFingerprint,
        scope: MatchScope,
    ) -> Result<Vec<SimilarityMatch>> {
        let candidates = self
            .store
            .candidates(fingerprint.kind, fingerprint.owner_id, scope)?;
        Ok(rank(
            fingerprint,
            &candidates,
            self.limit,
            self.video_tolerance_ms,
        ))
    }
}

/// Rank by score descending, ties broken by the earliest stored fingerprint
/// and then by id, so reruns always pick the same top match.
pub fn rank(
    fingerprint: &ContentFingerprint,
    candidates: &[ContentFingerprint],
    limit: usize,
    video_tolerance_ms: u64,
) -> Vec<SimilarityMatch> {
    let mut matches: Vec<SimilarityMatch> = candidates
        .iter()
        .filter(|c| c.content_id != fingerprint.content_id && c.owner_id != fingerprint.owner_id)
        .filter_map(|c| {
            let score = similarity_with(&fingerprint.signature, &c.signature, video_tolerance_ms)?;
            (score > 0.0).then(|| SimilarityMatch {
                candidate_fingerprint_id: fingerprint.id,
                target_fingerprint_id: c.id,
                target_content_id: c.content_id,
                target_owner_id: c.owner_id,
                target_protected: c.protected,
                target_created_at: c.created_at,
                score,
                kind: c.kind,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.target_created_at.cmp(&b.target_created_at))
            .then(a.target_fingerprint_id.cmp(&b.target_fingerprint_id))
    });
    matches.truncate(limit);
    matches
}
