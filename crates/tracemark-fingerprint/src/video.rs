use tracemark_types::models::Signature;

use crate::ExtractError;

/// Default duration window for a duration-only match.
pub const DEFAULT_TOLERANCE_MS: u64 = 1_000;

/// Score reported when only the durations agree.
pub const DURATION_MATCH_SCORE: f64 = 0.9;

/// Coarse video fingerprint built from the stored source reference and
/// duration. No frames are analyzed.
pub fn signature(source_ref: &str, duration_ms: u64) -> Result<Signature, ExtractError> {
    let source_ref = source_ref.trim();
    if source_ref.is_empty() && duration_ms == 0 {
        return Err(ExtractError::Empty);
    }

    Ok(Signature::Video {
        source_ref: source_ref.to_string(),
        duration_ms,
    })
}

/// 1.0 for the same source reference, [`DURATION_MATCH_SCORE`] when both
/// durations are known and within `tolerance_ms`, otherwise 0.0.
pub fn similarity(
    (left_ref, left_ms): (&str, u64),
    (right_ref, right_ms): (&str, u64),
    tolerance_ms: u64,
) -> f64 {
    if !left_ref.is_empty() && left_ref == right_ref {
        return 1.0;
    }
    if left_ms > 0 && right_ms > 0 && left_ms.abs_diff(right_ms) <= tolerance_ms {
        return DURATION_MATCH_SCORE;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_source_is_a_full_match() {
        assert_eq!(similarity(("s3://a.mp4", 10_000), ("s3://a.mp4", 99_000), 1_000), 1.0);
    }

    #[test]
    fn duration_window_is_inclusive() {
        let tol = DEFAULT_TOLERANCE_MS;
        assert_eq!(similarity(("a", 60_000), ("b", 61_000), tol), DURATION_MATCH_SCORE);
        assert_eq!(similarity(("a", 60_000), ("b", 61_001), tol), 0.0);
    }

    #[test]
    fn unknown_durations_never_match() {
        assert_eq!(similarity(("a", 0), ("b", 0), DEFAULT_TOLERANCE_MS), 0.0);
        assert_eq!(similarity(("", 0), ("", 500), DEFAULT_TOLERANCE_MS), 0.0);
    }

    // Re-uploads under a new source reference with a different length are
    // invisible to this fingerprint. This pins the known gap.
    #[test]
    fn reencoded_upload_with_new_length_is_not_detected() {
        let original = ("media/original.mp4", 120_000);
        let reupload = ("media/reupload.webm", 118_500);
        assert_eq!(similarity(original, reupload, DEFAULT_TOLERANCE_MS), 0.0);
    }

    #[test]
    fn source_ref_is_trimmed() {
        assert_eq!(signature("  clip.mp4 ", 5).unwrap(), signature("clip.mp4", 5).unwrap());
    }
}
