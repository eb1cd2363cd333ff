use tracemark_types::models::Signature;

use crate::{perceptual, text, video};

/// Score two signatures in [0, 1] with the default video tolerance.
/// Returns `None` when the kinds differ.
pub fn similarity(left: &Signature, right: &Signature) -> Option<f64> {
    similarity_with(left, right, video::DEFAULT_TOLERANCE_MS)
}

pub fn similarity_with(left: &Signature, right: &Signature, video_tolerance_ms: u64) -> Option<f64> {
    match (left, right) {
        (Signature::Text { tokens: a, .. }, Signature::Text { tokens: b, .. }) => {
            Some(text::jaccard(a, b))
        }
        (Signature::Image { hash: a }, Signature::Image { hash: b }) => {
            Some(perceptual::hamming_similarity(*a, *b))
        }
        (
            Signature::Video {
                source_ref: ra,
                duration_ms: da,
            },
            Signature::Video {
                source_ref: rb,
                duration_ms: db,
            },
        ) => Some(video::similarity((ra.as_str(), *da), (rb.as_str(), *db), video_tolerance_ms)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_kinds_are_incomparable() {
        let t = text::signature("hello there").unwrap();
        let i = Signature::Image { hash: 7 };
        assert_eq!(similarity(&t, &i), None);
    }

    #[test]
    fn text_and_image_scores_are_symmetric() {
        let pairs = [
            (
                text::signature("a b c d e").unwrap(),
                text::signature("c d e f").unwrap(),
            ),
            (Signature::Image { hash: 0xff00 }, Signature::Image { hash: 0x0ff0 }),
        ];
        for (a, b) in &pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn identical_text_scores_one() {
        let a = text::signature("Same words here.").unwrap();
        let b = text::signature("same WORDS here").unwrap();
        assert_eq!(similarity(&a, &b), Some(1.0));
    }
}
