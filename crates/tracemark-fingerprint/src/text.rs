use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use tracemark_types::models::Signature;

use crate::ExtractError;

/// Lowercase, strip punctuation and split into words.
///
/// Any character that is not alphanumeric acts as a separator, so
/// "Hello, world!" and "hello world" normalize identically.
pub fn normalize(body: &str) -> BTreeSet<String> {
    body.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn signature(body: &str) -> Result<Signature, ExtractError> {
    let tokens: Vec<String> = normalize(body).into_iter().collect();
    if tokens.is_empty() {
        return Err(ExtractError::Empty);
    }

    let mut hasher = Sha256::new();
    for token in &tokens {
        hasher.update(token.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hex::encode(hasher.finalize());

    Ok(Signature::Text { digest, tokens })
}

/// Jaccard index of two sorted, deduplicated token lists.
pub fn jaccard(left: &[String], right: &[String]) -> f64 {
    let mut shared = 0usize;
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }

    let union = left.len() + right.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(body: &str) -> Vec<String> {
        match signature(body).unwrap() {
            Signature::Text { tokens, .. } => tokens,
            other => panic!("unexpected signature {:?}", other),
        }
    }

    #[test]
    fn punctuation_and_case_are_ignored() {
        assert_eq!(signature("Hello, World!").unwrap(), signature("hello world").unwrap());
        assert_eq!(tokens("a-b  c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn token_order_and_repetition_do_not_matter() {
        assert_eq!(signature("one two two three").unwrap(), signature("three one two").unwrap());
    }

    #[test]
    fn jaccard_bounds() {
        let a = tokens("alpha beta gamma");
        let b = tokens("delta epsilon");
        assert_eq!(jaccard(&a, &a), 1.0);
        assert_eq!(jaccard(&a, &b), 0.0);
    }

    #[test]
    fn jaccard_partial_overlap() {
        let a = tokens("w1 w2 w3 w4 w5 w6 w7 w8 w9 w10");
        let b = tokens("w1 w2 w3 w4 w5 w6 w7 w8 w9");
        assert_eq!(jaccard(&a, &b), 0.9);
        assert_eq!(jaccard(&a, &b), jaccard(&b, &a));
    }

    #[test]
    fn unicode_words_are_kept() {
        assert_eq!(tokens("Café déjà-vu"), vec!["café", "déjà", "vu"]);
    }
}
