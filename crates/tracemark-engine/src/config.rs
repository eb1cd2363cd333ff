use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracemark_types::models::ContentKind;

/// Thresholds and limits for the decision pipeline. All score thresholds are
/// inclusive: a score equal to the threshold triggers.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Text similarity at which content is marked duplicate, protected or not.
    pub duplicate_threshold: f64,
    pub copyright_text_threshold: f64,
    pub copyright_image_threshold: f64,
    pub copyright_video_threshold: f64,
    /// Protected-match score that logs a review flag without moderating.
    pub review_threshold: f64,
    pub video_tolerance_ms: u64,
    pub max_matches: usize,
    pub match_timeout: Duration,
    /// Strikes in one category that put an account into moderation.
    pub strike_ceiling: u32,
    /// Evaluate image and video publications on a background task.
    pub offload_media: bool,
    pub eligibility: EligibilityRules,
}

/// Gates for automatic protection.
#[derive(Debug, Clone)]
pub struct EligibilityRules {
    pub min_account_age_days: i64,
    pub min_published: u32,
    /// Total strikes must stay below this.
    pub max_strikes: u32,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.90,
            copyright_text_threshold: 0.80,
            copyright_image_threshold: 0.90,
            copyright_video_threshold: 0.90,
            review_threshold: 0.70,
            video_tolerance_ms: 1_000,
            max_matches: 5,
            match_timeout: Duration::from_secs(15),
            strike_ceiling: 10,
            offload_media: true,
            eligibility: EligibilityRules::default(),
        }
    }
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            min_account_age_days: 7,
            min_published: 3,
            max_strikes: 3,
        }
    }
}

impl Policy {
    /// Defaults overridden by `TRACEMARK_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            duplicate_threshold: env_or("TRACEMARK_DUPLICATE_THRESHOLD", d.duplicate_threshold)?,
            copyright_text_threshold: env_or(
                "TRACEMARK_COPYRIGHT_TEXT_THRESHOLD",
                d.copyright_text_threshold,
            )?,
            copyright_image_threshold: env_or(
                "TRACEMARK_COPYRIGHT_IMAGE_THRESHOLD",
                d.copyright_image_threshold,
            )?,
            copyright_video_threshold: env_or(
                "TRACEMARK_COPYRIGHT_VIDEO_THRESHOLD",
                d.copyright_video_threshold,
            )?,
            review_threshold: env_or("TRACEMARK_REVIEW_THRESHOLD", d.review_threshold)?,
            video_tolerance_ms: env_or("TRACEMARK_VIDEO_TOLERANCE_MS", d.video_tolerance_ms)?,
            max_matches: env_or("TRACEMARK_MAX_MATCHES", d.max_matches)?,
            match_timeout: Duration::from_secs(env_or(
                "TRACEMARK_MATCH_TIMEOUT_SECS",
                d.match_timeout.as_secs(),
            )?),
            strike_ceiling: env_or("TRACEMARK_STRIKE_CEILING", d.strike_ceiling)?,
            offload_media: env_or("TRACEMARK_OFFLOAD_MEDIA", d.offload_media)?,
            eligibility: EligibilityRules {
                min_account_age_days: env_or(
                    "TRACEMARK_MIN_ACCOUNT_AGE_DAYS",
                    d.eligibility.min_account_age_days,
                )?,
                min_published: env_or("TRACEMARK_MIN_PUBLISHED", d.eligibility.min_published)?,
                max_strikes: env_or("TRACEMARK_MAX_ELIGIBLE_STRIKES", d.eligibility.max_strikes)?,
            },
        })
    }

    pub fn copyright_threshold(&self, kind: ContentKind) -> f64 {
        match kind {
            ContentKind::Text => self.copyright_text_threshold,
            ContentKind::Image => self.copyright_image_threshold,
            ContentKind::Video => self.copyright_video_threshold,
        }
    }

    pub fn is_duplicate(&self, score: f64) -> bool {
        score >= self.duplicate_threshold
    }

    pub fn is_copyright_match(&self, kind: ContentKind, score: f64) -> bool {
        score >= self.copyright_threshold(kind)
    }

    pub fn needs_review(&self, score: f64) -> bool {
        score >= self.review_threshold
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_threshold_is_inclusive() {
        let policy = Policy::default();
        assert!(policy.is_duplicate(0.90));
        assert!(!policy.is_duplicate(0.899999));
        assert!(policy.is_duplicate(1.0));
    }

    #[test]
    fn copyright_thresholds_are_per_kind() {
        let policy = Policy::default();
        assert!(policy.is_copyright_match(ContentKind::Text, 0.80));
        assert!(!policy.is_copyright_match(ContentKind::Image, 0.80));
        assert!(policy.is_copyright_match(ContentKind::Video, 0.90));
    }
}
