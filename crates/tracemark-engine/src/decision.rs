use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use tracemark_db::posts::PostFlag;
use tracemark_db::{Connection, Database, accounts, fingerprints, posts, reconciliation};
use tracemark_fingerprint::extract;
use tracemark_types::api::{PublishResponse, PublishStatus, RecordStrikeResponse};
use tracemark_types::events::NotificationType;
use tracemark_types::models::{
    ContentFingerprint, ContentKind, ContentPayload, DecisionKind, Post, PostVisibility,
    SimilarityMatch, StrikeCategory, TargetType,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{self, DecisionDraft};
use crate::config::Policy;
use crate::error::EngineError;
use crate::matcher::SimilarityMatcher;
use crate::store::MatchScope;
use crate::strikes::apply_strike;
use crate::visibility;

const BACKGROUND_PENDING: &str = "background evaluation pending";

/// A publication handed to the pre-publish hook.
#[derive(Debug, Clone)]
pub struct PublishContent {
    pub content_id: Uuid,
    pub owner_id: Uuid,
    pub payload: ContentPayload,
}

/// What the matcher results call for.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    NoAction,
    /// Logged for a human; the post stays published.
    FlagForReview(SimilarityMatch),
    AutoModerate {
        category: StrikeCategory,
        decision: DecisionKind,
        matched: SimilarityMatch,
        /// Also mark the post duplicate without a second strike.
        also_duplicate: bool,
    },
}

/// Apply the decision order to ranked matches.
pub fn decide(
    policy: &Policy,
    kind: ContentKind,
    protected: &[SimilarityMatch],
    any: &[SimilarityMatch],
) -> Verdict {
    let best_protected = protected.first();
    let duplicate = if kind == ContentKind::Text {
        any.first().filter(|m| policy.is_duplicate(m.score))
    } else {
        None
    };

    if let Some(m) = best_protected.filter(|m| policy.is_copyright_match(kind, m.score)) {
        return Verdict::AutoModerate {
            category: StrikeCategory::Copyright,
            decision: DecisionKind::CopyrightMatch,
            matched: m.clone(),
            also_duplicate: duplicate.is_some(),
        };
    }
    if let Some(m) = duplicate {
        return Verdict::AutoModerate {
            category: StrikeCategory::DuplicateContent,
            decision: DecisionKind::DuplicateContent,
            matched: m.clone(),
            also_duplicate: false,
        };
    }
    match best_protected.filter(|m| policy.needs_review(m.score)) {
        Some(m) => Verdict::FlagForReview(m.clone()),
        None => Verdict::NoAction,
    }
}

struct Assessment {
    fingerprint: ContentFingerprint,
    verdict: Verdict,
}

enum Registration {
    /// Already fingerprinted; nothing to re-evaluate.
    Known(PublishResponse),
    Fresh { protected: bool },
}

/// Pre-publish hook, external violation intake and content deletion.
#[derive(Clone)]
pub struct DecisionEngine {
    db: Arc<Database>,
    matcher: SimilarityMatcher,
    policy: Arc<Policy>,
}

impl DecisionEngine {
    pub fn new(db: Arc<Database>, matcher: SimilarityMatcher, policy: Arc<Policy>) -> Self {
        Self { db, matcher, policy }
    }

    /// Never fails: dependency errors publish the content and leave a
    /// reconciliation entry behind.
    pub async fn publish(&self, content: PublishContent) -> PublishResponse {
        let kind = content.payload.kind();

        let registration = {
            let engine = self.clone();
            let (content_id, owner_id) = (content.content_id, content.owner_id);
            tokio::task::spawn_blocking(move || engine.register(content_id, owner_id, kind)).await
        };
        let protected = match registration {
            Ok(Ok(Registration::Known(response))) => {
                debug!("Content {} ({}) already evaluated", content.content_id, kind);
                return response;
            }
            Ok(Ok(Registration::Fresh { protected })) => protected,
            Ok(Err(e)) => return self.fail_open(&content, format!("registration failed: {}", e)).await,
            Err(e) => return self.fail_open(&content, format!("registration task failed: {}", e)).await,
        };

        if kind != ContentKind::Text && self.policy.offload_media {
            // Left open until apply or the skip path closes it.
            self.record_reconciliation(&content, BACKGROUND_PENDING.to_string())
                .await;
            let engine = self.clone();
            tokio::spawn(async move {
                let content_id = content.content_id;
                let outcome = engine.evaluate(content, protected).await;
                debug!("Background evaluation of {} finished: {}", content_id, outcome.status);
            });
            return published(None);
        }

        self.evaluate(content, protected).await
    }

    async fn evaluate(&self, content: PublishContent, protected: bool) -> PublishResponse {
        let assessed = {
            let engine = self.clone();
            let job = content.clone();
            let task = tokio::task::spawn_blocking(move || engine.assess(&job, protected));
            tokio::time::timeout(self.policy.match_timeout, task).await
        };

        let assessment = match assessed {
            Err(_) => {
                return self
                    .fail_open(&content, "similarity check timed out".to_string())
                    .await;
            }
            Ok(Err(e)) => {
                return self
                    .fail_open(&content, format!("similarity task failed: {}", e))
                    .await;
            }
            Ok(Ok(Err(e))) => {
                return self
                    .fail_open(&content, format!("fingerprint store unavailable: {}", e))
                    .await;
            }
            Ok(Ok(Ok(None))) => {
                self.resolve_reconciliation(&content).await;
                return published(None);
            }
            Ok(Ok(Ok(Some(a)))) => a,
        };

        let applied = {
            let engine = self.clone();
            let (owner_id, content_id) = (content.owner_id, content.content_id);
            tokio::task::spawn_blocking(move || engine.apply(owner_id, content_id, assessment))
                .await
        };
        match applied {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.fail_open(&content, format!("decision write failed: {}", e)).await,
            Err(e) => self.fail_open(&content, format!("decision task failed: {}", e)).await,
        }
    }

    fn register(
        &self,
        content_id: Uuid,
        owner_id: Uuid,
        kind: ContentKind,
    ) -> anyhow::Result<Registration> {
        self.db.with_tx(|conn| {
            let now = Utc::now();
            accounts::ensure(conn, owner_id, now)?;
            posts::ensure(conn, content_id, owner_id, now)?;

            if fingerprints::get_by_content(conn, content_id, kind)?.is_some() {
                let post = load_post(conn, content_id)?;
                return Ok(Registration::Known(status_of(&post)));
            }
            let protected = accounts::get(conn, owner_id)?
                .map(|a| a.protection_enabled)
                .unwrap_or(false);
            Ok(Registration::Fresh { protected })
        })
    }

    /// Read-only half: extract and match. Returns None when the payload
    /// yields no usable signature.
    fn assess(
        &self,
        content: &PublishContent,
        protected: bool,
    ) -> anyhow::Result<Option<Assessment>> {
        let signature = match extract(&content.payload) {
            Ok(s) => s,
            Err(e) => {
                debug!("No fingerprint for {}: {}", content.content_id, e);
                return Ok(None);
            }
        };
        let fingerprint = ContentFingerprint {
            id: Uuid::new_v4(),
            content_id: content.content_id,
            owner_id: content.owner_id,
            kind: signature.kind(),
            signature,
            protected,
            created_at: Utc::now(),
        };

        let protected_matches = self.matcher.find_matches(&fingerprint, MatchScope::Protected)?;
        let any_matches = if fingerprint.kind == ContentKind::Text {
            self.matcher.find_matches(&fingerprint, MatchScope::Any)?
        } else {
            Vec::new()
        };
        let verdict = decide(&self.policy, fingerprint.kind, &protected_matches, &any_matches);

        Ok(Some(Assessment {
            fingerprint,
            verdict,
        }))
    }

    /// Write half: fingerprint, post state, decision, strike and
    /// notification in one transaction.
    fn apply(
        &self,
        owner_id: Uuid,
        content_id: Uuid,
        assessment: Assessment,
    ) -> anyhow::Result<PublishResponse> {
        let Assessment {
            fingerprint,
            verdict,
        } = assessment;
        let kind = fingerprint.kind;

        self.db.with_tx(|conn| {
            let now = Utc::now();
            if !fingerprints::insert(conn, &fingerprint)? {
                // A concurrent publish of the same content won.
                return Ok(status_of(&load_post(conn, content_id)?));
            }
            reconciliation::resolve_for_content(conn, content_id, kind, now)?;

            let mut effects = Vec::new();
            match verdict {
                Verdict::NoAction => Ok(published(None)),
                Verdict::FlagForReview(matched) => {
                    let decision = DecisionDraft::system(
                        TargetType::Post,
                        content_id,
                        DecisionKind::FlaggedForReview,
                        format!(
                            "{} similarity {:.3} to protected content {}",
                            kind, matched.score, matched.target_content_id
                        ),
                    )
                    .matched(&matched)
                    .record(conn, now, &mut effects)?;
                    info!(
                        content_id = %content_id,
                        score = matched.score,
                        "Flagged for review"
                    );
                    Ok(published(Some(decision.decision_code)))
                }
                Verdict::AutoModerate {
                    category,
                    decision,
                    matched,
                    also_duplicate,
                } => {
                    let post = load_post(conn, content_id)?;
                    if post.visibility == PostVisibility::Removed {
                        debug!("Post {} already removed, no further action", content_id);
                        return Ok(status_of(&post));
                    }
                    let flag = match decision {
                        DecisionKind::CopyrightMatch => PostFlag::CopyrightMatch,
                        _ => PostFlag::DuplicateContent,
                    };
                    posts::set_flag(conn, content_id, flag, now)?;
                    if also_duplicate {
                        posts::set_flag(conn, content_id, PostFlag::DuplicateContent, now)?;
                    }
                    visibility::transition(conn, &post, PostVisibility::PendingModeration, now)?;

                    let recorded = DecisionDraft::system(
                        TargetType::Post,
                        content_id,
                        decision,
                        format!(
                            "{} similarity {:.3} to content {}",
                            kind, matched.score, matched.target_content_id
                        ),
                    )
                    .matched(&matched)
                    .record(conn, now, &mut effects)?;

                    audit::notify(
                        conn,
                        owner_id,
                        NotificationType::ContentModerated,
                        (TargetType::Post, content_id),
                        format!(
                            "Your post is pending moderation: {} (ref {})",
                            decision, recorded.decision_code
                        ),
                        now,
                        &mut effects,
                    )?;

                    let strike = apply_strike(
                        conn,
                        owner_id,
                        category,
                        &format!("publish:{}:{}", content_id, kind),
                        self.policy.strike_ceiling,
                        now,
                        &mut effects,
                    )?;
                    info!(
                        content_id = %content_id,
                        owner_id = %owner_id,
                        decision = %decision,
                        score = matched.score,
                        strikes = strike.count,
                        "Content held for moderation"
                    );

                    Ok(PublishResponse {
                        status: PublishStatus::PendingModeration,
                        decision_code: Some(recorded.decision_code),
                    })
                }
            }
        })
    }

    async fn fail_open(&self, content: &PublishContent, reason: String) -> PublishResponse {
        warn!(
            content_id = %content.content_id,
            owner_id = %content.owner_id,
            kind = %content.payload.kind(),
            reason = %reason,
            "Similarity check failed open, publishing unchecked"
        );
        self.record_reconciliation(content, reason).await;
        published(None)
    }

    async fn record_reconciliation(&self, content: &PublishContent, reason: String) {
        let db = self.db.clone();
        let kind = content.payload.kind();
        let (content_id, owner_id) = (content.content_id, content.owner_id);
        let recorded = tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                reconciliation::record(conn, content_id, owner_id, kind, &reason, Utc::now())
            })
        })
        .await;
        match recorded {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to record reconciliation for {}: {}", content_id, e),
            Err(e) => error!("Reconciliation task for {} failed: {}", content_id, e),
        }
    }

    /// Nothing left to reconcile for content that yields no fingerprint.
    async fn resolve_reconciliation(&self, content: &PublishContent) {
        let db = self.db.clone();
        let kind = content.payload.kind();
        let content_id = content.content_id;
        let resolved = tokio::task::spawn_blocking(move || {
            db.with_conn(|conn| {
                reconciliation::resolve_for_content(conn, content_id, kind, Utc::now())
            })
        })
        .await;
        match resolved {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to resolve reconciliation for {}: {}", content_id, e),
            Err(e) => error!("Reconciliation task for {} failed: {}", content_id, e),
        }
    }

    /// Registers content of a kind the extractor does not handle and
    /// publishes it unchecked.
    pub async fn publish_unsupported(&self, content_id: Uuid, owner_id: Uuid) -> PublishResponse {
        let db = self.db.clone();
        let registered = tokio::task::spawn_blocking(move || {
            db.with_tx(|conn| -> anyhow::Result<PublishResponse> {
                let now = Utc::now();
                accounts::ensure(conn, owner_id, now)?;
                posts::ensure(conn, content_id, owner_id, now)?;
                Ok(status_of(&load_post(conn, content_id)?))
            })
        })
        .await;
        match registered {
            Ok(Ok(response)) => {
                debug!("Content {} has an unsupported kind, not fingerprinted", content_id);
                response
            }
            Ok(Err(e)) => {
                warn!("Registering unsupported content {} failed: {}", content_id, e);
                published(None)
            }
            Err(e) => {
                warn!("Registration task for {} failed: {}", content_id, e);
                published(None)
            }
        }
    }

    /// Strike intake for violations detected outside the matcher.
    pub fn record_external_violation(
        &self,
        account_id: Uuid,
        category: StrikeCategory,
        idempotency_key: &str,
        reason: &str,
    ) -> Result<RecordStrikeResponse, EngineError> {
        if !matches!(category, StrikeCategory::Nsfw | StrikeCategory::Spam) {
            return Err(EngineError::Validation(format!(
                "{} strikes are only issued by the moderation pipeline",
                category
            )));
        }
        let key = idempotency_key.trim();
        if key.is_empty() {
            return Err(EngineError::Validation("idempotency_key is required".into()));
        }
        let reason = match reason.trim() {
            "" => format!("{} violation reported", category),
            r => r.to_string(),
        };

        self.db.with_tx(|conn| {
            let now = Utc::now();
            accounts::ensure(conn, account_id, now)?;
            let mut effects = Vec::new();
            let outcome = apply_strike(
                conn,
                account_id,
                category,
                &format!("external:{}", key),
                self.policy.strike_ceiling,
                now,
                &mut effects,
            )?;
            if outcome.applied {
                DecisionDraft::system(
                    TargetType::Account,
                    account_id,
                    DecisionKind::ExternalViolation,
                    reason,
                )
                .record(conn, now, &mut effects)?;
                info!(
                    account_id = %account_id,
                    category = %category,
                    count = outcome.count,
                    "External violation recorded"
                );
            }
            Ok(RecordStrikeResponse {
                account_id,
                category,
                count: outcome.count,
                applied: outcome.applied,
                effects,
            })
        })
    }

    /// Content permanently deleted upstream: forget its fingerprints so it
    /// no longer matches anything.
    pub fn content_deleted(&self, content_id: Uuid) -> Result<usize, EngineError> {
        let deleted = self
            .db
            .with_conn(|conn| fingerprints::delete_for_content(conn, content_id))?;
        if deleted > 0 {
            info!("Dropped {} fingerprint(s) for deleted content {}", deleted, content_id);
        }
        Ok(deleted)
    }
}

fn published(decision_code: Option<String>) -> PublishResponse {
    PublishResponse {
        status: PublishStatus::Published,
        decision_code,
    }
}

fn status_of(post: &Post) -> PublishResponse {
    match post.visibility {
        PostVisibility::Published => published(None),
        PostVisibility::PendingModeration | PostVisibility::Removed => PublishResponse {
            status: PublishStatus::PendingModeration,
            decision_code: None,
        },
    }
}

fn load_post(conn: &Connection, id: Uuid) -> anyhow::Result<Post> {
    posts::get(conn, id)?.ok_or_else(|| anyhow!("post {} missing", id))
}
