use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracemark_db::{Connection, Database, claims, posts};
use tracemark_types::api::{AppliedEffect, ReviewClaimResponse, SubmitClaimRequest};
use tracemark_types::events::NotificationType;
use tracemark_types::models::{
    Actor, ClaimAction, ClaimStatus, CopyrightClaim, DecisionKind, PostVisibility, StrikeCategory,
    TargetType,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{self, DecisionDraft};
use crate::error::EngineError;
use crate::strikes::apply_strike;
use crate::validate::{self, MAX_NAME_LEN, MAX_PROOF_URLS, MAX_TEXT_LEN};
use crate::visibility;

const LIST_LIMIT: u32 = 200;

/// Human-filed copyright claims and their review.
#[derive(Clone)]
pub struct ClaimWorkflow {
    db: Arc<Database>,
    strike_ceiling: u32,
}

impl ClaimWorkflow {
    pub fn new(db: Arc<Database>, strike_ceiling: u32) -> Self {
        Self { db, strike_ceiling }
    }

    /// File a claim against a post. The filer is usually the post's author
    /// contesting an automated flag, but anyone may file. All validation
    /// happens before anything is written.
    pub fn submit(&self, filer: &Actor, req: SubmitClaimRequest) -> Result<Uuid, EngineError> {
        let owner_name = validate::required("owner_name", &req.owner_name, MAX_NAME_LEN)?;
        let owner_email = validate::email("owner_email", &req.owner_email)?;
        let proof_description =
            validate::required("proof_description", &req.proof_description, MAX_TEXT_LEN)?;
        if req.proof_urls.len() > MAX_PROOF_URLS {
            return Err(EngineError::Validation(format!(
                "at most {} proof_urls are allowed",
                MAX_PROOF_URLS
            )));
        }
        let proof_urls = req
            .proof_urls
            .iter()
            .map(|u| validate::url("proof_urls", u))
            .collect::<Result<Vec<_>, _>>()?;

        let claim_id = self.db.with_tx(|conn| {
            let post = posts::get(conn, req.post_id)?
                .filter(|p| p.visibility != PostVisibility::Removed)
                .ok_or_else(|| EngineError::NotFound(format!("post {}", req.post_id)))?;
            if claims::has_pending(conn, post.id, filer.id)? {
                return Err(EngineError::Validation(
                    "a claim for this post is already pending".into(),
                ));
            }

            let matched_author_id = match req.matched_post_id {
                Some(matched_id) => {
                    let matched = posts::get(conn, matched_id)?.ok_or_else(|| {
                        EngineError::NotFound(format!("matched post {}", matched_id))
                    })?;
                    Some(req.matched_author_id.unwrap_or(matched.author_id))
                }
                None => req.matched_author_id,
            };

            let claim = CopyrightClaim {
                id: Uuid::new_v4(),
                post_id: post.id,
                filer_id: filer.id,
                disputed_owner_id: post.author_id,
                status: ClaimStatus::Pending,
                matched_post_id: req.matched_post_id,
                matched_author_id,
                owner_name,
                owner_email,
                proof_description,
                proof_urls,
                reviewer_id: None,
                reviewer_note: None,
                created_at: Utc::now(),
                reviewed_at: None,
            };
            claims::insert(conn, &claim)?;
            Ok(claim.id)
        })?;

        info!(
            claim_id = %claim_id,
            post_id = %req.post_id,
            filer_id = %filer.id,
            "Copyright claim filed"
        );
        Ok(claim_id)
    }

    /// Resolve a pending claim. The status change, post change, strike,
    /// audit entry and notifications commit together or not at all. A claim
    /// already resolved reports `NotFound` and changes nothing.
    pub fn review(
        &self,
        reviewer: &Actor,
        claim_id: Uuid,
        action: ClaimAction,
        reason: Option<String>,
    ) -> Result<ReviewClaimResponse, EngineError> {
        if !reviewer.is_reviewer() {
            warn!(
                actor_id = %reviewer.id,
                role = %reviewer.role,
                claim_id = %claim_id,
                "Claim review attempted without reviewer role"
            );
            return Err(EngineError::Unauthorized("reviewer role required".into()));
        }
        let reason = validate::note(reason)?;
        let target = action.target_status();

        let response = self.db.with_tx(|conn| {
            let now = Utc::now();
            let claim = claims::get(conn, claim_id)?
                .ok_or_else(|| EngineError::claim_not_actionable(claim_id))?;
            if !claim.status.can_transition_to(target) {
                debug!("Claim {} is already {}", claim_id, claim.status);
                return Err(EngineError::claim_not_actionable(claim_id));
            }
            // A removed post cannot be restored, so it cannot be verified either.
            let removed = posts::get(conn, claim.post_id)?
                .is_some_and(|p| p.visibility == PostVisibility::Removed);
            if action == ClaimAction::Verify && removed {
                debug!("Claim {} targets removed post {}", claim_id, claim.post_id);
                return Err(EngineError::claim_not_actionable(claim_id));
            }
            if !claims::resolve(conn, claim_id, target, reviewer.id, reason.as_deref(), now)? {
                return Err(EngineError::claim_not_actionable(claim_id));
            }

            let mut effects = Vec::new();
            match action {
                ClaimAction::Verify => {
                    self.verify(conn, &claim, reviewer, reason.as_deref(), now, &mut effects)?
                }
                ClaimAction::Reject => {
                    self.reject(conn, &claim, reviewer, reason.as_deref(), now, &mut effects)?
                }
            }

            let claim = claims::get(conn, claim_id)?
                .ok_or_else(|| EngineError::claim_not_actionable(claim_id))?;
            Ok(ReviewClaimResponse { claim, effects })
        })?;

        info!(
            claim_id = %claim_id,
            reviewer_id = %reviewer.id,
            status = %response.claim.status,
            effects = response.effects.len(),
            "Copyright claim reviewed"
        );
        Ok(response)
    }

    fn verify(
        &self,
        conn: &Connection,
        claim: &CopyrightClaim,
        reviewer: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
        effects: &mut Vec<AppliedEffect>,
    ) -> anyhow::Result<()> {
        if claims::insert_verification(conn, claim.filer_id, claim.post_id, claim.id, now)? {
            effects.push(AppliedEffect::VerificationRecorded {
                account_id: claim.filer_id,
                post_id: claim.post_id,
            });
        }
        if let Some(post) = posts::get(conn, claim.post_id)? {
            posts::mark_copyright_verified(conn, post.id, now)?;
            if visibility::transition(conn, &post, PostVisibility::Published, now)? {
                effects.push(AppliedEffect::PostRestored { post_id: post.id });
            }
        }

        let decision = DecisionDraft::system(
            TargetType::Post,
            claim.post_id,
            DecisionKind::CopyrightVerified,
            reason.unwrap_or("copyright claim verified").to_string(),
        )
        .by(reviewer.id)
        .record(conn, now, effects)?;

        audit::notify(
            conn,
            claim.filer_id,
            NotificationType::CopyrightVerified,
            (TargetType::Claim, claim.id),
            format!(
                "Your copyright claim was verified (ref {})",
                decision.decision_code
            ),
            now,
            effects,
        )
    }

    fn reject(
        &self,
        conn: &Connection,
        claim: &CopyrightClaim,
        reviewer: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
        effects: &mut Vec<AppliedEffect>,
    ) -> anyhow::Result<()> {
        if let Some(post) = posts::get(conn, claim.post_id)? {
            if visibility::transition(conn, &post, PostVisibility::Removed, now)? {
                effects.push(AppliedEffect::PostRemoved { post_id: post.id });
            }
        }

        apply_strike(
            conn,
            claim.disputed_owner_id,
            StrikeCategory::Copyright,
            &format!("claim:{}:rejected", claim.id),
            self.strike_ceiling,
            now,
            effects,
        )?;

        let decision = DecisionDraft::system(
            TargetType::Post,
            claim.post_id,
            DecisionKind::CopyrightRejected,
            reason.unwrap_or("post removed after copyright review").to_string(),
        )
        .by(reviewer.id)
        .record(conn, now, effects)?;

        audit::notify(
            conn,
            claim.disputed_owner_id,
            NotificationType::CopyrightRejected,
            (TargetType::Post, claim.post_id),
            format!(
                "Your post was removed after a copyright review (ref {})",
                decision.decision_code
            ),
            now,
            effects,
        )?;
        if claim.filer_id != claim.disputed_owner_id {
            audit::notify(
                conn,
                claim.filer_id,
                NotificationType::CopyrightRejected,
                (TargetType::Claim, claim.id),
                format!(
                    "The post you reported was removed (ref {})",
                    decision.decision_code
                ),
                now,
                effects,
            )?;
        }
        Ok(())
    }

    /// Reviewers see every claim; anyone else only claims they filed or that
    /// target their post.
    pub fn get(&self, caller: &Actor, claim_id: Uuid) -> Result<CopyrightClaim, EngineError> {
        let claim = self
            .db
            .get_claim(claim_id)?
            .ok_or_else(|| EngineError::NotFound(format!("claim {}", claim_id)))?;
        let involved = claim.filer_id == caller.id || claim.disputed_owner_id == caller.id;
        if !caller.is_reviewer() && !involved {
            return Err(EngineError::NotFound(format!("claim {}", claim_id)));
        }
        Ok(claim)
    }

    pub fn list(&self, caller: &Actor, status: ClaimStatus) -> Result<Vec<CopyrightClaim>, EngineError> {
        if !caller.is_reviewer() {
            return Err(EngineError::Unauthorized("reviewer role required".into()));
        }
        Ok(self.db.list_claims(status, LIST_LIMIT)?)
    }
}
