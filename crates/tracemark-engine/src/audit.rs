use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracemark_db::{Connection, decisions, outbox};
use tracemark_types::api::AppliedEffect;
use tracemark_types::events::{EngineEvent, Notification, NotificationType};
use tracemark_types::models::{
    DecisionKind, ModerationDecision, SYSTEM_ACTOR, SimilarityMatch, TargetType,
};
use uuid::Uuid;

/// Random six-digit reference shown to users alongside a decision.
pub(crate) fn decision_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

/// A decision about to be appended to the audit log.
pub(crate) struct DecisionDraft {
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub decision: DecisionKind,
    pub reason: String,
    pub moderator_id: String,
    pub matched: Option<(Uuid, f64)>,
}

impl DecisionDraft {
    pub fn system(
        target_type: TargetType,
        target_id: Uuid,
        decision: DecisionKind,
        reason: String,
    ) -> Self {
        Self {
            target_type,
            target_id,
            decision,
            reason,
            moderator_id: SYSTEM_ACTOR.to_string(),
            matched: None,
        }
    }

    pub fn by(mut self, moderator: Uuid) -> Self {
        self.moderator_id = moderator.to_string();
        self
    }

    pub fn matched(mut self, m: &SimilarityMatch) -> Self {
        self.matched = Some((m.target_fingerprint_id, m.score));
        self
    }

    /// Append the decision and queue its event in the caller's transaction.
    pub fn record(
        self,
        conn: &Connection,
        now: DateTime<Utc>,
        effects: &mut Vec<AppliedEffect>,
    ) -> Result<ModerationDecision> {
        let decision = ModerationDecision {
            id: Uuid::new_v4(),
            target_type: self.target_type,
            target_id: self.target_id,
            decision: self.decision,
            reason: self.reason,
            moderator_id: self.moderator_id,
            decision_code: decision_code(),
            matched_fingerprint_id: self.matched.map(|(id, _)| id),
            score: self.matched.map(|(_, score)| score),
            created_at: now,
        };
        decisions::append(conn, &decision)?;
        outbox::enqueue(conn, &EngineEvent::DecisionRecorded(decision.clone()), now)?;
        effects.push(AppliedEffect::DecisionRecorded {
            decision_code: decision.decision_code.clone(),
        });
        Ok(decision)
    }
}

/// Queue a user notification in the caller's transaction.
pub(crate) fn notify(
    conn: &Connection,
    user_id: Uuid,
    notification_type: NotificationType,
    object: (TargetType, Uuid),
    content: String,
    now: DateTime<Utc>,
    effects: &mut Vec<AppliedEffect>,
) -> Result<()> {
    let notification = Notification {
        user_id,
        notification_type,
        object_type: object.0,
        object_id: object.1,
        content,
    };
    outbox::enqueue(conn, &EngineEvent::Notification(notification), now)?;
    effects.push(AppliedEffect::NotificationQueued {
        user_id,
        notification_type,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_codes_are_six_digits() {
        for _ in 0..200 {
            let code = decision_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
