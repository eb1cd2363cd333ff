use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracemark_db::{Connection, Database, accounts, posts, strikes};
use tracemark_types::api::CheckpointResponse;
use tracemark_types::events::NotificationType;
use tracemark_types::models::{Account, DecisionKind, EligibilityReport, TargetType};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{self, DecisionDraft};
use crate::config::EligibilityRules;
use crate::error::EngineError;

/// Check every gate for one account.
pub fn evaluate(
    conn: &Connection,
    account: &Account,
    rules: &EligibilityRules,
    now: DateTime<Utc>,
) -> Result<EligibilityReport> {
    let age = now.signed_duration_since(account.created_at);
    Ok(EligibilityReport {
        verified_contact: account.email_verified,
        account_age_ok: age >= chrono::Duration::days(rules.min_account_age_days),
        content_count_ok: posts::published_count(conn, account.id)? >= rules.min_published,
        strikes_ok: strikes::total(conn, account.id)? < rules.max_strikes,
        no_open_violations: posts::open_violation_count(conn, account.id)? == 0,
    })
}

/// Periodic pass that grants protection to accounts meeting every gate.
/// Protection is never revoked here, so reruns only ever add grants.
#[derive(Clone)]
pub struct ProtectionCheckpoint {
    db: Arc<Database>,
    rules: EligibilityRules,
}

impl ProtectionCheckpoint {
    pub fn new(db: Arc<Database>, rules: EligibilityRules) -> Self {
        Self { db, rules }
    }

    pub fn rules(&self) -> &EligibilityRules {
        &self.rules
    }

    pub fn run(&self, now: DateTime<Utc>) -> Result<CheckpointResponse, EngineError> {
        let candidates = self.db.with_conn(accounts::unprotected_ids)?;
        let mut granted = 0;
        for id in &candidates {
            if self.db.with_tx(|conn| self.try_grant(conn, *id, now))? {
                granted += 1;
            }
        }
        if granted > 0 {
            info!(
                "Checkpoint: granted protection to {} of {} accounts",
                granted,
                candidates.len()
            );
        } else {
            debug!("Checkpoint: {} accounts evaluated, none eligible", candidates.len());
        }
        Ok(CheckpointResponse {
            evaluated: candidates.len(),
            granted,
        })
    }

    fn try_grant(&self, conn: &Connection, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let Some(account) = accounts::get(conn, id)? else {
            return Ok(false);
        };
        if account.protection_enabled || !evaluate(conn, &account, &self.rules, now)?.eligible() {
            return Ok(false);
        }
        if !accounts::grant_protection(conn, id, now)? {
            return Ok(false);
        }

        let mut effects = Vec::new();
        let decision = DecisionDraft::system(
            TargetType::Account,
            id,
            DecisionKind::ProtectionGranted,
            "all protection eligibility checks passed".to_string(),
        )
        .record(conn, now, &mut effects)?;
        audit::notify(
            conn,
            id,
            NotificationType::ProtectionGranted,
            (TargetType::Account, id),
            format!(
                "Content protection is now enabled for your account (ref {})",
                decision.decision_code
            ),
            now,
            &mut effects,
        )?;
        Ok(true)
    }
}

/// Runs the checkpoint on an interval.
pub async fn run_checkpoint_loop(checkpoint: ProtectionCheckpoint, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let job = checkpoint.clone();
        match tokio::task::spawn_blocking(move || job.run(Utc::now())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Checkpoint error: {}", e),
            Err(e) => warn!("Checkpoint task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tracemark_types::models::{AccountType, StrikeCategory};

    fn seeded(db: &Database, verified: bool, age_days: i64, posts_published: usize) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        db.with_conn(|conn| {
            accounts::upsert(
                conn,
                id,
                verified,
                AccountType::Individual,
                Some(now - ChronoDuration::days(age_days)),
                now,
            )?;
            for _ in 0..posts_published {
                posts::ensure(conn, Uuid::new_v4(), id, now)?;
            }
            Ok(())
        })
        .unwrap();
        id
    }

    fn checkpoint() -> ProtectionCheckpoint {
        let db = Arc::new(Database::open_in_memory().unwrap());
        ProtectionCheckpoint::new(db, EligibilityRules::default())
    }

    #[test]
    fn eligible_account_is_granted_once() {
        let cp = checkpoint();
        let id = seeded(&cp.db, true, 30, 3);

        let first = cp.run(Utc::now()).unwrap();
        assert_eq!(first.granted, 1);
        let second = cp.run(Utc::now()).unwrap();
        assert_eq!(second.granted, 0);
        assert_eq!(second.evaluated, 0);

        assert!(cp.db.get_account(id).unwrap().unwrap().protection_enabled);
        assert_eq!(cp.db.decision_count(DecisionKind::ProtectionGranted).unwrap(), 1);
    }

    #[test]
    fn each_gate_blocks() {
        let cp = checkpoint();
        let now = Utc::now();
        let unverified = seeded(&cp.db, false, 30, 3);
        let young = seeded(&cp.db, true, 2, 3);
        let quiet = seeded(&cp.db, true, 30, 2);
        let struck = seeded(&cp.db, true, 30, 3);
        cp.db
            .with_conn(|conn| {
                for key in ["a", "b", "c"] {
                    strikes::increment(conn, struck, StrikeCategory::Spam, key, now)?;
                }
                Ok(())
            })
            .unwrap();

        let report = |id| {
            cp.db
                .with_conn(|conn| {
                    let account = accounts::get(conn, id)?.unwrap();
                    evaluate(conn, &account, cp.rules(), now)
                })
                .unwrap()
        };
        assert!(!report(unverified).verified_contact);
        assert!(!report(young).account_age_ok);
        assert!(!report(quiet).content_count_ok);
        assert!(!report(struck).strikes_ok);

        assert_eq!(cp.run(now).unwrap().granted, 0);
    }
}
