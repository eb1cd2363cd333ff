use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracemark_db::{Connection, Database, accounts, strikes};
use tracemark_types::api::AppliedEffect;
use tracemark_types::events::NotificationType;
use tracemark_types::models::{DecisionKind, StrikeCategory, TargetType};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{self, DecisionDraft};
use crate::error::EngineError;

/// Result of a single strike request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrikeOutcome {
    pub count: u32,
    /// False when the idempotency key was already used.
    pub applied: bool,
    /// True only for the call that moved the account into moderation.
    pub escalated: bool,
}

/// Keyed per-account, per-category strike counters.
///
/// Callers never read-modify-write: [`StrikeLedger::increment`] is a single
/// atomic upsert guarded by an idempotency key.
#[derive(Clone)]
pub struct StrikeLedger {
    db: Arc<Database>,
    ceiling: u32,
}

impl StrikeLedger {
    pub fn new(db: Arc<Database>, ceiling: u32) -> Self {
        Self { db, ceiling }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn increment(
        &self,
        account_id: Uuid,
        category: StrikeCategory,
        idempotency_key: &str,
    ) -> Result<StrikeOutcome, EngineError> {
        self.db.with_tx(|conn| {
            let now = Utc::now();
            accounts::ensure(conn, account_id, now)?;
            let mut effects = Vec::new();
            Ok(apply_strike(
                conn,
                account_id,
                category,
                idempotency_key,
                self.ceiling,
                now,
                &mut effects,
            )?)
        })
    }

    pub fn count(&self, account_id: Uuid, category: StrikeCategory) -> Result<u32, EngineError> {
        Ok(self.db.strike_count(account_id, category)?)
    }

    pub fn total(&self, account_id: Uuid) -> Result<u32, EngineError> {
        Ok(self.db.strike_total(account_id)?)
    }

    /// Every category, zero-filled.
    pub fn counts(&self, account_id: Uuid) -> Result<BTreeMap<StrikeCategory, u32>, EngineError> {
        Ok(self.db.with_conn(|conn| counts_in(conn, account_id))?)
    }
}

pub(crate) fn counts_in(conn: &Connection, account_id: Uuid) -> Result<BTreeMap<StrikeCategory, u32>> {
    let mut counts: BTreeMap<StrikeCategory, u32> =
        StrikeCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for entry in strikes::entries(conn, account_id)? {
        counts.insert(entry.category, entry.count);
    }
    Ok(counts)
}

/// Add one strike inside an open transaction. Reaching the ceiling moves an
/// active account into moderation; the conditional status update makes that
/// happen once no matter how many callers cross the ceiling together.
pub(crate) fn apply_strike(
    conn: &Connection,
    account_id: Uuid,
    category: StrikeCategory,
    idempotency_key: &str,
    ceiling: u32,
    now: DateTime<Utc>,
    effects: &mut Vec<AppliedEffect>,
) -> Result<StrikeOutcome> {
    let inc = strikes::increment(conn, account_id, category, idempotency_key, now)?;
    if !inc.applied {
        debug!("Strike key {} already applied", idempotency_key);
        return Ok(StrikeOutcome {
            count: inc.count,
            applied: false,
            escalated: false,
        });
    }
    effects.push(AppliedEffect::StrikeApplied {
        account_id,
        category,
        count: inc.count,
    });

    let escalated = inc.count >= ceiling && accounts::escalate(conn, account_id)?;
    if escalated {
        warn!(
            account_id = %account_id,
            category = %category,
            count = inc.count,
            "Account escalated to moderation"
        );
        effects.push(AppliedEffect::AccountEscalated { account_id });
        let decision = DecisionDraft::system(
            TargetType::Account,
            account_id,
            DecisionKind::AccountModeration,
            format!("{} {} strikes reached the limit of {}", inc.count, category, ceiling),
        )
        .record(conn, now, effects)?;
        audit::notify(
            conn,
            account_id,
            NotificationType::AccountModeration,
            (TargetType::Account, account_id),
            format!(
                "Your account has been placed under moderation (ref {})",
                decision.decision_code
            ),
            now,
            effects,
        )?;
    }

    Ok(StrikeOutcome {
        count: inc.count,
        applied: true,
        escalated,
    })
}
