//! Content registration, similarity matching and moderation decisions.
//!
//! [`Engine`] wires the components around one [`Database`]:
//! - [`DecisionEngine`]: pre-publish hook, fails open on dependency errors
//! - [`ClaimWorkflow`]: human copyright claims and their review
//! - [`StrikeLedger`]: atomic per-category strike counters
//! - [`ProtectionCheckpoint`]: periodic protection grants
//! - [`ProtectionApplications`]: manual organization protection
//!
//! Side effects leave through the outbox; see [`OutboxRelay`].

pub mod applications;
mod audit;
pub mod claims;
pub mod config;
pub mod decision;
pub mod dispatcher;
pub mod eligibility;
pub mod error;
pub mod matcher;
pub mod outbox;
pub mod store;
pub mod strikes;
mod validate;
mod visibility;
pub mod webhook;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracemark_db::{Database, accounts};
use tracemark_types::api::{AccountStanding, CheckpointResponse, ReconciliationEntry};
use tracemark_types::models::{Account, AccountType, Actor, Role};
use tracing::info;
use uuid::Uuid;

pub use applications::ProtectionApplications;
pub use claims::ClaimWorkflow;
pub use config::{EligibilityRules, Policy};
pub use decision::{DecisionEngine, PublishContent};
pub use dispatcher::Dispatcher;
pub use eligibility::ProtectionCheckpoint;
pub use error::EngineError;
pub use matcher::SimilarityMatcher;
pub use outbox::{Fanout, NotificationGateway, OutboxRelay};
pub use store::{FingerprintStore, MatchScope};
pub use strikes::StrikeLedger;
pub use webhook::WebhookGateway;

const RECONCILIATION_LIMIT: u32 = 500;

#[derive(Clone)]
pub struct Engine {
    pub db: Arc<Database>,
    pub policy: Arc<Policy>,
    pub decisions: DecisionEngine,
    pub claims: ClaimWorkflow,
    pub strikes: StrikeLedger,
    pub checkpoint: ProtectionCheckpoint,
    pub applications: ProtectionApplications,
}

impl Engine {
    pub fn new(db: Arc<Database>, policy: Policy) -> Self {
        let store: Arc<dyn FingerprintStore> = db.clone();
        Self::with_store(db, store, policy)
    }

    /// Match against a different fingerprint source than `db`.
    pub fn with_store(db: Arc<Database>, store: Arc<dyn FingerprintStore>, policy: Policy) -> Self {
        let policy = Arc::new(policy);
        let matcher = SimilarityMatcher::new(store, policy.max_matches, policy.video_tolerance_ms);
        Self {
            decisions: DecisionEngine::new(db.clone(), matcher, policy.clone()),
            claims: ClaimWorkflow::new(db.clone(), policy.strike_ceiling),
            strikes: StrikeLedger::new(db.clone(), policy.strike_ceiling),
            checkpoint: ProtectionCheckpoint::new(db.clone(), policy.eligibility.clone()),
            applications: ProtectionApplications::new(db.clone()),
            db,
            policy,
        }
    }

    /// Record account facts reported by the auth collaborator.
    pub fn sync_account(
        &self,
        caller: &Actor,
        account_id: Uuid,
        email_verified: bool,
        account_type: AccountType,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Account, EngineError> {
        require_service(caller)?;
        let account = self.db.with_tx(|conn| {
            accounts::upsert(
                conn,
                account_id,
                email_verified,
                account_type,
                created_at,
                Utc::now(),
            )?;
            accounts::get(conn, account_id)?
                .ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))
        })?;
        info!(account_id = %account_id, verified = email_verified, "Account synced");
        Ok(account)
    }

    /// Strike counts and eligibility. Visible to the account itself,
    /// reviewers and services.
    pub fn standing(&self, caller: &Actor, account_id: Uuid) -> Result<AccountStanding, EngineError> {
        if caller.id != account_id && !caller.is_reviewer() && caller.role != Role::Service {
            return Err(EngineError::Unauthorized(
                "cannot read another account's standing".into(),
            ));
        }
        let rules = &self.policy.eligibility;
        let standing = self.db.with_conn(|conn| {
            let Some(account) = accounts::get(conn, account_id)? else {
                return Ok(None);
            };
            let strikes = strikes::counts_in(conn, account_id)?;
            let eligibility = eligibility::evaluate(conn, &account, rules, Utc::now())?;
            Ok(Some(AccountStanding {
                account_id,
                status: account.status,
                protection_enabled: account.protection_enabled,
                protection_eligible: eligibility.eligible(),
                total_strikes: strikes.values().sum(),
                strikes,
                eligibility,
            }))
        })?;
        standing.ok_or_else(|| EngineError::NotFound(format!("account {}", account_id)))
    }

    pub fn reconciliation(&self, caller: &Actor) -> Result<Vec<ReconciliationEntry>, EngineError> {
        require_admin(caller)?;
        Ok(self.db.unresolved_reconciliation(RECONCILIATION_LIMIT)?)
    }

    pub fn run_checkpoint(&self, caller: &Actor) -> Result<CheckpointResponse, EngineError> {
        require_admin(caller)?;
        self.checkpoint.run(Utc::now())
    }
}

pub fn require_service(caller: &Actor) -> Result<(), EngineError> {
    if caller.role != Role::Service {
        return Err(EngineError::Unauthorized("service role required".into()));
    }
    Ok(())
}

/// Admins and services.
pub fn require_admin(caller: &Actor) -> Result<(), EngineError> {
    if !matches!(caller.role, Role::Admin | Role::Service) {
        return Err(EngineError::Unauthorized("admin role required".into()));
    }
    Ok(())
}
