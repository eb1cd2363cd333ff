use std::sync::Arc;

use chrono::Utc;
use tracemark_db::{Database, accounts, applications};
use tracemark_types::api::{AppliedEffect, ReviewApplicationResponse, SubmitApplicationRequest};
use tracemark_types::events::NotificationType;
use tracemark_types::models::{
    AccountType, Actor, ApplicationAction, ApplicationStatus, DecisionKind,
    ProtectionApplication, TargetType,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, DecisionDraft};
use crate::error::EngineError;
use crate::validate::{self, MAX_NAME_LEN, MAX_TEXT_LEN};

/// Manual protection requests from organization accounts.
#[derive(Clone)]
pub struct ProtectionApplications {
    db: Arc<Database>,
}

impl ProtectionApplications {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn submit(
        &self,
        applicant: &Actor,
        req: SubmitApplicationRequest,
    ) -> Result<Uuid, EngineError> {
        let organization_name =
            validate::required("organization_name", &req.organization_name, MAX_NAME_LEN)?;
        let details = validate::required("details", &req.details, MAX_TEXT_LEN)?;
        let website = match req.website.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(w) => Some(validate::url("website", w)?),
        };

        let id = self.db.with_tx(|conn| {
            let account = accounts::get(conn, applicant.id)?
                .ok_or_else(|| EngineError::NotFound(format!("account {}", applicant.id)))?;
            if account.account_type != AccountType::Organization {
                return Err(EngineError::Validation(
                    "only organization accounts may apply for protection".into(),
                ));
            }
            if account.protection_enabled {
                return Err(EngineError::Validation("protection is already enabled".into()));
            }
            if applications::has_pending(conn, account.id)? {
                return Err(EngineError::Validation(
                    "an application is already pending".into(),
                ));
            }
            let application = ProtectionApplication {
                id: Uuid::new_v4(),
                account_id: account.id,
                organization_name,
                website,
                details,
                status: ApplicationStatus::Pending,
                reviewer_id: None,
                reviewer_note: None,
                created_at: Utc::now(),
                reviewed_at: None,
            };
            applications::insert(conn, &application)?;
            Ok(application.id)
        })?;

        info!(application_id = %id, account_id = %applicant.id, "Protection application filed");
        Ok(id)
    }

    /// Approval enables protection immediately, skipping the checkpoint gates.
    pub fn review(
        &self,
        reviewer: &Actor,
        application_id: Uuid,
        action: ApplicationAction,
        reason: Option<String>,
    ) -> Result<ReviewApplicationResponse, EngineError> {
        if !reviewer.is_reviewer() {
            warn!(
                actor_id = %reviewer.id,
                application_id = %application_id,
                "Application review attempted without reviewer role"
            );
            return Err(EngineError::Unauthorized("reviewer role required".into()));
        }
        let reason = validate::note(reason)?;
        let target = action.target_status();

        self.db.with_tx(|conn| {
            let now = Utc::now();
            let app = applications::get(conn, application_id)?
                .ok_or_else(|| EngineError::application_not_actionable(application_id))?;
            if !app.status.can_transition_to(target)
                || !applications::resolve(
                    conn,
                    application_id,
                    target,
                    reviewer.id,
                    reason.as_deref(),
                    now,
                )?
            {
                return Err(EngineError::application_not_actionable(application_id));
            }

            let mut effects = Vec::new();
            let (decision_kind, notification_type, message) = match action {
                ApplicationAction::Approve => {
                    if accounts::grant_protection(conn, app.account_id, now)? {
                        effects.push(AppliedEffect::ProtectionEnabled {
                            account_id: app.account_id,
                        });
                    }
                    (
                        DecisionKind::ApplicationApproved,
                        NotificationType::ApplicationApproved,
                        "Your protection application was approved",
                    )
                }
                ApplicationAction::Reject => (
                    DecisionKind::ApplicationRejected,
                    NotificationType::ApplicationRejected,
                    "Your protection application was not approved",
                ),
            };

            let decision = DecisionDraft::system(
                TargetType::Application,
                application_id,
                decision_kind,
                reason.clone().unwrap_or_else(|| message.to_string()),
            )
            .by(reviewer.id)
            .record(conn, now, &mut effects)?;
            audit::notify(
                conn,
                app.account_id,
                notification_type,
                (TargetType::Application, application_id),
                format!("{} (ref {})", message, decision.decision_code),
                now,
                &mut effects,
            )?;

            let application = applications::get(conn, application_id)?
                .ok_or_else(|| EngineError::application_not_actionable(application_id))?;
            info!(
                application_id = %application_id,
                status = %application.status,
                "Protection application reviewed"
            );
            Ok(ReviewApplicationResponse {
                application,
                effects,
            })
        })
    }
}
