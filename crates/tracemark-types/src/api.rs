use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::NotificationType;
use crate::models::{
    AccountStatus, AccountType, ApplicationAction, ClaimAction, ContentKind, CopyrightClaim,
    EligibilityReport, ProtectionApplication, Role, StrikeCategory,
};

// -- JWT Claims --

/// Bearer token claims. Tokens are issued by the auth collaborator; this
/// service only validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Publish hook --

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub content_id: Uuid,
    pub owner_id: Uuid,
    #[serde(flatten)]
    pub payload: PublishPayload,
}

/// Missing or malformed media fields still reach the engine, which publishes
/// without a fingerprint when nothing can be extracted.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishPayload {
    Text {
        #[serde(default)]
        body: String,
    },
    /// Base64-encoded image bytes.
    Image {
        #[serde(default)]
        data: String,
    },
    Video {
        #[serde(default)]
        source_ref: String,
        duration_secs: Option<f64>,
    },
    /// Any kind the extractor does not handle.
    #[serde(other)]
    Unsupported,
}

string_enum! {
    pub enum PublishStatus: "publish status" {
        Published => "published",
        PendingModeration => "pending_moderation",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub status: PublishStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_code: Option<String>,
}

// -- Claims --

/// Missing text fields deserialize as empty so they are reported as
/// validation errors rather than body rejections.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitClaimRequest {
    pub post_id: Uuid,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub owner_email: String,
    #[serde(default)]
    pub proof_description: String,
    #[serde(default)]
    pub proof_urls: Vec<String>,
    pub matched_post_id: Option<Uuid>,
    pub matched_author_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitClaimResponse {
    pub claim_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewClaimRequest {
    pub action: ClaimAction,
    pub reason: Option<String>,
}

/// Side effect applied as part of a review or decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum AppliedEffect {
    VerificationRecorded { account_id: Uuid, post_id: Uuid },
    PostRestored { post_id: Uuid },
    PostRemoved { post_id: Uuid },
    StrikeApplied { account_id: Uuid, category: StrikeCategory, count: u32 },
    AccountEscalated { account_id: Uuid },
    ProtectionEnabled { account_id: Uuid },
    NotificationQueued { user_id: Uuid, notification_type: NotificationType },
    DecisionRecorded { decision_code: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewClaimResponse {
    pub claim: CopyrightClaim,
    pub effects: Vec<AppliedEffect>,
}

// -- Protection applications --

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitApplicationRequest {
    #[serde(default)]
    pub organization_name: String,
    pub website: Option<String>,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitApplicationResponse {
    pub application_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewApplicationRequest {
    pub action: ApplicationAction,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewApplicationResponse {
    pub application: ProtectionApplication,
    pub effects: Vec<AppliedEffect>,
}

// -- Accounts & strikes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncAccountRequest {
    pub email_verified: bool,
    #[serde(default = "default_account_type")]
    pub account_type: AccountType,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_account_type() -> AccountType {
    AccountType::Individual
}

/// Strike counts and eligibility gates for account-health screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountStanding {
    pub account_id: Uuid,
    pub status: AccountStatus,
    pub protection_enabled: bool,
    pub protection_eligible: bool,
    pub strikes: BTreeMap<StrikeCategory, u32>,
    pub total_strikes: u32,
    pub eligibility: EligibilityReport,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordStrikeRequest {
    pub account_id: Uuid,
    pub category: StrikeCategory,
    pub idempotency_key: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordStrikeResponse {
    pub account_id: Uuid,
    pub category: StrikeCategory,
    pub count: u32,
    pub applied: bool,
    pub effects: Vec<AppliedEffect>,
}

// -- Admin --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub evaluated: usize,
    pub granted: usize,
}

/// Fail-open publish evaluation awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub id: i64,
    pub content_id: Uuid,
    pub owner_id: Uuid,
    pub kind: ContentKind,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
