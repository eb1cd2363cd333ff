use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderator id recorded on decisions taken without a human reviewer.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// -- Content --

string_enum! {
    pub enum ContentKind: "content kind" {
        Text => "text",
        Image => "image",
        Video => "video",
    }
}

/// Raw content handed over by the publish hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPayload {
    Text(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Image(Vec<u8>),
    /// Only the stored source reference and duration are known; frames are never inspected.
    Video { source_ref: String, duration_ms: u64 },
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Image(_) => ContentKind::Image,
            Self::Video { .. } => ContentKind::Video,
        }
    }
}

/// Comparable signature derived from content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signature {
    /// Sorted, deduplicated normalized tokens plus a SHA-256 digest of them.
    Text { digest: String, tokens: Vec<String> },
    /// 64-bit difference hash.
    Image { hash: u64 },
    Video { source_ref: String, duration_ms: u64 },
}

impl Signature {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text { .. } => ContentKind::Text,
            Self::Image { .. } => ContentKind::Image,
            Self::Video { .. } => ContentKind::Video,
        }
    }

    /// Exact-match key stored alongside the signature.
    pub fn digest(&self) -> String {
        match self {
            Self::Text { digest, .. } => digest.clone(),
            Self::Image { hash } => format!("{:016x}", hash),
            Self::Video { source_ref, .. } => source_ref.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentFingerprint {
    pub id: Uuid,
    pub content_id: Uuid,
    pub owner_id: Uuid,
    pub kind: ContentKind,
    pub signature: Signature,
    pub protected: bool,
    pub created_at: DateTime<Utc>,
}

/// Ephemeral comparison result. Only persisted as part of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub candidate_fingerprint_id: Uuid,
    pub target_fingerprint_id: Uuid,
    pub target_content_id: Uuid,
    pub target_owner_id: Uuid,
    pub target_protected: bool,
    pub target_created_at: DateTime<Utc>,
    pub score: f64,
    pub kind: ContentKind,
}

// -- Posts --

string_enum! {
    pub enum PostVisibility: "post visibility" {
        Published => "published",
        /// Hidden from listings but still visible to its author.
        PendingModeration => "pending_moderation",
        Removed => "removed",
    }
}

impl PostVisibility {
    pub fn can_transition_to(self, next: PostVisibility) -> bool {
        use PostVisibility::*;
        matches!(
            (self, next),
            (Published, PendingModeration)
                | (PendingModeration, Published)
                | (Published, Removed)
                | (PendingModeration, Removed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub visibility: PostVisibility,
    pub duplicate_content: bool,
    pub copyright_match: bool,
    pub nsfw: bool,
    pub copyright_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Accounts --

string_enum! {
    pub enum AccountStatus: "account status" {
        Active => "active",
        Moderation => "moderation",
    }
}

string_enum! {
    pub enum AccountType: "account type" {
        Individual => "individual",
        Organization => "organization",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email_verified: bool,
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub protection_enabled: bool,
    pub protection_granted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

string_enum! {
    pub enum Role: "role" {
        User => "user",
        Moderator => "moderator",
        Admin => "admin",
        /// Trusted collaborator services (content management, auth, classifiers).
        Service => "service",
    }
}

/// Authenticated caller of an engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn is_reviewer(&self) -> bool {
        matches!(self.role, Role::Moderator | Role::Admin)
    }
}

// -- Strikes --

string_enum! {
    pub enum StrikeCategory: "strike category" {
        Copyright => "copyright",
        DuplicateContent => "duplicate_content",
        Nsfw => "nsfw",
        Spam => "spam",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeEntry {
    pub account_id: Uuid,
    pub category: StrikeCategory,
    pub count: u32,
    pub updated_at: DateTime<Utc>,
}

// -- Claims --

string_enum! {
    pub enum ClaimStatus: "claim status" {
        Pending => "pending",
        Verified => "verified",
        Rejected => "rejected",
    }
}

impl ClaimStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ClaimStatus::Pending)
    }

    pub fn can_transition_to(self, next: ClaimStatus) -> bool {
        matches!(
            (self, next),
            (ClaimStatus::Pending, ClaimStatus::Verified)
                | (ClaimStatus::Pending, ClaimStatus::Rejected)
        )
    }
}

string_enum! {
    pub enum ClaimAction: "claim action" {
        Verify => "verify",
        Reject => "reject",
    }
}

impl ClaimAction {
    pub fn target_status(self) -> ClaimStatus {
        match self {
            ClaimAction::Verify => ClaimStatus::Verified,
            ClaimAction::Reject => ClaimStatus::Rejected,
        }
    }
}

/// A human-filed copyright claim.
///
/// `filer_id` is the account that filed the claim; `disputed_owner_id` is the
/// author of the post under dispute and the account penalized on rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyrightClaim {
    pub id: Uuid,
    pub post_id: Uuid,
    pub filer_id: Uuid,
    pub disputed_owner_id: Uuid,
    pub status: ClaimStatus,
    pub matched_post_id: Option<Uuid>,
    pub matched_author_id: Option<Uuid>,
    pub owner_name: String,
    pub owner_email: String,
    pub proof_description: String,
    pub proof_urls: Vec<String>,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

// -- Protection applications --

string_enum! {
    pub enum ApplicationStatus: "application status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

impl ApplicationStatus {
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
        )
    }
}

string_enum! {
    pub enum ApplicationAction: "application action" {
        Approve => "approve",
        Reject => "reject",
    }
}

impl ApplicationAction {
    pub fn target_status(self) -> ApplicationStatus {
        match self {
            ApplicationAction::Approve => ApplicationStatus::Approved,
            ApplicationAction::Reject => ApplicationStatus::Rejected,
        }
    }
}

/// Organization request to enable protection without the waiting period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionApplication {
    pub id: Uuid,
    pub account_id: Uuid,
    pub organization_name: String,
    pub website: Option<String>,
    pub details: String,
    pub status: ApplicationStatus,
    pub reviewer_id: Option<Uuid>,
    pub reviewer_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

// -- Moderation log --

string_enum! {
    pub enum TargetType: "target type" {
        Post => "post",
        Account => "account",
        Claim => "claim",
        Application => "application",
    }
}

string_enum! {
    pub enum DecisionKind: "decision" {
        DuplicateContent => "duplicate_content",
        CopyrightMatch => "copyright_match",
        FlaggedForReview => "flagged_for_review",
        CopyrightVerified => "copyright_verified",
        CopyrightRejected => "copyright_rejected",
        ExternalViolation => "external_violation",
        AccountModeration => "account_moderation",
        ProtectionGranted => "protection_granted",
        ApplicationApproved => "application_approved",
        ApplicationRejected => "application_rejected",
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationDecision {
    pub id: Uuid,
    pub target_type: TargetType,
    pub target_id: Uuid,
    pub decision: DecisionKind,
    pub reason: String,
    /// Reviewer uuid, or [`SYSTEM_ACTOR`] for automated decisions.
    pub moderator_id: String,
    /// Six-digit reference shown to the affected user.
    pub decision_code: String,
    pub matched_fingerprint_id: Option<Uuid>,
    pub score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

// -- Eligibility --

/// Individual protection gates. Protection is granted when all hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub verified_contact: bool,
    pub account_age_ok: bool,
    pub content_count_ok: bool,
    pub strikes_ok: bool,
    pub no_open_violations: bool,
}

impl EligibilityReport {
    pub fn eligible(&self) -> bool {
        self.verified_contact
            && self.account_age_ok
            && self.content_count_ok
            && self.strikes_ok
            && self.no_open_violations
    }
}
