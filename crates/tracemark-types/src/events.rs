use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ModerationDecision, TargetType};

string_enum! {
    pub enum NotificationType: "notification type" {
        CopyrightVerified => "copyright_verified",
        CopyrightRejected => "copyright_rejected",
        ContentModerated => "content_moderated",
        AccountModeration => "account_moderation",
        ProtectionGranted => "protection_granted",
        ApplicationApproved => "application_approved",
        ApplicationRejected => "application_rejected",
    }
}

/// Fire-and-forget notification for the external delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub object_type: TargetType,
    pub object_id: Uuid,
    pub content: String,
}

/// Events written to the outbox and relayed to gateways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// A user-facing notification
    Notification(Notification),

    /// A moderation decision was appended to the audit log
    DecisionRecorded(ModerationDecision),
}

impl EngineEvent {
    /// Returns the recipient if this event targets a single user.
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            Self::Notification(n) => Some(n.user_id),
            Self::DecisionRecorded(_) => None,
        }
    }
}
