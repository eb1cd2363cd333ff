use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tracemark_db::{Database, accounts};
use tracemark_engine::{Engine, EngineError, FingerprintStore, MatchScope, Policy, PublishContent};
use tracemark_types::api::{
    AppliedEffect, PublishResponse, PublishStatus, SubmitApplicationRequest, SubmitClaimRequest,
};
use tracemark_types::events::NotificationType;
use tracemark_types::models::{
    AccountStatus, AccountType, Actor, ApplicationAction, ClaimAction, ClaimStatus,
    ContentFingerprint, ContentKind, ContentPayload, DecisionKind, PostVisibility, Role,
    StrikeCategory, TargetType,
};
use uuid::Uuid;

fn policy() -> Policy {
    Policy {
        offload_media: false,
        ..Policy::default()
    }
}

fn engine() -> Engine {
    Engine::new(Arc::new(Database::open_in_memory().unwrap()), policy())
}

fn protect(engine: &Engine, owner: Uuid) {
    let now = Utc::now();
    engine
        .db
        .with_conn(|conn| {
            accounts::ensure(conn, owner, now)?;
            accounts::grant_protection(conn, owner, now)?;
            Ok(())
        })
        .unwrap();
}

fn words(prefix: &str, n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", prefix, i)).collect()
}

async fn publish(engine: &Engine, owner: Uuid, payload: ContentPayload) -> (Uuid, PublishResponse) {
    let content_id = Uuid::new_v4();
    let response = engine
        .decisions
        .publish(PublishContent {
            content_id,
            owner_id: owner,
            payload,
        })
        .await;
    (content_id, response)
}

async fn publish_text(engine: &Engine, owner: Uuid, body: &str) -> (Uuid, PublishResponse) {
    publish(engine, owner, ContentPayload::Text(body.to_string())).await
}

fn moderator() -> Actor {
    Actor {
        id: Uuid::new_v4(),
        role: Role::Moderator,
    }
}

fn user(id: Uuid) -> Actor {
    Actor { id, role: Role::User }
}

fn claim_request(post_id: Uuid) -> SubmitClaimRequest {
    SubmitClaimRequest {
        post_id,
        owner_name: "Ada Example".into(),
        owner_email: "ada@example.com".into(),
        proof_description: "Original draft with timestamps".into(),
        proof_urls: vec!["https://example.com/drafts/1".into()],
        matched_post_id: None,
        matched_author_id: None,
    }
}

fn gradient_png(seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(64, 64, |x, y| {
        Rgb([(x * 4) as u8 ^ seed, (y * 4) as u8, ((x + y) * 2) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Publishes a protected original and a 92%-similar copy by someone else.
async fn protected_original_and_copy(engine: &Engine) -> (Uuid, Uuid, Uuid) {
    let owner_a = Uuid::new_v4();
    let owner_b = Uuid::new_v4();
    protect(engine, owner_a);

    let original = words("w", 23);
    let mut copy = original.clone();
    copy.extend(["extra1".to_string(), "extra2".to_string()]);

    let (_, first) = publish_text(engine, owner_a, &original.join(" ")).await;
    assert_eq!(first.status, PublishStatus::Published);
    let (post_b, second) = publish_text(engine, owner_b, &copy.join(" ")).await;
    assert_eq!(second.status, PublishStatus::PendingModeration);

    (owner_a, owner_b, post_b)
}

#[tokio::test]
async fn identical_text_is_flagged_duplicate_without_protection() {
    let engine = engine();
    let body = "the quick brown fox jumps over the lazy dog";

    let (_, first) = publish_text(&engine, Uuid::new_v4(), body).await;
    let owner = Uuid::new_v4();
    let (post_id, second) = publish_text(&engine, owner, body).await;

    assert_eq!(first.status, PublishStatus::Published);
    assert_eq!(second.status, PublishStatus::PendingModeration);
    assert_eq!(second.decision_code.as_deref().map(str::len), Some(6));

    let post = engine.db.get_post(post_id).unwrap().unwrap();
    assert!(post.duplicate_content);
    assert!(!post.copyright_match);
    assert_eq!(post.visibility, PostVisibility::PendingModeration);
    assert_eq!(
        engine.strikes.count(owner, StrikeCategory::DuplicateContent).unwrap(),
        1
    );
}

#[tokio::test]
async fn similarity_exactly_at_duplicate_threshold_triggers() {
    let engine = engine();
    let mut original = words("t", 9);
    let copy = original.clone();
    original.push("tail".into());

    publish_text(&engine, Uuid::new_v4(), &original.join(" ")).await;
    let (_, response) = publish_text(&engine, Uuid::new_v4(), &copy.join(" ")).await;

    // 9 shared tokens out of 10 distinct
    assert_eq!(response.status, PublishStatus::PendingModeration);
}

#[tokio::test]
async fn near_copy_of_protected_text_is_a_copyright_match() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;

    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert!(post.copyright_match);
    assert!(post.duplicate_content);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 1);
    assert_eq!(
        engine.strikes.count(owner_b, StrikeCategory::DuplicateContent).unwrap(),
        0
    );

    let decisions = engine.db.decisions_for(TargetType::Post, post_b).unwrap();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision, DecisionKind::CopyrightMatch);
    assert_eq!(decisions[0].moderator_id, "system");
    assert!(decisions[0].score.unwrap() >= 0.92 - 1e-9);
}

#[tokio::test]
async fn republishing_same_content_is_idempotent() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;

    let again = engine
        .decisions
        .publish(PublishContent {
            content_id: post_b,
            owner_id: owner_b,
            payload: ContentPayload::Text("entirely different words now".into()),
        })
        .await;

    assert_eq!(again.status, PublishStatus::PendingModeration);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 1);
    assert_eq!(engine.db.decisions_for(TargetType::Post, post_b).unwrap().len(), 1);
}

#[tokio::test]
async fn verified_claim_restores_post_without_strikes() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;

    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();
    let review = engine
        .claims
        .review(&moderator(), claim_id, ClaimAction::Verify, Some("licensed".into()))
        .unwrap();

    assert_eq!(review.claim.status, ClaimStatus::Verified);
    assert_eq!(review.claim.reviewer_note.as_deref(), Some("licensed"));
    assert!(review.effects.contains(&AppliedEffect::PostRestored { post_id: post_b }));
    assert!(review.effects.contains(&AppliedEffect::NotificationQueued {
        user_id: owner_b,
        notification_type: NotificationType::CopyrightVerified,
    }));
    assert!(
        !review
            .effects
            .iter()
            .any(|e| matches!(e, AppliedEffect::StrikeApplied { .. }))
    );

    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Published);
    assert!(!post.copyright_match && !post.duplicate_content);
    assert!(post.copyright_verified);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 1);
}

#[tokio::test]
async fn rejected_claim_removes_post_and_escalates_at_ceiling() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;
    for i in 0..8 {
        engine
            .strikes
            .increment(owner_b, StrikeCategory::Copyright, &format!("seed:{}", i))
            .unwrap();
    }
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 9);

    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();
    let review = engine
        .claims
        .review(&moderator(), claim_id, ClaimAction::Reject, None)
        .unwrap();

    assert!(review.effects.contains(&AppliedEffect::PostRemoved { post_id: post_b }));
    assert!(review.effects.contains(&AppliedEffect::StrikeApplied {
        account_id: owner_b,
        category: StrikeCategory::Copyright,
        count: 10,
    }));
    assert!(review.effects.contains(&AppliedEffect::AccountEscalated { account_id: owner_b }));

    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Removed);
    let account = engine.db.get_account(owner_b).unwrap().unwrap();
    assert_eq!(account.status, AccountStatus::Moderation);
}

#[tokio::test]
async fn rejection_penalizes_the_post_author_not_a_third_party_filer() {
    let engine = engine();
    let (owner_a, owner_b, post_b) = protected_original_and_copy(&engine).await;

    let claim_id = engine
        .claims
        .submit(&user(owner_a), claim_request(post_b))
        .unwrap();
    let claim = engine.claims.get(&user(owner_a), claim_id).unwrap();
    assert_eq!(claim.filer_id, owner_a);
    assert_eq!(claim.disputed_owner_id, owner_b);

    let review = engine
        .claims
        .review(&moderator(), claim_id, ClaimAction::Reject, None)
        .unwrap();
    assert!(review.effects.contains(&AppliedEffect::NotificationQueued {
        user_id: owner_a,
        notification_type: NotificationType::CopyrightRejected,
    }));
    assert_eq!(engine.strikes.count(owner_a, StrikeCategory::Copyright).unwrap(), 0);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 2);
}

#[tokio::test]
async fn re_reviewing_a_claim_is_not_found_and_changes_nothing() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;
    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();
    engine
        .claims
        .review(&moderator(), claim_id, ClaimAction::Reject, None)
        .unwrap();

    let strikes = engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap();
    let queued = engine.db.pending_events(1_000, 5).unwrap().len();

    for action in [ClaimAction::Reject, ClaimAction::Verify] {
        let err = engine
            .claims
            .review(&moderator(), claim_id, action, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    assert_eq!(
        engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(),
        strikes
    );
    assert_eq!(engine.db.pending_events(1_000, 5).unwrap().len(), queued);
    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Removed);
}

#[tokio::test]
async fn concurrent_reviews_resolve_once() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;
    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let claims = engine.claims.clone();
            std::thread::spawn(move || {
                claims
                    .review(&moderator(), claim_id, ClaimAction::Reject, None)
                    .is_ok()
            })
        })
        .collect();
    let wins = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(wins, 1);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 2);
}

#[test]
fn concurrent_strikes_escalate_exactly_once() {
    let engine = engine();
    let account = Uuid::new_v4();

    let handles: Vec<_> = (0..25)
        .map(|i| {
            let ledger = engine.strikes.clone();
            std::thread::spawn(move || {
                ledger
                    .increment(account, StrikeCategory::Copyright, &format!("burst:{}", i))
                    .unwrap()
            })
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(outcomes.iter().filter(|o| o.escalated).count(), 1);
    assert_eq!(engine.strikes.count(account, StrikeCategory::Copyright).unwrap(), 25);
    assert_eq!(
        engine.db.decision_count(DecisionKind::AccountModeration).unwrap(),
        1
    );
}

#[test]
fn invalid_claims_are_rejected_before_persistence() {
    let engine = engine();
    let filer = user(Uuid::new_v4());

    let mut missing_email = claim_request(Uuid::new_v4());
    missing_email.owner_email = String::new();
    assert!(matches!(
        engine.claims.submit(&filer, missing_email),
        Err(EngineError::Validation(_))
    ));

    let mut bad_url = claim_request(Uuid::new_v4());
    bad_url.proof_urls = vec!["javascript:alert(1)".into()];
    assert!(matches!(
        engine.claims.submit(&filer, bad_url),
        Err(EngineError::Validation(_))
    ));

    assert!(matches!(
        engine.claims.submit(&filer, claim_request(Uuid::new_v4())),
        Err(EngineError::NotFound(_))
    ));
    assert!(
        engine
            .claims
            .list(&moderator(), ClaimStatus::Pending)
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn only_reviewers_may_review() {
    let engine = engine();
    let (_, owner_b, post_b) = protected_original_and_copy(&engine).await;
    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();

    let err = engine
        .claims
        .review(&user(owner_b), claim_id, ClaimAction::Verify, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let err = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(
        engine.claims.get(&moderator(), claim_id).unwrap().status,
        ClaimStatus::Pending
    );
}

struct SlowStore {
    inner: Arc<Database>,
    delay: Duration,
}

impl FingerprintStore for SlowStore {
    fn candidates(
        &self,
        kind: ContentKind,
        exclude_owner: Uuid,
        scope: MatchScope,
    ) -> anyhow::Result<Vec<ContentFingerprint>> {
        std::thread::sleep(self.delay);
        self.inner.candidates(kind, exclude_owner, scope)
    }
}

struct BrokenStore;

impl FingerprintStore for BrokenStore {
    fn candidates(&self, _: ContentKind, _: Uuid, _: MatchScope) -> anyhow::Result<Vec<ContentFingerprint>> {
        anyhow::bail!("connection refused")
    }
}

#[tokio::test]
async fn matcher_timeout_publishes_normally() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(SlowStore {
        inner: db.clone(),
        delay: Duration::from_millis(300),
    });
    let engine = Engine::with_store(
        db,
        store,
        Policy {
            match_timeout: Duration::from_millis(50),
            ..policy()
        },
    );

    let owner = Uuid::new_v4();
    let (content_id, response) = publish_text(&engine, owner, "anything at all").await;

    assert_eq!(response.status, PublishStatus::Published);
    assert_eq!(response.decision_code, None);
    assert_eq!(engine.strikes.total(owner).unwrap(), 0);

    let pending = engine.db.unresolved_reconciliation(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content_id, content_id);
    assert!(pending[0].reason.contains("timed out"));
    assert!(
        engine
            .db
            .get_fingerprint(content_id, ContentKind::Text)
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn store_failure_publishes_normally() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let engine = Engine::with_store(db, Arc::new(BrokenStore), policy());

    let owner = Uuid::new_v4();
    let (content_id, response) = publish_text(&engine, owner, "a body of text").await;

    assert_eq!(response.status, PublishStatus::Published);
    assert_eq!(engine.strikes.total(owner).unwrap(), 0);
    let post = engine.db.get_post(content_id).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Published);
    assert_eq!(engine.db.unresolved_reconciliation(10).unwrap().len(), 1);
}

#[tokio::test]
async fn protected_image_copies_are_moderated_in_the_background() {
    let engine = Engine::new(Arc::new(Database::open_in_memory().unwrap()), Policy::default());
    let owner_a = Uuid::new_v4();
    protect(&engine, owner_a);
    let png = gradient_png(0);

    let (original, _) = publish(&engine, owner_a, ContentPayload::Image(png.clone())).await;
    for _ in 0..100 {
        if engine.db.get_fingerprint(original, ContentKind::Image).unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let owner_b = Uuid::new_v4();
    let (copy, response) = publish(&engine, owner_b, ContentPayload::Image(png)).await;
    assert_eq!(response.status, PublishStatus::Published);

    let mut visibility = PostVisibility::Published;
    for _ in 0..100 {
        visibility = engine.db.get_post(copy).unwrap().unwrap().visibility;
        if visibility == PostVisibility::PendingModeration {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(visibility, PostVisibility::PendingModeration);
    assert_eq!(
        engine.db.get_post(original).unwrap().unwrap().visibility,
        PostVisibility::Published
    );
}

#[tokio::test]
async fn re_encoded_video_is_not_detected() {
    let engine = engine();
    let owner_a = Uuid::new_v4();
    protect(&engine, owner_a);

    publish(
        &engine,
        owner_a,
        ContentPayload::Video {
            source_ref: "cdn://videos/original.mp4".into(),
            duration_ms: 120_000,
        },
    )
    .await;

    let (_, same_ref) = publish(
        &engine,
        Uuid::new_v4(),
        ContentPayload::Video {
            source_ref: "cdn://videos/original.mp4".into(),
            duration_ms: 120_000,
        },
    )
    .await;
    assert_eq!(same_ref.status, PublishStatus::PendingModeration);

    // Known gap: only source reference and duration are compared.
    let (_, reencoded) = publish(
        &engine,
        Uuid::new_v4(),
        ContentPayload::Video {
            source_ref: "cdn://videos/reupload.mp4".into(),
            duration_ms: 125_000,
        },
    )
    .await;
    assert_eq!(reencoded.status, PublishStatus::Published);
}

#[tokio::test]
async fn checkpoint_grants_protection_which_later_copies_match() {
    let engine = engine();
    let service = Actor {
        id: Uuid::new_v4(),
        role: Role::Service,
    };
    let creator = Uuid::new_v4();
    engine
        .sync_account(
            &service,
            creator,
            true,
            AccountType::Individual,
            Some(Utc::now() - chrono::Duration::days(30)),
        )
        .unwrap();
    for i in 0..3 {
        publish_text(&engine, creator, &words(&format!("post{}x", i), 12).join(" ")).await;
    }

    let standing = engine.standing(&user(creator), creator).unwrap();
    assert!(standing.protection_eligible);
    assert!(!standing.protection_enabled);

    let first = engine.run_checkpoint(&service).unwrap();
    assert_eq!(first.granted, 1);
    assert_eq!(engine.run_checkpoint(&service).unwrap().granted, 0);

    let original = words("fresh", 20).join(" ");
    publish_text(&engine, creator, &original).await;
    let (copy, _) = publish_text(&engine, Uuid::new_v4(), &original).await;
    assert!(engine.db.get_post(copy).unwrap().unwrap().copyright_match);
}

#[test]
fn external_violations_are_idempotent_and_limited_to_external_categories() {
    let engine = engine();
    let account = Uuid::new_v4();

    let first = engine
        .decisions
        .record_external_violation(account, StrikeCategory::Nsfw, "classifier:42", "")
        .unwrap();
    let retry = engine
        .decisions
        .record_external_violation(account, StrikeCategory::Nsfw, "classifier:42", "")
        .unwrap();
    assert!(first.applied);
    assert!(!retry.applied);
    assert_eq!(retry.count, 1);
    assert_eq!(
        engine.db.decision_count(DecisionKind::ExternalViolation).unwrap(),
        1
    );

    let err = engine
        .decisions
        .record_external_violation(account, StrikeCategory::Copyright, "x", "")
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn organization_application_grants_protection_directly() {
    let engine = engine();
    let service = Actor {
        id: Uuid::new_v4(),
        role: Role::Service,
    };
    let org = Uuid::new_v4();
    engine
        .sync_account(&service, org, false, AccountType::Organization, None)
        .unwrap();

    let application_id = engine
        .applications
        .submit(
            &user(org),
            SubmitApplicationRequest {
                organization_name: "Example Press".into(),
                website: Some("https://press.example.com".into()),
                details: "Newsroom publishing original reporting".into(),
            },
        )
        .unwrap();
    let review = engine
        .applications
        .review(&moderator(), application_id, ApplicationAction::Approve, None)
        .unwrap();

    assert!(review.effects.contains(&AppliedEffect::ProtectionEnabled { account_id: org }));
    assert!(engine.db.get_account(org).unwrap().unwrap().protection_enabled);
    assert!(matches!(
        engine
            .applications
            .review(&moderator(), application_id, ApplicationAction::Reject, None),
        Err(EngineError::NotFound(_))
    ));

    let individual = Uuid::new_v4();
    engine
        .sync_account(&service, individual, true, AccountType::Individual, None)
        .unwrap();
    let err = engine
        .applications
        .submit(
            &user(individual),
            SubmitApplicationRequest {
                organization_name: "Me".into(),
                website: None,
                details: "please".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn standing_is_private_to_the_account() {
    let engine = engine();
    let service = Actor {
        id: Uuid::new_v4(),
        role: Role::Service,
    };
    let account = Uuid::new_v4();
    engine
        .sync_account(&service, account, true, AccountType::Individual, None)
        .unwrap();

    assert!(matches!(
        engine.standing(&user(Uuid::new_v4()), account),
        Err(EngineError::Unauthorized(_))
    ));
    let standing = engine.standing(&moderator(), account).unwrap();
    assert_eq!(standing.total_strikes, 0);
    assert_eq!(standing.strikes.len(), StrikeCategory::ALL.len());
    assert!(!standing.eligibility.account_age_ok);
}

#[tokio::test]
async fn background_evaluation_stays_pending_until_applied() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = Arc::new(SlowStore {
        inner: db.clone(),
        delay: Duration::from_millis(200),
    });
    let engine = Engine::with_store(db, store, Policy::default());

    let owner = Uuid::new_v4();
    let (content_id, response) =
        publish(&engine, owner, ContentPayload::Image(gradient_png(7))).await;
    assert_eq!(response.status, PublishStatus::Published);

    let pending = engine.db.unresolved_reconciliation(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].content_id, content_id);
    assert_eq!(pending[0].kind, ContentKind::Image);
    assert!(pending[0].reason.contains("background evaluation pending"));

    for _ in 0..100 {
        if engine.db.get_fingerprint(content_id, ContentKind::Image).unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(engine.db.get_fingerprint(content_id, ContentKind::Image).unwrap().is_some());
    assert!(engine.db.unresolved_reconciliation(10).unwrap().is_empty());
}

#[tokio::test]
async fn unfingerprintable_background_media_closes_its_pending_entry() {
    let engine = Engine::new(Arc::new(Database::open_in_memory().unwrap()), Policy::default());

    let (content_id, response) =
        publish(&engine, Uuid::new_v4(), ContentPayload::Image(Vec::new())).await;
    assert_eq!(response.status, PublishStatus::Published);

    let mut open = engine.db.unresolved_reconciliation(10).unwrap().len();
    for _ in 0..100 {
        if open == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        open = engine.db.unresolved_reconciliation(10).unwrap().len();
    }
    assert_eq!(open, 0);
    assert!(engine.db.get_fingerprint(content_id, ContentKind::Image).unwrap().is_none());
}

#[tokio::test]
async fn removed_posts_take_no_further_strikes() {
    let engine = engine();
    let (owner_a, owner_b, post_b) = protected_original_and_copy(&engine).await;
    let claim_id = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();
    engine
        .claims
        .review(&moderator(), claim_id, ClaimAction::Reject, None)
        .unwrap();
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 2);

    let png = gradient_png(3);
    let (_, original) = publish(&engine, owner_a, ContentPayload::Image(png.clone())).await;
    assert_eq!(original.status, PublishStatus::Published);

    let response = engine
        .decisions
        .publish(PublishContent {
            content_id: post_b,
            owner_id: owner_b,
            payload: ContentPayload::Image(png),
        })
        .await;

    assert_eq!(response.status, PublishStatus::PendingModeration);
    assert_eq!(response.decision_code, None);
    assert_eq!(engine.strikes.count(owner_b, StrikeCategory::Copyright).unwrap(), 2);
    assert!(engine.db.get_fingerprint(post_b, ContentKind::Image).unwrap().is_some());
    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Removed);
}

#[tokio::test]
async fn claims_on_a_removed_post_cannot_be_verified() {
    let engine = engine();
    let (owner_a, owner_b, post_b) = protected_original_and_copy(&engine).await;
    let contested = engine
        .claims
        .submit(&user(owner_b), claim_request(post_b))
        .unwrap();
    let reported = engine
        .claims
        .submit(&user(owner_a), claim_request(post_b))
        .unwrap();
    engine
        .claims
        .review(&moderator(), contested, ClaimAction::Reject, None)
        .unwrap();
    let queued = engine.db.pending_events(1_000, 5).unwrap().len();

    let err = engine
        .claims
        .review(&moderator(), reported, ClaimAction::Verify, None)
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let claim = engine.claims.get(&user(owner_a), reported).unwrap();
    assert_eq!(claim.status, ClaimStatus::Pending);
    let post = engine.db.get_post(post_b).unwrap().unwrap();
    assert_eq!(post.visibility, PostVisibility::Removed);
    assert!(!post.copyright_verified);
    assert_eq!(engine.db.pending_events(1_000, 5).unwrap().len(), queued);
}
