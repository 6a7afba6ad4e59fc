//! End-to-end tests of the Postgres adapters.
//!
//! Each test runs in its own database created and dropped by the harness.
//! Run with: DATABASE_URL="postgresql:///postgres" cargo test -p hunt_harness -- --ignored --nocapture

use hunt_core::error::HuntError;
use hunt_core::ports::{Counter, HuntStore, SequenceAllocator};
use hunt_core::types::*;
use hunt_core::{HuntService, Principal};
use hunt_harness::db::{drop_db, isolated_db};
use hunt_harness::{pg_service, pg_service_with_assets};
use hunt_postgres::{run_migrations, PgHuntStore, PgSequenceAllocator};

fn admin_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for harness tests")
}

fn alice() -> Principal {
    Principal::in_process("alice")
}

fn clue(text: &str) -> StepContent {
    StepContent {
        challenge: Challenge::Clue {
            text: text.into(),
            image: None,
        },
        required_location: None,
        hint: None,
        time_limit_seconds: None,
        max_attempts: None,
    }
}

async fn create_with_steps(service: &impl HuntService, texts: &[&str]) -> HuntView {
    let detail = service
        .create_hunt(
            &alice(),
            CreateHuntInput {
                name: "Quayside".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let mut payload = SaveHuntPayload::from(&detail.hunt);
    payload.steps = texts.iter().map(|t| StepInput::new(clue(t))).collect();
    service
        .save_hunt(&alice(), detail.hunt.root.hunt_id, payload)
        .await
        .unwrap()
        .hunt
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn migrations_are_idempotent() {
    let db = isolated_db(&admin_url()).await;
    let again = run_migrations(&db.pool).await.unwrap();
    assert_eq!(again, 0);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn sequences_never_reuse_values() {
    let db = isolated_db(&admin_url()).await;
    let seq = PgSequenceAllocator::new(db.pool.clone());
    let a = seq.next(Counter::StepId).await.unwrap();
    let batch = seq.next_n(Counter::StepId, 3).await.unwrap();
    let b = seq.next(Counter::StepId).await.unwrap();
    assert_eq!(batch, vec![a + 1, a + 2, a + 3]);
    assert_eq!(b, a + 4);
    // Counters are independent.
    assert_eq!(seq.next(Counter::HuntId).await.unwrap(), 1);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn rolled_back_transaction_still_consumes_ids() {
    let db = isolated_db(&admin_url()).await;
    let store = PgHuntStore::new(db.pool.clone());
    let seq = PgSequenceAllocator::new(db.pool.clone());

    let hunt_id = HuntId(seq.next(Counter::HuntId).await.unwrap());
    let now = chrono::Utc::now();
    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_root(&HuntRoot {
            hunt_id,
            creator_id: alice().user_id,
            latest_version: 1,
            live_version: None,
            is_deleted: false,
            access_mode: AccessMode::Private,
            play_slug: "rolled-back".into(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
        // Dropped without commit.
    }

    assert!(store.load_root(hunt_id).await.unwrap().is_none());
    let next = seq.next(Counter::HuntId).await.unwrap();
    assert_eq!(next, hunt_id.0 + 1);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn timestamps_round_trip_exactly() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one", "two"]).await;

    // A save built from a freshly read view must pass every precondition.
    let reread = service
        .get_hunt(&alice(), view.root.hunt_id)
        .await
        .unwrap()
        .hunt;
    assert_eq!(reread.snapshot.updated_at, view.snapshot.updated_at);
    let outcome = service
        .save_hunt(&alice(), view.root.hunt_id, SaveHuntPayload::from(&reread))
        .await
        .unwrap();
    assert!(outcome.created.is_empty() && outcome.updated.is_empty());
    assert!(outcome.hunt.snapshot.updated_at > view.snapshot.updated_at);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn concurrent_saves_from_the_same_read_conflict() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one"]).await;
    let hunt_id = view.root.hunt_id;

    let mut a = SaveHuntPayload::from(&view);
    a.metadata.name = "Editor A".into();
    let mut b = SaveHuntPayload::from(&view);
    b.metadata.name = "Editor B".into();

    let editor = alice();
    let (ra, rb) = futures::join!(
        service.save_hunt(&editor, hunt_id, a),
        service.save_hunt(&editor, hunt_id, b),
    );
    let results = [ra.is_ok(), rb.is_ok()];
    assert_eq!(results.iter().filter(|ok| **ok).count(), 1, "exactly one save wins");
    let loser = if ra.is_err() { ra } else { rb };
    assert!(matches!(loser, Err(HuntError::Conflict(_))));
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn unconditioned_saves_queued_on_the_draft_both_succeed() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one"]).await;
    let hunt_id = view.root.hunt_id;

    // Neither save carries a precondition.
    let mut add_step = SaveHuntPayload::from(&view);
    add_step.updated_at = None;
    add_step.steps.iter_mut().for_each(|s| s.updated_at = None);
    add_step.steps.push(StepInput::new(clue("two")));
    let mut rename = SaveHuntPayload::from(&view);
    rename.updated_at = None;
    rename.steps.iter_mut().for_each(|s| s.updated_at = None);
    rename.metadata.name = "Renamed".into();

    // Hold the draft row so both saves start before either can write.
    let mut holder = db.pool.begin().await.unwrap();
    sqlx::query(
        "SELECT 1 FROM hunt.hunt_versions WHERE hunt_id = $1 AND NOT is_published FOR UPDATE",
    )
    .bind(hunt_id.0)
    .execute(&mut *holder)
    .await
    .unwrap();

    let editor = alice();
    let release_holder = async move {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        holder.commit().await.unwrap();
    };
    let (ra, rb, ()) = futures::join!(
        service.save_hunt(&editor, hunt_id, add_step),
        service.save_hunt(&editor, hunt_id, rename),
        release_holder,
    );
    let ra = ra.unwrap();
    let rb = rb.unwrap();
    assert_eq!(ra.created.len(), 1);
    assert!(rb.created.is_empty());

    // Whichever committed last defines the draft, and it is consistent.
    let draft = service.get_hunt(&editor, hunt_id).await.unwrap().hunt;
    assert_eq!(draft.snapshot.step_order.len(), draft.steps.len());
    let last = if ra.hunt.snapshot.updated_at > rb.hunt.snapshot.updated_at {
        ra.hunt
    } else {
        rb.hunt
    };
    assert_eq!(draft.snapshot.metadata.name, last.snapshot.metadata.name);
    assert_eq!(draft.steps.len(), last.steps.len());
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn publish_release_rollback_against_postgres() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one", "two"]).await;
    let hunt_id = view.root.hunt_id;

    let p1 = service.publish(&alice(), hunt_id).await.unwrap();
    assert_eq!((p1.published_version, p1.draft_version), (1, 2));
    service.release(&alice(), hunt_id, 1, None).await.unwrap();

    let draft = service.get_hunt(&alice(), hunt_id).await.unwrap().hunt;
    assert_eq!(draft.snapshot.version, 2);
    assert_eq!(draft.steps.len(), 2);
    assert!(draft
        .steps
        .iter()
        .zip(&view.steps)
        .all(|(copy, orig)| copy.step_id != orig.step_id && copy.content == orig.content));

    service.publish(&alice(), hunt_id).await.unwrap();
    service.release(&alice(), hunt_id, 2, Some(1)).await.unwrap();
    let err = service
        .release(&alice(), hunt_id, 1, Some(1))
        .await
        .unwrap_err();
    assert!(matches!(err, HuntError::Conflict(_)));
    let back = service.release(&alice(), hunt_id, 1, Some(2)).await.unwrap();
    assert_eq!(back.live_version, Some(1));

    let live = service
        .get_live_hunt(&view.root.play_slug)
        .await
        .unwrap();
    assert_eq!(live.snapshot.version, 1);

    let history = service.list_versions(&alice(), hunt_id).await.unwrap();
    let versions: Vec<Version> = history.versions.iter().map(|v| v.record.version).collect();
    assert_eq!(versions, vec![1, 2]);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn second_draft_row_is_rejected_by_the_schema() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one"]).await;

    let store = PgHuntStore::new(db.pool.clone());
    let mut tx = store.begin().await.unwrap();
    let mut rogue = view.snapshot.clone();
    rogue.version = 2;
    let err = tx.insert_snapshot(&rogue).await.unwrap_err();
    assert!(matches!(err, HuntError::Conflict(_)));
    drop(tx);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn asset_ownership_is_checked_in_the_database() {
    let db = isolated_db(&admin_url()).await;
    let (service, assets, sequences) = pg_service_with_assets(db.pool.clone());
    let mine = assets
        .register(sequences.as_ref(), &alice().user_id, "uploads/alice/cover.jpg")
        .await
        .unwrap();
    let theirs = assets
        .register(sequences.as_ref(), &UserId::new("bob"), "uploads/bob/x.jpg")
        .await
        .unwrap();

    let input = |cover| CreateHuntInput {
        name: "With cover".into(),
        cover_image: Some(cover),
        ..Default::default()
    };
    let err = service
        .create_hunt(&alice(), input(theirs))
        .await
        .unwrap_err();
    assert!(matches!(err, HuntError::Forbidden(_)));
    let err = service
        .create_hunt(&alice(), input(AssetId(9_999)))
        .await
        .unwrap_err();
    assert!(matches!(err, HuntError::NotFound(_)));

    let detail = service.create_hunt(&alice(), input(mine)).await.unwrap();
    let used: Vec<i64> = sqlx::query_scalar(
        "SELECT asset_id FROM hunt.asset_usage WHERE hunt_id = $1 ORDER BY asset_id",
    )
    .bind(detail.hunt.root.hunt_id.0)
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(used, vec![mine.0]);
    drop_db(db).await;
}

#[tokio::test]
#[ignore] // requires DATABASE_URL
async fn grants_upsert_and_revoke() {
    let db = isolated_db(&admin_url()).await;
    let service = pg_service(db.pool.clone());
    let view = create_with_steps(&service, &["one"]).await;
    let hunt_id = view.root.hunt_id;
    let bob = UserId::new("bob");

    service
        .share_hunt(&alice(), hunt_id, bob.clone(), GrantPermission::View)
        .await
        .unwrap();
    service
        .share_hunt(&alice(), hunt_id, bob.clone(), GrantPermission::Admin)
        .await
        .unwrap();
    let grants = service.list_grants(&alice(), hunt_id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].permission, GrantPermission::Admin);

    let bob_p = Principal::in_process("bob");
    let access = service.get_access(&bob_p, hunt_id).await.unwrap();
    assert!(access.capabilities.can_publish);

    service
        .share_hunt(&alice(), hunt_id, bob.clone(), GrantPermission::View)
        .await
        .unwrap();
    let seen = service.get_hunt(&bob_p, hunt_id).await.unwrap().hunt;
    assert_eq!(seen.root.hunt_id, hunt_id);
    let err = service
        .save_hunt(&bob_p, hunt_id, SaveHuntPayload::from(&seen))
        .await
        .unwrap_err();
    assert!(matches!(err, HuntError::Forbidden(_)));

    service.revoke_access(&alice(), hunt_id, bob.clone()).await.unwrap();
    let err = service.get_hunt(&bob_p, hunt_id).await.unwrap_err();
    assert!(matches!(err, HuntError::NotFound(_)));
    drop_db(db).await;
}
