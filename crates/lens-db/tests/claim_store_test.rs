//! Integration tests for the work-item claim store.
//!
//! **IMPORTANT**: These tests require a migrated PostgreSQL database and are
//! ignored by default. Point `DATABASE_URL` at a disposable database and run
//! `cargo test -p lens-db -- --ignored`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use lens_db::test_fixtures::TestDatabase;
use lens_db::{AiSource, WorkItemRepository, WorkStatus};
use uuid::Uuid;

async fn seed_pending(test_db: &TestDatabase, count: usize) -> Vec<Uuid> {
    use lens_db::PromptRepository;

    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let prompt_id = test_db
            .db
            .prompts
            .insert(&format!("prompt {i}"))
            .await
            .unwrap();
        let id = test_db
            .db
            .work_items
            .enqueue(prompt_id, AiSource::ChatGpt, Utc::now())
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn concurrent_claims_are_disjoint_and_exhaustive() {
    let test_db = TestDatabase::new().await;
    test_db.cleanup().await;

    let seeded = seed_pending(&test_db, 12).await;

    // 6 concurrent claimers asking for 4 rows each against 12 eligible rows:
    // every row must be claimed exactly once.
    let repo = test_db.db.work_items.clone();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::spawn(async move {
            repo.claim_batch(AiSource::ChatGpt, 4).await.unwrap()
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.await.unwrap());
    }

    let unique: HashSet<Uuid> = claimed.iter().map(|c| c.id).collect();
    assert_eq!(unique.len(), claimed.len(), "a row was claimed twice");
    assert_eq!(unique, seeded.into_iter().collect::<HashSet<_>>());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn claims_are_oldest_first_and_source_scoped() {
    let test_db = TestDatabase::new().await;
    test_db.cleanup().await;

    use lens_db::PromptRepository;
    let prompt_id = test_db.db.prompts.insert("ordering").await.unwrap();

    let first = test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::ChatGpt, Utc::now())
        .await
        .unwrap();
    let _other_source = test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::Claude, Utc::now())
        .await
        .unwrap();
    let second = test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::ChatGpt, Utc::now())
        .await
        .unwrap();

    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 10)
        .await
        .unwrap();

    assert_eq!(
        claimed.iter().map(|c| c.id).collect::<Vec<_>>(),
        vec![first, second]
    );
    assert_eq!(claimed[0].prompt_content, "ordering");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn not_before_gates_eligibility() {
    let test_db = TestDatabase::new().await;
    test_db.cleanup().await;

    use lens_db::PromptRepository;
    let prompt_id = test_db.db.prompts.insert("future").await.unwrap();
    test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::ChatGpt, Utc::now() + Duration::hours(24))
        .await
        .unwrap();

    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 10)
        .await
        .unwrap();
    assert!(claimed.is_empty(), "follow-up item claimed before its time");

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn failed_items_become_claimable_after_backoff_window() {
    let test_db = TestDatabase::new().await;
    test_db.cleanup().await;

    let ids = seed_pending(&test_db, 1).await;
    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 1)
        .await
        .unwrap();
    assert_eq!(claimed[0].id, ids[0]);

    test_db
        .db
        .work_items
        .fail(ids[0], "backend timeout")
        .await
        .unwrap();

    // 30 minutes into the backoff window: still ineligible.
    sqlx::query("UPDATE work_items SET updated_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::minutes(30))
        .bind(ids[0])
        .execute(&test_db.db.pool)
        .await
        .unwrap();
    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 1)
        .await
        .unwrap();
    assert!(claimed.is_empty());

    // 61 minutes: past the 1h window, eligible again.
    sqlx::query("UPDATE work_items SET updated_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::minutes(61))
        .bind(ids[0])
        .execute(&test_db.db.pool)
        .await
        .unwrap();
    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 1)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, ids[0]);

    let item = test_db.db.work_items.get(ids[0]).await.unwrap().unwrap();
    assert_eq!(item.status, WorkStatus::Running);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a migrated Postgres at DATABASE_URL"]
async fn pending_tier_shadows_backoff_tier() {
    let test_db = TestDatabase::new().await;
    test_db.cleanup().await;

    use lens_db::PromptRepository;
    let prompt_id = test_db.db.prompts.insert("tiers").await.unwrap();

    // An old failed row and a fresh pending row; the pending row wins even
    // though the failed one is past its backoff window.
    let failed_id = test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::ChatGpt, Utc::now())
        .await
        .unwrap();
    test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 1)
        .await
        .unwrap();
    test_db.db.work_items.fail(failed_id, "boom").await.unwrap();
    sqlx::query("UPDATE work_items SET updated_at = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::hours(2))
        .bind(failed_id)
        .execute(&test_db.db.pool)
        .await
        .unwrap();

    let pending_id = test_db
        .db
        .work_items
        .enqueue(prompt_id, AiSource::ChatGpt, Utc::now())
        .await
        .unwrap();

    let claimed = test_db
        .db
        .work_items
        .claim_batch(AiSource::ChatGpt, 1)
        .await
        .unwrap();
    assert_eq!(claimed[0].id, pending_id);

    test_db.cleanup().await;
}
