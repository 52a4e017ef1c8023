//! Vault, reshare and counter backfill behavior on real rows.

use chrono::Utc;
use pretty_assertions::assert_eq;
use sqlx::PgPool;

use omsim_social::domain::{
    Memory, MemoryCounters, MemoryRepository, MemoryScope, Notification, NotificationKind,
    VaultItem,
};
use omsim_social::infrastructure::repositories::PgMemoryRepository;

use super::{count, create_user, next_id, test_pool};

async fn public_memory(repo: &PgMemoryRepository, author_id: i64) -> Memory {
    let mut memory = Memory::new(next_id(), author_id, MemoryScope::Public);
    memory.body = Some("sunset".into());
    repo.create(&memory).await.expect("Failed to create memory")
}

async fn counters(repo: &PgMemoryRepository, id: i64) -> MemoryCounters {
    repo.find_by_id(id)
        .await
        .expect("Lookup failed")
        .expect("Memory missing")
        .counters
}

fn adoption(user_id: i64, memory: &Memory) -> (VaultItem, Notification) {
    let item = VaultItem {
        id: next_id(),
        user_id,
        memory_id: memory.id,
        note: None,
        created_at: Utc::now(),
    };
    let notification = Notification::new(
        next_id(),
        memory.author_id,
        user_id,
        NotificationKind::MemoryAdopted,
        Some(memory.id),
    );
    (item, notification)
}

async fn adopted_notifications(pool: &PgPool, memory_id: i64) -> i64 {
    count(
        pool,
        "SELECT COUNT(*) FROM notifications WHERE kind = 'memory_adopted' AND subject_id = $1",
        memory_id,
    )
    .await
}

#[tokio::test]
async fn test_adopting_twice_saves_once() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgMemoryRepository::new(pool.clone());
    let author = create_user(&pool).await;
    let saver = create_user(&pool).await;
    let memory = public_memory(&repo, author).await;

    let (item, notification) = adoption(saver, &memory);
    let first = repo.adopt(&item, &notification).await.unwrap();
    assert!(first.created);

    // A retry carries fresh ids, as a new request would
    let (item, notification) = adoption(saver, &memory);
    let second = repo.adopt(&item, &notification).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.item.id, first.item.id);

    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM vault_items WHERE memory_id = $1", memory.id).await,
        1
    );
    assert_eq!(counters(&repo, memory.id).await.saves, 1);
    assert_eq!(adopted_notifications(&pool, memory.id).await, 1);
}

#[tokio::test]
async fn test_concurrent_adoptions_save_once() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgMemoryRepository::new(pool.clone());
    let author = create_user(&pool).await;
    let saver = create_user(&pool).await;
    let memory = public_memory(&repo, author).await;

    let (item_a, notification_a) = adoption(saver, &memory);
    let (item_b, notification_b) = adoption(saver, &memory);
    let (a, b) = tokio::join!(
        repo.adopt(&item_a, &notification_a),
        repo.adopt(&item_b, &notification_b),
    );

    let created = [a.unwrap().created, b.unwrap().created];
    assert_eq!(created.iter().filter(|c| **c).count(), 1);
    assert_eq!(counters(&repo, memory.id).await.saves, 1);
    assert_eq!(adopted_notifications(&pool, memory.id).await, 1);
}

#[tokio::test]
async fn test_reshare_counter_follows_reshare_lifecycle() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgMemoryRepository::new(pool.clone());
    let author = create_user(&pool).await;
    let resharer = create_user(&pool).await;
    let original = public_memory(&repo, author).await;

    let mut reshare = Memory::new(next_id(), resharer, MemoryScope::Public);
    reshare.reshare_of_id = Some(original.id);
    repo.create(&reshare).await.unwrap();
    assert_eq!(counters(&repo, original.id).await.reshares, 1);

    assert!(repo.soft_delete(reshare.id).await.unwrap());
    assert_eq!(counters(&repo, original.id).await.reshares, 0);

    // Deleting again must not push the counter below the live reshares
    assert!(!repo.soft_delete(reshare.id).await.unwrap());
    assert_eq!(counters(&repo, original.id).await.reshares, 0);
}

#[tokio::test]
async fn test_recompute_counters_repairs_drift() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgMemoryRepository::new(pool.clone());
    let author = create_user(&pool).await;
    let fan = create_user(&pool).await;
    let memory = public_memory(&repo, author).await;

    let (item, notification) = adoption(fan, &memory);
    repo.adopt(&item, &notification).await.unwrap();
    repo.add_heart(memory.id, fan, None).await.unwrap();
    let mut reshare = Memory::new(next_id(), fan, MemoryScope::Public);
    reshare.reshare_of_id = Some(memory.id);
    repo.create(&reshare).await.unwrap();

    sqlx::query(
        r#"
        UPDATE memories
        SET comments_count = 7, hearts_count = 0, saves_count = 40, reshares_count = 3
        WHERE id = $1
        "#,
    )
    .bind(memory.id)
    .execute(&pool)
    .await
    .unwrap();

    // Snowflake ids are unique, so this batch is exactly our memory
    let batch = repo.recompute_counters(memory.id - 1, 1).await.unwrap();
    assert_eq!(batch.processed, 1);
    assert_eq!(batch.last_id, Some(memory.id));

    assert_eq!(
        counters(&repo, memory.id).await,
        MemoryCounters {
            comments: 0,
            hearts: 1,
            saves: 1,
            reshares: 1,
        }
    );
}
