//! Refresh token rotation is a compare-and-set on the stored hash.

use chrono::{Duration, Utc};

use omsim_social::domain::{Session, SessionRepository};
use omsim_social::infrastructure::repositories::PgSessionRepository;

use super::{create_user, next_id, test_pool};

#[tokio::test]
async fn test_rotate_with_stale_hash_fails() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgSessionRepository::new(pool.clone());
    let user = create_user(&pool).await;
    let old_hash = format!("{:064}", next_id());
    let session = repo
        .create(&Session::new(user, old_hash.clone(), Utc::now() + Duration::days(1)))
        .await
        .unwrap();
    let expires = Utc::now() + Duration::days(30);

    let first_hash = format!("{:064}", next_id());
    assert!(repo.rotate(session.id, &old_hash, &first_hash, expires).await.unwrap());

    // A second refresh presenting the same old token loses
    let second_hash = format!("{:064}", next_id());
    assert!(!repo.rotate(session.id, &old_hash, &second_hash, expires).await.unwrap());

    assert!(repo.find_by_token_hash(&first_hash).await.unwrap().is_some());
    assert!(repo.find_by_token_hash(&second_hash).await.unwrap().is_none());
}
