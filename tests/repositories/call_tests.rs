//! Call start holds per-user locks from the busy check to the insert.

use pretty_assertions::assert_eq;

use omsim_social::domain::{CallKind, CallRepository, CallSession, CallStart};
use omsim_social::infrastructure::repositories::PgCallRepository;

use super::{count, create_user, next_id, test_pool};

#[tokio::test]
async fn test_concurrent_starts_open_one_call() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgCallRepository::new(pool.clone());
    let caller = create_user(&pool).await;
    let first_peer = create_user(&pool).await;
    let second_peer = create_user(&pool).await;

    let a = CallSession::new(next_id(), caller, first_peer, CallKind::Audio);
    let b = CallSession::new(next_id(), caller, second_peer, CallKind::Video);
    let (a, b) = tokio::join!(repo.start_if_idle(&a), repo.start_if_idle(&b));

    let outcomes = [a.unwrap(), b.unwrap()];
    let started = outcomes
        .iter()
        .filter(|o| matches!(o, CallStart::Started(_)))
        .count();
    let busy = outcomes
        .iter()
        .filter(|o| matches!(o, CallStart::CallerBusy))
        .count();
    assert_eq!((started, busy), (1, 1));
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) FROM call_sessions WHERE caller_id = $1 AND status = 'ringing'",
            caller,
        )
        .await,
        1
    );
}

#[tokio::test]
async fn test_calling_a_busy_callee_is_refused() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgCallRepository::new(pool.clone());
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    let carol = create_user(&pool).await;

    let first = CallSession::new(next_id(), alice, bob, CallKind::Audio);
    assert!(matches!(repo.start_if_idle(&first).await.unwrap(), CallStart::Started(_)));

    let second = CallSession::new(next_id(), carol, bob, CallKind::Audio);
    assert!(matches!(repo.start_if_idle(&second).await.unwrap(), CallStart::CalleeBusy));
}
