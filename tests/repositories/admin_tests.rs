//! Admin mutations commit together with their audit row.

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::PgPool;

use omsim_social::domain::{
    AdminAction, AdminAuditLog, AdminRepository, Session, SessionRepository, UserRepository,
};
use omsim_social::infrastructure::repositories::{
    PgAdminRepository, PgSessionRepository, PgUserRepository,
};

use super::{count, create_user, next_id, test_pool};

fn entry(id: i64, admin_id: i64, action: AdminAction, user_id: i64) -> AdminAuditLog {
    AdminAuditLog::new(id, admin_id, action, "user", Some(user_id), json!({}))
}

async fn is_suspended(pool: &PgPool, user_id: i64) -> bool {
    PgUserRepository::new(pool.clone())
        .find_by_id(user_id)
        .await
        .unwrap()
        .expect("User missing")
        .is_suspended()
}

async fn open_session(pool: &PgPool, user_id: i64) {
    let session = Session::new(
        user_id,
        format!("{:064}", next_id()),
        Utc::now() + Duration::days(1),
    );
    PgSessionRepository::new(pool.clone())
        .create(&session)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_suspend_revokes_sessions_and_writes_audit() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgAdminRepository::new(pool.clone());
    let admin = create_user(&pool).await;
    let target = create_user(&pool).await;
    open_session(&pool, target).await;
    open_session(&pool, target).await;

    let audit_id = next_id();
    let revoked = repo
        .suspend_user(target, Some("spam".into()), &entry(audit_id, admin, AdminAction::SuspendUser, target))
        .await
        .unwrap();

    assert_eq!(revoked, Some(2));
    assert!(is_suspended(&pool, target).await);
    let details: serde_json::Value =
        sqlx::query_scalar("SELECT details FROM admin_audit_logs WHERE id = $1")
            .bind(audit_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(details["sessions_revoked"], 2);
}

#[tokio::test]
async fn test_failed_audit_insert_rolls_back_mutation() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgAdminRepository::new(pool.clone());
    let admin = create_user(&pool).await;
    let target = create_user(&pool).await;

    let audit_id = next_id();
    repo.suspend_user(target, None, &entry(audit_id, admin, AdminAction::SuspendUser, target))
        .await
        .unwrap();

    // Reusing the audit id makes the audit insert fail inside the transaction
    let result = repo
        .unsuspend_user(target, &entry(audit_id, admin, AdminAction::UnsuspendUser, target))
        .await;

    assert!(result.is_err());
    assert!(is_suspended(&pool, target).await);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM admin_audit_logs WHERE target_id = $1", target).await,
        1
    );
}

#[tokio::test]
async fn test_bulk_suspend_skips_already_suspended() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgAdminRepository::new(pool.clone());
    let admin = create_user(&pool).await;
    let first = create_user(&pool).await;
    let second = create_user(&pool).await;
    repo.suspend_user(first, None, &entry(next_id(), admin, AdminAction::SuspendUser, first))
        .await
        .unwrap();

    let bulk = AdminAuditLog::new(next_id(), admin, AdminAction::BulkSuspendUsers, "user", None, json!({}));
    let changed = repo
        .bulk_suspend(&[first, second], None, &bulk)
        .await
        .unwrap();

    assert_eq!(changed, vec![second]);
    assert!(is_suspended(&pool, second).await);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM admin_audit_logs WHERE id = $1", bulk.id).await,
        1
    );
}
