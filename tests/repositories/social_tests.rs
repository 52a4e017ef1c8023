//! Accepting a friend request or connection writes the acceptance
//! notification in the same transaction.

use pretty_assertions::assert_eq;

use omsim_social::domain::{
    ConnectionRepository, ConnectionStatus, FriendRequest, FriendshipRepository, Notification,
    NotificationKind, UserPair,
};
use omsim_social::infrastructure::repositories::{PgConnectionRepository, PgFriendshipRepository};

use super::{count, create_user, next_id, test_pool};

const NOTIFICATIONS_FOR: &str = "SELECT COUNT(*) FROM notifications WHERE user_id = $1";

#[tokio::test]
async fn test_friend_accept_notifies_sender_once() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgFriendshipRepository::new(pool.clone());
    let sender = create_user(&pool).await;
    let recipient = create_user(&pool).await;
    let pair = UserPair::new(sender, recipient).unwrap();
    let request = repo
        .create_request(&FriendRequest::new(next_id(), sender, recipient))
        .await
        .unwrap();

    let accepted = Notification::new(
        next_id(),
        sender,
        recipient,
        NotificationKind::FriendAccepted,
        Some(request.id),
    );
    assert!(repo.accept_request(request.id, pair, &accepted).await.unwrap().is_some());
    assert!(repo.are_friends(pair).await.unwrap());

    let again = Notification::new(
        next_id(),
        sender,
        recipient,
        NotificationKind::FriendAccepted,
        Some(request.id),
    );
    assert!(repo.accept_request(request.id, pair, &again).await.unwrap().is_none());
    assert_eq!(count(&pool, NOTIFICATIONS_FOR, sender).await, 1);
}

#[tokio::test]
async fn test_connection_accept_rolls_back_without_notification() {
    let Some(pool) = test_pool().await else { return };
    let repo = PgConnectionRepository::new(pool.clone());
    let requester = create_user(&pool).await;
    let invitee = create_user(&pool).await;
    let pair = UserPair::new(requester, invitee).unwrap();
    repo.create_pending(pair, requester).await.unwrap();

    // An unknown recipient violates the notifications foreign key
    let broken = Notification::new(
        next_id(),
        next_id(),
        invitee,
        NotificationKind::ConnectionAccepted,
        Some(invitee),
    );
    assert!(repo.accept(pair, &broken).await.is_err());
    let row = repo.find(pair).await.unwrap().expect("Connection missing");
    assert_eq!(row.status, ConnectionStatus::Pending);

    let notification = Notification::new(
        next_id(),
        requester,
        invitee,
        NotificationKind::ConnectionAccepted,
        Some(invitee),
    );
    let accepted = repo.accept(pair, &notification).await.unwrap().expect("Not pending");
    assert_eq!(accepted.status, ConnectionStatus::Accepted);
    assert_eq!(count(&pool, NOTIFICATIONS_FOR, requester).await, 1);
}
