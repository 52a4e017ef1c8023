//! # Domain Entities
//!
//! Core domain entities representing the main business objects of Omsim Social.
//! All entities map directly to their corresponding database tables.
//!
//! ## Core Entities
//!
//! - **User**: Account with authentication data, role, status and profile
//! - **Memory**: User-authored content with a visibility scope
//! - **Circle**: A named group sharing circle-scoped memories
//! - **Message**: A direct message, plaintext or E2EE envelope
//!
//! ## Social Graph
//!
//! - **Follow**: Directed follower edge
//! - **FriendRequest / Friendship**: Request workflow and the canonical pair row
//! - **Connection**: Single-row pair relationship with a pending/accepted status
//!
//! ## Realtime Signaling
//!
//! - **CallSession**: One-to-one call status machine
//! - **LiveRoom**: Hosted broadcast with participants
//! - **Signal**: Offer/answer/ICE messages relayed over polling
//!
//! ## Supporting Entities
//!
//! - **Notification**: Inbox entries
//! - **Report**: Safety reports
//! - **AdminAuditLog**: Record of every mutating admin action
//! - **Session**: Refresh token sessions
//! - **StoredMedia**: Uploaded images and the `MediaStore` contract
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod admin;
mod call;
mod circle;
mod connection;
mod follow;
mod friendship;
mod live_room;
mod media;
mod memory;
mod message;
mod notification;
mod report;
mod session;
mod signal;
mod social_graph;
mod user;

pub use admin::{AdminAction, AdminAuditLog, AdminRepository, DashboardStats};
pub use call::{CallKind, CallRepository, CallSession, CallStart, CallStatus};
pub use circle::{Circle, CircleMember, CircleMemberProfile, CircleRepository, CircleRole};
pub use connection::{Connection, ConnectionRepository, ConnectionStatus};
pub use follow::{Follow, FollowCounts, FollowRepository};
pub use friendship::{FriendRequest, FriendRequestStatus, Friendship, FriendshipRepository};
pub use live_room::{LiveRoom, LiveRoomRepository, LiveRoomStatus};
pub use media::{image_extension, sniff_image_extension, MediaStore, StoredMedia, ALLOWED_IMAGE_TYPES};
pub use memory::{
    Adoption, BackfillBatch, Comment, FeedKind, Memory, MemoryCounters, MemoryRepository,
    VaultItem,
};
pub use message::{
    ConversationSummary, E2eeEnvelope, Message, MessageBody, MessageBodyError, MessageRepository,
};
pub use notification::{Notification, NotificationKind, NotificationRepository};
pub use report::{Report, ReportReason, ReportRepository, ReportStatus, ReportTarget};
pub use session::{Session, SessionRepository};
pub use signal::{Signal, SignalChannel, SignalKind, SignalRepository};
pub use social_graph::{SocialGraph, ViewerRelation};
pub use user::{
    AccountStatus, Profile, User, UserRepository, UserRole, UserSearch, UserSummary,
};

// Mock repositories for application service tests
#[cfg(test)]
pub use admin::MockAdminRepository;
#[cfg(test)]
pub use call::MockCallRepository;
#[cfg(test)]
pub use circle::MockCircleRepository;
#[cfg(test)]
pub use connection::MockConnectionRepository;
#[cfg(test)]
pub use follow::MockFollowRepository;
#[cfg(test)]
pub use friendship::MockFriendshipRepository;
#[cfg(test)]
pub use live_room::MockLiveRoomRepository;
#[cfg(test)]
pub use media::MockMediaStore;
#[cfg(test)]
pub use memory::MockMemoryRepository;
#[cfg(test)]
pub use message::MockMessageRepository;
#[cfg(test)]
pub use notification::MockNotificationRepository;
#[cfg(test)]
pub use report::MockReportRepository;
#[cfg(test)]
pub use session::MockSessionRepository;
#[cfg(test)]
pub use signal::MockSignalRepository;
#[cfg(test)]
pub use social_graph::MockSocialGraph;
#[cfg(test)]
pub use user::MockUserRepository;
