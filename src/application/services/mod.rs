//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, password and Google sign-in, JWT and refresh sessions
//! - **UserService**: Profiles, search, E2EE public keys
//! - **FollowService / FriendshipService / ConnectionService**: The social graph
//! - **CircleService**: Circles and their members
//! - **MemoryService**: Memories, feeds, comments, hearts, vault, reshares
//! - **MessageService**: Direct messages between friends
//! - **CallService / LiveRoomService**: Call and broadcast signaling over polling
//! - **InboxService**: Notifications
//! - **ReportService / AdminService**: Safety reports and moderation
//! - **MediaService**: Moderated image uploads
//! - **CounterBackfill**: Periodic repair of denormalized counters

pub mod admin_service;
pub mod auth_service;
pub mod call_service;
pub mod circle_service;
pub mod connection_service;
pub mod counter_backfill;
pub mod follow_service;
pub mod friendship_service;
pub mod inbox_service;
pub mod live_room_service;
pub mod media_service;
pub mod memory_service;
pub mod message_service;
pub mod report_service;
pub mod user_service;

// Re-export auth service types
pub use auth_service::{
    decode_access_token, AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims, ClientInfo,
    RegisterDto,
};

// Re-export user service types
pub use user_service::{
    PublicKeyDto, UpdateProfileDto, UserDto, UserError, UserService, UserServiceImpl,
};

// Re-export social graph service types
pub use connection_service::{
    ConnectionDto, ConnectionError, ConnectionService, ConnectionServiceImpl, ConnectionState,
    ConnectionStateDto,
};
pub use follow_service::{FollowError, FollowService, FollowServiceImpl};
pub use friendship_service::{
    FriendRequestDto, FriendshipError, FriendshipService, FriendshipServiceImpl,
};

// Re-export content service types
pub use circle_service::{
    CircleDto, CircleError, CircleInput, CircleMemberDto, CircleService, CircleServiceImpl,
};
pub use memory_service::{
    CommentDto, CreateMemoryInput, MemoryDto, MemoryError, MemoryService, MemoryServiceImpl,
    ReshareInput, VaultItemDto,
};

// Re-export messaging and realtime types
pub use call_service::{CallDto, CallError, CallService, CallServiceImpl};
pub use live_room_service::{LiveRoomDto, LiveRoomError, LiveRoomService, LiveRoomServiceImpl};
pub use message_service::{
    ConversationDto, CreateMessageDto, MessageDto, MessageError, MessageService,
    MessageServiceImpl,
};

// Re-export inbox, moderation and media types
pub use admin_service::{AdminError, AdminService, AdminServiceImpl, AuditLogDto};
pub use counter_backfill::CounterBackfill;
pub use inbox_service::{InboxService, InboxServiceImpl, NotificationDto};
pub use media_service::{MediaDto, MediaError, MediaService, MediaServiceImpl};
pub use report_service::{
    CreateReportInput, ReportDto, ReportError, ReportService, ReportServiceImpl,
};
