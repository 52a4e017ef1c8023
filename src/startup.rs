//! Application Startup
//!
//! Application building, shared state and per-request service construction.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::application::services::{
    AdminServiceImpl, AuthServiceImpl, CallServiceImpl, CircleServiceImpl, ConnectionServiceImpl,
    CounterBackfill, FollowServiceImpl, FriendshipServiceImpl, InboxServiceImpl,
    LiveRoomServiceImpl, MediaServiceImpl, MemoryServiceImpl, MessageServiceImpl,
    ReportServiceImpl, UserServiceImpl,
};
use crate::config::Settings;
use crate::infrastructure::repositories::{
    PgAdminRepository, PgCallRepository, PgCircleRepository, PgConnectionRepository,
    PgFollowRepository, PgFriendshipRepository, PgLiveRoomRepository, PgMemoryRepository,
    PgMessageRepository, PgNotificationRepository, PgReportRepository, PgSessionRepository,
    PgSignalRepository, PgSocialGraph, PgUserRepository,
};
use crate::infrastructure::storage::LocalMediaStore;
use crate::infrastructure::verification::{
    build_http_client, HttpGoogleVerifier, HttpTurnstileVerifier, HttpVisionModerator,
};
use crate::infrastructure::{cache, database};
use crate::presentation::http::{handlers, routes};
use crate::presentation::middleware::{cors, create_trace_layer};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// `None` when Redis is disabled or was unreachable at startup
    pub redis: Option<ConnectionManager>,
    pub snowflake: Arc<SnowflakeGenerator>,
    pub settings: Arc<Settings>,
    pub turnstile: Arc<HttpTurnstileVerifier>,
    pub google: Arc<HttpGoogleVerifier>,
    pub moderator: Arc<HttpVisionModerator>,
    pub media_store: Arc<LocalMediaStore>,
}

impl AppState {
    /// Build state around an existing pool and optional Redis connection.
    pub fn new(db: PgPool, redis: Option<ConnectionManager>, settings: Settings) -> Result<Self> {
        let http = build_http_client(settings.verification.timeout_secs)?;
        let snowflake = Arc::new(SnowflakeGenerator::with_epoch(
            settings.snowflake.epoch,
            settings.snowflake.machine_id as u64,
            0,
        ));

        Ok(Self {
            db,
            redis,
            snowflake,
            turnstile: Arc::new(HttpTurnstileVerifier::new(
                http.clone(),
                settings.verification.turnstile.clone(),
            )),
            google: Arc::new(HttpGoogleVerifier::new(
                http.clone(),
                settings.verification.google.clone(),
            )),
            moderator: Arc::new(HttpVisionModerator::new(
                http,
                settings.verification.moderation.clone(),
            )),
            media_store: Arc::new(LocalMediaStore::new(&settings.storage)),
            settings: Arc::new(settings),
        })
    }

    fn repo<R>(&self, build: fn(PgPool) -> R) -> Arc<R> {
        Arc::new(build(self.db.clone()))
    }

    fn graph(&self) -> Arc<PgSocialGraph> {
        self.repo(PgSocialGraph::new)
    }

    pub fn auth_service(
        &self,
    ) -> AuthServiceImpl<PgUserRepository, PgSessionRepository, HttpTurnstileVerifier, HttpGoogleVerifier>
    {
        AuthServiceImpl::new(
            self.repo(PgUserRepository::new),
            self.repo(PgSessionRepository::new),
            self.turnstile.clone(),
            self.google.clone(),
            self.snowflake.clone(),
            self.settings.jwt.clone(),
        )
    }

    pub fn user_service(&self) -> UserServiceImpl<PgUserRepository, PgFollowRepository> {
        UserServiceImpl::new(
            self.repo(PgUserRepository::new),
            self.repo(PgFollowRepository::new),
        )
    }

    pub fn follow_service(
        &self,
    ) -> FollowServiceImpl<PgFollowRepository, PgSocialGraph, PgNotificationRepository> {
        FollowServiceImpl::new(
            self.repo(PgFollowRepository::new),
            self.graph(),
            self.repo(PgNotificationRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn friendship_service(
        &self,
    ) -> FriendshipServiceImpl<PgFriendshipRepository, PgSocialGraph, PgNotificationRepository> {
        FriendshipServiceImpl::new(
            self.repo(PgFriendshipRepository::new),
            self.graph(),
            self.repo(PgNotificationRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn connection_service(
        &self,
    ) -> ConnectionServiceImpl<PgConnectionRepository, PgSocialGraph, PgNotificationRepository> {
        ConnectionServiceImpl::new(
            self.repo(PgConnectionRepository::new),
            self.graph(),
            self.repo(PgNotificationRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn circle_service(
        &self,
    ) -> CircleServiceImpl<PgCircleRepository, PgSocialGraph, PgNotificationRepository> {
        CircleServiceImpl::new(
            self.repo(PgCircleRepository::new),
            self.graph(),
            self.repo(PgNotificationRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn memory_service(&self) -> MemoryServiceImpl<PgMemoryRepository, PgSocialGraph> {
        MemoryServiceImpl::new(
            self.repo(PgMemoryRepository::new),
            self.graph(),
            self.snowflake.clone(),
            chrono::Duration::hours(self.settings.content.story_ttl_hours),
        )
    }

    pub fn message_service(&self) -> MessageServiceImpl<PgMessageRepository, PgSocialGraph> {
        MessageServiceImpl::new(
            self.repo(PgMessageRepository::new),
            self.graph(),
            self.snowflake.clone(),
        )
    }

    pub fn call_service(
        &self,
    ) -> CallServiceImpl<PgCallRepository, PgSignalRepository, PgSocialGraph> {
        CallServiceImpl::new(
            self.repo(PgCallRepository::new),
            self.repo(PgSignalRepository::new),
            self.graph(),
            self.snowflake.clone(),
            chrono::Duration::seconds(self.settings.content.call_ring_timeout_secs),
        )
    }

    pub fn live_room_service(&self) -> LiveRoomServiceImpl<PgLiveRoomRepository, PgSignalRepository> {
        LiveRoomServiceImpl::new(
            self.repo(PgLiveRoomRepository::new),
            self.repo(PgSignalRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn inbox_service(&self) -> InboxServiceImpl<PgNotificationRepository> {
        InboxServiceImpl::new(self.repo(PgNotificationRepository::new))
    }

    pub fn report_service(&self) -> ReportServiceImpl<PgReportRepository> {
        ReportServiceImpl::new(self.repo(PgReportRepository::new), self.snowflake.clone())
    }

    pub fn admin_service(
        &self,
    ) -> AdminServiceImpl<
        PgUserRepository,
        PgMemoryRepository,
        PgReportRepository,
        PgAdminRepository,
    > {
        AdminServiceImpl::new(
            self.repo(PgUserRepository::new),
            self.repo(PgMemoryRepository::new),
            self.repo(PgReportRepository::new),
            self.repo(PgAdminRepository::new),
            self.snowflake.clone(),
        )
    }

    pub fn media_service(&self) -> MediaServiceImpl<LocalMediaStore, HttpVisionModerator> {
        MediaServiceImpl::new(
            self.media_store.clone(),
            self.moderator.clone(),
            self.snowflake.clone(),
            self.settings.storage.max_upload_bytes,
        )
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        if settings.database.run_migrations {
            database::run_migrations(&db).await?;
            tracing::info!("Database migrations applied");
        }

        let redis = cache::connect_optional(&settings.redis).await;

        let state = AppState::new(db, redis, settings.clone())?;
        spawn_counter_backfill(&state);
        handlers::health::init_server_start();

        let router = build_router(state);

        let addr = settings.server.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// The full router with outer layers, as served.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(CompressionLayer::new())
        .layer(create_trace_layer())
        .layer(cors)
}

fn spawn_counter_backfill(state: &AppState) {
    let content = &state.settings.content;
    if content.counter_backfill_interval_secs == 0 {
        tracing::info!("Counter backfill disabled");
        return;
    }

    let job = CounterBackfill::new(
        Arc::new(PgMemoryRepository::new(state.db.clone())),
        content.counter_backfill_batch_size,
    );
    tokio::spawn(job.run_forever(Duration::from_secs(content.counter_backfill_interval_secs)));
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
