//! Route Configuration
//!
//! Configures all HTTP routes for the API and the admin surface.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    auth_middleware, create_security_headers_layer, rate_limit_api, rate_limit_auth,
    rate_limit_signaling, rate_limit_upload, require_admin, track_metrics,
};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        // Outermost so every response carries the headers
        .layer(create_security_headers_layer(&state.settings.environment))
        .with_state(state)
}

async fn metrics_handler() -> Result<impl IntoResponse, AppError> {
    let body = metrics::gather_metrics().map_err(|e| AppError::Internal(e.to_string()))?;
    Ok((
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    ))
}

/// API v1 routes
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .merge(protected_routes(state.clone()))
        .merge(signaling_routes(state.clone()))
        .merge(upload_routes(state))
}

/// Require a bearer token on every route added so far. Layers added before
/// this one (the rate limiters) run after authentication, so they can key on
/// the user id.
fn authenticated(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ))
}

/// Authentication routes (public, with stricter rate limiting)
fn auth_routes(state: AppState) -> Router<AppState> {
    let me = Router::new().route("/me", get(handlers::auth::me));

    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/google", post(handlers::auth::google))
        .route("/refresh", post(handlers::auth::refresh_token))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_auth))
        .merge(authenticated(
            me.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_api)),
            &state,
        ))
}

/// Everything that needs a bearer token and the general API limit
fn protected_routes(state: AppState) -> Router<AppState> {
    let router = Router::new()
        .merge(user_routes())
        .merge(social_routes())
        .merge(circle_routes())
        .merge(memory_routes())
        .merge(message_routes())
        .merge(call_routes())
        .merge(live_room_routes())
        .merge(inbox_routes())
        .merge(report_routes());

    authenticated(
        router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_api)),
        &state,
    )
}

fn user_routes() -> Router<AppState> {
    use handlers::{memory, social, user};

    Router::new()
        .route(
            "/users/me",
            get(user::get_current_user).patch(user::update_current_user),
        )
        .route("/users/me/public-key", put(user::set_public_key))
        .route("/users/search", get(user::search_users))
        .route("/users/{user_id}", get(user::get_user))
        .route("/users/{user_id}/public-key", get(user::get_public_key))
        .route(
            "/users/{user_id}/follow",
            post(social::follow).delete(social::unfollow),
        )
        .route("/users/{user_id}/followers", get(social::followers))
        .route("/users/{user_id}/following", get(social::following))
        .route("/users/{user_id}/memories", get(memory::user_timeline))
}

fn social_routes() -> Router<AppState> {
    use handlers::social;

    Router::new()
        .route("/friends", get(social::list_friends))
        .route("/friends/requests", post(social::send_friend_request))
        .route(
            "/friends/requests/incoming",
            get(social::incoming_friend_requests),
        )
        .route(
            "/friends/requests/outgoing",
            get(social::outgoing_friend_requests),
        )
        .route(
            "/friends/requests/{request_id}",
            delete(social::cancel_friend_request),
        )
        .route(
            "/friends/requests/{request_id}/accept",
            post(social::accept_friend_request),
        )
        .route(
            "/friends/requests/{request_id}/decline",
            post(social::decline_friend_request),
        )
        .route("/friends/{user_id}", delete(social::unfriend))
        .route("/friends/{user_id}/status", get(social::friend_status))
        .route("/connections", get(social::list_connections))
        .route("/connections/incoming", get(social::incoming_connections))
        .route(
            "/connections/{user_id}",
            post(social::request_connection).delete(social::remove_connection),
        )
        .route(
            "/connections/{user_id}/accept",
            post(social::accept_connection),
        )
        .route(
            "/connections/{user_id}/status",
            get(social::connection_status),
        )
}

fn circle_routes() -> Router<AppState> {
    use handlers::circle;

    Router::new()
        .route(
            "/circles",
            get(circle::my_circles).post(circle::create_circle),
        )
        .route(
            "/circles/{circle_id}",
            get(circle::get_circle)
                .patch(circle::update_circle)
                .delete(circle::delete_circle),
        )
        .route(
            "/circles/{circle_id}/members",
            get(circle::list_members).post(circle::add_member),
        )
        .route(
            "/circles/{circle_id}/members/{user_id}",
            delete(circle::remove_member),
        )
        .route("/circles/{circle_id}/memories", get(circle::circle_feed))
}

fn memory_routes() -> Router<AppState> {
    use handlers::memory;

    Router::new()
        .route("/memories", post(memory::create_memory))
        .route("/memories/feed", get(memory::home_feed))
        .route("/memories/stories", get(memory::stories))
        .route("/memories/search", get(memory::search_memories))
        .route(
            "/memories/{memory_id}",
            get(memory::get_memory).delete(memory::delete_memory),
        )
        .route(
            "/memories/{memory_id}/comments",
            get(memory::list_comments).post(memory::add_comment),
        )
        .route(
            "/memories/{memory_id}/heart",
            post(memory::heart).delete(memory::unheart),
        )
        .route(
            "/memories/{memory_id}/adopt",
            post(memory::adopt).delete(memory::unadopt),
        )
        .route("/memories/{memory_id}/reshare", post(memory::reshare))
        .route("/comments/{comment_id}", delete(memory::delete_comment))
        .route("/vault", get(memory::vault))
}

fn message_routes() -> Router<AppState> {
    use handlers::message;

    Router::new()
        .route("/conversations", get(message::list_conversations))
        .route(
            "/conversations/{user_id}/messages",
            get(message::get_conversation).post(message::send_message),
        )
        .route("/conversations/{user_id}/read", post(message::mark_read))
        .route("/messages/{message_id}", delete(message::delete_message))
}

fn call_routes() -> Router<AppState> {
    use handlers::call;

    Router::new()
        .route("/calls", post(call::start_call))
        .route("/calls/incoming", get(call::incoming_calls))
        .route("/calls/history", get(call::call_history))
        .route("/calls/{call_id}", get(call::get_call))
        .route("/calls/{call_id}/accept", post(call::accept_call))
        .route("/calls/{call_id}/decline", post(call::decline_call))
        .route("/calls/{call_id}/cancel", post(call::cancel_call))
        .route("/calls/{call_id}/end", post(call::end_call))
}

fn live_room_routes() -> Router<AppState> {
    use handlers::live_room;

    Router::new()
        .route(
            "/live-rooms",
            get(live_room::list_rooms).post(live_room::create_room),
        )
        .route("/live-rooms/{room_id}", get(live_room::get_room))
        .route("/live-rooms/{room_id}/join", post(live_room::join_room))
        .route("/live-rooms/{room_id}/leave", post(live_room::leave_room))
        .route("/live-rooms/{room_id}/end", post(live_room::end_room))
        .route(
            "/live-rooms/{room_id}/participants",
            get(live_room::participants),
        )
}

fn inbox_routes() -> Router<AppState> {
    use handlers::inbox;

    Router::new()
        .route("/notifications", get(inbox::list_notifications))
        .route("/notifications/unread-count", get(inbox::unread_count))
        .route("/notifications/read", post(inbox::mark_read))
}

fn report_routes() -> Router<AppState> {
    use handlers::report;

    Router::new().route(
        "/reports",
        get(report::my_reports).post(report::create_report),
    )
}

/// Signal relays are polled often, so they get their own budget
fn signaling_routes(state: AppState) -> Router<AppState> {
    let router = Router::new()
        .route(
            "/calls/{call_id}/signals",
            get(handlers::call::poll_signals).post(handlers::call::send_signal),
        )
        .route(
            "/live-rooms/{room_id}/signals",
            get(handlers::live_room::poll_signals).post(handlers::live_room::send_signal),
        );

    authenticated(
        router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_signaling)),
        &state,
    )
}

fn upload_routes(state: AppState) -> Router<AppState> {
    let body_limit = state.settings.storage.max_upload_bytes + MULTIPART_OVERHEAD;
    let router = Router::new()
        .route("/media", post(handlers::media::upload_image))
        .route_layer(DefaultBodyLimit::max(body_limit));

    authenticated(
        router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_upload)),
        &state,
    )
}

/// Admin-only routes. Auth, then the API limit, then the role check.
fn admin_routes(state: AppState) -> Router<AppState> {
    use handlers::admin;

    let router = Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/users/bulk-suspend", post(admin::bulk_suspend))
        .route("/users/{user_id}", get(admin::get_user))
        .route("/users/{user_id}/suspend", post(admin::suspend_user))
        .route("/users/{user_id}/unsuspend", post(admin::unsuspend_user))
        .route("/memories/{memory_id}", delete(admin::remove_memory))
        .route("/reports", get(admin::list_reports))
        .route("/reports/{report_id}/close", post(admin::close_report))
        .route("/audit-log", get(admin::audit_log))
        .route_layer(middleware::from_fn(require_admin));

    authenticated(
        router.route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_api)),
        &state,
    )
}
