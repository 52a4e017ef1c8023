//! Admin Handlers
//!
//! Admin-only moderation tooling. Every route here sits behind
//! `require_admin`; each mutation is written to the audit log by the service.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::application::dto::request::{
    AdminUserQuery, AuditLogQuery, BulkSuspendRequest, CloseReportRequest,
    ModerationReasonRequest, ReportListQuery,
};
use crate::application::dto::response::ListResponse;
use crate::application::services::{AdminService, AuditLogDto, ReportDto, UserDto};
use crate::domain::DashboardStats;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, parse_ids, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Result of a bulk suspension
#[derive(Debug, Serialize)]
pub struct BulkSuspendResponse {
    pub suspended: Vec<String>,
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    let stats = state.admin_service().dashboard().await?;
    Ok(Json(stats))
}

/// Search accounts by name or email, optionally by status
pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<AdminUserQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<UserDto>>, AppError> {
    let page = page.page()?;
    let query = filter
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    let users = state
        .admin_service()
        .search_users(query, filter.status, page)
        .await?;
    Ok(Json(ListResponse::new(users, page.limit, |u| u.id.as_str())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDto>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = state.admin_service().get_user(user_id).await?;
    Ok(Json(user))
}

pub async fn suspend_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(user_id): Path<String>,
    body: Option<Json<ModerationReasonRequest>>,
) -> Result<StatusCode, AppError> {
    let Json(body) = body.unwrap_or_default();
    validate(&body)?;
    let user_id = parse_id(&user_id, "user")?;
    state
        .admin_service()
        .suspend(admin.user_id, user_id, body.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unsuspend_user(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    state
        .admin_service()
        .unsuspend(admin.user_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn bulk_suspend(
    State(state): State<AppState>,
    admin: AuthUser,
    Json(body): Json<BulkSuspendRequest>,
) -> Result<Json<BulkSuspendResponse>, AppError> {
    validate(&body)?;
    let user_ids = parse_ids(&body.user_ids, "user")?;
    let suspended = state
        .admin_service()
        .bulk_suspend(admin.user_id, user_ids, body.reason)
        .await?;
    Ok(Json(BulkSuspendResponse {
        suspended: suspended.into_iter().map(|id| id.to_string()).collect(),
    }))
}

/// Take a memory down
pub async fn remove_memory(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(memory_id): Path<String>,
    body: Option<Json<ModerationReasonRequest>>,
) -> Result<StatusCode, AppError> {
    let Json(body) = body.unwrap_or_default();
    validate(&body)?;
    let memory_id = parse_id(&memory_id, "memory")?;
    state
        .admin_service()
        .remove_memory(admin.user_id, memory_id, body.reason)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(filter): Query<ReportListQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<ReportDto>>, AppError> {
    let page = page.page()?;
    let reports = state
        .admin_service()
        .list_reports(filter.status, page)
        .await?;
    Ok(Json(ListResponse::new(reports, page.limit, |r| r.id.as_str())))
}

/// Resolve or dismiss an open report
pub async fn close_report(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(report_id): Path<String>,
    Json(body): Json<CloseReportRequest>,
) -> Result<Json<ReportDto>, AppError> {
    validate(&body)?;
    let report_id = parse_id(&report_id, "report")?;
    let report = state
        .admin_service()
        .close_report(admin.user_id, report_id, body.outcome, body.note)
        .await?;
    Ok(Json(report))
}

pub async fn audit_log(
    State(state): State<AppState>,
    Query(filter): Query<AuditLogQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<AuditLogDto>>, AppError> {
    let page = page.page()?;
    let admin_id = filter
        .admin_id
        .as_deref()
        .map(|id| parse_id(id, "admin"))
        .transpose()?;

    let entries = state
        .admin_service()
        .audit_log(admin_id, page)
        .await?;
    Ok(Json(ListResponse::new(entries, page.limit, |e| e.id.as_str())))
}
