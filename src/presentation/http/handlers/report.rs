//! Safety Report Handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::request::CreateReportRequest;
use crate::application::dto::response::ListResponse;
use crate::application::services::{CreateReportInput, ReportDto, ReportService};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::pagination::{parse_id, PageQuery};
use crate::shared::validation::validate;
use crate::startup::AppState;

/// Report a user, memory, comment or message
pub async fn create_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<ReportDto>), AppError> {
    validate(&body)?;

    let input = CreateReportInput {
        target_type: body.target_type,
        target_id: parse_id(&body.target_id, "target")?,
        reason: body.reason,
        details: body.details,
    };

    let report = state.report_service().create(auth.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// Reports filed by the caller
pub async fn my_reports(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ListResponse<ReportDto>>, AppError> {
    let page = page.page()?;
    let reports = state.report_service().mine(auth.user_id, page).await?;
    Ok(Json(ListResponse::new(reports, page.limit, |r| r.id.as_str())))
}
