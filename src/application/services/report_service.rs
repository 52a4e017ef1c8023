//! Report Service
//!
//! Safety reports filed by users. Admin triage lives in the admin service.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::domain::{Report, ReportReason, ReportRepository, ReportStatus, ReportTarget};
use crate::shared::error::AppError;
use crate::shared::pagination::Page;
use crate::shared::snowflake::SnowflakeGenerator;

pub const MAX_REPORT_DETAILS_CHARS: usize = 1000;

#[async_trait]
pub trait ReportService: Send + Sync {
    async fn create(&self, reporter_id: i64, input: CreateReportInput) -> Result<ReportDto, ReportError>;

    async fn mine(&self, reporter_id: i64, page: Page) -> Result<Vec<ReportDto>, ReportError>;
}

#[derive(Debug, Clone)]
pub struct CreateReportInput {
    pub target_type: ReportTarget,
    pub target_id: i64,
    pub reason: ReportReason,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDto {
    pub id: String,
    pub reporter_id: String,
    pub target_type: ReportTarget,
    pub target_id: String,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub resolved_by: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl From<Report> for ReportDto {
    fn from(report: Report) -> Self {
        Self {
            id: report.id.to_string(),
            reporter_id: report.reporter_id.to_string(),
            target_type: report.target_type,
            target_id: report.target_id.to_string(),
            reason: report.reason,
            details: report.details,
            status: report.status,
            resolution_note: report.resolution_note,
            resolved_by: report.resolved_by.map(|id| id.to_string()),
            created_at: report.created_at.to_rfc3339(),
            resolved_at: report.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("You cannot report yourself")]
    SelfReport,

    #[error("Reported {0} not found")]
    TargetNotFound(&'static str),

    #[error("Details must be at most {MAX_REPORT_DETAILS_CHARS} characters")]
    DetailsTooLong,

    #[error("You already have an open report on this")]
    Duplicate,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::SelfReport => AppError::BadRequest(err.to_string()),
            ReportError::TargetNotFound(_) => AppError::NotFound(err.to_string()),
            ReportError::DetailsTooLong => AppError::field("details", err.to_string()),
            ReportError::Duplicate => AppError::Conflict(err.to_string()),
            ReportError::Store(e) => e,
        }
    }
}

pub struct ReportServiceImpl<R: ReportRepository> {
    report_repo: Arc<R>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R: ReportRepository> ReportServiceImpl<R> {
    pub fn new(report_repo: Arc<R>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self {
            report_repo,
            id_generator,
        }
    }
}

#[async_trait]
impl<R: ReportRepository + 'static> ReportService for ReportServiceImpl<R> {
    async fn create(&self, reporter_id: i64, input: CreateReportInput) -> Result<ReportDto, ReportError> {
        if input.target_type == ReportTarget::User && input.target_id == reporter_id {
            return Err(ReportError::SelfReport);
        }

        let details = input
            .details
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if details
            .as_ref()
            .is_some_and(|d| d.chars().count() > MAX_REPORT_DETAILS_CHARS)
        {
            return Err(ReportError::DetailsTooLong);
        }

        if !self
            .report_repo
            .target_exists(input.target_type, input.target_id)
            .await?
        {
            return Err(ReportError::TargetNotFound(input.target_type.as_str()));
        }

        let report = Report::new(
            self.id_generator.generate(),
            reporter_id,
            input.target_type,
            input.target_id,
            input.reason,
            details,
        );
        let created = self.report_repo.create(&report).await.map_err(|e| match e {
            AppError::Conflict(_) => ReportError::Duplicate,
            e => ReportError::Store(e),
        })?;

        info!(
            report_id = created.id,
            target = created.target_type.as_str(),
            reason = created.reason.as_str(),
            "Report filed"
        );
        Ok(created.into())
    }

    async fn mine(&self, reporter_id: i64, page: Page) -> Result<Vec<ReportDto>, ReportError> {
        let reports = self
            .report_repo
            .list_by_reporter(reporter_id, page.before, page.limit)
            .await?;
        Ok(reports.into_iter().map(ReportDto::from).collect())
    }
}
