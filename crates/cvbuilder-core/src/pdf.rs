//! PDF export jobs.
//!
//! A request only records a queued job; rendering happens in a separate
//! worker that is not part of this crate.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::documents::{PdfJob, PdfJobStatus};
use crate::error::{AppError, AppResult};
use crate::store::DocumentStore;

pub struct PdfService {
    documents: Arc<dyn DocumentStore>,
}

impl PdfService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Queue a render of one of the owner's CVs. Without `layout_id` the CV's
    /// own layout is used.
    pub async fn generate(&self, owner: Uuid, cv_id: Uuid, layout_id: Option<Uuid>) -> AppResult<PdfJob> {
        let cv = self
            .documents
            .find_cv(cv_id, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("CV".into()))?;
        let layout_id = layout_id.unwrap_or(cv.layout_id);
        if self.documents.find_template(layout_id).await?.is_none() {
            return Err(AppError::NotFound("Template".into()));
        }

        let now = Utc::now();
        let job = PdfJob {
            id: Uuid::new_v4(),
            cv_id: cv.id,
            user_id: owner,
            layout_id,
            job_status: PdfJobStatus::Queued,
            pdf_path: None,
            attempts: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        let job = self.documents.insert_pdf_job(job).await?;
        info!(user_id = %owner, cv_id = %cv.id, job_id = %job.id, "PDF job queued");
        Ok(job)
    }

    pub async fn job_status(&self, owner: Uuid, job_id: Uuid) -> AppResult<PdfJob> {
        self.documents
            .find_pdf_job(job_id, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("PDF Job".into()))
    }
}
