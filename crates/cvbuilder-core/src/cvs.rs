//! CV documents: create, edit, autosave, duplicate, soft delete.
//!
//! Every operation is scoped to the signed-in owner. Another user's CV is
//! reported as "CV not found".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::documents::{Cv, CvData, CvSummary, CvUpdate};
use crate::error::{AppError, AppResult, FieldError};
use crate::pagination::{Page, PageRequest};
use crate::store::DocumentStore;
use crate::validation::is_valid_email;

pub const TITLE_MAX_LENGTH: usize = 100;
pub const INTRO_MAX_LENGTH: usize = 1000;
pub const DESCRIPTION_MAX_LENGTH: usize = 2000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCvRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<Uuid>,
    #[serde(default)]
    pub data: CvData,
}

fn field(errors: &mut Vec<FieldError>, field: &str, message: impl Into<String>) {
    errors.push(FieldError {
        field: field.to_string(),
        message: message.into(),
    });
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    let len = title.trim().chars().count();
    if len == 0 {
        field(errors, "title", "Title is required");
    } else if len > TITLE_MAX_LENGTH {
        field(
            errors,
            "title",
            format!("Title must be at most {TITLE_MAX_LENGTH} characters"),
        );
    }
}

fn too_long(value: &Option<String>, max: usize) -> bool {
    value.as_deref().is_some_and(|v| v.chars().count() > max)
}

fn out_of_percent(value: Option<f64>) -> bool {
    value.is_some_and(|v| !(0.0..=100.0).contains(&v))
}

/// Bounds on the free-form sections. Empty strings are allowed everywhere.
pub fn check_cv_data(data: &CvData, errors: &mut Vec<FieldError>) {
    let basic = &data.basic_details;
    if let Some(email) = basic.email.as_deref().filter(|e| !e.is_empty()) {
        if !is_valid_email(email) {
            field(errors, "data.basicDetails.email", "Please provide a valid email address");
        }
    }
    if too_long(&basic.introductory_paragraph, INTRO_MAX_LENGTH) {
        field(
            errors,
            "data.basicDetails.introductoryParagraph",
            format!("Introduction must be at most {INTRO_MAX_LENGTH} characters"),
        );
    }
    for (i, entry) in data.education.iter().enumerate() {
        if out_of_percent(entry.percentage) {
            field(errors, &format!("data.education[{i}].percentage"), "Percentage must be between 0 and 100");
        }
    }
    for (i, entry) in data.experience.iter().enumerate() {
        if too_long(&entry.description, INTRO_MAX_LENGTH) {
            field(
                errors,
                &format!("data.experience[{i}].description"),
                format!("Description must be at most {INTRO_MAX_LENGTH} characters"),
            );
        }
    }
    for (i, entry) in data.projects.iter().enumerate() {
        if entry.team_size == Some(0) {
            field(errors, &format!("data.projects[{i}].teamSize"), "Team size must be at least 1");
        }
        if too_long(&entry.description, DESCRIPTION_MAX_LENGTH) {
            field(
                errors,
                &format!("data.projects[{i}].description"),
                format!("Description must be at most {DESCRIPTION_MAX_LENGTH} characters"),
            );
        }
    }
    for (i, skill) in data.skills.iter().enumerate() {
        if out_of_percent(skill.perfection) {
            field(errors, &format!("data.skills[{i}].perfection"), "Perfection must be between 0 and 100");
        }
    }
}

fn finish(errors: Vec<FieldError>) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation_fields(errors))
    }
}

pub struct CvService {
    documents: Arc<dyn DocumentStore>,
}

impl CvService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn list(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<CvSummary>> {
        self.documents.list_cvs(owner, page).await
    }

    pub async fn get(&self, owner: Uuid, cv_id: Uuid) -> AppResult<Cv> {
        self.documents
            .find_cv(cv_id, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("CV".into()))
    }

    pub async fn create(&self, owner: Uuid, request: CreateCvRequest) -> AppResult<Cv> {
        let mut errors = Vec::new();
        check_title(&request.title, &mut errors);
        if request.layout_id.is_none() {
            field(&mut errors, "layoutId", "Layout is required");
        }
        check_cv_data(&request.data, &mut errors);
        finish(errors)?;

        let layout_id = self.existing_layout(request.layout_id).await?;
        let cv = Cv::new(owner, request.title.trim().to_string(), layout_id, request.data);
        let cv = self.documents.insert_cv(cv).await?;
        info!(user_id = %owner, cv_id = %cv.id, "CV created");
        Ok(cv)
    }

    pub async fn update(&self, owner: Uuid, cv_id: Uuid, mut update: CvUpdate) -> AppResult<Cv> {
        let mut errors = Vec::new();
        if let Some(ref title) = update.title {
            check_title(title, &mut errors);
        }
        if let Some(ref data) = update.data {
            check_cv_data(data, &mut errors);
        }
        finish(errors)?;

        if update.layout_id.is_some() {
            self.existing_layout(update.layout_id).await?;
        }
        update.title = update.title.map(|t| t.trim().to_string());
        let cv = self.documents.update_cv(cv_id, owner, update).await?;
        info!(user_id = %owner, cv_id = %cv.id, version = cv.version, "CV updated");
        Ok(cv)
    }

    pub async fn autosave(&self, owner: Uuid, cv_id: Uuid, data: CvData) -> AppResult<Cv> {
        let mut errors = Vec::new();
        check_cv_data(&data, &mut errors);
        finish(errors)?;
        self.documents.autosave_cv(cv_id, owner, data).await
    }

    pub async fn delete(&self, owner: Uuid, cv_id: Uuid) -> AppResult<()> {
        self.documents.delete_cv(cv_id, owner).await?;
        info!(user_id = %owner, cv_id = %cv_id, "CV deleted");
        Ok(())
    }

    /// Copy titled "<title> (Copy)", starting again at version 1.
    pub async fn duplicate(&self, owner: Uuid, cv_id: Uuid) -> AppResult<Cv> {
        let original = self.get(owner, cv_id).await?;
        let copy = Cv::new(
            owner,
            format!("{} (Copy)", original.title),
            original.layout_id,
            original.data,
        );
        let copy = self.documents.insert_cv(copy).await?;
        info!(user_id = %owner, from = %cv_id, cv_id = %copy.id, "CV duplicated");
        Ok(copy)
    }

    async fn existing_layout(&self, layout_id: Option<Uuid>) -> AppResult<Uuid> {
        let layout_id = layout_id.ok_or_else(|| AppError::validation("Layout is required"))?;
        match self.documents.find_template(layout_id).await? {
            Some(template) if template.is_active => Ok(layout_id),
            _ => Err(AppError::validation_fields(vec![FieldError {
                field: "layoutId".into(),
                message: "Layout template not found".into(),
            }])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Skill;
    use crate::store::MemoryStore;
    use crate::templates::TemplateService;

    async fn service() -> (CvService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let templates = TemplateService::new(store.clone());
        templates.ensure_defaults().await.unwrap();
        let layout = templates.list(PageRequest::default()).await.unwrap().data[0].id;
        (CvService::new(store), layout)
    }

    fn request(title: &str, layout_id: Uuid) -> CreateCvRequest {
        CreateCvRequest {
            title: title.into(),
            layout_id: Some(layout_id),
            data: CvData::default(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (cvs, layout) = service().await;
        let owner = Uuid::new_v4();
        let cv = cvs.create(owner, request("  My CV ", layout)).await.unwrap();
        assert_eq!(cv.title, "My CV");
        assert_eq!(cv.version, 1);
        assert_eq!(cvs.get(owner, cv.id).await.unwrap().id, cv.id);

        let err = cvs.get(Uuid::new_v4(), cv.id).await.unwrap_err();
        assert_eq!(err.to_string(), "CV not found");
    }

    #[tokio::test]
    async fn test_create_validates_title_and_layout() {
        let (cvs, layout) = service().await;
        let owner = Uuid::new_v4();

        let err = cvs.create(owner, request("", layout)).await.unwrap_err();
        assert_eq!(err.details().unwrap()[0]["field"], "title");

        let err = cvs
            .create(owner, request(&"x".repeat(TITLE_MAX_LENGTH + 1), layout))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);

        let err = cvs
            .create(owner, request("My CV", Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.details().unwrap()[0]["field"], "layoutId");

        let mut missing = request("My CV", layout);
        missing.layout_id = None;
        assert!(cvs.create(owner, missing).await.is_err());
    }

    #[tokio::test]
    async fn test_skill_perfection_bounded() {
        let (cvs, layout) = service().await;
        let mut req = request("My CV", layout);
        req.data.skills.push(Skill {
            skill_name: Some("Rust".into()),
            perfection: Some(120.0),
            category: None,
        });
        let err = cvs.create(Uuid::new_v4(), req).await.unwrap_err();
        assert_eq!(err.details().unwrap()[0]["field"], "data.skills[0].perfection");
    }

    #[tokio::test]
    async fn test_duplicate_resets_version() {
        let (cvs, layout) = service().await;
        let owner = Uuid::new_v4();
        let cv = cvs.create(owner, request("Resume", layout)).await.unwrap();
        cvs.update(
            owner,
            cv.id,
            CvUpdate {
                title: Some("Resume 2024".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let copy = cvs.duplicate(owner, cv.id).await.unwrap();
        assert_eq!(copy.title, "Resume 2024 (Copy)");
        assert_eq!(copy.version, 1);
        assert_ne!(copy.id, cv.id);
        assert_eq!(cvs.list(owner, PageRequest::default()).await.unwrap().data.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_hides_cv() {
        let (cvs, layout) = service().await;
        let owner = Uuid::new_v4();
        let cv = cvs.create(owner, request("Resume", layout)).await.unwrap();
        cvs.delete(owner, cv.id).await.unwrap();

        assert_eq!(cvs.get(owner, cv.id).await.unwrap_err().status(), 404);
        assert_eq!(cvs.delete(owner, cv.id).await.unwrap_err().status(), 404);
        assert!(cvs.duplicate(owner, cv.id).await.is_err());
    }
}
