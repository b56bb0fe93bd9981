//! Layout templates a CV is rendered with.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::documents::Template;
use crate::error::{AppError, AppResult};
use crate::pagination::{Page, PageRequest};
use crate::store::DocumentStore;

pub struct TemplateService {
    documents: Arc<dyn DocumentStore>,
}

impl TemplateService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Active templates, newest first.
    pub async fn list(&self, page: PageRequest) -> AppResult<Page<Template>> {
        self.documents.list_templates(page).await
    }

    /// Inactive templates are reported as missing.
    pub async fn get(&self, template_id: Uuid) -> AppResult<Template> {
        self.documents
            .find_template(template_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| AppError::NotFound("Template".into()))
    }

    /// Seed the built-in layouts into an empty collection.
    ///
    /// Returns how many were inserted; zero when templates already exist.
    pub async fn ensure_defaults(&self) -> AppResult<usize> {
        if self.documents.count_templates().await? > 0 {
            return Ok(0);
        }
        let defaults = builtin_templates();
        let count = defaults.len();
        for template in defaults {
            self.documents.insert_template(template).await?;
        }
        info!(count, "Seeded built-in templates");
        Ok(count)
    }
}

fn template(
    name: &str,
    description: &str,
    layout_structure: Value,
    default_theme: Value,
    is_premium: bool,
    tags: &[&str],
) -> Template {
    let now = Utc::now();
    let slug = name.to_lowercase();
    Template {
        id: Uuid::new_v4(),
        name: name.to_string(),
        preview_image_url: Some(format!("/assets/templates/{slug}.png")),
        slug,
        description: Some(description.to_string()),
        layout_structure,
        default_theme,
        is_premium,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        is_active: true,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "Classic",
            "A classic two-column CV layout with profile on left.",
            json!({
                "columns": 2,
                "left": ["basicDetails", "skills"],
                "right": ["education", "experience", "projects"]
            }),
            json!({
                "fontFamily": "Inter",
                "fontSizes": { "heading": 18, "body": 14 },
                "colors": { "primary": "#2563eb", "text": "#111827", "background": "#ffffff" },
                "spacing": { "sectionGap": 12 }
            }),
            false,
            &["classic", "two-column", "professional"],
        ),
        template(
            "Modern",
            "Minimal modern layout with emphasis on experience.",
            json!({
                "columns": 1,
                "order": ["basicDetails", "experience", "education", "projects", "skills"]
            }),
            json!({
                "fontFamily": "Poppins",
                "fontSizes": { "heading": 20, "body": 15 },
                "colors": { "primary": "#111827", "text": "#1f2937", "background": "#ffffff" },
                "spacing": { "sectionGap": 10 }
            }),
            true,
            &["modern", "single-column", "minimal"],
        ),
        template(
            "Compact",
            "Dense single-page layout for short CVs.",
            json!({
                "columns": 1,
                "order": ["basicDetails", "skills", "experience", "education", "projects", "socialProfiles"]
            }),
            json!({
                "fontFamily": "Roboto",
                "fontSizes": { "heading": 16, "body": 12 },
                "colors": { "primary": "#0f766e", "text": "#111827", "background": "#ffffff" },
                "spacing": { "sectionGap": 8 }
            }),
            false,
            &["compact", "single-page"],
        ),
    ]
}
