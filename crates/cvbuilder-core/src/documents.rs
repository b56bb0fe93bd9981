//! CV documents, layout templates, share links, PDF jobs and payments.
//!
//! Every document except templates belongs to one user. Stores look them up
//! by `(id, owner)` so that another user's document is indistinguishable from
//! a missing one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::pagination::PageKey;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introductory_paragraph: Option<String>,
}

/// Dates are kept as the client sent them (ISO 8601 strings).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_of_study: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joining_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joining_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaving_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Technical,
    Interpersonal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_name: Option<String>,
    /// Self-assessed proficiency, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfection: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<SkillCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_link: Option<String>,
}

/// The editable body of a CV, one field per section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvData {
    #[serde(default)]
    pub basic_details: BasicDetails,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub social_profiles: Vec<SocialProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cv {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub layout_id: Uuid,
    #[serde(default)]
    pub data: CvData,
    pub last_saved_at: DateTime<Utc>,
    /// Starts at 1 and grows by one on every full update. Autosave leaves it alone.
    pub version: u32,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cv {
    pub fn new(user_id: Uuid, title: String, layout_id: Uuid, data: CvData) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            layout_id,
            data,
            last_saved_at: now,
            version: 1,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn page_key(&self) -> PageKey {
        (self.created_at, self.id)
    }
}

/// List view of a CV, without the section data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvSummary {
    pub id: Uuid,
    pub title: String,
    pub layout_id: Uuid,
    pub last_saved_at: DateTime<Utc>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Cv> for CvSummary {
    fn from(cv: &Cv) -> Self {
        Self {
            id: cv.id,
            title: cv.title.clone(),
            layout_id: cv.layout_id,
            last_saved_at: cv.last_saved_at,
            version: cv.version,
            created_at: cv.created_at,
            updated_at: cv.updated_at,
        }
    }
}

/// Fields a full update may change. Absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CvData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
    /// Section placement, interpreted by the renderer.
    #[serde(default)]
    pub layout_structure: Value,
    /// Fonts, colours and spacing.
    #[serde(default)]
    pub default_theme: Value,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_active: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn page_key(&self) -> PageKey {
        (self.created_at, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub id: Uuid,
    pub cv_id: Uuid,
    /// 64 hex characters, unique.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfJobStatus {
    Queued,
    Processing,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfJob {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub user_id: Uuid,
    pub layout_id: Uuid,
    pub job_status: PdfJobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Uuid,
    pub amount_cents: u64,
    pub currency: String,
    pub provider_payment_id: String,
    pub status: PaymentStatus,
    pub purpose: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn page_key(&self) -> PageKey {
        (self.created_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cv_data_accepts_partial_sections() {
        let data: CvData = serde_json::from_value(json!({
            "basicDetails": { "name": "Alice" },
            "skills": [{ "skillName": "Rust", "perfection": 90, "category": "technical" }]
        }))
        .unwrap();
        assert_eq!(data.basic_details.name.as_deref(), Some("Alice"));
        assert_eq!(data.skills[0].category, Some(SkillCategory::Technical));
        assert!(data.education.is_empty());
    }

    #[test]
    fn test_unknown_skill_category_rejected() {
        let parsed = serde_json::from_value::<Skill>(json!({ "category": "magic" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_summary_drops_data() {
        let cv = Cv::new(Uuid::new_v4(), "Resume".into(), Uuid::new_v4(), CvData::default());
        let summary = serde_json::to_value(CvSummary::from(&cv)).unwrap();
        assert!(summary.get("data").is_none());
        assert_eq!(summary["version"], 1);
    }

    #[test]
    fn test_share_link_expiry_is_exclusive() {
        let now = Utc::now();
        let link = ShareLink {
            id: Uuid::new_v4(),
            cv_id: Uuid::new_v4(),
            token: "t".into(),
            expires_at: now,
            access_count: 0,
            created_at: now,
        };
        assert!(!link.is_active_at(now));
        assert!(link.is_active_at(now - chrono::Duration::seconds(1)));
    }
}
