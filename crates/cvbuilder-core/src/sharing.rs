//! Public, expiring share links for CVs, and sending them by email.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::documents::{Cv, ShareLink};
use crate::error::{AppError, AppResult, FieldError};
use crate::store::DocumentStore;
use crate::validation::{is_valid_email, normalize_email};

/// Seven days.
pub const DEFAULT_SHARE_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// One year.
pub const MAX_SHARE_TTL_SECS: i64 = 365 * 24 * 60 * 60;

const TOKEN_BYTES: usize = 32;

/// Outbound mail for shared CVs.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_share_link(&self, to: &str, cv: &Cv, share_url: &str) -> AppResult<()>;
}

/// Records the message in the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_share_link(&self, to: &str, cv: &Cv, share_url: &str) -> AppResult<()> {
        info!(to, cv_id = %cv.id, share_url, "Share link email queued");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedShareLink {
    pub token: String,
    pub share_url: String,
    pub expires_at: DateTime<Utc>,
}

fn generate_share_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct ShareService {
    documents: Arc<dyn DocumentStore>,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl ShareService {
    pub fn new(documents: Arc<dyn DocumentStore>, mailer: Arc<dyn Mailer>, frontend_url: impl Into<String>) -> Self {
        Self {
            documents,
            mailer,
            frontend_url: frontend_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn share_url(&self, token: &str) -> String {
        format!("{}/share/{}", self.frontend_url, token)
    }

    /// Issue a link to one of the owner's CVs, valid for `expires_in_seconds`
    /// (seven days when absent).
    pub async fn create_link(
        &self,
        owner: Uuid,
        cv_id: Uuid,
        expires_in_seconds: Option<i64>,
    ) -> AppResult<IssuedShareLink> {
        let ttl = expires_in_seconds.unwrap_or(DEFAULT_SHARE_TTL_SECS);
        if !(1..=MAX_SHARE_TTL_SECS).contains(&ttl) {
            return Err(AppError::validation_fields(vec![FieldError {
                field: "expiresInSeconds".into(),
                message: format!("expiresInSeconds must be between 1 and {MAX_SHARE_TTL_SECS}"),
            }]));
        }
        let cv = self
            .documents
            .find_cv(cv_id, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("CV".into()))?;

        let now = Utc::now();
        let link = ShareLink {
            id: Uuid::new_v4(),
            cv_id: cv.id,
            token: generate_share_token(),
            expires_at: now + Duration::seconds(ttl),
            access_count: 0,
            created_at: now,
        };
        let link = self.documents.insert_share_link(link).await?;
        info!(user_id = %owner, cv_id = %cv.id, expires_at = %link.expires_at, "Share link created");
        Ok(IssuedShareLink {
            share_url: self.share_url(&link.token),
            token: link.token,
            expires_at: link.expires_at,
        })
    }

    /// The CV behind an active link. Each call counts one access.
    pub async fn resolve(&self, token: &str) -> AppResult<Cv> {
        let (link, cv) = self
            .documents
            .redeem_share_link(token, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Share link".into()))?;
        tracing::debug!(cv_id = %cv.id, access_count = link.access_count, "Share link opened");
        Ok(cv)
    }

    /// Issue a fresh default link and mail it to `email`.
    pub async fn send_by_email(&self, owner: Uuid, cv_id: Uuid, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::validation_fields(vec![FieldError {
                field: "email".into(),
                message: "Please provide a valid email address".into(),
            }]));
        }
        let cv = self
            .documents
            .find_cv(cv_id, owner)
            .await?
            .ok_or_else(|| AppError::NotFound("CV".into()))?;
        let issued = self.create_link(owner, cv.id, None).await?;
        self.mailer.send_share_link(&email, &cv, &issued.share_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::CvData;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_share_link(&self, to: &str, _cv: &Cv, share_url: &str) -> AppResult<()> {
            self.sent.lock().unwrap().push((to.to_string(), share_url.to_string()));
            Ok(())
        }
    }

    async fn setup() -> (ShareService, Arc<RecordingMailer>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let cv = store
            .insert_cv(Cv::new(owner, "Resume".into(), Uuid::new_v4(), CvData::default()))
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let service = ShareService::new(store, mailer.clone(), "https://cv.example.com/");
        (service, mailer, owner, cv.id)
    }

    #[tokio::test]
    async fn test_link_round_trip() {
        let (service, _, owner, cv_id) = setup().await;
        let issued = service.create_link(owner, cv_id, None).await.unwrap();
        assert_eq!(issued.token.len(), 64);
        assert!(issued.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(issued.share_url, format!("https://cv.example.com/share/{}", issued.token));
        let ttl = issued.expires_at - Utc::now();
        assert!(ttl > Duration::days(6) && ttl <= Duration::days(7));

        let cv = service.resolve(&issued.token).await.unwrap();
        assert_eq!(cv.id, cv_id);
        assert_eq!(
            service.resolve("deadbeef").await.unwrap_err().to_string(),
            "Share link not found"
        );
    }

    #[tokio::test]
    async fn test_only_owner_can_share() {
        let (service, _, _, cv_id) = setup().await;
        let err = service.create_link(Uuid::new_v4(), cv_id, None).await.unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_expiry_bounds() {
        let (service, _, owner, cv_id) = setup().await;
        assert!(service.create_link(owner, cv_id, Some(0)).await.is_err());
        assert!(service
            .create_link(owner, cv_id, Some(MAX_SHARE_TTL_SECS + 1))
            .await
            .is_err());
        assert!(service.create_link(owner, cv_id, Some(60)).await.is_ok());
    }

    #[tokio::test]
    async fn test_tokens_are_distinct() {
        let (service, _, owner, cv_id) = setup().await;
        let a = service.create_link(owner, cv_id, None).await.unwrap();
        let b = service.create_link(owner, cv_id, None).await.unwrap();
        assert_ne!(a.token, b.token);
    }

    #[tokio::test]
    async fn test_send_by_email() {
        let (service, mailer, owner, cv_id) = setup().await;
        service.send_by_email(owner, cv_id, " Bob@X.com ").await.unwrap();
        let sent = mailer.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "bob@x.com");
        assert!(sent[0].1.starts_with("https://cv.example.com/share/"));

        assert_eq!(
            service.send_by_email(owner, cv_id, "nope").await.unwrap_err().status(),
            400
        );
    }
}
