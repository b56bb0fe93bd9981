use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CredentialStore, DocumentStore};
use crate::documents::{Cv, CvData, CvSummary, CvUpdate, Payment, PdfJob, ShareLink, Template};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, ProfileUpdate, RefreshTokenRecord, UserRecord};
use crate::pagination::{paginate, Page, PageKey, PageRequest};
use crate::validation::{normalize_email, normalize_phone};

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot<T> {
    data: T,
    saved_at: DateTime<Utc>,
}

/// Every collection, keyed by document id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Collections {
    users: HashMap<Uuid, UserRecord>,
    cvs: HashMap<Uuid, Cv>,
    templates: HashMap<Uuid, Template>,
    share_links: HashMap<Uuid, ShareLink>,
    pdf_jobs: HashMap<Uuid, PdfJob>,
    payments: HashMap<Uuid, Payment>,
}

impl Collections {
    fn user_mut(&mut self, user_id: Uuid) -> AppResult<&mut UserRecord> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound("User".into()))
    }

    fn live_cv(&self, cv_id: Uuid, owner: Uuid) -> Option<&Cv> {
        self.cvs
            .get(&cv_id)
            .filter(|cv| cv.user_id == owner && !cv.is_deleted)
    }

    fn live_cv_mut(&mut self, cv_id: Uuid, owner: Uuid) -> AppResult<&mut Cv> {
        self.cvs
            .get_mut(&cv_id)
            .filter(|cv| cv.user_id == owner && !cv.is_deleted)
            .ok_or_else(|| AppError::NotFound("CV".into()))
    }
}

/// Resolve a page cursor against the documents it may legitimately point at.
fn cursor_key<'a, T: 'a>(
    page: &PageRequest,
    mut candidates: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> PageKey,
) -> AppResult<Option<PageKey>> {
    let Some(cursor) = page.cursor else {
        return Ok(None);
    };
    candidates
        .find(|item| key(*item).1 == cursor)
        .map(|item| Some(key(item)))
        .ok_or_else(|| AppError::validation("Invalid cursor"))
}

/// In-process document collections.
///
/// Every mutation runs under the write lock, which makes each one atomic
/// with respect to the others (the single-document atomic update the session
/// layer relies on). With a snapshot path, a mutation is applied to a copy of
/// the collections, the copy is written to disk, and only then does it replace
/// the live state. A failed write leaves memory exactly as it was.
pub struct MemoryStore {
    state: RwLock<Collections>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Collections::default()),
            snapshot_path: None,
        }
    }

    /// Load the collections from `path` if it exists and write back to it on
    /// every change.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let mut collections = Collections::default();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read data store: {}", path.display()))?;
            let snapshot: Snapshot<Collections> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse data store: {}", path.display()))?;
            collections = snapshot.data;
            info!(
                users = collections.users.len(),
                cvs = collections.cvs.len(),
                saved_at = %snapshot.saved_at,
                "Loaded data store"
            );
        } else if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }
        Ok(Self {
            state: RwLock::new(collections),
            snapshot_path: Some(path),
        })
    }

    /// Run `op` under the write lock and persist the result before committing it.
    async fn mutate<R>(&self, op: impl FnOnce(&mut Collections) -> AppResult<R>) -> AppResult<R> {
        let mut state = self.state.write().await;
        let Some(path) = self.snapshot_path.clone() else {
            return op(&mut *state);
        };
        let mut draft = state.clone();
        let out = op(&mut draft)?;
        save_snapshot(path, &draft).await?;
        *state = draft;
        Ok(out)
    }

    fn strip(user: &UserRecord, include_secret: bool) -> UserRecord {
        if include_secret {
            user.clone()
        } else {
            user.without_secret()
        }
    }
}

async fn save_snapshot(path: PathBuf, collections: &Collections) -> AppResult<()> {
    let snapshot = Snapshot {
        data: collections,
        saved_at: Utc::now(),
    };
    let contents = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| AppError::internal(format!("Failed to serialize data store: {e}")))?;
    tokio::task::spawn_blocking(move || write_atomically(&path, contents))
        .await
        .map_err(|e| AppError::internal(format!("Data store writer panicked: {e}")))?
        .map_err(|e| AppError::internal(format!("{e:#}")))?;
    debug!(users = collections.users.len(), cvs = collections.cvs.len(), "Data store saved");
    Ok(())
}

fn write_atomically(path: &Path, contents: String) -> anyhow::Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write data store: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace data store: {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_email(&self, email: &str, include_secret: bool) -> AppResult<Option<UserRecord>> {
        let email = normalize_email(email);
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| Self::strip(u, include_secret)))
    }

    async fn find_by_username(&self, username: &str, include_secret: bool) -> AppResult<Option<UserRecord>> {
        let username = username.trim();
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .map(|u| Self::strip(u, include_secret)))
    }

    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state.users.get(&user_id).map(|u| Self::strip(u, false)))
    }

    async fn email_exists(&self, email: &str) -> AppResult<bool> {
        Ok(self.find_by_email(email, false).await?.is_some())
    }

    async fn username_exists(&self, username: &str) -> AppResult<bool> {
        Ok(self.find_by_username(username, false).await?.is_some())
    }

    async fn create(&self, new_user: NewUser) -> AppResult<UserRecord> {
        let email = normalize_email(&new_user.email);
        let username = new_user.username.trim().to_string();

        self.mutate(|state| {
            if state.users.values().any(|u| u.email == email) {
                return Err(AppError::conflict("email", "Email already registered"));
            }
            if state.users.values().any(|u| u.username == username) {
                return Err(AppError::conflict("username", "Username already taken"));
            }

            let now = Utc::now();
            let record = UserRecord {
                id: Uuid::new_v4(),
                username,
                email,
                phone: new_user.phone.as_deref().and_then(normalize_phone),
                password_hash: new_user.password_hash,
                is_verified: new_user.is_verified,
                avatar_url: None,
                settings: Default::default(),
                refresh_tokens: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            state.users.insert(record.id, record.clone());
            Ok(record)
        })
        .await
    }

    async fn append_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<()> {
        self.mutate(|state| {
            state
                .user_mut(user_id)?
                .refresh_tokens
                .push(RefreshTokenRecord::new(token_hash.to_string()));
            Ok(())
        })
        .await
    }

    async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<bool> {
        self.mutate(|state| {
            let user = state.user_mut(user_id)?;
            let Some(record) = user
                .refresh_tokens
                .iter_mut()
                .find(|t| t.token_hash == token_hash && t.is_active())
            else {
                return Ok(false);
            };
            record.revoked_at = Some(Utc::now());
            Ok(true)
        })
        .await
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<UserRecord> {
        self.mutate(|state| {
            let user = state.user_mut(user_id)?;
            if let Some(phone) = update.phone {
                user.phone = normalize_phone(&phone);
            }
            if let Some(settings) = update.settings {
                user.settings.merge(settings);
            }
            user.updated_at = Utc::now();
            Ok(user.without_secret())
        })
        .await
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_cv(&self, cv: Cv) -> AppResult<Cv> {
        self.mutate(|state| {
            state.cvs.insert(cv.id, cv.clone());
            Ok(cv)
        })
        .await
    }

    async fn find_cv(&self, cv_id: Uuid, owner: Uuid) -> AppResult<Option<Cv>> {
        let state = self.state.read().await;
        Ok(state.live_cv(cv_id, owner).cloned())
    }

    async fn list_cvs(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<CvSummary>> {
        let state = self.state.read().await;
        // Deleted CVs still anchor a cursor handed out before the delete.
        let owned = || state.cvs.values().filter(move |cv| cv.user_id == owner);
        let after = cursor_key(&page, owned(), Cv::page_key)?;
        let live: Vec<&Cv> = owned().filter(|cv| !cv.is_deleted).collect();
        Ok(paginate(live, after, page.limit(), |cv| cv.page_key()).map(CvSummary::from))
    }

    async fn update_cv(&self, cv_id: Uuid, owner: Uuid, update: CvUpdate) -> AppResult<Cv> {
        self.mutate(|state| {
            let cv = state.live_cv_mut(cv_id, owner)?;
            if let Some(title) = update.title {
                cv.title = title;
            }
            if let Some(layout_id) = update.layout_id {
                cv.layout_id = layout_id;
            }
            if let Some(data) = update.data {
                cv.data = data;
            }
            let now = Utc::now();
            cv.version = cv.version.saturating_add(1);
            cv.last_saved_at = now;
            cv.updated_at = now;
            Ok(cv.clone())
        })
        .await
    }

    async fn autosave_cv(&self, cv_id: Uuid, owner: Uuid, data: CvData) -> AppResult<Cv> {
        self.mutate(|state| {
            let cv = state.live_cv_mut(cv_id, owner)?;
            let now = Utc::now();
            cv.data = data;
            cv.last_saved_at = now;
            cv.updated_at = now;
            Ok(cv.clone())
        })
        .await
    }

    async fn delete_cv(&self, cv_id: Uuid, owner: Uuid) -> AppResult<()> {
        self.mutate(|state| {
            let cv = state.live_cv_mut(cv_id, owner)?;
            cv.is_deleted = true;
            cv.updated_at = Utc::now();
            Ok(())
        })
        .await
    }

    async fn insert_template(&self, template: Template) -> AppResult<Template> {
        self.mutate(|state| {
            if state.templates.values().any(|t| t.slug == template.slug) {
                return Err(AppError::conflict("slug", "Template slug already exists"));
            }
            state.templates.insert(template.id, template.clone());
            Ok(template)
        })
        .await
    }

    async fn find_template(&self, template_id: Uuid) -> AppResult<Option<Template>> {
        let state = self.state.read().await;
        Ok(state.templates.get(&template_id).cloned())
    }

    async fn list_templates(&self, page: PageRequest) -> AppResult<Page<Template>> {
        let state = self.state.read().await;
        let after = cursor_key(&page, state.templates.values(), Template::page_key)?;
        let active: Vec<Template> = state
            .templates
            .values()
            .filter(|t| t.is_active)
            .cloned()
            .collect();
        Ok(paginate(active, after, page.limit(), Template::page_key))
    }

    async fn count_templates(&self) -> AppResult<usize> {
        Ok(self.state.read().await.templates.len())
    }

    async fn insert_share_link(&self, link: ShareLink) -> AppResult<ShareLink> {
        self.mutate(|state| {
            if state.share_links.values().any(|l| l.token == link.token) {
                return Err(AppError::conflict("token", "Share token already exists"));
            }
            state.share_links.insert(link.id, link.clone());
            Ok(link)
        })
        .await
    }

    async fn redeem_share_link(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<(ShareLink, Cv)>> {
        self.mutate(|state| {
            let Some(link) = state
                .share_links
                .values()
                .find(|l| l.token == token && l.is_active_at(now))
                .cloned()
            else {
                return Ok(None);
            };
            let Some(cv) = state.cvs.get(&link.cv_id).filter(|cv| !cv.is_deleted).cloned() else {
                return Ok(None);
            };
            let Some(stored) = state.share_links.get_mut(&link.id) else {
                return Ok(None);
            };
            stored.access_count = stored.access_count.saturating_add(1);
            Ok(Some((stored.clone(), cv)))
        })
        .await
    }

    async fn insert_pdf_job(&self, job: PdfJob) -> AppResult<PdfJob> {
        self.mutate(|state| {
            state.pdf_jobs.insert(job.id, job.clone());
            Ok(job)
        })
        .await
    }

    async fn find_pdf_job(&self, job_id: Uuid, owner: Uuid) -> AppResult<Option<PdfJob>> {
        let state = self.state.read().await;
        Ok(state
            .pdf_jobs
            .get(&job_id)
            .filter(|job| job.user_id == owner)
            .cloned())
    }

    async fn insert_payment(&self, payment: Payment) -> AppResult<Payment> {
        self.mutate(|state| {
            state.payments.insert(payment.id, payment.clone());
            Ok(payment)
        })
        .await
    }

    async fn list_payments(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<Payment>> {
        let state = self.state.read().await;
        let owned = || state.payments.values().filter(move |p| p.user_id == owner);
        let after = cursor_key(&page, owned(), Payment::page_key)?;
        let payments: Vec<Payment> = owned().cloned().collect();
        Ok(paginate(payments, after, page.limit(), Payment::page_key))
    }
}
