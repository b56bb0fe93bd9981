//! Persistence for accounts and the documents users own.
//!
//! The document database is an external collaborator. This module defines the
//! operations the services need from it, `CredentialStore` for accounts and
//! refresh-token records and `DocumentStore` for everything else, and ships an
//! in-process implementation (`MemoryStore`) that can snapshot to a JSON file.
//!
//! Lookups return `Ok(None)` for a missing document. Mutations fail with
//! `AppError::NotFound` instead.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::documents::{Cv, CvData, CvSummary, CvUpdate, Payment, PdfJob, ShareLink, Template};
use crate::error::AppResult;
use crate::models::{NewUser, ProfileUpdate, UserRecord};
use crate::pagination::{Page, PageRequest};

pub use memory::MemoryStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Case-insensitive. The password hash is stripped unless `include_secret`.
    async fn find_by_email(&self, email: &str, include_secret: bool) -> AppResult<Option<UserRecord>>;

    async fn find_by_username(&self, username: &str, include_secret: bool) -> AppResult<Option<UserRecord>>;

    /// Never includes the password hash.
    async fn find_by_id(&self, user_id: Uuid) -> AppResult<Option<UserRecord>>;

    async fn email_exists(&self, email: &str) -> AppResult<bool>;

    async fn username_exists(&self, username: &str) -> AppResult<bool>;

    /// Fails with `Conflict` if the email or username is already taken.
    async fn create(&self, user: NewUser) -> AppResult<UserRecord>;

    /// Append an active record stamped with the current time.
    async fn append_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<()>;

    /// Revoke the matching record only if it is still active.
    ///
    /// Returns `true` when this call revoked a record, `false` when nothing
    /// active matched (already revoked or unknown). The check and the write
    /// are a single atomic step.
    async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str) -> AppResult<bool>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<UserRecord>;
}

/// CV documents and the records that hang off them.
///
/// Owner-scoped lookups treat a document owned by someone else exactly like a
/// missing one. Soft-deleted CVs are invisible to every read and mutation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_cv(&self, cv: Cv) -> AppResult<Cv>;

    async fn find_cv(&self, cv_id: Uuid, owner: Uuid) -> AppResult<Option<Cv>>;

    /// Newest first. An unknown cursor is a validation error.
    async fn list_cvs(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<CvSummary>>;

    /// Apply `update`, bump `version` and stamp `last_saved_at`.
    async fn update_cv(&self, cv_id: Uuid, owner: Uuid, update: CvUpdate) -> AppResult<Cv>;

    /// Replace the section data and stamp `last_saved_at`. The version is kept.
    async fn autosave_cv(&self, cv_id: Uuid, owner: Uuid, data: CvData) -> AppResult<Cv>;

    async fn delete_cv(&self, cv_id: Uuid, owner: Uuid) -> AppResult<()>;

    /// Fails with `Conflict` on a duplicate slug.
    async fn insert_template(&self, template: Template) -> AppResult<Template>;

    async fn find_template(&self, template_id: Uuid) -> AppResult<Option<Template>>;

    /// Active templates only, newest first.
    async fn list_templates(&self, page: PageRequest) -> AppResult<Page<Template>>;

    async fn count_templates(&self) -> AppResult<usize>;

    async fn insert_share_link(&self, link: ShareLink) -> AppResult<ShareLink>;

    /// Count one access on the link and return it with its CV.
    ///
    /// `None` when the token is unknown, expired at `now`, or its CV is gone.
    async fn redeem_share_link(&self, token: &str, now: DateTime<Utc>) -> AppResult<Option<(ShareLink, Cv)>>;

    async fn insert_pdf_job(&self, job: PdfJob) -> AppResult<PdfJob>;

    async fn find_pdf_job(&self, job_id: Uuid, owner: Uuid) -> AppResult<Option<PdfJob>>;

    async fn insert_payment(&self, payment: Payment) -> AppResult<Payment>;

    async fn list_payments(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<Payment>>;
}
