//! Core library for the CV builder.
//!
//! This crate provides:
//! - `TokenCodec`: signed, expiring access and refresh tokens
//! - `CredentialStore`: user accounts and refresh-token records
//! - `SessionManager`: register, login, refresh-token rotation, logout
//! - `UserService`: profile reads and updates
//! - `DocumentStore` and the services over it: CVs, layout templates, share
//!   links, PDF export jobs, payment intents
//!
//! Access tokens live 15 minutes and refresh tokens 30 days by default.
//! Refresh tokens are single-use: each refresh revokes the one presented.

pub mod cvs;
pub mod documents;
pub mod error;
pub mod models;
pub mod pagination;
pub mod password;
pub mod payments;
pub mod pdf;
pub mod session;
pub mod sharing;
pub mod store;
pub mod templates;
pub mod token;
pub mod users;
pub mod validation;

pub use cvs::{CreateCvRequest, CvService};
pub use documents::{Cv, CvData, CvSummary, CvUpdate, Payment, PdfJob, ShareLink, Template};
pub use error::{AppError, AppResult, FieldError};
pub use models::{Identity, ProfileUpdate, RefreshTokenRecord, User, UserRecord, UserSettings};
pub use pagination::{Page, PageRequest};
pub use password::PasswordHasher;
pub use payments::{PaymentIntent, PaymentIntentRequest, PaymentService};
pub use pdf::PdfService;
pub use session::{hash_refresh_token, AuthSession, SessionManager, TokenPair};
pub use sharing::{IssuedShareLink, LogMailer, Mailer, ShareService};
pub use store::{CredentialStore, DocumentStore, MemoryStore};
pub use templates::TemplateService;
pub use token::{parse_ttl, Claims, TokenCodec, TokenError, TokenKind};
pub use users::UserService;
pub use validation::{LoginRequest, RegisterRequest};
