use std::sync::Arc;

use cvbuilder_core::{
    CredentialStore, CvService, DocumentStore, LogMailer, Mailer, PasswordHasher, PaymentService, PdfService,
    SessionManager, ShareService, TemplateService, TokenCodec, UserService,
};

use crate::config::ServerConfig;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

/// Shared handler state. Clone is cheap; everything sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserService>,
    pub cvs: Arc<CvService>,
    pub templates: Arc<TemplateService>,
    pub shares: Arc<ShareService>,
    pub pdfs: Arc<PdfService>,
    pub payments: Arc<PaymentService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new<S>(config: ServerConfig, store: Arc<S>) -> Self
    where
        S: CredentialStore + DocumentStore + 'static,
    {
        Self::with_hasher(config, store, PasswordHasher::default())
    }

    pub fn with_hasher<S>(config: ServerConfig, store: Arc<S>, hasher: PasswordHasher) -> Self
    where
        S: CredentialStore + DocumentStore + 'static,
    {
        Self::from_parts(config, store.clone(), store, hasher, Arc::new(LogMailer))
    }

    /// Wire the services over separate account and document stores.
    pub fn from_parts(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        documents: Arc<dyn DocumentStore>,
        hasher: PasswordHasher,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let codec = TokenCodec::new(config.jwt_secret.as_bytes(), config.access_ttl, config.refresh_ttl);
        let rate_limiter = RateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit_max,
            window: config.rate_limit_window,
        });
        Self {
            sessions: Arc::new(SessionManager::new(Arc::clone(&credentials), codec, hasher)),
            users: Arc::new(UserService::new(credentials)),
            cvs: Arc::new(CvService::new(Arc::clone(&documents))),
            templates: Arc::new(TemplateService::new(Arc::clone(&documents))),
            shares: Arc::new(ShareService::new(
                Arc::clone(&documents),
                mailer,
                config.frontend_url.clone(),
            )),
            pdfs: Arc::new(PdfService::new(Arc::clone(&documents))),
            payments: Arc::new(PaymentService::new(documents)),
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        self.sessions.codec()
    }
}
