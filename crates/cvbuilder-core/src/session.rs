//! Register, login, refresh-token rotation and logout.
//!
//! A session moves `Anonymous -> Authenticated(access, refresh)`, each refresh
//! swaps the pair for a new one and revokes the old refresh token, and logout
//! (or any rejected refresh) returns it to `Anonymous`.
//!
//! Refresh tokens are only ever stored as SHA-256 digests.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Identity, NewUser, User, UserRecord};
use crate::password::PasswordHasher;
use crate::store::CredentialStore;
use crate::token::TokenCodec;
use crate::validation::{normalize_email, LoginRequest, RegisterRequest};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Result of a successful register or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// One-way digest of a refresh token, as stored in `RefreshTokenRecord`.
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    hasher: PasswordHasher,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec, hasher: PasswordHasher) -> Self {
        Self { store, codec, hasher }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<AuthSession> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let username = request.username.trim().to_string();

        if self.store.email_exists(&email).await? {
            return Err(AppError::conflict("email", "Email already registered"));
        }
        if self.store.username_exists(&username).await? {
            return Err(AppError::conflict("username", "Username already taken"));
        }

        let password_hash = self.hasher.hash_async(request.password).await?;

        let user = self
            .store
            .create(NewUser {
                username,
                email,
                phone: request.phone,
                password_hash: Some(password_hash),
                is_verified: false,
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        self.start_session(&user).await
    }

    /// `identifier` is tried as an email first, then as a username. Every
    /// failure gives the same message so callers cannot tell which accounts exist.
    pub async fn login(&self, request: LoginRequest) -> AppResult<AuthSession> {
        request.validate()?;

        let identifier = request.identifier.trim();
        let user = match self.store.find_by_email(identifier, true).await? {
            Some(user) => Some(user),
            None => self.store.find_by_username(identifier, true).await?,
        };

        let Some(user) = user else {
            debug!("Login for unknown identifier");
            return Err(AppError::authentication(INVALID_CREDENTIALS));
        };
        let Some(ref password_hash) = user.password_hash else {
            debug!(user_id = %user.id, "Password login attempted on account without password");
            return Err(AppError::authentication(INVALID_CREDENTIALS));
        };

        let valid = self
            .hasher
            .verify_async(request.password, password_hash.clone())
            .await?;
        if !valid {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AppError::authentication(INVALID_CREDENTIALS));
        }

        info!(user_id = %user.id, "User logged in");
        self.start_session(&user).await
    }

    /// Exchange a refresh token for a new pair, revoking the one presented.
    ///
    /// Every failure is reported as the same authentication error, whatever
    /// step rejected the token.
    pub async fn refresh(&self, presented: &str) -> AppResult<TokenPair> {
        self.rotate(presented).await.map_err(|e| {
            if e.is_internal() {
                warn!(error = %e, "Refresh failed on an internal error");
            } else {
                debug!(error = %e, "Refresh rejected");
            }
            AppError::authentication(INVALID_REFRESH_TOKEN)
        })
    }

    async fn rotate(&self, presented: &str) -> AppResult<TokenPair> {
        let claims = self.codec.verify_refresh(presented)?;

        let user = self
            .store
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".into()))?;

        let presented_hash = hash_refresh_token(presented);
        if !user.has_active_refresh_token(&presented_hash) {
            warn!(user_id = %user.id, "Refresh token reuse or unknown token");
            return Err(AppError::authentication(INVALID_REFRESH_TOKEN));
        }

        let pair = self.issue_pair(&user.identity())?;

        // A concurrent refresh with the same token may have revoked it since
        // the check above; only the caller whose revoke lands may rotate.
        if !self.store.revoke_refresh_token(user.id, &presented_hash).await? {
            warn!(user_id = %user.id, "Refresh lost a race on the same token");
            return Err(AppError::authentication(INVALID_REFRESH_TOKEN));
        }
        self.store
            .append_refresh_token(user.id, &hash_refresh_token(&pair.refresh_token))
            .await?;

        debug!(user_id = %user.id, "Refresh token rotated");
        Ok(pair)
    }

    /// Revoke the presented refresh token. Missing, unknown or already
    /// revoked tokens are not an error.
    pub async fn logout(&self, user_id: Uuid, presented: Option<&str>) -> AppResult<()> {
        let Some(token) = presented.filter(|t| !t.is_empty()) else {
            debug!(user_id = %user_id, "Logout without refresh token");
            return Ok(());
        };
        let revoked = self
            .store
            .revoke_refresh_token(user_id, &hash_refresh_token(token))
            .await?;
        info!(user_id = %user_id, revoked, "User logged out");
        Ok(())
    }

    /// Resolve the owner of a refresh token without consuming it. Used when a
    /// logout arrives without a valid access token.
    pub fn refresh_token_owner(&self, presented: &str) -> Option<Uuid> {
        self.codec.verify_refresh(presented).ok().map(|c| c.user_id)
    }

    fn issue_pair(&self, identity: &Identity) -> AppResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.codec.issue_access(identity)?,
            refresh_token: self.codec.issue_refresh(identity)?,
        })
    }

    async fn start_session(&self, user: &UserRecord) -> AppResult<AuthSession> {
        let pair = self.issue_pair(&user.identity())?;
        self.store
            .append_refresh_token(user.id, &hash_refresh_token(&pair.refresh_token))
            .await?;
        Ok(AuthSession {
            user: User::from(user),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        })
    }
}
