//! Profile reads and updates for the signed-in user.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldError};
use crate::models::{ProfileUpdate, User};
use crate::store::CredentialStore;
use crate::validation::is_valid_phone;

pub struct UserService {
    store: Arc<dyn CredentialStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<User> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(User::from)
            .ok_or_else(|| AppError::NotFound("User".into()))
    }

    pub async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> AppResult<User> {
        if let Some(ref phone) = update.phone {
            if !is_valid_phone(phone.trim()) {
                return Err(AppError::validation_fields(vec![FieldError {
                    field: "phone".into(),
                    message: "Please provide a valid phone number".into(),
                }]));
            }
        }
        let updated = self.store.update_profile(user_id, update).await?;
        info!(user_id = %user_id, "Profile updated");
        Ok(User::from(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewUser, UserSettings};
    use crate::store::MemoryStore;

    async fn seeded() -> (UserService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .create(NewUser {
                username: "alice".into(),
                email: "alice@x.com".into(),
                phone: None,
                password_hash: Some("$argon2id$stub".into()),
                is_verified: false,
            })
            .await
            .unwrap();
        (UserService::new(store), user.id)
    }

    #[tokio::test]
    async fn test_get_profile() {
        let (service, id) = seeded().await;
        let user = service.get_profile(id).await.unwrap();
        assert_eq!(user.username, "alice");

        let missing = service.get_profile(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(missing.to_string(), "User not found");
    }

    #[tokio::test]
    async fn test_update_profile_merges_settings() {
        let (service, id) = seeded().await;
        let user = service
            .update_profile(
                id,
                ProfileUpdate {
                    phone: None,
                    settings: Some(UserSettings {
                        theme: Some("dark".into()),
                        ..Default::default()
                    }),
                },
            )
            .await
            .unwrap();
        assert_eq!(user.settings.theme.as_deref(), Some("dark"));
    }

    #[tokio::test]
    async fn test_update_profile_rejects_bad_phone() {
        let (service, id) = seeded().await;
        let err = service
            .update_profile(
                id,
                ProfileUpdate {
                    phone: Some("not a phone".into()),
                    settings: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }
}
