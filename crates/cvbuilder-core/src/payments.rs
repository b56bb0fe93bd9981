//! Payment intents and history.
//!
//! No payment provider is wired in. Intents are recorded as pending with a
//! `mock_` provider id, and webhooks are only logged.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::documents::{Payment, PaymentStatus};
use crate::error::{AppError, AppResult, FieldError};
use crate::pagination::{Page, PageRequest};
use crate::store::DocumentStore;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    #[serde(default)]
    pub amount_cents: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub cv_id: Uuid,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub client_secret: String,
    pub payment_id: Uuid,
}

impl PaymentIntentRequest {
    /// Check the request and return the upper-cased currency code.
    pub fn validate(&self) -> AppResult<String> {
        let mut errors = Vec::new();
        if self.amount_cents == 0 {
            errors.push(FieldError {
                field: "amountCents".into(),
                message: "Amount must be greater than zero".into(),
            });
        }
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(FieldError {
                field: "currency".into(),
                message: "Currency must be a three-letter code".into(),
            });
        }
        if self.purpose.trim().is_empty() {
            errors.push(FieldError {
                field: "purpose".into(),
                message: "Purpose is required".into(),
            });
        }
        if errors.is_empty() {
            Ok(currency)
        } else {
            Err(AppError::validation_fields(errors))
        }
    }
}

pub struct PaymentService {
    documents: Arc<dyn DocumentStore>,
}

impl PaymentService {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn history(&self, owner: Uuid, page: PageRequest) -> AppResult<Page<Payment>> {
        self.documents.list_payments(owner, page).await
    }

    /// Record a pending payment against one of the owner's CVs.
    pub async fn create_intent(&self, owner: Uuid, request: PaymentIntentRequest) -> AppResult<PaymentIntent> {
        let currency = request.validate()?;
        if self.documents.find_cv(request.cv_id, owner).await?.is_none() {
            return Err(AppError::NotFound("CV".into()));
        }

        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: owner,
            cv_id: request.cv_id,
            amount_cents: request.amount_cents,
            currency,
            provider_payment_id: format!("mock_{}", now.timestamp_millis()),
            status: PaymentStatus::Pending,
            purpose: request.purpose.trim().to_string(),
            metadata: json!({}),
            created_at: now,
        };
        let payment = self.documents.insert_payment(payment).await?;
        info!(
            user_id = %owner,
            payment_id = %payment.id,
            amount_cents = payment.amount_cents,
            currency = %payment.currency,
            "Payment intent created"
        );
        Ok(PaymentIntent {
            client_secret: format!("mock_secret_{}", payment.id),
            payment_id: payment.id,
        })
    }

    pub async fn handle_webhook(&self, payload: &Value) -> AppResult<()> {
        let event = payload.get("type").and_then(Value::as_str).unwrap_or("unknown");
        info!(event, "Payment webhook received");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Cv, CvData};
    use crate::store::MemoryStore;

    fn intent(cv_id: Uuid) -> PaymentIntentRequest {
        PaymentIntentRequest {
            amount_cents: 499,
            currency: Some("eur".into()),
            cv_id,
            purpose: "pdf-download".into(),
        }
    }

    #[tokio::test]
    async fn test_intent_recorded_as_pending() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let cv = store
            .insert_cv(Cv::new(owner, "Resume".into(), Uuid::new_v4(), CvData::default()))
            .await
            .unwrap();
        let service = PaymentService::new(store);

        let created = service.create_intent(owner, intent(cv.id)).await.unwrap();
        assert_eq!(created.client_secret, format!("mock_secret_{}", created.payment_id));

        let history = service.history(owner, PageRequest::default()).await.unwrap();
        assert_eq!(history.data.len(), 1);
        let payment = &history.data[0];
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, "EUR");
        assert!(payment.provider_payment_id.starts_with("mock_"));

        let err = service
            .create_intent(Uuid::new_v4(), intent(cv.id))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_intent_validation() {
        let mut req = intent(Uuid::new_v4());
        req.currency = None;
        assert_eq!(req.validate().unwrap(), "USD");

        req.amount_cents = 0;
        req.currency = Some("dollars".into());
        req.purpose = " ".into();
        let err = req.validate().unwrap_err();
        assert_eq!(err.details().and_then(|d| d.as_array()).map(|a| a.len()), Some(3));
    }
}
