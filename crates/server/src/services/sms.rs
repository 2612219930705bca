//! SMS dispatch.
//!
//! [`SmsGateway`] is the seam between the app and a provider. The HTTP
//! gateway posts JSON with a bearer key; the logging gateway stands in when
//! no provider is configured. [`SmsService`] adds the `sms_enabled` switch
//! and records every attempt in the SMS log.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tasfiya_core::{Phone, PhoneError, SmsStatus};

use crate::config::SmsConfig;
use crate::db::{RepositoryError, Storage};
use crate::models::NewSmsMessage;
use crate::models::setting::keys;
use crate::services::settings::SettingsService;

/// Longest message accepted (ten concatenated segments).
pub const MAX_MESSAGE_LENGTH: usize = 1600;

/// Errors from sending SMS.
#[derive(Debug, Error)]
pub enum SmsError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider rejected the request.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Provider response could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The `sms_enabled` setting is off.
    #[error("SMS sending is disabled")]
    Disabled,

    /// Empty or oversized body.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Recipient is not a valid phone number.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(#[from] PhoneError),
}

/// Something that can deliver a text message.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Deliver `body` to `to`, returning the provider's message id.
    async fn send(&self, to: &Phone, body: &str) -> Result<String, SmsError>;
}

/// JSON-over-HTTP provider client.
#[derive(Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    endpoint: String,
    sender_id: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(alias = "messageId")]
    id: String,
}

impl HttpSmsGateway {
    /// Build a client with the API key as a default header.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::Parse` if the key cannot be used as a header value,
    /// or `SmsError::Http` if the client fails to build.
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
            .map_err(|e| SmsError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.api_url.to_string(),
            sender_id: config.sender_id.clone(),
        })
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &Phone, body: &str) -> Result<String, SmsError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendRequest {
                from: &self.sender_id,
                to: to.as_str(),
                message: body,
            })
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| SmsError::Parse(e.to_string()))?;
        Ok(parsed.id)
    }
}

/// Gateway used when no provider is configured: messages are only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSmsGateway;

#[async_trait]
impl SmsGateway for LoggingSmsGateway {
    async fn send(&self, to: &Phone, body: &str) -> Result<String, SmsError> {
        let id = format!("log-{}", uuid::Uuid::new_v4());
        tracing::info!(to = %to.masked(), chars = body.chars().count(), %id, "SMS (not sent, no provider configured)");
        Ok(id)
    }
}

/// Pick the gateway for the current configuration.
///
/// # Errors
///
/// Returns `SmsError` if the HTTP client cannot be built.
pub fn gateway_from_config(config: Option<&SmsConfig>) -> Result<Arc<dyn SmsGateway>, SmsError> {
    match config {
        Some(config) => Ok(Arc::new(HttpSmsGateway::new(config)?)),
        None => Ok(Arc::new(LoggingSmsGateway)),
    }
}

/// Outcome for one recipient of a bulk send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRecipientResult {
    pub phone: String,
    pub status: SmsStatus,
    pub error: Option<String>,
}

/// Response body of `POST /api/admin/sms/send`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendSummary {
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<SmsRecipientResult>,
}

/// Validate a message body.
///
/// # Errors
///
/// Returns `SmsError::InvalidMessage` when blank or too long.
pub fn validate_message(message: &str) -> Result<String, SmsError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(SmsError::InvalidMessage("message is required".to_owned()));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(SmsError::InvalidMessage(format!(
            "message must be at most {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(message.to_owned())
}

/// Sending with the feature switch and the audit log.
pub struct SmsService<'a> {
    storage: &'a dyn Storage,
    gateway: &'a dyn SmsGateway,
    settings: &'a SettingsService,
}

impl<'a> SmsService<'a> {
    #[must_use]
    pub const fn new(
        storage: &'a dyn Storage,
        gateway: &'a dyn SmsGateway,
        settings: &'a SettingsService,
    ) -> Self {
        Self {
            storage,
            gateway,
            settings,
        }
    }

    /// Whether the `sms_enabled` setting allows sending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if settings cannot be loaded.
    pub async fn enabled(&self) -> Result<bool, RepositoryError> {
        Ok(self
            .settings
            .snapshot(self.storage)
            .await?
            .get_bool(keys::SMS_ENABLED, true))
    }

    /// Send one message and log the attempt. Provider failures are logged
    /// and returned as a `failed` result rather than an error.
    async fn deliver(
        &self,
        to: &Phone,
        body: &str,
    ) -> Result<SmsRecipientResult, RepositoryError> {
        let outcome = self.gateway.send(to, body).await;
        let (status, provider_id, error) = match outcome {
            Ok(id) => (SmsStatus::Sent, Some(id), None),
            Err(e) => {
                tracing::warn!(error = %e, to = %to.masked(), "SMS delivery failed");
                (SmsStatus::Failed, None, Some(e.to_string()))
            }
        };
        self.storage
            .log_sms(NewSmsMessage {
                recipient: to.clone(),
                body: body.to_owned(),
                status,
                provider_id,
                error: error.clone(),
            })
            .await?;
        Ok(SmsRecipientResult {
            phone: to.as_str().to_owned(),
            status,
            error,
        })
    }

    /// Admin bulk send. Every phone is validated before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `SmsError::Disabled` when sending is switched off,
    /// `SmsError::InvalidMessage`/`InvalidRecipient` for bad input, and
    /// `RepositoryError` (wrapped by the caller) if logging fails.
    pub async fn send_bulk(
        &self,
        phones: &[String],
        message: &str,
    ) -> Result<Result<SmsSendSummary, SmsError>, RepositoryError> {
        let message = match validate_message(message) {
            Ok(m) => m,
            Err(e) => return Ok(Err(e)),
        };
        if phones.is_empty() {
            return Ok(Err(SmsError::InvalidMessage(
                "at least one phone number is required".to_owned(),
            )));
        }
        let mut recipients: Vec<Phone> = Vec::with_capacity(phones.len());
        for raw in phones {
            match Phone::parse(raw) {
                Ok(phone) if !recipients.contains(&phone) => recipients.push(phone),
                Ok(_) => {}
                Err(e) => return Ok(Err(e.into())),
            }
        }
        if !self.enabled().await? {
            return Ok(Err(SmsError::Disabled));
        }

        let mut results = Vec::with_capacity(recipients.len());
        for phone in &recipients {
            results.push(self.deliver(phone, &message).await?);
        }
        let sent = results
            .iter()
            .filter(|r| r.status == SmsStatus::Sent)
            .count();
        tracing::info!(sent, failed = results.len() - sent, "Bulk SMS finished");
        Ok(Ok(SmsSendSummary {
            sent,
            failed: results.len() - sent,
            results,
        }))
    }

    /// Transactional message (order updates). Skipped silently when SMS is
    /// disabled; failures are logged, never returned.
    pub async fn send_logged(&self, to: &Phone, body: &str) {
        match self.enabled().await {
            Ok(true) => {
                if let Err(e) = self.deliver(to, body).await {
                    tracing::warn!(error = %e, "Failed to record SMS");
                }
            }
            Ok(false) => tracing::debug!("SMS disabled, skipping message"),
            Err(e) => tracing::warn!(error = %e, "Failed to load settings for SMS"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use tasfiya_core::SettingType;

    use super::*;
    use crate::db::{MemoryStorage, SettingsRepository, SmsRepository};

    /// Fails for one number, succeeds for the rest.
    #[derive(Default)]
    struct FlakyGateway {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SmsGateway for FlakyGateway {
        async fn send(&self, to: &Phone, _body: &str) -> Result<String, SmsError> {
            if to.as_str() == "0500000000" {
                return Err(SmsError::Api {
                    status: 400,
                    message: "unreachable".to_owned(),
                });
            }
            self.sent.lock().unwrap().push(to.as_str().to_owned());
            Ok(format!("msg-{}", to.as_str()))
        }
    }

    #[test]
    fn test_validate_message() {
        assert!(validate_message("   ").is_err());
        assert!(validate_message(&"x".repeat(MAX_MESSAGE_LENGTH + 1)).is_err());
        assert_eq!(validate_message(" hello ").unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_bulk_send_logs_every_attempt() {
        let storage = MemoryStorage::new();
        let gateway = FlakyGateway::default();
        let settings = SettingsService::new(Duration::from_secs(60));
        let service = SmsService::new(&storage, &gateway, &settings);

        let phones = vec![
            "0501111111".to_owned(),
            "0500000000".to_owned(),
            "050 111 1111".to_owned(),
        ];
        let summary = service
            .send_bulk(&phones, "Sale starts today")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(storage.list_sms(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_send_rejects_bad_phone_before_sending() {
        let storage = MemoryStorage::new();
        let gateway = FlakyGateway::default();
        let settings = SettingsService::new(Duration::from_secs(60));
        let service = SmsService::new(&storage, &gateway, &settings);

        let result = service
            .send_bulk(&["0501111111".to_owned(), "12".to_owned()], "Hi")
            .await
            .unwrap();
        assert!(matches!(result, Err(SmsError::InvalidRecipient(_))));
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_setting_blocks_sending() {
        let storage = MemoryStorage::new();
        storage
            .upsert_setting(keys::SMS_ENABLED, "false", "internal", SettingType::Boolean)
            .await
            .unwrap();
        let gateway = FlakyGateway::default();
        let settings = SettingsService::new(Duration::from_secs(60));
        let service = SmsService::new(&storage, &gateway, &settings);

        let result = service
            .send_bulk(&["0501111111".to_owned()], "Hi")
            .await
            .unwrap();
        assert!(matches!(result, Err(SmsError::Disabled)));

        service
            .send_logged(&Phone::parse("0501111111").unwrap(), "Order shipped")
            .await;
        assert!(storage.list_sms(10).await.unwrap().is_empty());
    }
}
