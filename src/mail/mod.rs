//! Confirmation code delivery.
//!
//! The authority generates codes; getting them to the user is somebody
//! else's job. [`CodeMailer`] is that seam. Delivery failures are reported
//! to the caller, which logs them without rolling back the issued code.

#![allow(missing_docs)]

use crate::utils::toml_config::{AppConfig, ConfigError, MailConfig};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// What a code is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    /// Confirms a new account's email address.
    Verification,
    /// Passwordless sign-in.
    Login,
}

impl CodePurpose {
    pub fn subject(self) -> &'static str {
        match self {
            CodePurpose::Verification => "Confirm your email address",
            CodePurpose::Login => "Your sign-in code",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail relay rejected the message: HTTP {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), MailError>;
}

/// Writes codes to the log. For development only: the code appears at debug
/// level and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), MailError> {
        info!(destination, ?purpose, "Confirmation code ready for delivery");
        debug!(destination, code, "Confirmation code (log mailer)");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    to: &'a str,
    subject: &'static str,
    purpose: CodePurpose,
    code: &'a str,
}

/// POSTs each code as JSON to an HTTP relay that owns actual email sending.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl WebhookMailer {
    pub fn new(url: reqwest::Url, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl CodeMailer for WebhookMailer {
    async fn send_code(
        &self,
        destination: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<(), MailError> {
        let message = WebhookMessage {
            to: destination,
            subject: purpose.subject(),
            purpose,
            code,
        };

        let resp = self
            .client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(MailError::Rejected(resp.status().as_u16()));
        }

        debug!(destination, ?purpose, "Code handed to mail relay");
        Ok(())
    }
}

/// Build the mailer selected by `[mail]`.
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn CodeMailer>, ConfigError> {
    match &config.mail {
        MailConfig::Log => Ok(Arc::new(LogMailer)),
        MailConfig::Webhook { timeout_secs, .. } => {
            let raw = config.webhook_url()?;
            let url = reqwest::Url::parse(&raw).map_err(|e| {
                ConfigError::ValidationError(format!("mail webhook url '{}': {}", raw, e))
            })?;
            let mailer = WebhookMailer::new(url, Duration::from_secs(*timeout_secs))
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
            Ok(Arc::new(mailer))
        }
    }
}
