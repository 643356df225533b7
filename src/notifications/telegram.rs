use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use super::{render_message, Notifier, NotifierError};
use crate::auth::RecipientDirectory;
use crate::models::ItemExpiry;

/// Posts the report into a Telegram chat through the bot API.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: Value,
}

impl TelegramNotifier {
    pub fn new(
        api_base_url: &str,
        token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            api_base_url.trim_end_matches('/'),
            token
        );

        // numeric ids go out as numbers, channel handles like "@pantry" as strings
        let chat_id = chat_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(chat_id));

        Ok(Self {
            client,
            endpoint,
            chat_id,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(expired = expired.len(), expiring_soon = expiring_soon.len()))]
    async fn notify_about_items(
        &self,
        expired: &[ItemExpiry],
        expiring_soon: &[ItemExpiry],
        _recipients: &dyn RecipientDirectory,
    ) -> Result<(), NotifierError> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": render_message(expired, expiring_soon),
        });

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        if response.status() != StatusCode::OK {
            return Err(NotifierError::Status {
                service: "Telegram",
                status: response.status(),
            });
        }
        Ok(())
    }
}
