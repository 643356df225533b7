//! Delivery channels for the expiry report.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::auth::{AuthError, RecipientDirectory};
use crate::config::AppConfig;
use crate::models::ItemExpiry;

pub mod email;
pub mod telegram;
pub mod terminal;

pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;
pub use terminal::TerminalNotifier;

/// Title line shared by every channel.
pub const NOTIFICATION_TITLE: &str = "Pantry: items that need your attention";

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} API responded with {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("no recipient emails available")]
    NoRecipients,

    #[error("recipient lookup failed: {0}")]
    Directory(String),

    #[error("invalid notifier configuration: {0}")]
    Config(String),

    #[error("terminal output failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AuthError> for NotifierError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NoRecipients => NotifierError::NoRecipients,
            other => NotifierError::Directory(other.to_string()),
        }
    }
}

/// A channel able to deliver the two expiry buckets.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_about_items(
        &self,
        expired: &[ItemExpiry],
        expiring_soon: &[ItemExpiry],
        recipients: &dyn RecipientDirectory,
    ) -> Result<(), NotifierError>;
}

/// Renders both buckets as plain text.
pub fn render_text(expired: &[ItemExpiry], expiring_soon: &[ItemExpiry]) -> String {
    let mut text = String::from("EXPIRED ITEMS\n-------------\n");
    for exp in expired {
        let _ = writeln!(
            text,
            "{} is {} day(s) overdue",
            exp.item.name,
            exp.days_left.unsigned_abs()
        );
    }

    text.push('\n');

    text.push_str("ITEMS ABOUT TO EXPIRE\n---------------------\n");
    for exp in expiring_soon {
        let _ = writeln!(text, "{} has {} day(s) left", exp.item.name, exp.days_left);
    }
    text
}

/// Title, blank line, then the rendered buckets.
pub fn render_message(expired: &[ItemExpiry], expiring_soon: &[ItemExpiry]) -> String {
    format!(
        "{}\n\n{}",
        NOTIFICATION_TITLE,
        render_text(expired, expiring_soon)
    )
}

/// Picks the channel: email when its API base URL is set, Telegram when a token
/// is set, the terminal otherwise.
pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotifierError> {
    let timeout = config.notify_timeout();

    if let Some(base_url) = non_empty(&config.email_api_base_url) {
        let api_key = non_empty(&config.email_api_key)
            .ok_or_else(|| NotifierError::Config("email_api_key is required".into()))?;
        let from = non_empty(&config.email_from)
            .ok_or_else(|| NotifierError::Config("email_from is required".into()))?;
        info!("Using email notifier");
        return Ok(Arc::new(EmailNotifier::new(base_url, api_key, from, timeout)?));
    }

    if let Some(token) = non_empty(&config.telegram_token) {
        let chat_id = non_empty(&config.telegram_chat_id)
            .ok_or_else(|| NotifierError::Config("telegram_chat_id is required".into()))?;
        info!("Using Telegram notifier");
        return Ok(Arc::new(TelegramNotifier::new(
            &config.telegram_api_base_url,
            token,
            chat_id,
            timeout,
        )?));
    }

    info!("Using terminal notifier");
    Ok(Arc::new(TerminalNotifier))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::fixtures::item;

    fn expiry(name: &str, days_left: i64) -> ItemExpiry {
        ItemExpiry {
            item: item(name, name, None),
            days_left,
        }
    }

    #[test]
    fn text_lists_both_sections() {
        let text = render_text(&[expiry("Milk", -3)], &[expiry("Bread", 1)]);
        assert_eq!(
            text,
            "EXPIRED ITEMS\n-------------\nMilk is 3 day(s) overdue\n\n\
             ITEMS ABOUT TO EXPIRE\n---------------------\nBread has 1 day(s) left\n"
        );
    }

    #[test]
    fn message_starts_with_title() {
        let message = render_message(&[], &[expiry("Bread", 0)]);
        assert!(message.starts_with("Pantry: items that need your attention\n\nEXPIRED ITEMS"));
        assert!(message.ends_with("Bread has 0 day(s) left\n"));
    }

    #[test]
    fn notifier_selection_follows_config() {
        let mut cfg = AppConfig::default();
        assert!(build_notifier(&cfg).is_ok());

        cfg.telegram_token = Some("123:abc".into());
        assert!(matches!(build_notifier(&cfg), Err(NotifierError::Config(_))));
        cfg.telegram_chat_id = Some("42".into());
        assert!(build_notifier(&cfg).is_ok());

        cfg.email_api_base_url = Some("https://mail.example.com".into());
        assert!(matches!(build_notifier(&cfg), Err(NotifierError::Config(_))));
        cfg.email_api_key = Some("key".into());
        cfg.email_from = Some("pantry@example.com".into());
        assert!(build_notifier(&cfg).is_ok());
    }
}
