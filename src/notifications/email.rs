use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::{render_text, Notifier, NotifierError, NOTIFICATION_TITLE};
use crate::auth::RecipientDirectory;
use crate::models::ItemExpiry;

const SEND_PATH: &str = "email/3/send";

/// Sends the report through an Infobip-style email HTTP API.
#[derive(Debug, Clone)]
pub struct EmailNotifier {
    client: Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

impl EmailNotifier {
    pub fn new(
        base_url: &str,
        api_key: &str,
        from: &str,
        timeout: Duration,
    ) -> Result<Self, NotifierError> {
        let endpoint = send_endpoint(base_url)
            .map_err(|e| NotifierError::Config(format!("email_api_base_url: {}", e)))?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }

    fn form(&self, text: String, emails: Vec<String>) -> Form {
        emails.into_iter().fold(
            Form::new()
                .text("from", self.from.clone())
                .text("subject", NOTIFICATION_TITLE)
                .text("text", text),
            |form, email| form.text("to", email),
        )
    }
}

/// Appends the send path to the base url, keeping any path prefix the base carries.
fn send_endpoint(base_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(SEND_PATH)
}

#[async_trait]
impl Notifier for EmailNotifier {
    #[instrument(skip_all, fields(expired = expired.len(), expiring_soon = expiring_soon.len()))]
    async fn notify_about_items(
        &self,
        expired: &[ItemExpiry],
        expiring_soon: &[ItemExpiry],
        recipients: &dyn RecipientDirectory,
    ) -> Result<(), NotifierError> {
        let emails = recipients.list_all_emails().await?;
        if emails.is_empty() {
            return Err(NotifierError::NoRecipients);
        }
        debug!(recipients = emails.len(), "sending expiry email");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("App {}", self.api_key))
            .multipart(self.form(render_text(expired, expiring_soon), emails))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(NotifierError::Status {
                service: "email",
                status: response.status(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://api.example.com", "https://api.example.com/email/3/send")]
    #[case("https://api.example.com/", "https://api.example.com/email/3/send")]
    #[case("https://proxy.example.com/infobip", "https://proxy.example.com/infobip/email/3/send")]
    #[case("https://proxy.example.com/infobip/", "https://proxy.example.com/infobip/email/3/send")]
    fn send_endpoint_keeps_base_path(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(send_endpoint(base).unwrap().as_str(), expected);
    }

    #[test]
    fn unparseable_base_is_a_config_error() {
        let result = EmailNotifier::new("not a url", "key", "a@example.com", Duration::from_secs(1));
        assert!(matches!(result, Err(NotifierError::Config(_))));
    }
}
