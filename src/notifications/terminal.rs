use async_trait::async_trait;
use std::io::Write;

use super::{render_message, Notifier, NotifierError};
use crate::auth::RecipientDirectory;
use crate::models::ItemExpiry;

/// Prints the report to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

#[async_trait]
impl Notifier for TerminalNotifier {
    async fn notify_about_items(
        &self,
        expired: &[ItemExpiry],
        expiring_soon: &[ItemExpiry],
        _recipients: &dyn RecipientDirectory,
    ) -> Result<(), NotifierError> {
        let message = render_message(expired, expiring_soon);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(message.as_bytes())?;
        stdout.flush()?;
        Ok(())
    }
}
