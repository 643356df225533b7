use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::auth::RecipientDirectory;
use crate::errors::ServiceError;
use crate::models::{Item, ItemExpiry};
use crate::notifications::Notifier;
use crate::repositories::Repository;

/// Items with at most this many days left count as expiring soon.
pub const EXPIRING_SOON_DAYS: i64 = 2;

/// Outcome of one expiry scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpiryReport {
    pub expired: Vec<ItemExpiry>,
    pub expiring_soon: Vec<ItemExpiry>,
}

impl ExpiryReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.expiring_soon.is_empty()
    }
}

/// Splits items into expired (negative days left) and expiring soon
/// (0 to [`EXPIRING_SOON_DAYS`] days left). Input order is kept.
pub fn classify_expiries(items: Vec<Item>, now: DateTime<Utc>) -> ExpiryReport {
    let mut report = ExpiryReport::default();
    for item in items {
        let Some(days_left) = item.days_left_at(now) else {
            continue;
        };
        let entry = ItemExpiry { item, days_left };
        if days_left < 0 {
            report.expired.push(entry);
        } else if days_left <= EXPIRING_SOON_DAYS {
            report.expiring_soon.push(entry);
        }
    }
    report
}

/// Scans every item and hands anything needing attention to `notifier`.
#[instrument(skip_all)]
pub async fn scan_and_notify(
    repo: &dyn Repository,
    notifier: &dyn Notifier,
    recipients: &dyn RecipientDirectory,
) -> Result<ExpiryReport, ServiceError> {
    let items = repo
        .get_items(None, None)
        .await
        .map_err(|e| ServiceError::storage("get items", e))?;

    let report = classify_expiries(items, Utc::now());
    if report.is_empty() {
        info!("No expired or expiring items, nothing to send");
        return Ok(report);
    }

    info!(
        expired = report.expired.len(),
        expiring_soon = report.expiring_soon.len(),
        "Sending expiry notification"
    );
    notifier
        .notify_about_items(&report.expired, &report.expiring_soon, recipients)
        .await?;
    Ok(report)
}
