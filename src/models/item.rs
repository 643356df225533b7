use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::location::Location;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// A tracked physical object with optional expiry metadata and location assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub tags: Vec<String>,
    /// Minor currency units.
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub bought_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Days of usable life after opening.
    pub lifespan: Option<i64>,
    pub location_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Box<Location>>,
}

/// Input projection of [`Item`] used for creation and full replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WriteItemParams {
    #[validate(length(min = 2))]
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub tags: Vec<String>,
    #[validate(range(min = 0))]
    pub price: Option<i64>,
    #[validate(url)]
    pub image_url: Option<String>,
    pub bought_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 0))]
    pub lifespan: Option<i64>,
    pub location_id: Option<String>,
}

impl Item {
    /// Builds a stored item from validated write parameters.
    pub fn from_params(id: impl Into<String>, params: WriteItemParams) -> Self {
        Self {
            id: id.into(),
            name: params.name,
            item_type: params.item_type,
            tags: params.tags,
            price: params.price,
            image_url: params.image_url,
            bought_at: params.bought_at,
            opened_at: params.opened_at,
            expires_at: params.expires_at,
            lifespan: params.lifespan,
            location_id: params.location_id,
            location: None,
        }
    }

    /// Replaces every writable field, keeping the id.
    pub fn apply(&mut self, params: WriteItemParams) {
        let id = std::mem::take(&mut self.id);
        *self = Self::from_params(id, params);
    }

    /// Point in time at which the item runs out after being opened.
    pub fn lifespan_ends_at(&self) -> Option<DateTime<Utc>> {
        let opened_at = self.opened_at?;
        let lifespan = Duration::try_days(self.lifespan?)?;
        opened_at.checked_add_signed(lifespan)
    }

    /// Signed number of days until the most urgent expiry boundary, rounded up.
    ///
    /// Both the absolute `expires_at` and the lifespan after opening are considered;
    /// when both apply the smaller count wins. `None` means the item never expires.
    pub fn days_left_at(&self, now: DateTime<Utc>) -> Option<i64> {
        let absolute = self.expires_at.map(|at| ceil_days(at - now));
        let after_opening = self.lifespan_ends_at().map(|at| ceil_days(at - now));

        match (absolute, after_opening) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn days_left(&self) -> Option<i64> {
        self.days_left_at(Utc::now())
    }
}

fn ceil_days(span: Duration) -> i64 {
    let millis = span.num_milliseconds();
    let days = millis.div_euclid(DAY_MILLIS);
    if millis.rem_euclid(DAY_MILLIS) == 0 {
        days
    } else {
        days + 1
    }
}

/// An item paired with its computed days until expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemExpiry {
    pub item: Item,
    pub days_left: i64,
}
