//! Domain operations over the repository contract.

pub mod expiry;
pub mod items;
pub mod locations;

pub use expiry::{classify_expiries, scan_and_notify, ExpiryReport, EXPIRING_SOON_DAYS};
pub use locations::LocationsView;
