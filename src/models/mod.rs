//! Domain data structures shared by the services, repositories and handlers.

pub mod item;
pub mod location;

pub use item::{Item, ItemExpiry, WriteItemParams};
pub use location::{Location, LocationWrite};
