pub mod item;
pub mod location;
