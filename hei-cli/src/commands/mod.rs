pub mod backends;
pub mod host;
pub mod open;
pub mod plugin;
