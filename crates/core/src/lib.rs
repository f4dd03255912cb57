pub mod config;
pub mod duration;
pub mod error;
pub mod health;
pub mod secret;

pub use config::Config;
pub use duration::parse_duration;
pub use error::*;
pub use health::{Health, HealthType};
pub use secret::OptionalSecret;
