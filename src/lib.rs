pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod handlers;
pub mod media;
pub mod messages;
pub mod models;
pub mod network;
pub mod notifications;
pub mod posts;
pub mod users;

pub use auth::Session;
pub use core::errors::{Outcome, SocialError, SocialResult};
pub use handlers::{Console, Flow};
pub use models::models::{MediaKind, Partitioned};
pub use network::Network;
