pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod jobs;
pub mod maintenance;
pub mod money;
pub mod notifications;
pub mod payments;
pub mod pings;
pub mod pricing;
pub mod users;

pub use error::{ErrorCode, MarketError};
pub use money::Money;
