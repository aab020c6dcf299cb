pub mod machine;
pub mod model;
pub mod repo;
pub mod service;

pub use machine::{plan_response, recommend_budget, PingEffect};
pub use model::{BudgetRecommendation, NewPing, Ping, PingStatus};
pub use repo::PingsRepo;
pub use service::{PingReply, PingService};
