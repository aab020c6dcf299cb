pub mod dispatcher;
pub mod model;
pub mod repo;

pub use dispatcher::{Notifier, PgNotifier, SharedNotifier};
pub use model::{Notification, NotificationType};
pub use repo::NotificationsRepo;
