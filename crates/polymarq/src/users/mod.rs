pub mod model;
pub mod repo;

pub use model::{NewUser, Principal, User};
pub use repo::UsersRepo;
