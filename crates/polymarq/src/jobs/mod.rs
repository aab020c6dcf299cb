pub mod model;
pub mod repo;

pub use model::{Job, JobFilter, JobScope, JobStatus, JobUpdate, NewJob, SortOrder};
pub use repo::JobsRepo;
