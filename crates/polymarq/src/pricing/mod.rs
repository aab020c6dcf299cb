pub mod budget;
pub mod quotation;
pub mod sampler;
pub mod search;

pub use budget::resolve_budget_range;
pub use quotation::{quote_in_tx, Quotation, QuotationGenerator, QuotationsRepo};
pub use sampler::{sample_unique_uniform, SampleError};
pub use search::{SearchMode, SearchOrder, SearchOutcome, TechnicianMatch, TechnicianSearch};
