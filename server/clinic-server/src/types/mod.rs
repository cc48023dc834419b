pub mod de;
pub mod pagination;
pub mod query;

pub use pagination::{PaginationParams, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use query::Query;
