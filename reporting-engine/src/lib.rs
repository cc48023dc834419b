//! Reporting layer for the clinic engine.
//!
//! Every report is a parameterized aggregate over one tenant database,
//! restricted by a [`ReportFilter`]: an inclusive date range, a grouping
//! [`Period`] for trends and a [`DoctorScope`] coming from the caller's
//! role. Soft-deleted rows never count.
//!
//! ```rust,no_run
//! use reporting_engine::{DoctorScope, Period, ReportFilter, ReportsRepository};
//!
//! # async fn run(pool: sqlx::PgPool) -> reporting_engine::ReportResult<()> {
//! let filter = ReportFilter::new(None, None)?
//!     .with_period(Period::Week)
//!     .with_scope(DoctorScope::Doctor(12));
//! let trend = ReportsRepository::new(pool).cases_trend(&filter).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod filter;
pub mod models;
mod queries;
pub mod repository;
pub mod stats;

pub use error::*;
pub use filter::{DoctorScope, Period, ReportFilter};
pub use models::*;
pub use repository::{profit_loss_of, ReportsRepository};
