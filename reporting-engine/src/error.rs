use chrono::NaiveDate;
use database_layer::DatabaseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("date_to ({to}) must be a date after or equal to date_from ({from})")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for ReportError {
    fn from(err: sqlx::Error) -> Self {
        ReportError::Database(DatabaseError::SqlxError(err))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
