//! Query string extractor answering malformed parameters with the JSON
//! validation envelope instead of axum's plain-text 400.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use std::ops::Deref;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

impl<T> Deref for Query<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        axum::extract::Query::<T>::try_from_uri(&parts.uri)
            .map(|axum::extract::Query(value)| Query(value))
            .map_err(|rejection| ApiError::validation(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::de::optional_date;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Range {
        #[serde(default, deserialize_with = "optional_date")]
        date_from: Option<NaiveDate>,
    }

    async fn extract(uri: &str) -> Result<Query<Range>, ApiError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        Query::<Range>::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_blank_date_is_absent() {
        assert_eq!(extract("/bills?date_from=").await.unwrap().date_from, None);
        assert_eq!(
            extract("/bills?date_from=2024-03-01").await.unwrap().date_from,
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[tokio::test]
    async fn test_malformed_date_is_a_validation_error() {
        let err = extract("/bills?date_from=2024-13-40").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("invalid date"));
    }
}
