//! Pagination types and utilities for consistent pagination across all endpoints

use crate::error::{ApiResponse, PaginationInfo, ResponseMetadata};
use crate::types::de::optional_number;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_PER_PAGE: u32 = 15;
pub const MAX_PER_PAGE: u32 = 100;

/// Standard pagination parameters for list endpoints
#[derive(Debug, Deserialize, IntoParams, ToSchema, Clone, Default)]
pub struct PaginationParams {
    #[param(example = 1, minimum = 1)]
    #[serde(default, deserialize_with = "optional_number")]
    pub page: Option<u32>,

    #[param(example = 15, minimum = 1, maximum = 100)]
    #[serde(default, alias = "page_size", deserialize_with = "optional_number")]
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Get the page number (defaults to 1, minimum 1)
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Get the page size (defaults to 15, clamped between 1 and 100)
    pub fn per_page(&self) -> u32 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    /// Calculate the offset for SQL queries
    pub fn offset(&self) -> i64 {
        (i64::from(self.page()) - 1) * i64::from(self.per_page())
    }

    /// Get the limit for SQL queries
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// Calculate total pages given a total count
    pub fn total_pages(&self, total_count: i64) -> u32 {
        if total_count <= 0 {
            return 1;
        }
        let per_page = i64::from(self.per_page());
        u32::try_from((total_count + per_page - 1) / per_page).unwrap_or(u32::MAX)
    }

    /// Create response metadata with pagination info
    pub fn to_metadata(&self, total_count: i64) -> ResponseMetadata {
        let total_pages = self.total_pages(total_count);

        ResponseMetadata {
            pagination: Some(PaginationInfo {
                page: self.page(),
                per_page: self.per_page(),
                total_pages,
                has_next: self.page() < total_pages,
                has_previous: self.page() > 1,
            }),
            total_count: Some(total_count),
            request_id: None,
        }
    }

    /// Wrap data with pagination metadata
    pub fn wrap_response<T>(&self, data: T, total_count: i64) -> ApiResponse<T> {
        crate::error::api_success_with_meta(data, self.to_metadata(total_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let params = PaginationParams::default();
        assert_eq!(params.page(), 1);
        assert_eq!(params.per_page(), 15);
    }

    #[test]
    fn test_pagination_offset() {
        let params = PaginationParams::new(3, 10);
        assert_eq!(params.offset(), 20);
        assert_eq!(params.limit(), 10);
    }

    #[test]
    fn test_per_page_is_clamped() {
        assert_eq!(PaginationParams::new(1, 500).per_page(), 100);
        assert_eq!(PaginationParams::new(0, 0).per_page(), 1);
        assert_eq!(PaginationParams::new(0, 0).page(), 1);
    }

    #[test]
    fn test_total_pages() {
        let params = PaginationParams::new(1, 20);
        assert_eq!(params.total_pages(100), 5);
        assert_eq!(params.total_pages(101), 6);
        assert_eq!(params.total_pages(0), 1);
    }

    #[test]
    fn test_page_size_alias() {
        let params: PaginationParams = serde_json::from_str(r#"{"page":"2","page_size":"30"}"#).unwrap();
        assert_eq!(params.page(), 2);
        assert_eq!(params.per_page(), 30);
    }

    #[test]
    fn test_metadata_flags() {
        let meta = PaginationParams::new(2, 10).to_metadata(25);
        let info = meta.pagination.unwrap();
        assert_eq!(info.total_pages, 3);
        assert!(info.has_next);
        assert!(info.has_previous);
    }
}
