//! Image metadata attached to patients, cases and other records.
//!
//! Files live on a storage disk; rows here only carry the path and
//! descriptive fields. `url` is derived from the path on the way out.

use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::types::de::optional_number;
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_length, validate_one_of};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Image {
    pub id: i64,
    pub path: String,
    pub disk: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
    #[sqlx(rename = "sort_order")]
    pub order: i32,
    pub imageable_type: String,
    pub imageable_id: i64,
    #[sqlx(skip)]
    #[serde(default)]
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    fn with_url(mut self) -> Self {
        self.url = image_url(&self.path);
        self
    }
}

const IMAGE_COLUMNS: &str = "id, path, disk, type, mime_type, size, width, height, alt_text, sort_order, \
     imageable_type, imageable_id, created_at, updated_at";

impl Resource for Image {
    const TABLE: &'static str = "images";
    const COLUMNS: &'static str = IMAGE_COLUMNS;
    const NAME: &'static str = "Image";
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImageStatistics {
    pub total_images: i64,
    pub total_size_bytes: i64,
    #[schema(value_type = f64)]
    pub total_size_mb: Decimal,
    pub by_type: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListImagesParams {
    pub imageable_type: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub imageable_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ImageableParams {
    pub imageable_type: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub imageable_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ImageRequest {
    pub path: Option<String>,
    pub disk: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
    pub order: Option<i32>,
    pub imageable_type: Option<String>,
    pub imageable_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImageOrderRequest {
    pub order: i32,
}

impl RequestValidation for ImageRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(path) = &self.path {
            validate_length!(path, 1, 2048, "The path may not be greater than 2048 characters.");
        }
        if let Some(kind) = &self.kind {
            validate_one_of!(
                kind,
                ["profile", "document", "xray", "before", "after", "treatment", "prescription", "other"],
                "The selected type is invalid."
            );
        }
        if let Some(imageable_type) = &self.imageable_type {
            validate_field!(
                imageable_type,
                imageable_table(imageable_type).is_some(),
                "The selected imageable type is invalid."
            );
        }
        if let Some(alt_text) = &self.alt_text {
            validate_field!(
                alt_text,
                alt_text.chars().count() <= 255,
                "The alt text may not be greater than 255 characters."
            );
        }
        if let Some(order) = self.order {
            validate_field!(order, order >= 0, "The order must be at least 0.");
        }
        if let Some(size) = self.size {
            validate_field!(size, size >= 0, "The size must be at least 0.");
        }
        Ok(())
    }
}

impl ImageRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.path.is_none() {
            return Err(ApiError::field("path", "The path field is required."));
        }
        if self.imageable_type.is_none() {
            return Err(ApiError::field("imageable_type", "The imageable type field is required."));
        }
        if self.imageable_id.is_none() {
            return Err(ApiError::field("imageable_id", "The imageable id field is required."));
        }
        Ok(())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Public URL of a stored file; absolute URLs pass through
pub fn image_url(path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("/storage/{}", path.trim_start_matches('/'))
    }
}

fn imageable_table(imageable_type: &str) -> Option<&'static str> {
    match imageable_type {
        "Patient" => Some("patients"),
        "Case" => Some("cases"),
        "User" => Some("users"),
        "Reservation" => Some("reservations"),
        "Recipe" => Some("recipes"),
        _ => None,
    }
}

async fn require_imageable(db: &TenantDb, imageable_type: &str, imageable_id: i64) -> Result<(), ApiError> {
    let table = imageable_table(imageable_type)
        .ok_or_else(|| ApiError::field("imageable_type", "The selected imageable type is invalid."))?;
    crud::require_exists(db.pool(), table, imageable_id, "imageable_id", "The selected imageable id is invalid.").await
}

fn size_in_mb(bytes: i64) -> Decimal {
    (Decimal::from(bytes) / Decimal::from(1024 * 1024)).round_dp(2)
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/images",
    params(ListImagesParams),
    responses((status = 200, description = "Images retrieved successfully", body = Vec<Image>)),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn list_images(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListImagesParams>,
) -> Result<Json<ApiResponse<Vec<Image>>>, ApiError> {
    auth.require_permission("view-images")?;

    let mut query = PaginatedQuery::new(IMAGE_COLUMNS, "FROM images WHERE deleted_at IS NULL");
    query
        .filter_eq("imageable_type", params.imageable_type.clone())
        .filter_eq("imageable_id", params.imageable_id)
        .filter_eq("type", params.kind.clone())
        .order_by("created_at", SortDirection::Desc);

    let (images, total) = query.fetch_page::<Image>(db.pool(), &params.pagination).await?;
    let images = images.into_iter().map(Image::with_url).collect();
    Ok(Json(
        params
            .pagination
            .wrap_response(images, total)
            .with_message("Images retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/images/by-imageable",
    params(ImageableParams),
    responses(
        (status = 200, description = "Images retrieved successfully", body = Vec<Image>),
        (status = 422, description = "Missing or unknown imageable")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn images_by_imageable(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ImageableParams>,
) -> Result<Json<ApiResponse<Vec<Image>>>, ApiError> {
    auth.require_permission("view-images")?;
    let imageable_type = params
        .imageable_type
        .ok_or_else(|| ApiError::field("imageable_type", "The imageable type field is required."))?;
    let imageable_id = params
        .imageable_id
        .ok_or_else(|| ApiError::field("imageable_id", "The imageable id field is required."))?;
    if imageable_table(&imageable_type).is_none() {
        return Err(ApiError::field("imageable_type", "The selected imageable type is invalid."));
    }

    let images = sqlx::query_as::<_, Image>(&format!(
        "SELECT {IMAGE_COLUMNS} FROM images \
         WHERE deleted_at IS NULL AND imageable_type = $1 AND imageable_id = $2 \
         ORDER BY sort_order, id"
    ))
    .bind(&imageable_type)
    .bind(imageable_id)
    .fetch_all(db.pool())
    .await?;

    let images = images.into_iter().map(Image::with_url).collect();
    Ok(Json(api_message(images, "Images retrieved successfully")))
}

#[utoipa::path(
    get,
    path = "/api/images/statistics",
    responses((status = 200, description = "Statistics retrieved successfully", body = ImageStatistics)),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn image_statistics(db: TenantDb, auth: AuthContext) -> Result<Json<ApiResponse<ImageStatistics>>, ApiError> {
    auth.require_permission("view-images")?;

    let (total_images, total_size_bytes): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(size), 0)::BIGINT FROM images WHERE deleted_at IS NULL")
            .fetch_one(db.pool())
            .await?;
    let by_type: Vec<(String, i64)> = sqlx::query_as(
        "SELECT COALESCE(type, 'other'), COUNT(*) FROM images WHERE deleted_at IS NULL GROUP BY 1 ORDER BY 1",
    )
    .fetch_all(db.pool())
    .await?;

    let statistics = ImageStatistics {
        total_images,
        total_size_bytes,
        total_size_mb: size_in_mb(total_size_bytes),
        by_type: by_type.into_iter().collect(),
    };
    Ok(Json(api_message(statistics, "Statistics retrieved successfully")))
}

#[utoipa::path(
    post,
    path = "/api/images",
    request_body = ImageRequest,
    responses(
        (status = 201, description = "Image uploaded successfully", body = Image),
        (status = 422, description = "Validation failed")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn create_image(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<ImageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Image>>), ApiError> {
    auth.require_permission("create-image")?;
    req.validate_create()?;

    let imageable_type = req.imageable_type.as_deref().unwrap_or_default();
    let imageable_id = req.imageable_id.unwrap_or_default();
    require_imageable(&db, imageable_type, imageable_id).await?;

    let image = sqlx::query_as::<_, Image>(&format!(
        r#"
        INSERT INTO images
            (path, disk, type, mime_type, size, width, height, alt_text, sort_order, imageable_type, imageable_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {IMAGE_COLUMNS}
        "#
    ))
    .bind(&req.path)
    .bind(req.disk.as_deref().unwrap_or("public"))
    .bind(&req.kind)
    .bind(&req.mime_type)
    .bind(req.size)
    .bind(req.width)
    .bind(req.height)
    .bind(&req.alt_text)
    .bind(req.order.unwrap_or(0))
    .bind(imageable_type)
    .bind(imageable_id)
    .fetch_one(db.pool())
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(api_message(image.with_url(), "Image uploaded successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/api/images/{id}",
    params(("id" = i64, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image retrieved successfully", body = Image),
        (status = 404, description = "Image not found")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn get_image(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Image>>, ApiError> {
    auth.require_permission("view-images")?;
    let image = crud::get_live::<Image>(db.pool(), id).await?;
    Ok(Json(api_message(image.with_url(), "Image retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/images/{id}",
    params(("id" = i64, Path, description = "Image ID")),
    request_body = ImageRequest,
    responses(
        (status = 200, description = "Image updated successfully", body = Image),
        (status = 404, description = "Image not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn update_image(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<ImageRequest>,
) -> Result<Json<ApiResponse<Image>>, ApiError> {
    auth.require_permission("edit-image")?;
    req.validate()?;
    let current = crud::get_live::<Image>(db.pool(), id).await?;

    let imageable_type = req.imageable_type.unwrap_or(current.imageable_type);
    let imageable_id = req.imageable_id.unwrap_or(current.imageable_id);
    require_imageable(&db, &imageable_type, imageable_id).await?;

    let image = sqlx::query_as::<_, Image>(&format!(
        r#"
        UPDATE images SET
            path = $2, disk = $3, type = $4, mime_type = $5, size = $6, width = $7, height = $8,
            alt_text = $9, sort_order = $10, imageable_type = $11, imageable_id = $12, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING {IMAGE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(req.path.unwrap_or(current.path))
    .bind(req.disk.unwrap_or(current.disk))
    .bind(req.kind.or(current.kind))
    .bind(req.mime_type.or(current.mime_type))
    .bind(req.size.or(current.size))
    .bind(req.width.or(current.width))
    .bind(req.height.or(current.height))
    .bind(req.alt_text.or(current.alt_text))
    .bind(req.order.unwrap_or(current.order))
    .bind(&imageable_type)
    .bind(imageable_id)
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(image.with_url(), "Image updated successfully")))
}

#[utoipa::path(
    patch,
    path = "/api/images/{id}/order",
    params(("id" = i64, Path, description = "Image ID")),
    request_body = ImageOrderRequest,
    responses(
        (status = 200, description = "Image order updated successfully", body = Image),
        (status = 404, description = "Image not found"),
        (status = 422, description = "Negative order")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn update_image_order(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<ImageOrderRequest>,
) -> Result<Json<ApiResponse<Image>>, ApiError> {
    auth.require_permission("edit-image")?;
    validate_field!(req.order, req.order >= 0, "The order must be at least 0.");
    crud::get_live::<Image>(db.pool(), id).await?;

    let image = sqlx::query_as::<_, Image>(&format!(
        "UPDATE images SET sort_order = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL \
         RETURNING {IMAGE_COLUMNS}"
    ))
    .bind(id)
    .bind(req.order)
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(image.with_url(), "Image order updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/images/{id}",
    params(("id" = i64, Path, description = "Image ID")),
    responses(
        (status = 200, description = "Image deleted successfully"),
        (status = 404, description = "Image not found")
    ),
    tag = "images",
    security(("bearer_auth" = []))
)]
pub async fn delete_image(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-image")?;
    crud::soft_delete::<Image>(db.pool(), id).await?;
    Ok(Json(api_message((), "Image deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url() {
        assert_eq!(image_url("patients/3/xray.png"), "/storage/patients/3/xray.png");
        assert_eq!(image_url("/patients/3/xray.png"), "/storage/patients/3/xray.png");
        assert_eq!(image_url("https://cdn.test/a.png"), "https://cdn.test/a.png");
    }

    #[test]
    fn test_size_in_mb_rounds_to_two_places() {
        assert_eq!(size_in_mb(0), Decimal::ZERO);
        assert_eq!(size_in_mb(1_572_864), Decimal::new(150, 2));
        assert_eq!(size_in_mb(1_000_000), Decimal::new(95, 2));
    }

    #[test]
    fn test_request_rules() {
        let req = ImageRequest {
            path: Some("a.png".to_string()),
            imageable_type: Some("Bill".to_string()),
            imageable_id: Some(1),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());

        let req = ImageRequest {
            path: Some("a.png".to_string()),
            kind: Some("selfie".to_string()),
            imageable_type: Some("Patient".to_string()),
            imageable_id: Some(1),
            ..Default::default()
        };
        assert!(req.validate_create().is_err());

        let req = ImageRequest {
            path: Some("a.png".to_string()),
            kind: Some("xray".to_string()),
            order: Some(2),
            imageable_type: Some("Case".to_string()),
            imageable_id: Some(1),
            ..Default::default()
        };
        assert!(req.validate_create().is_ok());
    }

    #[test]
    fn test_type_field_name() {
        let req: ImageRequest = serde_json::from_str(r#"{"type":"before","order":1}"#).unwrap();
        assert_eq!(req.kind.as_deref(), Some("before"));
    }
}
