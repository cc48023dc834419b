use axum::{
    extract::Path,
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::error::{api_message, ApiError, ApiResponse};
use crate::handlers::common::crud::{self, Resource};
use crate::middleware::{AuthContext, TenantDb};
use crate::types::de::optional_number;
use crate::types::{PaginationParams, Query};
use crate::utils::query_builder::{PaginatedQuery, SortDirection};
use crate::validation::RequestValidation;
use crate::{validate_field, validate_one_of};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Note {
    pub id: i64,
    /// `patient` or `case`
    pub noteable_type: String,
    pub noteable_id: i64,
    pub content: String,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const NOTE_COLUMNS: &str = "id, noteable_type, noteable_id, content, created_by, created_at, updated_at";

impl Resource for Note {
    const TABLE: &'static str = "notes";
    const COLUMNS: &'static str = NOTE_COLUMNS;
    const NAME: &'static str = "Note";
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListNotesParams {
    pub noteable_type: Option<String>,
    #[serde(default, deserialize_with = "optional_number")]
    pub noteable_id: Option<i64>,
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NoteablePageParams {
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct NoteRequest {
    pub noteable_type: Option<String>,
    pub noteable_id: Option<i64>,
    pub content: Option<String>,
}

impl RequestValidation for NoteRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(noteable_type) = &self.noteable_type {
            validate_one_of!(noteable_type, ["patient", "case"], "The selected noteable type is invalid.");
        }
        if let Some(content) = &self.content {
            validate_field!(content, !content.trim().is_empty(), "The content field is required.");
        }
        Ok(())
    }
}

impl NoteRequest {
    fn validate_create(&self) -> Result<(), ApiError> {
        self.validate()?;
        if self.noteable_type.is_none() {
            return Err(ApiError::field("noteable_type", "The noteable type field is required."));
        }
        if self.noteable_id.is_none() {
            return Err(ApiError::field("noteable_id", "The noteable id field is required."));
        }
        if self.content.is_none() {
            return Err(ApiError::field("content", "The content field is required."));
        }
        Ok(())
    }
}

fn noteable_table(noteable_type: &str) -> Option<&'static str> {
    match noteable_type {
        "patient" => Some("patients"),
        "case" => Some("cases"),
        _ => None,
    }
}

async fn require_noteable(db: &TenantDb, noteable_type: &str, noteable_id: i64) -> Result<(), ApiError> {
    let table = noteable_table(noteable_type)
        .ok_or_else(|| ApiError::field("noteable_type", "The selected noteable type is invalid."))?;
    crud::require_exists(db.pool(), table, noteable_id, "noteable_id", "The selected noteable id is invalid.").await
}

// ============================================================================
// API HANDLERS
// ============================================================================

#[utoipa::path(
    get,
    path = "/api/notes",
    params(ListNotesParams),
    responses((status = 200, description = "Notes retrieved successfully", body = Vec<Note>)),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn list_notes(
    db: TenantDb,
    auth: AuthContext,
    Query(params): Query<ListNotesParams>,
) -> Result<Json<ApiResponse<Vec<Note>>>, ApiError> {
    auth.require_permission("view-notes")?;

    let mut query = PaginatedQuery::new(NOTE_COLUMNS, "FROM notes WHERE deleted_at IS NULL");
    query
        .filter_eq("noteable_type", params.noteable_type.clone())
        .filter_eq("noteable_id", params.noteable_id)
        .filter_search(&["content"], params.search.as_deref())
        .order_by("created_at", SortDirection::Desc);

    let (notes, total) = query.fetch_page::<Note>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(notes, total)
            .with_message("Notes retrieved successfully"),
    ))
}

#[utoipa::path(
    get,
    path = "/api/notes/{noteable_type}/{noteable_id}",
    params(
        ("noteable_type" = String, Path, description = "patient or case"),
        ("noteable_id" = i64, Path, description = "Patient or case ID"),
        NoteablePageParams
    ),
    responses(
        (status = 200, description = "Notes retrieved successfully", body = Vec<Note>),
        (status = 422, description = "Unknown noteable type")
    ),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn notes_for(
    db: TenantDb,
    auth: AuthContext,
    Path((noteable_type, noteable_id)): Path<(String, i64)>,
    Query(params): Query<NoteablePageParams>,
) -> Result<Json<ApiResponse<Vec<Note>>>, ApiError> {
    auth.require_permission("view-notes")?;
    if noteable_table(&noteable_type).is_none() {
        return Err(ApiError::field("noteable_type", "The selected noteable type is invalid."));
    }

    let mut query = PaginatedQuery::new(NOTE_COLUMNS, "FROM notes WHERE deleted_at IS NULL");
    query
        .filter_eq("noteable_type", Some(noteable_type))
        .filter_eq("noteable_id", Some(noteable_id))
        .order_by("created_at", SortDirection::Desc);

    let (notes, total) = query.fetch_page::<Note>(db.pool(), &params.pagination).await?;
    Ok(Json(
        params
            .pagination
            .wrap_response(notes, total)
            .with_message("Notes retrieved successfully"),
    ))
}

#[utoipa::path(
    post,
    path = "/api/notes",
    request_body = NoteRequest,
    responses(
        (status = 201, description = "Note created successfully", body = Note),
        (status = 422, description = "Validation failed")
    ),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn create_note(
    db: TenantDb,
    auth: AuthContext,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Note>>), ApiError> {
    auth.require_permission("create-note")?;
    req.validate_create()?;

    let noteable_type = req.noteable_type.as_deref().unwrap_or_default();
    let noteable_id = req.noteable_id.unwrap_or_default();
    require_noteable(&db, noteable_type, noteable_id).await?;

    let note = sqlx::query_as::<_, Note>(&format!(
        "INSERT INTO notes (noteable_type, noteable_id, content, created_by) VALUES ($1, $2, $3, $4) \
         RETURNING {NOTE_COLUMNS}"
    ))
    .bind(noteable_type)
    .bind(noteable_id)
    .bind(req.content.as_deref().map(str::trim))
    .bind(auth.user_id)
    .fetch_one(db.pool())
    .await?;

    Ok((StatusCode::CREATED, Json(api_message(note, "Note created successfully"))))
}

#[utoipa::path(
    get,
    path = "/api/notes/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note retrieved successfully", body = Note),
        (status = 404, description = "Note not found")
    ),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn get_note(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Note>>, ApiError> {
    auth.require_permission("view-notes")?;
    let note = crud::get_live::<Note>(db.pool(), id).await?;
    Ok(Json(api_message(note, "Note retrieved successfully")))
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    request_body = NoteRequest,
    responses(
        (status = 200, description = "Note updated successfully", body = Note),
        (status = 404, description = "Note not found"),
        (status = 422, description = "Validation failed")
    ),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn update_note(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<ApiResponse<Note>>, ApiError> {
    auth.require_permission("edit-note")?;
    req.validate()?;
    let current = crud::get_live::<Note>(db.pool(), id).await?;

    let noteable_type = req.noteable_type.unwrap_or(current.noteable_type);
    let noteable_id = req.noteable_id.unwrap_or(current.noteable_id);
    require_noteable(&db, &noteable_type, noteable_id).await?;

    let note = sqlx::query_as::<_, Note>(&format!(
        "UPDATE notes SET noteable_type = $2, noteable_id = $3, content = $4, updated_at = NOW() \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {NOTE_COLUMNS}"
    ))
    .bind(id)
    .bind(&noteable_type)
    .bind(noteable_id)
    .bind(req.content.as_deref().map(str::trim).unwrap_or(current.content.as_str()))
    .fetch_one(db.pool())
    .await?;

    Ok(Json(api_message(note, "Note updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/api/notes/{id}",
    params(("id" = i64, Path, description = "Note ID")),
    responses(
        (status = 200, description = "Note deleted successfully"),
        (status = 404, description = "Note not found")
    ),
    tag = "notes",
    security(("bearer_auth" = []))
)]
pub async fn delete_note(
    db: TenantDb,
    auth: AuthContext,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    auth.require_permission("delete-note")?;
    crud::soft_delete::<Note>(db.pool(), id).await?;
    Ok(Json(api_message((), "Note deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noteable_types() {
        assert_eq!(noteable_table("patient"), Some("patients"));
        assert_eq!(noteable_table("case"), Some("cases"));
        assert_eq!(noteable_table("bill"), None);
    }

    #[test]
    fn test_create_requires_target_and_content() {
        let req = NoteRequest {
            noteable_type: Some("patient".to_string()),
            noteable_id: Some(3),
            content: Some("   ".to_string()),
        };
        assert!(req.validate_create().is_err());

        let req = NoteRequest {
            noteable_type: Some("patient".to_string()),
            noteable_id: None,
            content: Some("Allergic to penicillin".to_string()),
        };
        assert!(req.validate_create().is_err());

        let req = NoteRequest {
            noteable_type: Some("case".to_string()),
            noteable_id: Some(3),
            content: Some("Follow up in two weeks".to_string()),
        };
        assert!(req.validate_create().is_ok());
    }
}
