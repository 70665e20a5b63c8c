// src/handlers/product_type.rs
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Extension, Json,
};
use sqlx::PgPool;
use tracing::{error, info, instrument};

use super::images::ImageChange;
use super::validate_name;
use crate::dtos::product_type::{ProductTypeForm, ProductTypeResponse};
use crate::dtos::upload::FormData;
use crate::error::{map_unique_violation, AppError};
use crate::media::PRODUCT_TYPE_IMAGE_DIR;
use crate::middleware::auth::AuthContext;
use crate::models::product_type::ProductType;
use crate::state::AppState;

const DUPLICATE_NAME: &str = "Product Type with this name already exists.";

pub(crate) async fn fetch_product_type(pool: &PgPool, id: i64) -> Result<ProductType, AppError> {
    sqlx::query_as::<_, ProductType>(
        "SELECT id, name, description, header, header_description, image
         FROM product_type WHERE id = $1"
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Product type not found"))
}

async fn name_taken(pool: &PgPool, name: &str, except_id: Option<i64>) -> Result<bool, AppError> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM product_type WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))"
    )
    .bind(name)
    .bind(except_id)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

// GET /product-types/ - List all product types
#[instrument(skip(state))]
pub async fn list_product_types(State(state): State<AppState>) -> Result<Json<Vec<ProductTypeResponse>>, AppError> {
    match sqlx::query_as::<_, ProductType>(
        "SELECT id, name, description, header, header_description, image
         FROM product_type ORDER BY id"
    )
        .fetch_all(&state.db_pool)
        .await {
        Ok(rows) => {
            let response = rows
                .into_iter()
                .map(|pt| ProductTypeResponse::from_model(pt, &state.media))
                .collect();
            Ok(Json(response))
        }
        Err(e) => {
            error!(?e, "Failed to fetch product types");
            Err(e.into())
        }
    }
}

// GET /product-types/:id/ - Get single product type
#[instrument(skip(state))]
pub async fn get_product_type(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ProductTypeResponse>, AppError> {
    let product_type = fetch_product_type(&state.db_pool, id).await?;
    Ok(Json(ProductTypeResponse::from_model(product_type, &state.media)))
}

// POST /product-types/ - Create product type (multipart)
#[instrument(skip(state, multipart))]
pub async fn create_product_type(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductTypeResponse>), AppError> {
    let form = ProductTypeForm::from(FormData::read(multipart).await?);
    let name = validate_name(form.name.as_deref())?;

    if name_taken(&state.db_pool, &name, None).await? {
        return Err(AppError::validation(DUPLICATE_NAME));
    }

    let image = match &form.image {
        Some(upload) => Some(
            state.media
                .save(PRODUCT_TYPE_IMAGE_DIR, &name, &upload.file_name, &upload.bytes, None)
                .await?,
        ),
        None => None,
    };

    let inserted = sqlx::query_as::<_, ProductType>(
        "INSERT INTO product_type (name, description, header, header_description, image)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id, name, description, header, header_description, image"
    )
    .bind(&name)
    .bind(form.description.flatten())
    .bind(form.header.flatten())
    .bind(form.header_description.flatten())
    .bind(&image)
    .fetch_one(&state.db_pool)
    .await;

    let product_type = match inserted {
        Ok(pt) => pt,
        Err(e) => {
            if let Some(path) = &image {
                state.media.remove_quietly(path).await;
            }
            return Err(map_unique_violation(e, DUPLICATE_NAME));
        }
    };

    info!(id = product_type.id, user_id = auth.user_id, user = %auth.username, "Product type created");
    Ok((StatusCode::CREATED, Json(ProductTypeResponse::from_model(product_type, &state.media))))
}

// PUT/PATCH /product-types/:id/ - Update product type (multipart)
#[instrument(skip(state, multipart))]
pub async fn update_product_type(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<Json<ProductTypeResponse>, AppError> {
    let form = ProductTypeForm::from(FormData::read(multipart).await?);
    let existing = fetch_product_type(&state.db_pool, id).await?;

    let name = match form.name.as_deref() {
        Some(raw) => validate_name(Some(raw))?,
        None => existing.name.clone(),
    };
    let name_changed = name != existing.name;
    if name_changed && name_taken(&state.db_pool, &name, Some(id)).await? {
        return Err(AppError::validation(DUPLICATE_NAME));
    }

    let change = ImageChange::prepare(
        &state.media,
        PRODUCT_TYPE_IMAGE_DIR,
        existing.image.as_deref(),
        name_changed,
        &name,
        form.image.as_ref(),
    )
    .await?;

    let updated = sqlx::query_as::<_, ProductType>(
        "UPDATE product_type SET
         name = $1, description = $2, header = $3, header_description = $4, image = $5
         WHERE id = $6
         RETURNING id, name, description, header, header_description, image"
    )
    .bind(&name)
    .bind(form.description.unwrap_or(existing.description))
    .bind(form.header.unwrap_or(existing.header))
    .bind(form.header_description.unwrap_or(existing.header_description))
    .bind(change.stored_path(existing.image.as_deref()))
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await;

    let product_type = match updated {
        Ok(Some(pt)) => pt,
        Ok(None) => {
            change.rollback(&state.media).await;
            return Err(AppError::not_found("Product type not found"));
        }
        Err(e) => {
            change.rollback(&state.media).await;
            return Err(map_unique_violation(e, DUPLICATE_NAME));
        }
    };
    change.commit(&state.media).await;

    info!(id, user_id = auth.user_id, user = %auth.username, "Product type updated");
    Ok(Json(ProductTypeResponse::from_model(product_type, &state.media)))
}

// DELETE /product-types/:id/ - Delete product type, its products and their images
#[instrument(skip(state))]
pub async fn delete_product_type(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    // Collected before the cascade removes the rows.
    let product_images = sqlx::query_scalar::<_, String>(
        "SELECT image FROM product WHERE product_type_id = $1 AND image IS NOT NULL"
    )
    .bind(id)
    .fetch_all(&state.db_pool)
    .await?;

    let deleted = sqlx::query_scalar::<_, Option<String>>(
        "DELETE FROM product_type WHERE id = $1 RETURNING image"
    )
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Product type not found"))?;

    for path in deleted.iter().chain(product_images.iter()) {
        state.media.remove_quietly(path).await;
    }

    info!(id, user_id = auth.user_id, user = %auth.username, cascaded_images = product_images.len(), "Product type deleted");
    Ok(StatusCode::NO_CONTENT)
}
