// src/handlers/product.rs
use axum::{
    extract::{Multipart, OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use super::images::ImageChange;
use super::validate_name;
use crate::dtos::pagination::{PageWindow, PAGE_SIZE};
use crate::dtos::product::{ProductFilters, ProductForm, ProductListParams, ProductResponse};
use crate::dtos::upload::FormData;
use crate::error::{map_unique_violation, AppError};
use crate::media::PRODUCT_IMAGE_DIR;
use crate::middleware::auth::AuthContext;
use crate::models::product::{Product, ProductWithType, SELECT_PRODUCT_WITH_TYPE};
use crate::state::AppState;

const DUPLICATE_NAME: &str = "Product with this name already exists.";

fn unknown_product_type(id: i64) -> AppError {
    AppError::validation(format!("Product type with id {id} does not exist."))
}

/// Unique violations become the duplicate-name error, a foreign key
/// violation (type deleted meanwhile) the unknown-type error.
fn map_write_error(err: sqlx::Error, product_type_id: i64) -> AppError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23503") {
            return unknown_product_type(product_type_id);
        }
    }
    map_unique_violation(err, DUPLICATE_NAME)
}

async fn fetch_product(pool: &PgPool, id: i64) -> Result<ProductWithType, AppError> {
    sqlx::query_as::<_, ProductWithType>(&format!("{SELECT_PRODUCT_WITH_TYPE} WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))
}

async fn name_taken(pool: &PgPool, name: &str, except_id: Option<i64>) -> Result<bool, AppError> {
    let taken = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM product WHERE name = $1 AND ($2::BIGINT IS NULL OR id <> $2))"
    )
    .bind(name)
    .bind(except_id)
    .fetch_one(pool)
    .await?;
    Ok(taken)
}

async fn ensure_product_type(pool: &PgPool, id: i64) -> Result<(), AppError> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM product_type WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await?;
    if exists { Ok(()) } else { Err(unknown_product_type(id)) }
}

/// Escapes LIKE metacharacters so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ProductFilters) {
    for id in &filters.product_type_ids {
        qb.push(" AND p.product_type_id = ").push_bind(*id);
    }
    if let Some(type_name) = &filters.product_type_name {
        qb.push(" AND t.name ILIKE ").push_bind(format!("%{}%", escape_like(type_name)));
    }
    if let Some(keyword) = &filters.name_contains {
        qb.push(" AND p.name ILIKE ").push_bind(format!("%{}%", escape_like(keyword)));
    }
    if let Some(prefix) = &filters.name_prefix {
        qb.push(" AND p.name ILIKE ").push_bind(format!("{}%", escape_like(prefix)));
    }
}

// GET /products/ - List products, optionally filtered and paginated
#[instrument(skip(state, uri))]
pub async fn get_products(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ProductListParams>,
) -> Result<Response, AppError> {
    let filters = params.filters()?;

    let mut rows_query = QueryBuilder::<Postgres>::new(SELECT_PRODUCT_WITH_TYPE);
    rows_query.push(" WHERE TRUE");
    push_filters(&mut rows_query, &filters);
    rows_query.push(" ORDER BY p.id");

    if !params.paginated() {
        let rows = rows_query
            .build_query_as::<ProductWithType>()
            .fetch_all(&state.db_pool)
            .await?;
        let response: Vec<ProductResponse> = rows
            .into_iter()
            .map(|row| ProductResponse::from_model(row, &state.media))
            .collect();
        return Ok(Json(response).into_response());
    }

    let mut count_query = QueryBuilder::<Postgres>::new(
        "SELECT COUNT(*) FROM product p JOIN product_type t ON t.id = p.product_type_id WHERE TRUE",
    );
    push_filters(&mut count_query, &filters);
    let count: i64 = count_query
        .build_query_scalar::<i64>()
        .fetch_one(&state.db_pool)
        .await?;

    let window = PageWindow::new(params.page.as_deref(), count)?;
    rows_query
        .push(" LIMIT ")
        .push_bind(PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind(window.offset());

    let rows = rows_query
        .build_query_as::<ProductWithType>()
        .fetch_all(&state.db_pool)
        .await?;
    let results: Vec<ProductResponse> = rows
        .into_iter()
        .map(|row| ProductResponse::from_model(row, &state.media))
        .collect();

    Ok(Json(window.into_page(count, results, uri.path(), uri.query())).into_response())
}

// GET /products/:id/ - Get single product
#[instrument(skip(state))]
pub async fn get_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = fetch_product(&state.db_pool, id).await?;
    Ok(Json(ProductResponse::from_model(product, &state.media)))
}

// POST /products/ - Create product (multipart)
#[instrument(skip(state, multipart))]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    let form = ProductForm::try_from(FormData::read(multipart).await?)?;
    let name = validate_name(form.name.as_deref())?;
    let product_type_id = form
        .product_type
        .ok_or_else(|| AppError::validation("product_type: This field is required."))?;

    ensure_product_type(&state.db_pool, product_type_id).await?;
    if name_taken(&state.db_pool, &name, None).await? {
        return Err(AppError::validation(DUPLICATE_NAME));
    }

    let image = match &form.image {
        Some(upload) => Some(
            state.media
                .save(PRODUCT_IMAGE_DIR, &name, &upload.file_name, &upload.bytes, None)
                .await?,
        ),
        None => None,
    };

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO product (name, description, image, product_type_id)
         VALUES ($1, $2, $3, $4) RETURNING id"
    )
    .bind(&name)
    .bind(form.description.flatten())
    .bind(&image)
    .bind(product_type_id)
    .fetch_one(&state.db_pool)
    .await;

    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            if let Some(path) = &image {
                state.media.remove_quietly(path).await;
            }
            return Err(map_write_error(e, product_type_id));
        }
    };

    info!(id, user_id = auth.user_id, user = %auth.username, "Product created");
    let product = fetch_product(&state.db_pool, id).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from_model(product, &state.media))))
}

// PUT/PATCH /products/:id/ - Update product (multipart)
#[instrument(skip(state, multipart))]
pub async fn update_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Result<Json<ProductResponse>, AppError> {
    let form = ProductForm::try_from(FormData::read(multipart).await?)?;

    let existing = sqlx::query_as::<_, Product>(
        "SELECT id, name, description, image, product_type_id FROM product WHERE id = $1"
    )
    .bind(id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    let name = match form.name.as_deref() {
        Some(raw) => validate_name(Some(raw))?,
        None => existing.name.clone(),
    };
    let name_changed = name != existing.name;
    if name_changed && name_taken(&state.db_pool, &name, Some(id)).await? {
        return Err(AppError::validation(DUPLICATE_NAME));
    }

    let product_type_id = form.product_type.unwrap_or(existing.product_type_id);
    if product_type_id != existing.product_type_id {
        ensure_product_type(&state.db_pool, product_type_id).await?;
    }

    let change = ImageChange::prepare(
        &state.media,
        PRODUCT_IMAGE_DIR,
        existing.image.as_deref(),
        name_changed,
        &name,
        form.image.as_ref(),
    )
    .await?;

    let updated = sqlx::query(
        "UPDATE product SET name = $1, description = $2, image = $3, product_type_id = $4
         WHERE id = $5"
    )
    .bind(&name)
    .bind(form.description.unwrap_or(existing.description))
    .bind(change.stored_path(existing.image.as_deref()))
    .bind(product_type_id)
    .bind(existing.id)
    .execute(&state.db_pool)
    .await;

    match updated {
        Ok(result) if result.rows_affected() > 0 => change.commit(&state.media).await,
        Ok(_) => {
            change.rollback(&state.media).await;
            return Err(AppError::not_found("Product not found"));
        }
        Err(e) => {
            change.rollback(&state.media).await;
            return Err(map_write_error(e, product_type_id));
        }
    }

    info!(id, user_id = auth.user_id, user = %auth.username, "Product updated");
    let product = fetch_product(&state.db_pool, id).await?;
    Ok(Json(ProductResponse::from_model(product, &state.media)))
}

// DELETE /products/:id/ - Delete product and its image
#[instrument(skip(state))]
pub async fn delete_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, AppError> {
    let image = sqlx::query_scalar::<_, Option<String>>("DELETE FROM product WHERE id = $1 RETURNING image")
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    if let Some(path) = &image {
        state.media.remove_quietly(path).await;
    }

    info!(id, user_id = auth.user_id, user = %auth.username, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
