// src/dtos/product.rs
use serde::{Deserialize, Serialize};

use super::product_type::ProductTypeResponse;
use super::upload::{FormData, Upload};
use crate::error::AppError;
use crate::media::MediaStore;
use crate::models::product::ProductWithType;

/// Multipart fields for create and update. Absent fields are `None`.
#[derive(Debug)]
pub struct ProductForm {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub product_type: Option<i64>,
    pub image: Option<Upload>,
}

impl TryFrom<FormData> for ProductForm {
    type Error = AppError;

    fn try_from(mut form: FormData) -> Result<Self, Self::Error> {
        let product_type = match form.take("product_type") {
            None => None,
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| AppError::validation(format!("Invalid product type id \"{raw}\".")))?,
            ),
        };

        Ok(Self {
            name: form.take("name"),
            description: form.take_optional("description"),
            product_type,
            image: form.image.take(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub product_type: ProductTypeResponse,
}

impl ProductResponse {
    pub fn from_model(row: ProductWithType, media: &MediaStore) -> Self {
        let product_type = ProductTypeResponse::from_model(row.product_type(), media);
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            image: row.image.as_deref().map(|p| media.url(p)),
            product_type,
        }
    }
}

/// Query string of `GET /products/`. Every value arrives as text so that a
/// malformed number becomes a 400 with a message instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub paginate: Option<String>,
    pub page: Option<String>,
    pub product_type_id: Option<String>,
    pub product_type: Option<String>,
    pub keyword: Option<String>,
    pub search_keyword: Option<String>,
}

/// Filters shared by the paginated and unpaginated list.
#[derive(Debug, Default, PartialEq)]
pub struct ProductFilters {
    pub product_type_ids: Vec<i64>,
    pub product_type_name: Option<String>,
    pub name_contains: Option<String>,
    pub name_prefix: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ProductListParams {
    pub fn paginated(&self) -> bool {
        self.paginate
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn filters(&self) -> Result<ProductFilters, AppError> {
        let mut filters = ProductFilters::default();

        if let Some(raw) = non_empty(&self.product_type_id) {
            let id = raw
                .parse()
                .map_err(|_| AppError::validation(format!("Invalid product_type_id \"{raw}\".")))?;
            filters.product_type_ids.push(id);
        }
        if let Some(raw) = non_empty(&self.product_type) {
            match raw.parse::<i64>() {
                Ok(id) => filters.product_type_ids.push(id),
                Err(_) => filters.product_type_name = Some(raw.to_string()),
            }
        }
        filters.name_contains = non_empty(&self.keyword).map(str::to_string);
        filters.name_prefix = non_empty(&self.search_keyword).map(str::to_string);

        Ok(filters)
    }
}
