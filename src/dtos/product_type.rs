// src/dtos/product_type.rs
use serde::Serialize;

use super::upload::{FormData, Upload};
use crate::media::MediaStore;
use crate::models::product_type::ProductType;

/// Multipart fields for create and update. Absent fields are `None`.
#[derive(Debug)]
pub struct ProductTypeForm {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub header: Option<Option<String>>,
    pub header_description: Option<Option<String>>,
    pub image: Option<Upload>,
}

impl From<FormData> for ProductTypeForm {
    fn from(mut form: FormData) -> Self {
        Self {
            name: form.take("name"),
            description: form.take_optional("description"),
            header: form.take_optional("header"),
            header_description: form.take_optional("header_description"),
            image: form.image.take(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductTypeResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub header: Option<String>,
    pub header_description: Option<String>,
    pub image: Option<String>,
}

impl ProductTypeResponse {
    pub fn from_model(product_type: ProductType, media: &MediaStore) -> Self {
        Self {
            id: product_type.id,
            name: product_type.name,
            description: product_type.description,
            header: product_type.header,
            header_description: product_type.header_description,
            image: product_type.image.as_deref().map(|p| media.url(p)),
        }
    }
}
