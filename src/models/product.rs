use sqlx::FromRow;

use super::product_type::ProductType;

#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub product_type_id: i64,
}

/// A product joined with its product type, one row per product.
/// Columns of the type are prefixed with `pt_`.
#[derive(Debug, Clone, FromRow)]
pub struct ProductWithType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub pt_id: i64,
    pub pt_name: String,
    pub pt_description: Option<String>,
    pub pt_header: Option<String>,
    pub pt_header_description: Option<String>,
    pub pt_image: Option<String>,
}

impl ProductWithType {
    pub fn product_type(&self) -> ProductType {
        ProductType {
            id: self.pt_id,
            name: self.pt_name.clone(),
            description: self.pt_description.clone(),
            header: self.pt_header.clone(),
            header_description: self.pt_header_description.clone(),
            image: self.pt_image.clone(),
        }
    }
}

/// Rows as `ProductWithType`; callers append `WHERE`/`ORDER BY`.
pub const SELECT_PRODUCT_WITH_TYPE: &str = "SELECT p.id, p.name, p.description, p.image,
        t.id AS pt_id, t.name AS pt_name, t.description AS pt_description,
        t.header AS pt_header, t.header_description AS pt_header_description,
        t.image AS pt_image
    FROM product p JOIN product_type t ON t.id = p.product_type_id";
