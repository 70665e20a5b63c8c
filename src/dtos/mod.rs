pub mod auth;
pub mod pagination;
pub mod product;
pub mod product_type;
pub mod upload;
