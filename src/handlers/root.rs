use axum::Json;
use serde_json::{json, Value};

// GET / - API root listing the resource endpoints
pub async fn api_root() -> Json<Value> {
    Json(json!({
        "products": "/products/",
        "product-types": "/product-types/",
    }))
}

pub async fn health_check() -> &'static str {
    "OK"
}
