use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ProductType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub header: Option<String>,
    pub header_description: Option<String>,
    pub image: Option<String>,
}
