use std::sync::Arc;

use sqlx::PgPool;

use crate::media::MediaStore;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub media: MediaStore,
    pub auth: Arc<AuthSettings>,
}

/// Token signing settings shared by the login handler and the auth middleware.
pub struct AuthSettings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl AppState {
    pub fn new(db_pool: PgPool, media: MediaStore, auth: AuthSettings) -> Self {
        Self { db_pool, media, auth: Arc::new(auth) }
    }
}
