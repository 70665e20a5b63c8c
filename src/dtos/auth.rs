use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use super::upload::FormData;
use crate::error::AppError;

/// Login credentials, accepted as JSON, urlencoded or multipart form.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl<S> FromRequest<S> for TokenRequest
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            let mut form = FormData::read(multipart).await?;
            return Ok(Self {
                username: form.take("username").unwrap_or_default(),
                password: form.take_raw("password").unwrap_or_default(),
            });
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(payload) = Form::<TokenRequest>::from_request(req, state)
                .await
                .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
            return Ok(payload);
        }

        let Json(payload) = Json::<TokenRequest>::from_request(req, state)
            .await
            .map_err(|e| AppError::rejected(e.status(), e.body_text()))?;
        Ok(payload)
    }
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}
