// src/dtos/upload.rs
use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Multipart;

use crate::error::AppError;

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Bytes,
}

/// Text fields plus the optional `image` part of a multipart form.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    pub image: Option<Upload>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if name == "image" {
                // Browsers send an empty, unnamed part when no file was chosen.
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                if file_name.is_empty() {
                    continue;
                }
                if bytes.is_empty() {
                    return Err(AppError::validation("The submitted file is empty."));
                }
                form.image = Some(Upload { file_name, bytes });
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed value of a field, `None` when the field was not sent.
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.take_raw(key).map(|v| v.trim().to_string())
    }

    /// Value of a field exactly as sent.
    pub fn take_raw(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    /// `None` when absent, `Some(None)` when sent empty (clears the column).
    pub fn take_optional(&mut self, key: &str) -> Option<Option<String>> {
        self.take(key).map(|v| if v.is_empty() { None } else { Some(v) })
    }
}

#[cfg(test)]
impl FormData {
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            fields: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            image: None,
        }
    }
}
