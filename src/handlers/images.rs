// src/handlers/images.rs
use crate::dtos::upload::Upload;
use crate::error::AppError;
use crate::media::MediaStore;

/// File-side effect of an update, applied before the row is written and then
/// either committed or rolled back depending on the database result.
#[derive(Debug)]
pub enum ImageChange {
    Unchanged,
    /// A new upload was stored at `new`; `old` is the file it supersedes.
    Replaced { new: String, old: Option<String> },
    /// The existing file moved from `old` to `new` to follow a name change.
    Renamed { new: String, old: String },
}

impl ImageChange {
    pub async fn prepare(
        media: &MediaStore,
        dir: &str,
        current: Option<&str>,
        name_changed: bool,
        new_name: &str,
        upload: Option<&Upload>,
    ) -> Result<Self, AppError> {
        if let Some(upload) = upload {
            let new = media
                .save(dir, new_name, &upload.file_name, &upload.bytes, current)
                .await?;
            return Ok(ImageChange::Replaced { new, old: current.map(str::to_string) });
        }

        match current {
            Some(old) if name_changed => {
                let new = media.rename(old, new_name).await?;
                if new == old {
                    Ok(ImageChange::Unchanged)
                } else {
                    Ok(ImageChange::Renamed { new, old: old.to_string() })
                }
            }
            _ => Ok(ImageChange::Unchanged),
        }
    }

    /// Value for the record's `image` column after the change.
    pub fn stored_path(&self, current: Option<&str>) -> Option<String> {
        match self {
            ImageChange::Unchanged => current.map(str::to_string),
            ImageChange::Replaced { new, .. } | ImageChange::Renamed { new, .. } => Some(new.clone()),
        }
    }

    /// The row now points at the new file; drop the superseded one.
    pub async fn commit(self, media: &MediaStore) {
        if let ImageChange::Replaced { new, old: Some(old) } = self {
            if old != new {
                media.remove_quietly(&old).await;
            }
        }
    }

    /// The row write failed; put the files back the way the row describes them.
    /// An upload that overwrote the old file in place cannot be undone.
    pub async fn rollback(self, media: &MediaStore) {
        match self {
            ImageChange::Unchanged => {}
            ImageChange::Replaced { new, old } => {
                if old.as_deref() != Some(new.as_str()) {
                    media.remove_quietly(&new).await;
                }
            }
            ImageChange::Renamed { new, old } => {
                if let Err(e) = media.move_file(&new, &old).await {
                    tracing::warn!(error = %e, from = %new, to = %old, "Failed to restore renamed image");
                }
            }
        }
    }
}
