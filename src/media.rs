//! Local-disk storage for uploaded images.
//!
//! Files live under the media root in one subdirectory per resource and are
//! named after the slug of the owning record's name. Paths handed to and from
//! the database are always relative to the media root (`product_images/tea.png`).

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

pub const PRODUCT_TYPE_IMAGE_DIR: &str = "product_type_images";
pub const PRODUCT_IMAGE_DIR: &str = "product_images";

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "tif", "tiff",
];

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported image type: .{0}")]
    UnsupportedExtension(String),
    #[error("invalid media path {0:?}")]
    InvalidPath(String),
    #[error("media io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MediaError + '_ {
    move |source| MediaError::Io { path: path.to_path_buf(), source }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    url_prefix: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self { root: root.into(), url_prefix: url_prefix.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Public URL of a stored file.
    pub fn url(&self, relative: &str) -> String {
        format!("{}{}", self.url_prefix, relative)
    }

    /// Writes `bytes` as `<dir>/<slug(name)>.<ext of original_filename>`.
    /// Returns the relative path to store on the record. `replacing` is the
    /// record's current file, which may be overwritten in place.
    pub async fn save(
        &self,
        dir: &str,
        name: &str,
        original_filename: &str,
        bytes: &[u8],
        replacing: Option<&str>,
    ) -> Result<String, MediaError> {
        let extension = image_extension(original_filename)?;
        let target_dir = self.root.join(dir);
        tokio::fs::create_dir_all(&target_dir).await.map_err(io_err(&target_dir))?;

        let relative = self
            .available_name(dir, &slugify_or_default(name), extension.as_deref(), replacing)
            .await?;
        let path = self.resolve(&relative)?;
        tokio::fs::write(&path, bytes).await.map_err(io_err(&path))?;
        tracing::debug!(path = %relative, size = bytes.len(), "Stored image");
        Ok(relative)
    }

    /// Moves an existing file so its stem matches `slug(new_name)`, keeping the
    /// directory and extension. A missing source file leaves the path unchanged.
    pub async fn rename(&self, current: &str, new_name: &str) -> Result<String, MediaError> {
        let source = self.resolve(current)?;
        let (dir, file_name) = current.rsplit_once('/').unwrap_or(("", current));
        let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_string());

        let relative = self
            .available_name(dir, &slugify_or_default(new_name), extension.as_deref(), Some(current))
            .await?;
        if relative == current {
            return Ok(relative);
        }

        match tokio::fs::rename(&source, self.resolve(&relative)?).await {
            Ok(()) => {
                tracing::debug!(from = %current, to = %relative, "Renamed image");
                Ok(relative)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %current, "Image file missing on disk, keeping stored path");
                Ok(current.to_string())
            }
            Err(e) => Err(io_err(&source)(e)),
        }
    }

    /// Plain move between two relative paths.
    pub async fn move_file(&self, from: &str, to: &str) -> Result<(), MediaError> {
        let source = self.resolve(from)?;
        tokio::fs::rename(&source, self.resolve(to)?).await.map_err(io_err(&source))
    }

    /// Deletes a stored file. Returns whether a file was actually removed.
    pub async fn remove(&self, relative: &str) -> Result<bool, MediaError> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %relative, "Removed image");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Like `remove`, but only logs failures. Used for cleanup after the
    /// database change already happened.
    pub async fn remove_quietly(&self, relative: &str) {
        if let Err(e) = self.remove(relative).await {
            tracing::warn!(error = %e, path = %relative, "Failed to remove image");
        }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, MediaError> {
        let rel = Path::new(relative);
        if relative.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(MediaError::InvalidPath(relative.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// First free `<dir>/<stem>[-n].<ext>`. `owned` is the caller's current
    /// file, which counts as free.
    async fn available_name(
        &self,
        dir: &str,
        stem: &str,
        extension: Option<&str>,
        owned: Option<&str>,
    ) -> Result<String, MediaError> {
        let build = |suffix: Option<u32>| {
            let stem = match suffix {
                Some(n) => format!("{stem}-{n}"),
                None => stem.to_string(),
            };
            let file = match extension {
                Some(ext) => format!("{stem}.{ext}"),
                None => stem,
            };
            if dir.is_empty() { file } else { format!("{dir}/{file}") }
        };

        let mut candidate = build(None);
        let mut n = 0;
        loop {
            if owned == Some(candidate.as_str()) {
                return Ok(candidate);
            }
            let path = self.resolve(&candidate)?;
            if !tokio::fs::try_exists(&path).await.map_err(io_err(&path))? {
                return Ok(candidate);
            }
            n += 1;
            candidate = build(Some(n));
        }
    }
}

/// Lower-cased extension of an uploaded file name, checked against the image
/// types we accept. A name without a dot has no extension.
pub fn image_extension(file_name: &str) -> Result<Option<String>, MediaError> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.rsplit_once('.') {
        None => Ok(None),
        Some((_, ext)) => {
            let ext = ext.to_ascii_lowercase();
            if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
                Ok(Some(ext))
            } else {
                Err(MediaError::UnsupportedExtension(ext))
            }
        }
    }
}

/// ASCII slug: accents reduced to their base letter (NFKD), lowercase, word
/// characters kept, runs of dashes and whitespace collapsed to one dash,
/// leading and trailing dashes/underscores stripped.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    // Compatibility decomposition splits accented letters into base letter and
    // combining mark; the marks are non-ASCII and dropped below.
    for c in value.nfkd().filter(char::is_ascii).map(|c| c.to_ascii_lowercase()) {
        if c == '-' || c.is_ascii_whitespace() {
            pending_dash = true;
        } else if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash {
                slug.push('-');
                pending_dash = false;
            }
            slug.push(c);
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn slugify_or_default(value: &str) -> String {
    let slug = slugify(value);
    if slug.is_empty() { "image".to_string() } else { slug }
}
