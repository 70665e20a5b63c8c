pub mod auth;
pub mod images;
pub mod product;
pub mod product_type;
pub mod root;

use crate::error::AppError;

const NAME_MAX_LEN: usize = 100;

/// Shared rule for product and product type names: present, non-blank, at
/// most 100 characters. Returns the trimmed name.
pub(crate) fn validate_name(name: Option<&str>) -> Result<String, AppError> {
    let name = name
        .map(str::trim)
        .ok_or_else(|| AppError::validation("name: This field is required."))?;
    if name.is_empty() {
        return Err(AppError::validation("name: This field may not be blank."));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(AppError::validation(format!(
            "name: Ensure this field has no more than {NAME_MAX_LEN} characters."
        )));
    }
    Ok(name.to_string())
}
