use crate::TransferError;

/// Validates the filename declared for an uploaded file.
///
/// The name travels in a multipart `Content-Disposition` header, so it must be
/// non-empty and free of control characters and double quotes.
pub fn validate_filename(filename: &str) -> Result<(), TransferError> {
    if filename.is_empty() {
        return Err(TransferError::InvalidArgument(
            "filename may not be null or empty".into(),
        ));
    }

    if let Some(c) = filename.chars().find(|c| c.is_control() || *c == '"') {
        return Err(TransferError::InvalidArgument(format!(
            "filename contains illegal character {c:?}: {filename}"
        )));
    }

    Ok(())
}

/// Returns the format to declare, or `None` when it is blank.
pub fn normalize_format(format: Option<&str>) -> Option<&str> {
    format.filter(|f| !f.trim().is_empty())
}
