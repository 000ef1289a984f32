use service_core::ClientError;

pub const ACCEPTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Accepts a declared filename only if it ends in `.<format>` for one of the
/// accepted formats. Case-sensitive; the payload itself is not inspected.
pub fn validate_filename(file_name: Option<&str>) -> Result<(), ClientError> {
    let file_name = file_name.unwrap_or_default();
    let accepted = ACCEPTED_FORMATS.iter().any(|format| {
        file_name
            .strip_suffix(format)
            .is_some_and(|stem| stem.ends_with('.'))
    });

    if accepted {
        Ok(())
    } else {
        Err(ClientError::InvalidFormat(ACCEPTED_FORMATS))
    }
}
