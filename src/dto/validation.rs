//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::CODE_LENGTH;

/// Validates that a session code is exactly six uppercase alphanumeric
/// characters.
///
/// # Examples
///
/// ```ignore
/// validate_session_code("A1B2C3") // Ok
/// validate_session_code("a1b2c3") // Err - lowercase
/// validate_session_code("A1B2")   // Err - too short
/// ```
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != CODE_LENGTH {
        let mut err = ValidationError::new("session_code_length");
        err.message = Some(
            format!(
                "Session code must be exactly {} characters (got {})",
                CODE_LENGTH,
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("session_code_format");
        err.message =
            Some("Session code must contain only uppercase alphanumeric characters".into());
        return Err(err);
    }

    Ok(())
}
