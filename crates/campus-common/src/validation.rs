//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes and the gateway.

use validator::Validate;

use crate::error::CampusError;

/// Validate a request body, returning a CampusError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), CampusError> {
    body.validate().map_err(|e| CampusError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate message content: non-empty after trimming, within the length cap.
pub fn validate_message_content(content: &str, max_len: u32) -> Result<(), CampusError> {
    if content.trim().is_empty() {
        return Err(CampusError::Validation {
            message: "Message content cannot be empty or whitespace only".into(),
        });
    }
    if content.chars().count() > max_len as usize {
        return Err(CampusError::Validation {
            message: format!("Message content exceeds {max_len} characters"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_whitespace_only_content() {
        assert!(validate_message_content("   \n\t ", 4000).is_err());
        assert!(validate_message_content("", 4000).is_err());
    }

    #[test]
    fn accepts_normal_content() {
        assert!(validate_message_content("hello", 4000).is_ok());
    }

    #[test]
    fn rejects_oversized_content() {
        let long = "x".repeat(11);
        assert!(validate_message_content(&long, 10).is_err());
    }
}
