//! Input validation shared by the location and item operations.

use url::Url;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::errors::ServiceError;
use crate::models::{LocationWrite, WriteItemParams};

const ALLOWED_IMAGE_SCHEMES: [&str; 2] = ["http", "https"];

/// Checks write payloads before they reach a repository.
///
/// Built once at startup and shared by reference; it holds no per-request state.
#[derive(Debug, Clone, Default)]
pub struct InputValidator {
    _private: (),
}

impl InputValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name must be 1 to 50 characters, counted as Unicode scalar values.
    pub fn validate_location_name(&self, name: &str) -> Result<(), ServiceError> {
        LocationWrite {
            name: name.to_string(),
        }
        .validate()
        .map_err(|e| validation_failure("name validation", e))
    }

    pub fn validate_item(&self, params: &WriteItemParams) -> Result<(), ServiceError> {
        let mut result = params.validate();

        if let Some(raw) = params.image_url.as_deref() {
            if let Err(err) = validate_image_scheme(raw) {
                let mut errors = result.err().unwrap_or_else(ValidationErrors::new);
                errors.add("image_url", err);
                result = Err(errors);
            }
        }

        result.map_err(|e| validation_failure("item validation", e))
    }
}

fn validation_failure(context: &str, errors: ValidationErrors) -> ServiceError {
    tracing::debug!(%errors, "{} rejected input", context);
    ServiceError::ValidationError(format!("{}: {}", context, errors))
}

fn validate_image_scheme(raw: &str) -> Result<(), ValidationError> {
    // malformed URLs are reported by the derive rule
    match Url::parse(raw) {
        Ok(url) if !ALLOWED_IMAGE_SCHEMES.contains(&url.scheme()) => {
            let mut err = ValidationError::new("image_url_scheme");
            err.message = Some("Image URL must use http or https".into());
            Err(err)
        }
        _ => Ok(()),
    }
}
