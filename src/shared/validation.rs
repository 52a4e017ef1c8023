//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    AppError::Validation(field_errors)
}

/// Validate a request body, mapping failures to a 422 response.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(length(min = 3))]
        name: String,
    }

    #[test]
    fn test_validate_collects_all_fields_sorted() {
        let sample = Sample {
            email: "nope".into(),
            name: "x".into(),
        };

        match validate(&sample) {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "email");
                assert_eq!(fields[0].message, "Invalid email format");
                assert_eq!(fields[1].field, "name");
                assert_eq!(fields[1].message, "length");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_passes() {
        let sample = Sample {
            email: "a@b.co".into(),
            name: "abc".into(),
        };
        assert!(validate(&sample).is_ok());
    }
}
