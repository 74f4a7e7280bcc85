use crate::error::{CardHubError, CardHubResult};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Validate a request payload, reporting the first offending field.
pub fn validate_model<T: Validate>(model: &T) -> CardHubResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error(&errors, "")
                .unwrap_or_else(|| ("request".to_string(), format_validation_errors(&errors)));
            Err(CardHubError::validation(field, message))
        }
    }
}

fn first_error(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by_key(|(field, _)| **field);

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                if let Some(error) = field_errors.first() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| describe_code(&error.code, &path));
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(found) = first_error(nested, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    if let Some(found) = first_error(nested, &format!("{path}[{index}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

fn describe_code(code: &str, field: &str) -> String {
    match code {
        "email" => "Invalid email format".to_string(),
        "length" => format!("Length validation failed for field '{}'", field),
        "range" => format!("Value out of range for field '{}'", field),
        "required" => format!("Field '{}' is required", field),
        _ => format!("Validation failed for field '{}': {}", field, code),
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();

    for (field, field_errors) in errors.field_errors() {
        for error in field_errors {
            let message = error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| describe_code(&error.code, field));
            messages.push(message);
        }
    }

    messages.join(", ")
}

/// Lower-cased extension of `file_name` if it is in `allowed_types`.
pub fn validate_file_type(file_name: &str, allowed_types: &[String]) -> CardHubResult<String> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    if extension.is_empty() || !allowed_types.iter().any(|t| t.eq_ignore_ascii_case(&extension)) {
        return Err(CardHubError::validation(
            "file_type",
            format!(
                "File type '{}' not allowed. Allowed types: {}",
                extension,
                allowed_types.join(", ")
            ),
        ));
    }

    Ok(extension)
}

pub fn validate_file_size(file_size: u64, max_size: u64) -> CardHubResult<()> {
    if file_size == 0 {
        return Err(CardHubError::validation("file", "Uploaded file is empty"));
    }
    if file_size > max_size {
        return Err(CardHubError::validation(
            "file_size",
            format!(
                "File size {} bytes exceeds maximum allowed size {} bytes",
                file_size, max_size
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardhub_models::{CreateOrganizationRequest, LoginRequest, OrganizationAdmin};

    fn allowed() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string()]
    }

    #[test]
    fn test_validate_file_type() {
        assert_eq!(validate_file_type("photo.JPG", &allowed()).unwrap(), "jpg");
        assert!(validate_file_type("photo.gif", &allowed()).is_err());
        assert!(validate_file_type("photo", &allowed()).is_err());
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(100, 1024).is_ok());
        assert!(validate_file_size(0, 1024).is_err());
        assert!(validate_file_size(2048, 1024).is_err());
    }

    #[test]
    fn test_validate_model_reports_custom_message() {
        let request = LoginRequest {
            mobile: "123".to_string(),
            password: "whatever".to_string(),
        };
        match validate_model(&request) {
            Err(CardHubError::Validation { field, message }) => {
                assert_eq!(field, "mobile");
                assert_eq!(message, "Mobile number must be 10 to 15 digits");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_model_reports_nested_path() {
        let request = CreateOrganizationRequest {
            name: "Green Valley School".to_string(),
            code: None,
            email: None,
            mobile: None,
            address: None,
            logo_url: None,
            agent_id: None,
            admin: OrganizationAdmin {
                name: "Principal".to_string(),
                email: None,
                mobile: "9876543210".to_string(),
                password: "short".to_string(),
            },
        };
        match validate_model(&request) {
            Err(CardHubError::Validation { field, .. }) => assert_eq!(field, "admin.password"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
