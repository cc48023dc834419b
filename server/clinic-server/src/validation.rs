//! Request validation utilities for consistent validation across handlers
//!
//! Failed checks become `422` validation errors whose `field_errors` key is
//! the checked field's name, so clients can highlight the offending input.

use crate::error::ApiError;

/// Trait for validating request payloads
///
/// Implement this trait for all create/update request types to ensure
/// consistent validation across the API.
///
/// # Example
///
/// ```rust
/// use clinic_server::validation::RequestValidation;
/// use clinic_server::error::ApiError;
/// use clinic_server::{validate_field, validate_required};
///
/// struct CreateNoteRequest {
///     content: String,
/// }
///
/// impl RequestValidation for CreateNoteRequest {
///     fn validate(&self) -> Result<(), ApiError> {
///         validate_required!(self.content, "The content field is required.");
///         validate_field!(self.content, self.content.len() <= 5000, "Content is too long.");
///         Ok(())
///     }
/// }
/// ```
pub trait RequestValidation {
    /// Validates the request and returns an error if validation fails
    fn validate(&self) -> Result<(), ApiError>;
}

/// `self.phone` -> `phone`
pub fn field_name(expr: &str) -> &str {
    expr.rsplit('.').next().unwrap_or(expr).trim()
}

/// Loose email shape check: one `@` with a dotted domain after it
pub fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

/// Macro for validating fields with custom predicates
///
/// ```rust,ignore
/// validate_field!(self.price, self.price >= 0, "The price must be at least 0.");
/// ```
#[macro_export]
macro_rules! validate_field {
    ($field:expr, $predicate:expr, $message:expr) => {
        if !$predicate {
            return Err($crate::error::ApiError::field(
                $crate::validation::field_name(stringify!($field)),
                $message,
            ));
        }
    };
}

/// Macro for validating required fields (non-empty strings)
#[macro_export]
macro_rules! validate_required {
    ($field:expr, $message:expr) => {
        $crate::validate_field!($field, !$field.trim().is_empty(), $message);
    };
}

/// Macro for validating optional strings that must not be blank when present
#[macro_export]
macro_rules! validate_present {
    ($field:expr, $message:expr) => {
        if let Some(value) = $field.as_deref() {
            $crate::validate_field!($field, !value.trim().is_empty(), $message);
        }
    };
}

/// Macro for validating string length in characters
///
/// ```rust,ignore
/// validate_length!(self.name, 1, 255, "The name may not be greater than 255 characters.");
/// ```
#[macro_export]
macro_rules! validate_length {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        let len = $field.chars().count();
        $crate::validate_field!($field, len >= $min && len <= $max, $message);
    };
}

/// Macro for validating email format (basic check)
#[macro_export]
macro_rules! validate_email {
    ($field:expr, $message:expr) => {
        $crate::validate_field!($field, $crate::validation::is_email(&$field), $message);
    };
}

/// Macro for validating numeric ranges
#[macro_export]
macro_rules! validate_range {
    ($field:expr, $min:expr, $max:expr, $message:expr) => {
        $crate::validate_field!($field, $field >= $min && $field <= $max, $message);
    };
}

/// Macro for validating that a string is one of a fixed set of values
///
/// ```rust,ignore
/// validate_one_of!(self.billable_type, ["case", "reservation"], "The selected billable type is invalid.");
/// ```
#[macro_export]
macro_rules! validate_one_of {
    ($field:expr, [$($allowed:expr),+ $(,)?], $message:expr) => {
        $crate::validate_field!($field, [$($allowed),+].contains(&$field.as_str()), $message);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    struct TestRequest {
        name: String,
        email: String,
        sex: i16,
        billable_type: String,
        address: Option<String>,
    }

    impl RequestValidation for TestRequest {
        fn validate(&self) -> Result<(), ApiError> {
            validate_required!(self.name, "The name field is required.");
            validate_length!(self.name, 1, 10, "The name may not be greater than 10 characters.");
            validate_email!(self.email, "The email must be a valid email address.");
            validate_range!(self.sex, 1, 2, "The selected sex is invalid.");
            validate_one_of!(self.billable_type, ["case", "reservation"], "The selected billable type is invalid.");
            validate_present!(self.address, "The address field must not be empty.");
            Ok(())
        }
    }

    fn valid() -> TestRequest {
        TestRequest {
            name: "Ali".to_string(),
            email: "ali@clinic.iq".to_string(),
            sex: 1,
            billable_type: "case".to_string(),
            address: None,
        }
    }

    fn failing_field(request: &TestRequest) -> String {
        match request.validate() {
            Err(ApiError::Validation { field_errors: Some(fields), .. }) => {
                fields.keys().next().cloned().unwrap_or_default()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_field_errors_are_keyed_by_field() {
        let mut request = valid();
        request.name = "  ".to_string();
        assert_eq!(failing_field(&request), "name");

        let mut request = valid();
        request.email = "ali@".to_string();
        assert_eq!(failing_field(&request), "email");

        let mut request = valid();
        request.sex = 3;
        assert_eq!(failing_field(&request), "sex");

        let mut request = valid();
        request.billable_type = "invoice".to_string();
        assert_eq!(failing_field(&request), "billable_type");

        let mut request = valid();
        request.address = Some(String::new());
        assert_eq!(failing_field(&request), "address");
    }

    #[test]
    fn test_length_counts_characters() {
        let mut request = valid();
        request.name = "عيادة".to_string();
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("a@b.co"));
        assert!(!is_email("a@b"));
        assert!(!is_email("@b.co"));
        assert!(!is_email("a@@b.co"));
    }
}
