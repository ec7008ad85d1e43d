//! Input validation helpers
//!
//! Used by interactive front ends to turn user-typed text into numbers
//! before they reach the motion layer.

use thiserror::Error;

/// Raised when user input cannot be converted into a numeric value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Input was not an integer
    #[error("{field} must be an integer")]
    NotAnInteger {
        /// Name of the field.
        field: String,
    },

    /// Input was not a number
    #[error("{field} must be a number")]
    NotANumber {
        /// Name of the field.
        field: String,
    },

    /// Input was below the allowed minimum
    #[error("{field} must be at least {minimum}")]
    BelowMinimum {
        /// Name of the field.
        field: String,
        /// Minimum accepted value.
        minimum: String,
    },

    /// Input was zero or negative
    #[error("{field} must be positive")]
    NotPositive {
        /// Name of the field.
        field: String,
    },
}

/// Parse `value` as an integer, enforcing `minimum` if given
pub fn parse_int(value: &str, field: &str, minimum: Option<i64>) -> Result<i64, ValidationError> {
    let number: i64 = value
        .trim()
        .parse()
        .map_err(|_| ValidationError::NotAnInteger {
            field: field.to_string(),
        })?;
    if let Some(minimum) = minimum {
        if number < minimum {
            return Err(ValidationError::BelowMinimum {
                field: field.to_string(),
                minimum: minimum.to_string(),
            });
        }
    }
    Ok(number)
}

/// Parse `value` as a finite float, enforcing `minimum` if given
pub fn parse_float(value: &str, field: &str, minimum: Option<f64>) -> Result<f64, ValidationError> {
    let number: f64 = value
        .trim()
        .parse()
        .ok()
        .filter(|n: &f64| n.is_finite())
        .ok_or_else(|| ValidationError::NotANumber {
            field: field.to_string(),
        })?;
    if let Some(minimum) = minimum {
        if number < minimum {
            return Err(ValidationError::BelowMinimum {
                field: field.to_string(),
                minimum: minimum.to_string(),
            });
        }
    }
    Ok(number)
}

/// Parse `value` and require it to be strictly positive
pub fn ensure_positive_float(value: &str, field: &str) -> Result<f64, ValidationError> {
    let number = parse_float(value, field, None)?;
    if number <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: field.to_string(),
        });
    }
    Ok(number)
}
