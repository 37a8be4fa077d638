//! Configuration validation utilities and rules

use crate::HeraldError;
use std::fmt;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Value is out of acceptable range
    OutOfRange {
        /// Offending field
        field: String,
        /// Inclusive lower bound, if any
        min: Option<f64>,
        /// Inclusive upper bound, if any
        max: Option<f64>,
        /// Value found
        actual: f64,
    },
    /// Custom validation failed
    Custom {
        /// Offending field
        field: String,
        /// What is wrong with it
        message: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::OutOfRange {
                field,
                min,
                max,
                actual,
            } => {
                let range_desc = match (min, max) {
                    (Some(min), Some(max)) => format!("between {min} and {max}"),
                    (Some(min), None) => format!("at least {min}"),
                    (None, Some(max)) => format!("at most {max}"),
                    (None, None) => "in valid range".to_string(),
                };
                write!(f, "Field '{field}' must be {range_desc} (got {actual})")
            }
            ValidationError::Custom { field, message } => {
                write!(f, "Field '{field}': {message}")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for HeraldError {
    fn from(err: ValidationError) -> Self {
        HeraldError::invalid(err.to_string())
    }
}

/// Configuration validator that accumulates validation failures
#[derive(Debug, Default)]
pub struct ConfigValidator {
    errors: Vec<ValidationError>,
    field_prefix: String,
}

impl ConfigValidator {
    /// Create a new validator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator for a nested section
    pub fn for_field(&self, field_name: &str) -> Self {
        Self {
            errors: Vec::new(),
            field_prefix: self.full_field_name(field_name),
        }
    }

    /// Validate that a number is within range (inclusive)
    pub fn range<T>(&mut self, field_name: &str, value: T, min: Option<T>, max: Option<T>) -> &mut Self
    where
        T: PartialOrd + Copy + Into<f64>,
    {
        let below = min.is_some_and(|min| value < min);
        let above = max.is_some_and(|max| value > max);

        if below || above {
            self.errors.push(ValidationError::OutOfRange {
                field: self.full_field_name(field_name),
                min: min.map(Into::into),
                max: max.map(Into::into),
                actual: value.into(),
            });
        }
        self
    }

    /// Validate an arbitrary condition
    pub fn check(&mut self, field_name: &str, ok: bool, message: impl Into<String>) -> &mut Self {
        if !ok {
            self.errors.push(ValidationError::Custom {
                field: self.full_field_name(field_name),
                message: message.into(),
            });
        }
        self
    }

    /// Fold the errors of a nested validator into this one
    pub fn absorb(&mut self, nested: ConfigValidator) -> &mut Self {
        self.errors.extend(nested.errors);
        self
    }

    /// Accumulated errors
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Finish validation, joining all failures into one error
    pub fn finish(&self) -> Result<(), HeraldError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let joined = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(HeraldError::invalid(joined))
    }

    fn full_field_name(&self, field_name: &str) -> String {
        if self.field_prefix.is_empty() {
            field_name.to_string()
        } else {
            format!("{}.{field_name}", self.field_prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_accepts_bounds() {
        let mut v = ConfigValidator::new();
        v.range("page_size", 1u32, Some(1), Some(100));
        v.range("page_size", 100u32, Some(1), Some(100));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn test_range_rejects_outside() {
        let mut v = ConfigValidator::new();
        v.range("page_size", 0u32, Some(1), Some(100));
        let err = v.finish().unwrap_err();
        assert!(err.to_string().contains("page_size"));
        assert!(err.to_string().contains("between 1 and 100"));
    }

    #[test]
    fn test_nested_prefix_and_absorb() {
        let mut root = ConfigValidator::new();
        let mut nested = root.for_field("reconnect");
        nested.check("max_delay_ms", false, "must not be below initial_delay_ms");
        root.absorb(nested);

        assert_eq!(root.errors().len(), 1);
        assert!(root.errors()[0]
            .to_string()
            .starts_with("Field 'reconnect.max_delay_ms'"));
    }
}
