//! Structural validation of caller payloads.
//!
//! Runs at the HTTP edge before the engine is invoked. A payload that fails
//! validation is rejected with `BadRequest` and never reaches a hook.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

/// Result of validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid {
        /// Human-readable descriptions of each failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Joins all failures into one caller-facing message.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Invalid { errors } => Some(errors.join("; ")),
        }
    }
}

/// Implemented by every caller payload.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// Accumulates field failures.
#[derive(Debug, Default)]
pub struct Checks {
    errors: Vec<String>,
}

impl Checks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `message` when `ok` is false.
    pub fn check(&mut self, ok: bool, message: impl FnOnce() -> String) -> &mut Self {
        if !ok {
            self.errors.push(message());
        }
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), || format!("{field} is required"))
    }

    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        self.check(value.chars().count() <= max, || {
            format!("{field} must be at most {max} characters")
        })
    }

    pub fn length_between(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.chars().count();
        self.check((min..=max).contains(&len), || {
            format!("{field} must be between {min} and {max} characters")
        })
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(EMAIL.is_match(value.trim()), || {
            format!("{field} must be a valid email address")
        })
    }

    pub fn url(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            value.starts_with("https://") || value.starts_with("http://"),
            || format!("{field} must be an http(s) URL"),
        )
    }

    #[must_use]
    pub fn finish(&mut self) -> ValidationResult {
        if self.errors.is_empty() {
            ValidationResult::Valid
        } else {
            ValidationResult::Invalid {
                errors: std::mem::take(&mut self.errors),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure() {
        let result = Checks::new()
            .required("name", " ")
            .email("email", "nope")
            .length_between("password", "short", 8, 128)
            .finish();
        assert_eq!(
            result,
            ValidationResult::Invalid {
                errors: vec![
                    "name is required".to_string(),
                    "email must be a valid email address".to_string(),
                    "password must be between 8 and 128 characters".to_string(),
                ]
            }
        );
    }

    #[test]
    fn passes_clean_input() {
        let result = Checks::new()
            .required("name", "ada")
            .email("email", "ada@example.com")
            .url("avatar_url", "https://cdn.example.com/a.png")
            .finish();
        assert!(result.is_valid());
        assert!(result.message().is_none());
    }

    #[test]
    fn message_joins_errors() {
        let result = Checks::new()
            .required("a", "")
            .required("b", "")
            .finish();
        assert_eq!(result.message().as_deref(), Some("a is required; b is required"));
    }
}
