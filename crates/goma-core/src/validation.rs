//! Field validation for create/update inputs.
//!
//! Repositories call [`Validate::validate`] before issuing any query, so
//! an input that violates a presence or length constraint never reaches
//! the database. Uniqueness and referential integrity are enforced by
//! the database layer instead.

use thiserror::Error;
use uuid::Uuid;

/// A single field-level constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be blank")]
    Blank { field: &'static str },

    #[error("{field} must be at most {max} characters (got {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("{field} is required")]
    Missing { field: &'static str },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Blank { field } | Self::TooLong { field, .. } | Self::Missing { field } => field,
        }
    }
}

/// All violations found on one input, in field declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", join_errors(.0))]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Append the error of a single-field check, if any.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Returns `true` if any violation concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }

    /// `Ok(())` when no violations were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Inputs that can check their own field constraints.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Rejects empty and whitespace-only strings.
pub fn require_non_blank(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank { field });
    }
    Ok(())
}

/// Rejects strings longer than `max` characters.
///
/// Length is counted in Unicode scalar values, not bytes.
pub fn require_max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValidationError::TooLong { field, max, actual });
    }
    Ok(())
}

/// Rejects the nil UUID used as "no tenant".
pub fn require_tenant(tenant_id: Uuid) -> Result<(), ValidationError> {
    if tenant_id.is_nil() {
        return Err(ValidationError::Missing { field: "tenant_id" });
    }
    Ok(())
}

/// Required, bounded text field.
pub(crate) fn check_required(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    max: usize,
) {
    match require_non_blank(field, value) {
        Ok(()) => errors.check(require_max_len(field, value, max)),
        Err(e) => errors.push(e),
    }
}

/// Optional, bounded text field.
pub(crate) fn check_optional(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<&str>,
    max: usize,
) {
    if let Some(value) = value {
        errors.check(require_max_len(field, value, max));
    }
}
