//! Integration settings and their validation.
//!
//! Settings arrive from the host as an untyped JSON mapping. [`parse`]
//! turns them into [`IntegrationSettings`], or into a
//! [`ValidationErrorDetail`] listing every problem at once.

mod types;
mod validate;

pub use types::{IntegrationSettings, ValidatedSettings};
pub use validate::{parse, FieldError, ValidationErrorDetail};
