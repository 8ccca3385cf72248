//! Filename template validation, resolution, and filesystem-safe naming.

mod sanitize;
mod template;

pub use sanitize::{reserve_unique_path, sanitize, unique_path};
pub use template::{resolve_template, validate_template, TemplateContext, TemplateError};
