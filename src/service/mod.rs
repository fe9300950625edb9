//! CrudService: generic document CRUD plus request validation.

mod crud;
mod validation;
pub use crud::{clamp_limit, CrudService};
pub use validation::{RequestValidator, ValidationRule};
