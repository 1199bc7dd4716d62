//! Record identifiers
//!
//! Records saved without an identifier get a random UUID v4.

use strata_model_core::key::{self, IdError};
use strata_model_core::{Model, ModelError, ModelResult};
use uuid::Uuid;

/// Generate a collision-resistant identifier
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Assign an identifier to `model` if it has none, then validate it
///
/// Returns the identifier.
pub fn ensure_id<M: Model>(model: &mut M) -> ModelResult<String> {
    if model.model_id().is_empty() {
        model.set_model_id(generate_id());
    }
    let id = model.model_id().to_string();
    check_id(&id)?;
    Ok(id)
}

/// Validate an identifier supplied by the caller
pub fn check_id(id: &str) -> ModelResult<()> {
    key::validate_id(id).map_err(|e: IdError| ModelError::InvalidId {
        id: id.to_string(),
        reason: e.to_string(),
    })
}
