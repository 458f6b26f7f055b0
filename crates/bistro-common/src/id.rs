use uuid::Uuid;

use crate::error::{Error, Result};

/// Generate a fresh store identifier (UUID v4, 32 lowercase hex chars).
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Whether `id` has the shape of a store-generated identifier.
pub fn is_valid_record_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Validate an identifier received from a caller.
pub fn validate_record_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Validation("identifier cannot be empty".into()));
    }
    if !is_valid_record_id(id) {
        return Err(Error::Validation(format!("malformed identifier: {id}")));
    }
    Ok(())
}
