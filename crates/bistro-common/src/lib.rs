pub mod error;
pub mod id;
pub mod lookup;
pub mod timestamp;

pub use error::{Error, Result};
pub use id::{is_valid_record_id, new_record_id, validate_record_id};
pub use lookup::Lookup;
