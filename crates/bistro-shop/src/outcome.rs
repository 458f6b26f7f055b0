//! Folding store results into [`Lookup`] outcomes.

use bistro_common::{Lookup, Result, validate_record_id};
use tracing::error;

/// `Found` on success; logs the error under `op` and yields `Failed`
/// otherwise.
pub(crate) fn settle<T>(op: &str, result: Result<T>) -> Lookup<T> {
    match result {
        Ok(value) => Lookup::Found(value),
        Err(e) => {
            error!("{op} failed: {e}");
            Lookup::failed(&e)
        }
    }
}

/// Like [`settle`], with `None` mapped to `NotFound`.
pub(crate) fn settle_option<T>(op: &str, result: Result<Option<T>>) -> Lookup<T> {
    match settle(op, result) {
        Lookup::Found(value) => Lookup::from_option(value),
        Lookup::NotFound => Lookup::NotFound,
        Lookup::Invalid(reason) => Lookup::Invalid(reason),
        Lookup::Failed(reason) => Lookup::Failed(reason),
    }
}

/// `Err(Lookup::Invalid)` when `id` is not a well-formed record id.
pub(crate) fn check_id<T>(id: &str) -> std::result::Result<(), Lookup<T>> {
    validate_record_id(id).map_err(|e| Lookup::invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use bistro_common::Error;

    use super::*;

    #[test]
    fn settle_option_separates_absence_from_failure() {
        assert_eq!(settle_option("op", Ok(Some(1))), Lookup::Found(1));
        assert_eq!(settle_option::<i32>("op", Ok(None)), Lookup::NotFound);
        assert!(matches!(
            settle_option::<i32>("op", Err(Error::Database("boom".into()))),
            Lookup::Failed(reason) if reason.contains("boom")
        ));
    }

    #[test]
    fn check_id_rejects_malformed_ids() {
        assert!(check_id::<()>("not-an-id").is_err());
        assert!(check_id::<()>(&bistro_common::new_record_id()).is_ok());
    }
}
