use crate::error::Error;

/// Outcome of a domain-service call.
///
/// Services never raise for expected conditions. A missing record is
/// `NotFound`, bad input is `Invalid`, and an unexpected store failure is
/// `Failed` (already logged by the service).
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Invalid(String),
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }

    pub fn failed(err: &Error) -> Self {
        Self::Failed(err.to_string())
    }

    /// `Found` for `Some`, `NotFound` for `None`.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Found(v),
            None => Self::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
            Self::Invalid(reason) => Lookup::Invalid(reason),
            Self::Failed(reason) => Lookup::Failed(reason),
        }
    }

    /// Re-tag a non-`Found` outcome for a different payload type.
    ///
    /// Returns `Err(self)` unchanged in the `Found` case so callers can
    /// early-return on the other three.
    pub fn cast<U>(self) -> std::result::Result<T, Lookup<U>> {
        match self {
            Self::Found(v) => Ok(v),
            Self::NotFound => Err(Lookup::NotFound),
            Self::Invalid(reason) => Err(Lookup::Invalid(reason)),
            Self::Failed(reason) => Err(Lookup::Failed(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_option_maps_absence_to_not_found() {
        assert_eq!(Lookup::from_option(Some(3)), Lookup::Found(3));
        assert_eq!(Lookup::<i32>::from_option(None), Lookup::NotFound);
    }

    #[test]
    fn map_keeps_failure_reason() {
        let l: Lookup<i32> = Lookup::Failed("store down".into());
        assert_eq!(l.map(|v| v * 2), Lookup::Failed("store down".into()));
        assert_eq!(Lookup::Found(2).map(|v| v * 2), Lookup::Found(4));
    }

    #[test]
    fn cast_passes_found_value_through() {
        let ok: std::result::Result<i32, Lookup<String>> = Lookup::Found(7).cast();
        assert_eq!(ok, Ok(7));

        let err: std::result::Result<i32, Lookup<String>> = Lookup::invalid("bad id").cast();
        assert_eq!(err, Err(Lookup::Invalid("bad id".into())));
    }

    #[test]
    fn failed_carries_error_text() {
        let e = Error::Database("locked".into());
        assert_eq!(
            Lookup::<()>::failed(&e),
            Lookup::Failed("database error: locked".into())
        );
    }
}
