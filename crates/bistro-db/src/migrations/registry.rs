use std::cmp::Ordering;

use bistro_common::{Error, Result};

use super::Migration;
use super::builtin;

/// The ordered list of known migrations.
///
/// Order is both apply order and dependency order, so ids must already be
/// strictly ascending; an out-of-order or duplicate id is rejected rather
/// than sorted.
pub struct Registry {
    units: Vec<Box<dyn Migration>>,
}

impl Registry {
    pub fn new(units: Vec<Box<dyn Migration>>) -> Result<Self> {
        for pair in units.windows(2) {
            let (prev, next) = (pair[0].id(), pair[1].id());
            if compare_ids(prev, next) != Ordering::Less {
                return Err(Error::migration(
                    next,
                    format!("id must sort after preceding migration {prev}"),
                ));
            }
        }
        Ok(Self { units })
    }

    /// The migrations every Bistro store is built from.
    pub fn builtin() -> Result<Self> {
        Self::new(builtin::migrations())
    }

    pub fn units(&self) -> &[Box<dyn Migration>] {
        &self.units
    }

    pub fn get(&self, id: &str) -> Option<&dyn Migration> {
        self.units.iter().find(|m| m.id() == id).map(|m| m.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|m| m.id())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Numeric comparison when both ids are numbers, lexical otherwise.
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
