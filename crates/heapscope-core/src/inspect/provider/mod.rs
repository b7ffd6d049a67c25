//! # Value Providers
//!
//! One provider per inspected object, chosen once by the shape classifier:
//!
//! - [`StringProvider`]: decoded text, no children.
//! - [`ArrayProvider`]: elements addressed by index from a computed stride.
//! - [`ObjectProvider`]: named fields from the type's cached layout.
//!
//! Children are materialized into an explicit per-index cache. Reads go
//! through [`Provider::value`], which never touches the process; filling the
//! cache is the separate, explicit [`Provider::child_at`].

mod array;
mod object;
mod string;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use array::ArrayProvider;
pub use object::ObjectProvider;
pub use string::StringProvider;

use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::inspect::shape::Shape;
use crate::inspect::value::{Child, FieldValue};
use crate::runtime::Runtime;
use crate::types::ObjectAddress;

/// Provider shared between the object cache and in-flight renders.
pub type SharedProvider = Rc<RefCell<Provider>>;

/// Classified view of one heap object.
#[derive(Debug)]
pub enum Provider
{
    /// String object
    String(StringProvider),
    /// Array object
    Array(ArrayProvider),
    /// Composite object
    Object(ObjectProvider),
}

impl Provider
{
    /// Address of the inspected object.
    pub fn object(&self) -> ObjectAddress
    {
        match self {
            Provider::String(p) => p.object(),
            Provider::Array(p) => p.object(),
            Provider::Object(p) => p.object(),
        }
    }

    /// Shape this provider was built for.
    pub fn shape(&self) -> Shape
    {
        match self {
            Provider::String(_) => Shape::String,
            Provider::Array(_) => Shape::Array,
            Provider::Object(_) => Shape::Object,
        }
    }

    /// Number of children (fields or elements; zero for strings).
    pub fn num_children(&self) -> usize
    {
        match self {
            Provider::String(_) => 0,
            Provider::Array(p) => p.len(),
            Provider::Object(p) => p.num_fields(),
        }
    }

    /// Whether there is at least one child.
    pub fn has_children(&self) -> bool
    {
        self.num_children() > 0
    }

    /// Index of the child called `name`.
    pub fn child_index(&self, name: &str) -> Option<usize>
    {
        match self {
            Provider::String(_) => None,
            Provider::Array(p) => p.index_of(name),
            Provider::Object(p) => p.index_of(name),
        }
    }

    /// Already-materialized value of child `index`, without any process access.
    pub fn value(&self, index: usize) -> Option<FieldValue>
    {
        match self {
            Provider::String(_) => None,
            Provider::Array(p) => p.value(index),
            Provider::Object(p) => p.value(index),
        }
    }

    /// Child `index`, materializing and caching its value on first access.
    ///
    /// Returns `Ok(None)` for out-of-range indexes and for strings.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if the value cannot be read.
    pub fn child_at<H: TargetHost>(&mut self, runtime: &Runtime<H>, index: usize) -> InspectResult<Option<Child>>
    {
        match self {
            Provider::String(_) => Ok(None),
            Provider::Array(p) => p.child_at(runtime, index),
            Provider::Object(p) => p.child_at(runtime, index),
        }
    }
}

/// Per-index cache of materialized values.
#[derive(Debug, Default)]
pub(crate) struct Materialized
{
    values: HashMap<usize, FieldValue>,
}

impl Materialized
{
    pub(crate) fn get(&self, index: usize) -> Option<FieldValue>
    {
        self.values.get(&index).copied()
    }

    pub(crate) fn insert(&mut self, index: usize, value: FieldValue)
    {
        self.values.insert(index, value);
    }

    /// Cached value of `index`, or the result of `read`, which is then cached.
    pub(crate) fn get_or_read(
        &mut self,
        index: usize,
        read: impl FnOnce() -> InspectResult<FieldValue>,
    ) -> InspectResult<FieldValue>
    {
        if let Some(value) = self.get(index) {
            return Ok(value);
        }
        let value = read()?;
        self.insert(index, value);
        Ok(value)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::error::InspectError;
    use crate::types::Address;

    #[test]
    fn test_materialized_reads_once()
    {
        let mut cache = Materialized::default();
        let mut reads = 0;
        for _ in 0..3 {
            let value = cache
                .get_or_read(4, || {
                    reads += 1;
                    Ok(FieldValue::Int32(9))
                })
                .unwrap();
            assert_eq!(value, FieldValue::Int32(9));
        }
        assert_eq!(reads, 1);
        assert_eq!(cache.get(4), Some(FieldValue::Int32(9)));
        assert_eq!(cache.get(5), None);
    }

    #[test]
    fn test_materialized_failure_is_not_cached()
    {
        let mut cache = Materialized::default();
        let failed = cache.get_or_read(0, || {
            Err(InspectError::MemoryReadFailure {
                address: Address::new(0x10),
                len: 4,
                reason: "unmapped".to_string(),
            })
        });
        assert!(failed.is_err());
        assert_eq!(cache.get(0), None);
    }
}
