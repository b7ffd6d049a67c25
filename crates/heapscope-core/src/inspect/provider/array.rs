//! Array provider.

use tracing::trace;

use super::Materialized;
use crate::error::{InspectError, InspectResult};
use crate::host::TargetHost;
use crate::inspect::layout::FieldKind;
use crate::inspect::value::{Child, FieldValue};
use crate::runtime::Runtime;
use crate::types::{Address, ObjectAddress};

/// Elements of a managed array.
///
/// Element kind and stride are derived from the addresses of elements 0 and 1
/// as reported by the runtime, so no element-size query is needed. Only the
/// first `limit` elements are read eagerly; the rest are read on request.
#[derive(Debug)]
pub struct ArrayProvider
{
    object: ObjectAddress,
    len: usize,
    kind: FieldKind,
    first_offset: u64,
    stride: u64,
    limit: usize,
    values: Materialized,
}

impl ArrayProvider
{
    /// Inspect the array at `object`, reading up to `limit` elements.
    ///
    /// An empty array issues no element queries. A single-element array
    /// queries only element 0 and takes the stride from the element kind.
    ///
    /// ## Errors
    ///
    /// Evaluation failures, `MemoryReadFailure` for the eager reads, and
    /// `InvalidArgument` if the runtime reports elements before the array start,
    /// out of order, or so far apart that the eagerly read prefix would run past
    /// the end of the address space.
    pub fn new<H: TargetHost>(runtime: &Runtime<H>, object: ObjectAddress, limit: usize) -> InspectResult<Self>
    {
        let len = runtime.field_count(object)?;
        let mut provider = Self {
            object,
            len,
            kind: FieldKind::Unsupported,
            first_offset: 0,
            stride: 0,
            limit,
            values: Materialized::default(),
        };
        if len == 0 {
            return Ok(provider);
        }

        provider.kind = FieldKind::from_tag(runtime.field_kind(object, 0)?);
        let first = runtime.field_address(object, 0)?;
        provider.first_offset = first
            .offset_from(object.address())
            .ok_or_else(|| misplaced(object, 0, first))?;
        provider.stride = if len > 1 {
            let second = runtime.field_address(object, 1)?;
            second.offset_from(first).ok_or_else(|| misplaced(object, 1, second))?
        } else {
            provider.kind.byte_size(runtime.pointer_size()) as u64
        };
        trace!(%object, len, kind = %provider.kind, stride = provider.stride, "array layout");

        // Element addresses grow with the index, so checking the last one covers the prefix.
        let rendered = provider.rendered_len();
        if rendered > 0 {
            provider.checked_element_address(rendered - 1)?;
        }
        for index in 0..rendered {
            let value = FieldValue::read(runtime, provider.checked_element_address(index)?, provider.kind)?;
            provider.values.insert(index, value);
        }
        Ok(provider)
    }

    /// Address of the array object.
    pub fn object(&self) -> ObjectAddress
    {
        self.object
    }

    /// Runtime-reported element count.
    pub fn len(&self) -> usize
    {
        self.len
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool
    {
        self.len == 0
    }

    /// Element kind (`Unsupported` for empty arrays).
    pub fn kind(&self) -> FieldKind
    {
        self.kind
    }

    /// Bytes between consecutive elements.
    pub fn stride(&self) -> u64
    {
        self.stride
    }

    /// Number of elements shown when rendering: `min(len, limit)`.
    pub fn rendered_len(&self) -> usize
    {
        self.len.min(self.limit)
    }

    /// Absolute address of element `index`, or `None` if it does not fit in
    /// the address space.
    pub fn element_address(&self, index: usize) -> Option<Address>
    {
        self.stride
            .checked_mul(index as u64)
            .and_then(|offset| offset.checked_add(self.first_offset))
            .and_then(|offset| self.object.address().checked_add(offset))
    }

    fn checked_element_address(&self, index: usize) -> InspectResult<Address>
    {
        self.element_address(index).ok_or_else(|| {
            InspectError::InvalidArgument(format!(
                "element {index} of array {} is out of range with stride {:#x}",
                self.object, self.stride
            ))
        })
    }

    pub(super) fn index_of(&self, name: &str) -> Option<usize>
    {
        name.trim().parse::<usize>().ok().filter(|&index| index < self.len)
    }

    pub(super) fn value(&self, index: usize) -> Option<FieldValue>
    {
        self.values.get(index)
    }

    pub(super) fn child_at<H: TargetHost>(&mut self, runtime: &Runtime<H>, index: usize) -> InspectResult<Option<Child>>
    {
        if index >= self.len {
            return Ok(None);
        }
        let address = self.checked_element_address(index)?;
        let kind = self.kind;
        let value = self
            .values
            .get_or_read(index, || FieldValue::read(runtime, address, kind))?;
        Ok(Some(Child {
            name: index.to_string(),
            address,
            kind,
            value,
        }))
    }
}

fn misplaced(object: ObjectAddress, index: usize, address: Address) -> InspectError
{
    InspectError::InvalidArgument(format!("element {index} of array {object} reported at {address}"))
}
