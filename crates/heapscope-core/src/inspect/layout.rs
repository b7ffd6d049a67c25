//! # Layout Cache
//!
//! Per-type field layouts: name, kind tag and byte offset of every field, in
//! the order the runtime enumerates them.
//!
//! A layout is built the first time an instance of a type is inspected, by
//! asking the runtime for the name, kind and address of each field (three
//! round-trips per field). Every later instance of the same type reuses the
//! stored layout and re-bases the offsets on its own address, so it pays only
//! for the value reads.
//!
//! The cache assumes a type's layout never changes while the session is alive.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use heapscope_utils::Stopwatch;
use tracing::{debug, trace};

use crate::error::{InspectError, InspectResult};
use crate::host::TargetHost;
use crate::runtime::Runtime;
use crate::types::{ObjectAddress, TypeInfoAddress};

/// Kind of a field, as reported by the runtime's field-type query.
///
/// The tag is the index into this fixed table:
///
/// | Tag | Kind |
/// |-----|------|
/// | 0 | `Object` |
/// | 1 | `NestedSynthetic` |
/// | 2..=5 | `Int8`, `Int16`, `Int32`, `Int64` |
/// | 6, 7 | `Float32`, `Float64` |
/// | 8 | `VoidPtr` |
/// | 9 | `Bool` |
/// | other | `Unsupported` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind
{
    /// Reference to another managed object.
    Object,
    /// Object-typed child the runtime marks for synthetic expansion.
    NestedSynthetic,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// IEEE single.
    Float32,
    /// IEEE double.
    Float64,
    /// Raw native pointer, shown as an address and never followed.
    VoidPtr,
    /// Boolean byte.
    Bool,
    /// Tag unknown to this engine; materializes as null.
    Unsupported,
}

impl FieldKind
{
    const BY_TAG: [FieldKind; 10] = [
        FieldKind::Object,
        FieldKind::NestedSynthetic,
        FieldKind::Int8,
        FieldKind::Int16,
        FieldKind::Int32,
        FieldKind::Int64,
        FieldKind::Float32,
        FieldKind::Float64,
        FieldKind::VoidPtr,
        FieldKind::Bool,
    ];

    /// Decode a runtime kind tag.
    pub fn from_tag(tag: i64) -> Self
    {
        usize::try_from(tag)
            .ok()
            .and_then(|index| Self::BY_TAG.get(index).copied())
            .unwrap_or(FieldKind::Unsupported)
    }

    /// Whether values of this kind are managed references rendered recursively.
    pub fn is_reference(self) -> bool
    {
        matches!(self, FieldKind::Object | FieldKind::NestedSynthetic)
    }

    /// Size of a value of this kind in the inspected process.
    pub fn byte_size(self, pointer_size: usize) -> usize
    {
        match self {
            FieldKind::Object | FieldKind::NestedSynthetic | FieldKind::VoidPtr => pointer_size,
            FieldKind::Int8 | FieldKind::Bool => 1,
            FieldKind::Int16 => 2,
            FieldKind::Int32 | FieldKind::Float32 => 4,
            FieldKind::Int64 | FieldKind::Float64 => 8,
            FieldKind::Unsupported => 0,
        }
    }

    /// C type a host uses to construct a typed child value of this kind.
    pub fn c_type(self) -> Option<&'static str>
    {
        match self {
            FieldKind::Object => Some("void *"),
            FieldKind::NestedSynthetic => Some("ObjHeader *"),
            FieldKind::Int8 => Some("int8_t"),
            FieldKind::Int16 => Some("int16_t"),
            FieldKind::Int32 => Some("int32_t"),
            FieldKind::Int64 => Some("int64_t"),
            FieldKind::Float32 => Some("float"),
            FieldKind::Float64 => Some("double"),
            FieldKind::VoidPtr => Some("void *"),
            FieldKind::Bool => Some("bool"),
            FieldKind::Unsupported => None,
        }
    }
}

impl fmt::Display for FieldKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.c_type() {
            Some(c_type) => write!(f, "{c_type}"),
            None => write!(f, "unsupported"),
        }
    }
}

/// One field of a type layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor
{
    name: String,
    kind: FieldKind,
    offset: u64,
}

impl FieldDescriptor
{
    /// Construct a descriptor.
    pub fn new(name: impl Into<String>, kind: FieldKind, offset: u64) -> Self
    {
        Self {
            name: name.into(),
            kind,
            offset,
        }
    }

    /// Field name.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Field kind.
    pub fn kind(&self) -> FieldKind
    {
        self.kind
    }

    /// Byte offset from the start of the object.
    pub fn offset(&self) -> u64
    {
        self.offset
    }
}

/// Shared, immutable field list of one type.
pub type Layout = Rc<[FieldDescriptor]>;

/// Layouts keyed by type-info address.
#[derive(Debug, Default)]
pub struct LayoutCache
{
    layouts: HashMap<TypeInfoAddress, Layout>,
}

impl LayoutCache
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Cached layout for `type_info`, if any.
    pub fn get(&self, type_info: TypeInfoAddress) -> Option<Layout>
    {
        self.layouts.get(&type_info).cloned()
    }

    /// Whether a layout for `type_info` is cached.
    pub fn contains(&self, type_info: TypeInfoAddress) -> bool
    {
        self.layouts.contains_key(&type_info)
    }

    /// Number of cached types.
    pub fn len(&self) -> usize
    {
        self.layouts.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool
    {
        self.layouts.is_empty()
    }

    /// Drop every cached layout.
    pub fn clear(&mut self)
    {
        self.layouts.clear();
    }

    /// Layout of `type_info`, built from `object` on a miss.
    ///
    /// On a hit nothing is queried, not even the field count. On a miss the
    /// field count is queried first, then name, kind and address of each field.
    ///
    /// ## Errors
    ///
    /// Propagates query failures; nothing is cached for `type_info` in that case.
    pub fn layout_for<H: TargetHost>(
        &mut self,
        runtime: &Runtime<H>,
        type_info: TypeInfoAddress,
        object: ObjectAddress,
    ) -> InspectResult<Layout>
    {
        if let Some(layout) = self.get(type_info) {
            trace!(%type_info, "layout cache hit");
            return Ok(layout);
        }

        let watch = Stopwatch::start("build_layout");
        let count = runtime.field_count(object)?;
        let layout: Layout = build_layout(runtime, object, count)?.into();
        watch.finish();

        debug!(%type_info, %object, fields = count, "layout cache miss");
        self.layouts.insert(type_info, layout.clone());
        Ok(layout)
    }
}

fn build_layout<H: TargetHost>(
    runtime: &Runtime<H>,
    object: ObjectAddress,
    count: usize,
) -> InspectResult<Vec<FieldDescriptor>>
{
    (0..count)
        .map(|index| {
            let name = runtime.field_name(object, index)?;
            let kind = FieldKind::from_tag(runtime.field_kind(object, index)?);
            let address = runtime.field_address(object, index)?;
            let offset = address.offset_from(object.address()).ok_or_else(|| {
                InspectError::InvalidArgument(format!(
                    "field {name} of {object} reported at {address}, below the object"
                ))
            })?;
            Ok(FieldDescriptor::new(name, kind, offset))
        })
        .collect()
}
