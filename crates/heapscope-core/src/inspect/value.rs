//! Field values read from the inspected process.

use std::fmt;

use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::inspect::layout::FieldKind;
use crate::runtime::Runtime;
use crate::types::{Address, ObjectAddress};

/// A materialized field or element value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue
{
    /// Unsupported kind, or nothing to show.
    Null,
    /// `Int8` field
    Int8(i8),
    /// `Int16` field
    Int16(i16),
    /// `Int32` field
    Int32(i32),
    /// `Int64` field
    Int64(i64),
    /// `Float32` field
    Float32(f32),
    /// `Float64` field
    Float64(f64),
    /// `Bool` field
    Bool(bool),
    /// Raw native pointer
    Pointer(Address),
    /// Managed reference; rendered by classifying the target
    Reference(ObjectAddress),
}

impl FieldValue
{
    /// Read a value of `kind` stored at `address`.
    ///
    /// `Unsupported` kinds yield [`FieldValue::Null`] without a read.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if the bytes cannot be read.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn read<H: TargetHost>(runtime: &Runtime<H>, address: Address, kind: FieldKind) -> InspectResult<Self>
    {
        let size = kind.byte_size(runtime.pointer_size());
        if size == 0 {
            return Ok(FieldValue::Null);
        }

        let bytes = runtime.read_memory(address, size)?;
        let raw = runtime.endianness().decode(&bytes);
        Ok(match kind {
            FieldKind::Object | FieldKind::NestedSynthetic => FieldValue::Reference(ObjectAddress::from(raw)),
            FieldKind::VoidPtr => FieldValue::Pointer(Address::new(raw)),
            FieldKind::Int8 => FieldValue::Int8(raw as u8 as i8),
            FieldKind::Int16 => FieldValue::Int16(raw as u16 as i16),
            FieldKind::Int32 => FieldValue::Int32(raw as u32 as i32),
            FieldKind::Int64 => FieldValue::Int64(raw as i64),
            FieldKind::Float32 => FieldValue::Float32(f32::from_bits(raw as u32)),
            FieldKind::Float64 => FieldValue::Float64(f64::from_bits(raw)),
            FieldKind::Bool => FieldValue::Bool(raw != 0),
            FieldKind::Unsupported => FieldValue::Null,
        })
    }

    /// The referenced object, for managed references.
    pub fn as_reference(&self) -> Option<ObjectAddress>
    {
        match self {
            FieldValue::Reference(object) => Some(*object),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Int8(v) => write!(f, "{v}"),
            FieldValue::Int16(v) => write!(f, "{v}"),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Int64(v) => write!(f, "{v}"),
            FieldValue::Float32(v) => write!(f, "{v}"),
            FieldValue::Float64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Pointer(address) => write!(f, "{address}"),
            FieldValue::Reference(object) if object.is_null() => write!(f, "null"),
            FieldValue::Reference(object) => write!(f, "{object}"),
        }
    }
}

/// A synthetic child handed back to the host.
///
/// Carries the absolute address and kind so the host can build its own typed
/// value (`c_type` at `address`) for its rendering pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Child
{
    /// Field name, or the decimal index for array elements.
    pub name: String,
    /// Absolute address of the stored value.
    pub address: Address,
    /// Kind of the stored value.
    pub kind: FieldKind,
    /// The decoded value.
    pub value: FieldValue,
}
