//! # Runtime Bridge
//!
//! Typed wrappers around the debug entry points exported by the inspected
//! process's runtime support layer. Each query is a C expression sent through
//! [`TargetHost::evaluate`], i.e. one blocking round-trip to the process.
//!
//! ## Entry points
//!
//! | Query | Expression |
//! |-------|------------|
//! | instance-of | `(bool)IsInstance(obj, type_info)` |
//! | field count | `(int)Konan_DebugGetFieldCount(obj)` |
//! | field name | `(void *)Konan_DebugGetFieldName(obj, (int)i)` then a C-string read |
//! | field kind | `(int)Konan_DebugGetFieldType(obj, i)` |
//! | field address | `(void *)Konan_DebugGetFieldAddress(obj, i)` |
//! | type name | `(char *)Konan_DebugGetTypeName(expr)` |
//! | scratch buffer | `(void *)Konan_DebugBuffer()` |
//! | UTF-8 encode | `(int)Konan_DebugObjectToUtf8Array(obj, buf, (int)Konan_DebugBufferSize())` |
//!
//! The string class type-info address is looked up by symbol once and memoised.

use heapscope_utils::Stopwatch;
use once_cell::unsync::OnceCell;
use tracing::trace;

use crate::config::InspectorConfig;
use crate::error::{InspectError, InspectResult};
use crate::host::{Endianness, EvalValue, TargetHost};
use crate::types::{Address, ObjectAddress, TypeInfoAddress};

pub(crate) const IS_INSTANCE: &str = "IsInstance";
pub(crate) const IS_ARRAY: &str = "Konan_DebugIsArray";
pub(crate) const FIELD_COUNT: &str = "Konan_DebugGetFieldCount";
pub(crate) const FIELD_NAME: &str = "Konan_DebugGetFieldName";
pub(crate) const FIELD_TYPE: &str = "Konan_DebugGetFieldType";
pub(crate) const FIELD_ADDRESS: &str = "Konan_DebugGetFieldAddress";
pub(crate) const TYPE_NAME: &str = "Konan_DebugGetTypeName";
pub(crate) const BUFFER: &str = "Konan_DebugBuffer";
pub(crate) const BUFFER_SIZE: &str = "Konan_DebugBufferSize";
pub(crate) const TO_UTF8: &str = "Konan_DebugObjectToUtf8Array";

/// Query interface to the inspected runtime, layered over a [`TargetHost`].
pub struct Runtime<H>
{
    host: H,
    string_class_symbol: String,
    field_name_limit: usize,
    string_type_info: OnceCell<TypeInfoAddress>,
}

impl<H: TargetHost> Runtime<H>
{
    /// Wrap `host`, taking symbol names and limits from `config`.
    pub fn new(host: H, config: &InspectorConfig) -> Self
    {
        Self {
            host,
            string_class_symbol: config.string_class_symbol.clone(),
            field_name_limit: config.field_name_limit,
            string_type_info: OnceCell::new(),
        }
    }

    /// The wrapped host.
    pub fn host(&self) -> &H
    {
        &self.host
    }

    /// Pointer width of the inspected process.
    pub fn pointer_size(&self) -> usize
    {
        self.host.pointer_size()
    }

    /// Byte order of the inspected process.
    pub fn endianness(&self) -> Endianness
    {
        self.host.endianness()
    }

    /// Evaluate an expression, logging it and its latency.
    ///
    /// ## Errors
    ///
    /// Propagates host evaluation failures.
    pub fn evaluate(&self, expression: &str) -> InspectResult<EvalValue>
    {
        let watch = Stopwatch::start("evaluate");
        let result = self.host.evaluate(expression);
        watch.finish();
        trace!(expression, result = ?result.as_ref().ok(), "evaluate");
        result
    }

    /// Read `len` bytes of process memory.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` from the host.
    pub fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>
    {
        self.host.read_memory(address, len)
    }

    /// Type-info address of the string class, resolved by symbol on first use.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` if the configured string class symbol is absent.
    pub fn string_type_info(&self) -> InspectResult<TypeInfoAddress>
    {
        self.string_type_info
            .get_or_try_init(|| self.host.symbol_address(&self.string_class_symbol).map(TypeInfoAddress))
            .copied()
    }

    /// Whether `object` is an instance of `type_info`.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn is_instance(&self, object: ObjectAddress, type_info: TypeInfoAddress) -> InspectResult<bool>
    {
        let value = self.evaluate(&format!("(bool){IS_INSTANCE}({object}, {type_info})"))?;
        Ok(value.is_true())
    }

    /// Number of fields of an object, or number of elements of an array.
    ///
    /// A negative answer from the runtime is treated as zero.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn field_count(&self, object: ObjectAddress) -> InspectResult<usize>
    {
        let value = self.evaluate(&format!("(int){FIELD_COUNT}({object})"))?;
        Ok(usize::try_from(value.signed()).unwrap_or(0))
    }

    /// Name of field `index`.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if the returned name cannot be read.
    pub fn field_name(&self, object: ObjectAddress, index: usize) -> InspectResult<String>
    {
        let pointer = self.evaluate(&format!("(void *){FIELD_NAME}({object}, (int){index})"))?;
        if pointer.address().is_null() {
            return Err(InspectError::MemoryReadFailure {
                address: pointer.address(),
                len: 0,
                reason: format!("runtime returned no name for field {index} of {object}"),
            });
        }
        self.host.read_c_string(pointer.address(), self.field_name_limit)
    }

    /// Raw kind tag of field `index`.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn field_kind(&self, object: ObjectAddress, index: usize) -> InspectResult<i64>
    {
        Ok(self.evaluate(&format!("(int){FIELD_TYPE}({object}, {index})"))?.signed())
    }

    /// Absolute address of field (or element) `index`.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn field_address(&self, object: ObjectAddress, index: usize) -> InspectResult<Address>
    {
        Ok(self
            .evaluate(&format!("(void *){FIELD_ADDRESS}({object}, {index})"))?
            .address())
    }

    /// Runtime type name of the object denoted by `expression`.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn type_name(&self, expression: &str) -> InspectResult<Option<String>>
    {
        let value = self.evaluate(&format!("(char *){TYPE_NAME}({expression})"))?;
        Ok(value.summary().map(|summary| summary.trim_matches('"').to_string()))
    }

    /// Address of the runtime-owned scratch buffer.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn scratch_buffer(&self) -> InspectResult<Address>
    {
        Ok(self.evaluate(&format!("(void *){BUFFER}()"))?.address())
    }

    /// Encode a string object as UTF-8 into `buffer`, bounded by the scratch
    /// buffer's capacity. Returns the runtime-reported byte count.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn encode_utf8(&self, object: ObjectAddress, buffer: Address) -> InspectResult<i64>
    {
        let expression = format!("(int){TO_UTF8}({object}, (void *){buffer}, (int){BUFFER_SIZE}());");
        Ok(self.evaluate(&expression)?.signed())
    }

    /// Call a zero-argument function at `address` returning `c_type`.
    ///
    /// ## Errors
    ///
    /// Propagates evaluation failures.
    pub fn call_getter(&self, c_type: &str, address: Address) -> InspectResult<EvalValue>
    {
        self.evaluate(&format!("(({c_type} (*)()){address})()"))
    }
}

impl<H> std::fmt::Debug for Runtime<H>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("Runtime")
            .field("string_class_symbol", &self.string_class_symbol)
            .field("field_name_limit", &self.field_name_limit)
            .field("string_type_info", &self.string_type_info.get())
            .finish_non_exhaustive()
    }
}
