//! # Host Debugger Interface
//!
//! The engine never touches the inspected process directly. Everything goes
//! through a host debugger (LLDB, a core-file reader, a test double) that
//! implements [`TargetHost`].
//!
//! ## What the host provides
//!
//! - **Expression evaluation** against the selected process/thread/frame. The
//!   engine calls the runtime's debug entry points this way.
//! - **Raw memory reads** with a byte-count bound and error signalling.
//! - **Symbols** of the module of the selected frame, for name and address lookup.
//!
//! ## Thread Safety
//!
//! Hosts deliver scripting callbacks on a single thread. Implementations need
//! not be `Sync`, and the engine never calls a host from more than one thread.

use crate::error::{InspectError, InspectResult};
use crate::types::{Address, RuntimeSymbol};

/// Byte order of the inspected process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness
{
    /// Least significant byte first (x86-64, AArch64 in practice)
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

impl Endianness
{
    /// Decode an unsigned integer from up to eight bytes.
    pub fn decode(self, bytes: &[u8]) -> u64
    {
        let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
        match self {
            Endianness::Little => bytes.iter().rev().fold(0, fold),
            Endianness::Big => bytes.iter().fold(0, fold),
        }
    }
}

/// Result of evaluating an expression in the inspected process.
///
/// Holds the raw bits of a scalar result plus its width, so callers can
/// reinterpret it as signed or unsigned the way the expression's cast intended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalValue
{
    bits: u64,
    byte_size: u8,
    summary: Option<String>,
}

impl EvalValue
{
    /// Construct from raw bits and the result type's width in bytes (1..=8).
    pub fn new(bits: u64, byte_size: u8) -> Self
    {
        Self {
            bits,
            byte_size: byte_size.clamp(1, 8),
            summary: None,
        }
    }

    /// A pointer-sized result.
    pub fn pointer(address: Address) -> Self
    {
        Self::new(address.value(), 8)
    }

    /// An `int` result.
    #[allow(clippy::cast_sign_loss)]
    pub fn int(value: i32) -> Self
    {
        Self::new(u64::from(value as u32), 4)
    }

    /// A `bool` result.
    pub fn boolean(value: bool) -> Self
    {
        Self::new(u64::from(value), 1)
    }

    /// Attach the host's textual summary (e.g. the pointee of a `char *`).
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self
    {
        self.summary = Some(summary.into());
        self
    }

    /// The value zero-extended from its width.
    pub fn unsigned(&self) -> u64
    {
        if self.byte_size >= 8 {
            self.bits
        } else {
            self.bits & ((1u64 << (u32::from(self.byte_size) * 8)) - 1)
        }
    }

    /// The value sign-extended from its width.
    #[allow(clippy::cast_possible_wrap)]
    pub fn signed(&self) -> i64
    {
        let shift = 64 - u32::from(self.byte_size) * 8;
        ((self.unsigned() as i64) << shift) >> shift
    }

    /// The value as an address.
    pub fn address(&self) -> Address
    {
        Address::new(self.unsigned())
    }

    /// Whether the value is non-zero (C truthiness).
    pub fn is_true(&self) -> bool
    {
        self.unsigned() != 0
    }

    /// Host-provided summary text, if any.
    pub fn summary(&self) -> Option<&str>
    {
        self.summary.as_deref()
    }
}

/// Services the engine consumes from the host debugger.
///
/// Only [`evaluate`](TargetHost::evaluate), [`read_memory`](TargetHost::read_memory)
/// and [`module_symbols`](TargetHost::module_symbols) are required; the rest
/// have defaults built on those.
pub trait TargetHost
{
    /// Evaluate a C expression in the selected frame of the inspected process.
    ///
    /// ## Errors
    ///
    /// `Evaluation` if the expression fails to compile or run.
    fn evaluate(&self, expression: &str) -> InspectResult<EvalValue>;

    /// Read exactly `len` bytes at `address`.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if any part of the range is unreadable.
    fn read_memory(&self, address: Address, len: usize) -> InspectResult<Vec<u8>>;

    /// Symbols of the module of the selected frame, in module order.
    ///
    /// ## Errors
    ///
    /// Host-specific failures, e.g. no process or frame selected.
    fn module_symbols(&self) -> InspectResult<Vec<RuntimeSymbol>>;

    /// Pointer width of the inspected process in bytes.
    fn pointer_size(&self) -> usize
    {
        8
    }

    /// Byte order of the inspected process.
    fn endianness(&self) -> Endianness
    {
        Endianness::Little
    }

    /// Read a NUL-terminated string of at most `max_len` bytes.
    ///
    /// Reads in chunks of up to 64 bytes. A chunk that cannot be read is
    /// retried one byte at a time, so a string that ends just before unmapped
    /// memory is still returned.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if a byte before the terminator cannot be read.
    fn read_c_string(&self, address: Address, max_len: usize) -> InspectResult<String>
    {
        const CHUNK: usize = 64;

        let mut bytes = Vec::new();
        while bytes.len() < max_len {
            let at = address + bytes.len() as u64;
            let len = CHUNK.min(max_len - bytes.len());
            let chunk = match self.read_memory(at, len) {
                Ok(chunk) => chunk,
                Err(err) => self.read_memory(at, 1).map_err(|_| err)?,
            };
            if let Some(end) = chunk.iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..end]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Load address of the first symbol named `name`.
    ///
    /// ## Errors
    ///
    /// `SymbolNotFound` if no symbol has that name.
    fn symbol_address(&self, name: &str) -> InspectResult<Address>
    {
        self.module_symbols()?
            .into_iter()
            .find(|symbol| symbol.name() == name)
            .map(|symbol| symbol.address())
            .ok_or_else(|| InspectError::SymbolNotFound(name.to_string()))
    }

    /// All symbols loaded at exactly `address`.
    ///
    /// ## Errors
    ///
    /// Propagates [`module_symbols`](TargetHost::module_symbols) failures.
    fn symbols_at(&self, address: Address) -> InspectResult<Vec<RuntimeSymbol>>
    {
        Ok(self
            .module_symbols()?
            .into_iter()
            .filter(|symbol| symbol.address() == address)
            .collect())
    }
}
