//! Memory address types.
//!
//! The inspected runtime hands out two kinds of pointers that must never be
//! mixed up: heap objects (valid only while the object is live) and type-info
//! blocks (stable for the lifetime of the process). Both wrap [`Address`].

use std::fmt;
use std::num::ParseIntError;
use std::ops::Add;
use std::str::FromStr;

/// Low bits of an object header word used by the memory manager.
///
/// They must be cleared before the header is dereferenced.
pub const TAG_MASK: u64 = 0x3;

/// Strongly typed address in the inspected process.
///
/// ```rust
/// use heapscope_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// assert_eq!((addr + 0x10).value(), 0x1010);
/// assert_eq!(Address::from(0x1003).untagged(), addr);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the null address
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// The address with the memory-manager tag bits cleared.
    #[must_use]
    pub const fn untagged(self) -> Self
    {
        Address(self.0 & !TAG_MASK)
    }

    /// Add an offset to this address, checking for overflow
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Distance from `base` to this address, or `None` if this address is below `base`.
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

/// Parses `0x`-prefixed hex or plain decimal.
impl FromStr for Address
{
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        let s = s.trim();
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16)?,
            None => s.parse()?,
        };
        Ok(Address(value))
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

/// Address of a managed heap object.
///
/// Only meaningful while the object is live. Caches keyed by it are not an
/// authority on liveness: if the allocator reuses the address, cached data is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ObjectAddress(pub Address);

impl ObjectAddress
{
    /// The null reference
    pub const NULL: Self = ObjectAddress(Address::ZERO);

    /// Underlying address
    pub const fn address(self) -> Address
    {
        self.0
    }

    /// Whether this is the null reference
    pub const fn is_null(self) -> bool
    {
        self.0.is_null()
    }
}

impl From<u64> for ObjectAddress
{
    fn from(value: u64) -> Self
    {
        ObjectAddress(Address::new(value))
    }
}

impl fmt::Display for ObjectAddress
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Address of a runtime type-info block.
///
/// Stable for the lifetime of the process; used as the layout cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeInfoAddress(pub Address);

impl TypeInfoAddress
{
    /// Underlying address
    pub const fn address(self) -> Address
    {
        self.0
    }
}

impl From<u64> for TypeInfoAddress
{
    fn from(value: u64) -> Self
    {
        TypeInfoAddress(Address::new(value))
    }
}

impl fmt::Display for TypeInfoAddress
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::Display::fmt(&self.0, f)
    }
}
