//! # Error Types
//!
//! General error handling for the introspection engine.
//!
//! We use `thiserror` to generate the `Error` implementations. How each
//! variant is surfaced depends on where it happens: an unresolvable type at the
//! top of a summary falls back to the raw pointer text, a failure inside a
//! nested field renders as an error marker for that field only, and everything
//! else propagates to the host's result channel.

use thiserror::Error;

use crate::types::Address;

/// Main error type for introspection operations
#[derive(Error, Debug)]
pub enum InspectError
{
    /// The object's header does not lead to a self-referencing type-info block
    ///
    /// Typical causes are uninitialized memory, a corrupt header, or a pointer
    /// that is not a managed object at all.
    #[error("Cannot determine the type of object at {0}")]
    UnresolvableType(Address),

    /// Reading raw bytes from the inspected process failed
    ///
    /// Raised instead of returning a partially built provider.
    #[error("Failed to read {len} bytes at {address}: {reason}")]
    MemoryReadFailure
    {
        /// Start of the failed read
        address: Address,
        /// Number of bytes requested
        len: usize,
        /// Host-supplied description
        reason: String,
    },

    /// The host evaluator rejected or failed an expression
    #[error("Failed to evaluate `{expression}`: {reason}")]
    Evaluation
    {
        /// The expression sent to the host
        expression: String,
        /// Host-supplied description
        reason: String,
    },

    /// A symbol required by the engine is not present in the selected module
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Invalid argument passed to an operation or command
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for `Result<T, InspectError>`
///
/// ```rust
/// use heapscope_core::error::InspectResult;
/// fn foo() -> InspectResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type InspectResult<T> = std::result::Result<T, InspectError>;
