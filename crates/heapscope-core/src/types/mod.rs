//! # Types
//!
//! Address and symbol types shared by the engine, the host interface and the
//! maintenance commands.

pub mod address;
pub mod symbols;

// Re-export all public types
pub use address::{Address, ObjectAddress, TypeInfoAddress, TAG_MASK};
pub use symbols::{RuntimeSymbol, SymbolKind};
