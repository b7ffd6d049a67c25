//! # Object Introspection
//!
//! The pipeline from a raw object pointer to rendered text:
//!
//! 1. [`identity`]: object pointer to type-info address
//! 2. [`shape`]: string, array or object
//! 3. [`layout`]: per-type field descriptors, cached by type-info
//! 4. [`provider`]: lazily materialized children
//! 5. [`render`]: depth-limited tree and its text form
//!
//! The caches tying these together live in [`Session`](crate::Session).

pub mod identity;
pub mod layout;
pub mod provider;
pub mod render;
pub mod shape;
pub mod value;

pub use layout::{FieldDescriptor, FieldKind, Layout, LayoutCache};
pub use provider::{ArrayProvider, ObjectProvider, Provider, SharedProvider, StringProvider};
pub use render::{CycleDetecting, DepthOnly, RecursionPolicy, RenderNode};
pub use shape::Shape;
pub use value::{Child, FieldValue};
