//! # heapscope-core
//!
//! Heap-object introspection for debuggers of a managed, garbage-collected
//! runtime.
//!
//! Given an opaque object pointer in a live or core-dumped process, this crate
//! works out the object's type, decides whether it is a string, an array or a
//! composite object, and renders its fields as a depth-limited tree. It is
//! loaded by a host debugger and reaches the process only through the host's
//! expression evaluator, memory reader and symbol table ([`TargetHost`]).
//!
//! ## Round-trips
//!
//! Every runtime query is a blocking round-trip to the inspected process, so
//! the engine is built around avoiding them:
//! - type resolution and shape classification are one expression each
//! - field layouts are queried once per type and cached by type-info address
//! - providers are cached by object address for the rest of the session
//! - reference fields are read only when the depth budget lets them render
//!
//! ## Threading
//!
//! Hosts deliver callbacks on one thread; [`Session`] is neither `Send` nor `Sync`.

pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod inspect;
pub mod prelude;
pub mod runtime;
pub mod session;
pub mod types;

pub use config::InspectorConfig;
pub use error::{InspectError, InspectResult};
pub use host::{EvalValue, TargetHost};
pub use session::Session;
pub use types::{Address, ObjectAddress, TypeInfoAddress};
