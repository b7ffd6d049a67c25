//! Common module for library exports

pub use crate::commands::{dispatch, Command, CommandOutput};
pub use crate::config::{CycleHandling, InspectorConfig};
pub use crate::error::{InspectError, InspectResult};
pub use crate::host::{Endianness, EvalValue, TargetHost};
pub use crate::inspect::{Child, FieldKind, FieldValue, RenderNode, Shape};
pub use crate::session::Session;
pub use crate::types::{Address, ObjectAddress, RuntimeSymbol, TypeInfoAddress};
