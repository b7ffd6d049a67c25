//! # Inspector Configuration
//!
//! Rendering limits and runtime symbol names used by a [`Session`](crate::Session).
//!
//! ## Environment Variables
//!
//! - `HEAPSCOPE_TO_STRING_DEPTH`: nested-object depth budget for summaries (default: 2)
//! - `HEAPSCOPE_ARRAY_LIMIT`: array elements shown in a summary (default: 10)
//! - `HEAPSCOPE_CYCLE_HANDLING`: `depth` (default) or `detect`
//!
//! Unparseable values are logged and ignored.

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::error::InspectError;

/// Default depth budget for recursive stringification.
pub const TO_STRING_DEPTH: u32 = 2;

/// Default number of array elements materialized and rendered.
pub const ARRAY_TO_STRING_LIMIT: usize = 10;

/// Maximum length of a C string returned by a runtime entry point.
pub const FIELD_NAME_LIMIT: usize = 0x1000;

/// Symbol of the string class type-info block.
pub const STRING_CLASS_SYMBOL: &str = "kclass:kotlin.String";

const DEPTH_VAR: &str = "HEAPSCOPE_TO_STRING_DEPTH";
const ARRAY_LIMIT_VAR: &str = "HEAPSCOPE_ARRAY_LIMIT";
const CYCLE_VAR: &str = "HEAPSCOPE_CYCLE_HANDLING";

/// How recursive rendering terminates on self-referencing object graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleHandling
{
    /// Stop only when the depth budget runs out.
    #[default]
    DepthOnly,
    /// Additionally mark an object that reappears on the current path as `<cycle>`.
    Detect,
}

impl FromStr for CycleHandling
{
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "depth" | "depth-only" | "none" => Ok(CycleHandling::DepthOnly),
            "detect" | "visited" => Ok(CycleHandling::Detect),
            _ => Err(InspectError::InvalidArgument(format!(
                "unknown cycle handling: {s}. Use 'depth' or 'detect'"
            ))),
        }
    }
}

/// Engine configuration.
///
/// ```rust
/// use heapscope_core::config::{CycleHandling, InspectorConfig};
///
/// let config = InspectorConfig::default()
///     .with_to_string_depth(3)
///     .with_cycle_handling(CycleHandling::Detect);
/// assert_eq!(config.to_string_depth, 3);
/// assert_eq!(config.array_to_string_limit, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig
{
    /// Depth budget: the root plus `to_string_depth - 1` nested object levels are
    /// rendered before `...` is substituted.
    pub to_string_depth: u32,
    /// Array elements eagerly materialized and rendered.
    pub array_to_string_limit: usize,
    /// Upper bound when reading runtime-provided C strings (field names).
    pub field_name_limit: usize,
    /// Symbol whose load address is the string class type-info.
    pub string_class_symbol: String,
    /// Termination strategy for recursive rendering.
    pub cycle_handling: CycleHandling,
}

impl Default for InspectorConfig
{
    fn default() -> Self
    {
        Self {
            to_string_depth: TO_STRING_DEPTH,
            array_to_string_limit: ARRAY_TO_STRING_LIMIT,
            field_name_limit: FIELD_NAME_LIMIT,
            string_class_symbol: STRING_CLASS_SYMBOL.to_string(),
            cycle_handling: CycleHandling::DepthOnly,
        }
    }
}

impl InspectorConfig
{
    /// Defaults overridden by `HEAPSCOPE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self
    {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self
    {
        let mut config = Self::default();
        if let Some(depth) = parse_var(&lookup, DEPTH_VAR) {
            config.to_string_depth = depth;
        }
        if let Some(limit) = parse_var(&lookup, ARRAY_LIMIT_VAR) {
            config.array_to_string_limit = limit;
        }
        if let Some(handling) = parse_var(&lookup, CYCLE_VAR) {
            config.cycle_handling = handling;
        }
        config
    }

    /// Set the depth budget.
    #[must_use]
    pub fn with_to_string_depth(mut self, depth: u32) -> Self
    {
        self.to_string_depth = depth;
        self
    }

    /// Set the array element limit.
    #[must_use]
    pub fn with_array_limit(mut self, limit: usize) -> Self
    {
        self.array_to_string_limit = limit;
        self
    }

    /// Set the string class symbol name.
    #[must_use]
    pub fn with_string_class_symbol(mut self, symbol: impl Into<String>) -> Self
    {
        self.string_class_symbol = symbol.into();
        self
    }

    /// Set the cycle handling strategy.
    #[must_use]
    pub fn with_cycle_handling(mut self, handling: CycleHandling) -> Self
    {
        self.cycle_handling = handling;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(variable = key, value = %raw, error = %err, "ignoring invalid configuration value");
            None
        }
    }
}
