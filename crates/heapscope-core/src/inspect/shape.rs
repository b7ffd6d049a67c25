//! # Shape Classifier
//!
//! Decides whether an object is a string, an array, or a composite object.
//!
//! Both checks are folded into one three-way expression (`1` string, `2` array,
//! `0` object) so classification is a single round-trip. The string check is
//! evaluated first, so a string is never reported as an array.

use std::fmt;

use heapscope_utils::Stopwatch;
use tracing::{trace, warn};

use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::runtime::{Runtime, IS_ARRAY, IS_INSTANCE};
use crate::types::{ObjectAddress, TypeInfoAddress};

/// Runtime shape of a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape
{
    /// Instance of the string class.
    String,
    /// Any array type.
    Array,
    /// Anything else: fields enumerated by index.
    Object,
}

impl Shape
{
    /// Decode the classifier's answer. Unknown codes are treated as objects.
    pub fn from_code(code: i64) -> Self
    {
        match code {
            1 => Shape::String,
            2 => Shape::Array,
            0 => Shape::Object,
            other => {
                warn!(code = other, "unexpected shape code, treating as object");
                Shape::Object
            }
        }
    }
}

impl fmt::Display for Shape
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let label = match self {
            Shape::String => "string",
            Shape::Array => "array",
            Shape::Object => "object",
        };
        write!(f, "{label}")
    }
}

/// Expression answering `1`, `2` or `0` for string, array or object.
pub(crate) fn shape_expression(object: ObjectAddress, string_type_info: TypeInfoAddress) -> String
{
    format!("(int)({IS_INSTANCE}({object}, {string_type_info}) ? 1 : ((int){IS_ARRAY}({object}) ? 2 : 0))")
}

/// Classify `object`.
///
/// ## Errors
///
/// `SymbolNotFound` if the string class cannot be located; evaluation failures.
pub fn classify<H: TargetHost>(runtime: &Runtime<H>, object: ObjectAddress) -> InspectResult<Shape>
{
    let string_type_info = runtime.string_type_info()?;

    let watch = Stopwatch::start("classify");
    let code = runtime.evaluate(&shape_expression(object, string_type_info))?.signed();
    watch.finish();

    let shape = Shape::from_code(code);
    trace!(%object, %shape, "classified");
    Ok(shape)
}
