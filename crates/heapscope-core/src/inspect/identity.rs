//! # Type Identity Resolver
//!
//! Maps an object pointer to the address of its type-info block.
//!
//! An object's first word points (with the two low tag bits possibly set) either
//! at its type-info or at a meta-object whose first word points at the
//! type-info. A type-info block's first word points at itself. So with
//! `P = header & ~0x3` and `T = *P`, the object has a resolvable type iff
//! `*T == T`, and `T` is the answer. In the common case `P` is the type-info
//! and `T == P`.
//!
//! The whole check is one expression, so resolution costs a single round-trip.

use heapscope_utils::Stopwatch;
use tracing::debug;

use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::runtime::Runtime;
use crate::types::{ObjectAddress, TypeInfoAddress, TAG_MASK};

/// Expression evaluating to the type-info of `object`, or null.
pub(crate) fn type_info_expression(object: ObjectAddress) -> String
{
    let header = format!("((uintptr_t)(*(void**){object}) & ~{TAG_MASK:#x})");
    format!("*(void **){header} == **(void***){header} ? *(void **){header} : (void *)0")
}

/// Resolve the type-info address of `object`.
///
/// Returns `Ok(None)` for the null reference (without touching the process) and
/// for objects whose header does not lead to a self-referencing type-info.
///
/// ## Errors
///
/// Propagates evaluation failures.
pub fn resolve<H: TargetHost>(runtime: &Runtime<H>, object: ObjectAddress) -> InspectResult<Option<TypeInfoAddress>>
{
    if object.is_null() {
        return Ok(None);
    }

    let watch = Stopwatch::start("resolve_type_info");
    let value = runtime.evaluate(&type_info_expression(object))?;
    watch.finish();

    let address = value.address();
    if address.is_null() {
        debug!(%object, "object type cannot be determined");
        return Ok(None);
    }
    Ok(Some(TypeInfoAddress(address)))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_expression_masks_tag_bits()
    {
        let expression = type_info_expression(ObjectAddress::from(0x1000));
        assert_eq!(
            expression,
            "*(void **)((uintptr_t)(*(void**)0x1000) & ~0x3) == **(void***)((uintptr_t)(*(void**)0x1000) & ~0x3) \
             ? *(void **)((uintptr_t)(*(void**)0x1000) & ~0x3) : (void *)0"
        );
    }
}
