//! # Stringification Engine
//!
//! Renders a classified object into a [`RenderNode`] tree.
//!
//! ## Depth budget
//!
//! The root is always rendered. Descending into a nested object or array
//! consumes one unit of the budget, and one that would be entered with no
//! budget left renders as `...`. With a budget of 2 the root and one level of
//! nested objects are shown.
//!
//! Strings and nulls render at any level. When the budget is already spent on
//! the parent, reference slots are not even read. Arrays additionally render
//! only their capped prefix.
//!
//! ## Cycles
//!
//! The depth budget alone guarantees termination. A [`RecursionPolicy`] may
//! additionally cut the walk when an object reappears on the current path;
//! [`CycleDetecting`] does that, [`DepthOnly`] never does.

use std::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::host::TargetHost;
use crate::inspect::provider::{Provider, SharedProvider};
use crate::inspect::shape::Shape;
use crate::inspect::value::FieldValue;
use crate::session::Session;
use crate::types::ObjectAddress;

/// Rendered form of an object graph.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode
{
    /// Null reference.
    Null,
    /// Primitive value or raw pointer.
    Scalar(FieldValue),
    /// Decoded string.
    Text(String),
    /// Array prefix.
    List(Vec<RenderNode>),
    /// Object fields in layout order.
    Map(Vec<(String, RenderNode)>),
    /// Depth budget exhausted.
    Elided,
    /// Object already on the current path.
    Cycle,
    /// Rendering this subtree failed.
    Error(String),
}

impl RenderNode
{
    /// Text shown for a top-level summary: strings unquoted, everything else
    /// as in [`Display`](fmt::Display).
    pub fn to_summary(&self) -> String
    {
        match self {
            RenderNode::Text(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RenderNode
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            RenderNode::Null => write!(f, "null"),
            RenderNode::Scalar(value) => write!(f, "{value}"),
            RenderNode::Text(text) => write!(f, "\"{}\"", text.escape_debug()),
            RenderNode::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            RenderNode::Map(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            RenderNode::Elided => write!(f, "..."),
            RenderNode::Cycle => write!(f, "<cycle>"),
            RenderNode::Error(message) => write!(f, "<error: {message}>"),
        }
    }
}

/// Decides whether the walk may enter an object, beyond the depth budget.
pub trait RecursionPolicy
{
    /// Called before rendering `object`'s children. Returning `false` renders
    /// the object as [`RenderNode::Cycle`].
    fn enter(&mut self, object: ObjectAddress) -> bool;

    /// Called after `object`'s children have been rendered.
    fn leave(&mut self, object: ObjectAddress);
}

/// Terminates on the depth budget only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthOnly;

impl RecursionPolicy for DepthOnly
{
    fn enter(&mut self, _object: ObjectAddress) -> bool
    {
        true
    }

    fn leave(&mut self, _object: ObjectAddress) {}
}

/// Also refuses to re-enter an object that is on the current path.
#[derive(Debug, Clone, Default)]
pub struct CycleDetecting
{
    path: SmallVec<[ObjectAddress; 8]>,
}

impl CycleDetecting
{
    /// Create a policy with an empty path.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }
}

impl RecursionPolicy for CycleDetecting
{
    fn enter(&mut self, object: ObjectAddress) -> bool
    {
        if self.path.contains(&object) {
            return false;
        }
        self.path.push(object);
        true
    }

    fn leave(&mut self, object: ObjectAddress)
    {
        if self.path.last() == Some(&object) {
            self.path.pop();
        }
    }
}

/// One walk over an object graph.
pub(crate) struct Renderer<'a, 'p, H>
{
    session: &'a mut Session<H>,
    policy: &'a mut (dyn RecursionPolicy + 'p),
}

impl<'a, 'p, H: TargetHost> Renderer<'a, 'p, H>
{
    pub(crate) fn new(session: &'a mut Session<H>, policy: &'a mut (dyn RecursionPolicy + 'p)) -> Self
    {
        Self { session, policy }
    }

    /// Render the provider of a top-level object with `remaining` nested levels.
    pub(crate) fn render_root(&mut self, provider: &SharedProvider, remaining: u32) -> RenderNode
    {
        self.render_provider(provider, remaining)
    }

    fn render_provider(&mut self, provider: &SharedProvider, remaining: u32) -> RenderNode
    {
        let object = provider.borrow().object();
        if !self.policy.enter(object) {
            debug!(%object, "object already on the render path");
            return RenderNode::Cycle;
        }

        let node = match &*provider.borrow() {
            Provider::String(p) if p.is_fallback() => Some(RenderNode::Scalar(FieldValue::Pointer(object.address()))),
            Provider::String(p) => Some(RenderNode::Text(p.text().to_string())),
            _ => None,
        };
        let node = match node {
            Some(node) => node,
            None => {
                let (shape, count) = {
                    let p = provider.borrow();
                    let count = match &*p {
                        Provider::Array(array) => array.rendered_len(),
                        other => other.num_children(),
                    };
                    (p.shape(), count)
                };
                let children = (0..count).map(|index| self.render_child(provider, index, remaining));
                match shape {
                    Shape::Array => RenderNode::List(children.map(|(_, node)| node).collect()),
                    _ => RenderNode::Map(children.collect()),
                }
            }
        };

        self.policy.leave(object);
        node
    }

    fn render_child(&mut self, provider: &SharedProvider, index: usize, remaining: u32) -> (String, RenderNode)
    {
        let (name, is_reference) = {
            let p = provider.borrow();
            match &*p {
                Provider::Object(object) => match object.field(index) {
                    Some(field) => (field.name().to_string(), field.kind().is_reference()),
                    None => (index.to_string(), false),
                },
                Provider::Array(array) => (index.to_string(), array.kind().is_reference()),
                Provider::String(_) => (index.to_string(), false),
            }
        };

        if is_reference && remaining == 0 {
            trace!(field = %name, "depth budget exhausted");
            return (name, RenderNode::Elided);
        }

        let child = provider.borrow_mut().child_at(self.session.runtime(), index);
        let node = match child {
            Ok(Some(child)) => match child.value {
                FieldValue::Reference(target) => self.render_reference(target, remaining.saturating_sub(1)),
                FieldValue::Null => RenderNode::Null,
                value => RenderNode::Scalar(value),
            },
            Ok(None) => RenderNode::Null,
            Err(err) => RenderNode::Error(err.to_string()),
        };
        (name, node)
    }

    fn render_reference(&mut self, target: ObjectAddress, remaining: u32) -> RenderNode
    {
        if target.is_null() {
            return RenderNode::Null;
        }
        let type_info = match self.session.resolve_type(target) {
            Ok(Some(type_info)) => type_info,
            Ok(None) => return RenderNode::Scalar(FieldValue::Pointer(target.address())),
            Err(err) => return RenderNode::Error(err.to_string()),
        };
        let shape = match self.session.shape_of(target) {
            Ok(shape) => shape,
            Err(err) => return RenderNode::Error(err.to_string()),
        };
        if remaining == 0 && shape != Shape::String {
            trace!(object = %target, %shape, "depth budget exhausted");
            return RenderNode::Elided;
        }
        match self.session.provider_with_shape(target, type_info, shape) {
            Ok(provider) => self.render_provider(&provider, remaining),
            Err(err) => RenderNode::Error(err.to_string()),
        }
    }
}
