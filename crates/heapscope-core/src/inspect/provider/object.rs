//! Object provider.

use super::Materialized;
use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::inspect::layout::{FieldDescriptor, Layout, LayoutCache};
use crate::inspect::value::{Child, FieldValue};
use crate::runtime::Runtime;
use crate::types::{ObjectAddress, TypeInfoAddress};

/// Named fields of a composite object.
///
/// Scalar fields are read when the provider is built. Reference fields are
/// read only when a render or a host asks for them, so an exhausted depth
/// budget costs no reads for them.
#[derive(Debug)]
pub struct ObjectProvider
{
    object: ObjectAddress,
    type_info: TypeInfoAddress,
    layout: Layout,
    values: Materialized,
}

impl ObjectProvider
{
    /// Inspect the object at `object` of type `type_info`.
    ///
    /// The layout comes from `layouts`; it is built (and cached) only if this
    /// is the first instance of the type seen in the session.
    ///
    /// ## Errors
    ///
    /// Layout query failures and `MemoryReadFailure` for the scalar reads.
    pub fn new<H: TargetHost>(
        runtime: &Runtime<H>,
        layouts: &mut LayoutCache,
        object: ObjectAddress,
        type_info: TypeInfoAddress,
    ) -> InspectResult<Self>
    {
        let layout = layouts.layout_for(runtime, type_info, object)?;
        let mut values = Materialized::default();
        for (index, field) in layout.iter().enumerate() {
            if !field.kind().is_reference() {
                let value = FieldValue::read(runtime, object.address() + field.offset(), field.kind())?;
                values.insert(index, value);
            }
        }

        Ok(Self {
            object,
            type_info,
            layout,
            values,
        })
    }

    /// Address of the object.
    pub fn object(&self) -> ObjectAddress
    {
        self.object
    }

    /// Type-info of the object.
    pub fn type_info(&self) -> TypeInfoAddress
    {
        self.type_info
    }

    /// Shared layout of the object's type.
    pub fn layout(&self) -> &Layout
    {
        &self.layout
    }

    /// Number of fields.
    pub fn num_fields(&self) -> usize
    {
        self.layout.len()
    }

    /// Descriptor of field `index`.
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor>
    {
        self.layout.get(index)
    }

    pub(super) fn index_of(&self, name: &str) -> Option<usize>
    {
        self.layout.iter().position(|field| field.name() == name)
    }

    pub(super) fn value(&self, index: usize) -> Option<FieldValue>
    {
        self.values.get(index)
    }

    pub(super) fn child_at<H: TargetHost>(&mut self, runtime: &Runtime<H>, index: usize) -> InspectResult<Option<Child>>
    {
        let Some(field) = self.layout.get(index) else {
            return Ok(None);
        };
        let address = self.object.address() + field.offset();
        let kind = field.kind();
        let value = self
            .values
            .get_or_read(index, || FieldValue::read(runtime, address, kind))?;
        Ok(Some(Child {
            name: field.name().to_string(),
            address,
            kind,
            value,
        }))
    }
}
