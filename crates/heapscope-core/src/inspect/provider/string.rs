//! String provider.

use tracing::debug;

use crate::error::InspectResult;
use crate::host::TargetHost;
use crate::runtime::Runtime;
use crate::types::ObjectAddress;

/// Decoded contents of a managed string.
///
/// The runtime encodes the string as UTF-8 into its scratch buffer (bounded by
/// the buffer's capacity) and the engine reads back exactly the reported byte
/// count. If the runtime reports nothing, the raw pointer text stands in.
#[derive(Debug, Clone)]
pub struct StringProvider
{
    object: ObjectAddress,
    text: String,
    fallback: bool,
}

impl StringProvider
{
    /// Decode the string at `object`.
    ///
    /// ## Errors
    ///
    /// `MemoryReadFailure` if the encoded bytes cannot be read back; evaluation
    /// failures from the runtime queries.
    pub fn new<H: TargetHost>(runtime: &Runtime<H>, object: ObjectAddress) -> InspectResult<Self>
    {
        let buffer = runtime.scratch_buffer()?;
        let len = runtime.encode_utf8(object, buffer)?;

        let Some(len) = usize::try_from(len).ok().filter(|&len| len > 0) else {
            debug!(%object, len, "string encoding returned nothing, using raw value");
            return Ok(Self {
                object,
                text: object.to_string(),
                fallback: true,
            });
        };

        let mut bytes = runtime.read_memory(buffer, len)?;
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(end);
        }

        Ok(Self {
            object,
            text: String::from_utf8_lossy(&bytes).into_owned(),
            fallback: false,
        })
    }

    /// Address of the string object.
    pub fn object(&self) -> ObjectAddress
    {
        self.object
    }

    /// Decoded text, or the raw pointer text on fallback.
    pub fn text(&self) -> &str
    {
        &self.text
    }

    /// Whether the runtime failed to encode the string.
    pub fn is_fallback(&self) -> bool
    {
        self.fallback
    }
}
