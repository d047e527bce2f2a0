/// Buffer trait and buffer descriptor

use crate::error::Result;

/// Buffer usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
    Storage,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Write `data` at `offset` (host-visible upload)
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;
}
