/// Attachment declarations (name, format, size, storage class)

use crate::graphics_device::TextureFormat;

/// Index of an attachment inside its `FrameGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttachmentId(pub(crate) usize);

impl AttachmentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Attachment dimensions, either fixed or relative to the frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttachmentSize {
    Absolute { width: u32, height: u32 },
    FrameRelative { width_ratio: f32, height_ratio: f32 },
}

impl AttachmentSize {
    /// Same size as the frame
    pub const FULL_FRAME: AttachmentSize = AttachmentSize::FrameRelative {
        width_ratio: 1.0,
        height_ratio: 1.0,
    };

    /// Size in pixels for a frame of `frame_width` x `frame_height` (never 0)
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
        match *self {
            AttachmentSize::Absolute { width, height } => (width.max(1), height.max(1)),
            AttachmentSize::FrameRelative { width_ratio, height_ratio } => (
                ((frame_width as f32 * width_ratio).round() as u32).max(1),
                ((frame_height as f32 * height_ratio).round() as u32).max(1),
            ),
        }
    }

    /// Hashable form used to group aliasing candidates
    pub(crate) fn key(&self) -> SizeKey {
        match *self {
            AttachmentSize::Absolute { width, height } => SizeKey::Absolute(width, height),
            AttachmentSize::FrameRelative { width_ratio, height_ratio } => {
                SizeKey::Relative(width_ratio.to_bits(), height_ratio.to_bits())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SizeKey {
    Absolute(u32, u32),
    Relative(u32, u32),
}

/// Who owns the memory behind an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// Allocated by the graph, possibly aliased with other transients
    Transient,
    /// Supplied by the caller (`bind_external_texture`); never aliased or freed
    External,
}

/// Declaration of one attachment
#[derive(Debug, Clone, PartialEq)]
pub struct FramePassAttachment {
    pub name: String,
    pub format: TextureFormat,
    pub size: AttachmentSize,
    pub storage: StorageClass,
}

impl FramePassAttachment {
    pub fn transient(name: impl Into<String>, format: TextureFormat, size: AttachmentSize) -> Self {
        Self { name: name.into(), format, size, storage: StorageClass::Transient }
    }

    pub fn external(name: impl Into<String>, format: TextureFormat, size: AttachmentSize) -> Self {
        Self { name: name.into(), format, size, storage: StorageClass::External }
    }
}
