/// Texture trait, texture descriptor, and texture info

use bitflags::bitflags;

/// Texture pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum TextureFormat {
    R8G8B8A8_SRGB,
    R8G8B8A8_UNORM,
    B8G8R8A8_SRGB,
    B8G8R8A8_UNORM,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    D16_UNORM,
    D32_FLOAT,
    D24_UNORM_S8_UINT,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::R8G8B8A8_SRGB
            | TextureFormat::R8G8B8A8_UNORM
            | TextureFormat::B8G8R8A8_SRGB
            | TextureFormat::B8G8R8A8_UNORM
            | TextureFormat::R32_SFLOAT
            | TextureFormat::D32_FLOAT
            | TextureFormat::D24_UNORM_S8_UINT => 4,
            TextureFormat::R16G16B16A16_SFLOAT => 8,
            TextureFormat::D16_UNORM => 2,
        }
    }

    /// Whether this is a depth (or depth/stencil) format
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::D16_UNORM | TextureFormat::D32_FLOAT | TextureFormat::D24_UNORM_S8_UINT
        )
    }

    /// Whether this format carries a stencil component
    pub fn has_stencil(self) -> bool {
        self == TextureFormat::D24_UNORM_S8_UINT
    }
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Sampled in shaders
        const SAMPLED = 1 << 0;
        /// Written as a color attachment
        const COLOR_ATTACHMENT = 1 << 1;
        /// Written or tested as a depth/stencil attachment
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        /// Source of a copy
        const TRANSFER_SRC = 1 << 3;
        /// Destination of a copy
        const TRANSFER_DST = 1 << 4;
    }
}

/// Texture layout (how the GPU currently expects to access the image)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    DepthStencilReadOnly,
    ShaderReadOnly,
    TransferSource,
    TransferDestination,
    Present,
}

// ===== TEXTURE DESC =====

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Usage flags
    pub usage: TextureUsage,
    /// Debug name
    pub name: String,
}

// ===== TEXTURE INFO =====

/// Read-only properties of a created texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureInfo {
    /// Approximate memory footprint (single mip, single layer)
    pub fn byte_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.format.bytes_per_pixel() as u64
    }
}

// ===== TEXTURE TRAIT =====

/// Texture resource trait
///
/// Implemented by backend-specific texture types.
/// The texture is destroyed when the last `Arc` is dropped, which is why
/// in-flight textures go through the deferred release queue.
pub trait Texture: Send + Sync {
    /// Get the read-only properties of this texture
    fn info(&self) -> &TextureInfo;
}
