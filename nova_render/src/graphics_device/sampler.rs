/// Sampler trait and the value key used to deduplicate sampler objects

/// Texel filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerFilter {
    Nearest,
    Linear,
}

/// Filter between mip levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerMipmapMode {
    Nearest,
    Linear,
}

/// Addressing mode outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerWrap {
    Repeat,
    MirroredRepeat,
    Clamp,
}

/// Complete sampler state. Two equal values describe interchangeable samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSamplerInfo {
    pub min_filter: SamplerFilter,
    pub mag_filter: SamplerFilter,
    pub mipmap_mode: SamplerMipmapMode,
    pub wrap_u: SamplerWrap,
    pub wrap_v: SamplerWrap,
    pub wrap_w: SamplerWrap,
    /// 1 disables anisotropic filtering
    pub anisotropy_level: u8,
    /// Depth comparison sampling (shadow maps)
    pub depth_compare: bool,
}

impl TextureSamplerInfo {
    /// Same filter on every axis and between mips
    pub fn with_filter(filter: SamplerFilter) -> Self {
        let mipmap_mode = match filter {
            SamplerFilter::Nearest => SamplerMipmapMode::Nearest,
            SamplerFilter::Linear => SamplerMipmapMode::Linear,
        };
        Self {
            min_filter: filter,
            mag_filter: filter,
            mipmap_mode,
            ..Self::default()
        }
    }

    /// Same addressing mode on every axis
    pub fn with_wrap(mut self, wrap: SamplerWrap) -> Self {
        self.wrap_u = wrap;
        self.wrap_v = wrap;
        self.wrap_w = wrap;
        self
    }
}

impl Default for TextureSamplerInfo {
    fn default() -> Self {
        Self {
            min_filter: SamplerFilter::Linear,
            mag_filter: SamplerFilter::Linear,
            mipmap_mode: SamplerMipmapMode::Linear,
            wrap_u: SamplerWrap::Repeat,
            wrap_v: SamplerWrap::Repeat,
            wrap_w: SamplerWrap::Repeat,
            anisotropy_level: 1,
            depth_compare: false,
        }
    }
}

/// Sampler resource trait
pub trait Sampler: Send + Sync {
    /// State this sampler was created with
    fn info(&self) -> &TextureSamplerInfo;
}
