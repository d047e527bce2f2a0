/// Swapchain trait - presentation surface of a window

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{Texture, TextureFormat};

/// Swapchain for presenting rendered images to a window
///
/// Provided by the windowing/backend layer. The render core acquires an
/// image, renders into it through the frame graph, and presents it once.
pub trait Swapchain: Send + Sync {
    /// Acquire the next available swapchain image index
    fn acquire_next_image(&mut self) -> Result<u32>;

    /// Texture view of a swapchain image
    fn image(&self, image_index: u32) -> Option<Arc<dyn Texture>>;

    /// Present the image at `image_index` to the screen
    fn present(&mut self, image_index: u32) -> Result<()>;

    /// Recreate the swapchain (e.g., after window resize)
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;

    /// Number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Width of the swapchain images in pixels
    fn width(&self) -> u32;

    /// Height of the swapchain images in pixels
    fn height(&self) -> u32;

    /// Pixel format of the swapchain images
    fn format(&self) -> TextureFormat;
}
