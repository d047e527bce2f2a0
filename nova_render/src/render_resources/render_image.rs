/// RenderSurface / RenderImage - frames in flight over a swapchain.
///
/// A `RenderSurface` keeps one release queue per frame in flight. Acquiring
/// a `RenderImage` first flushes the queue of the slot being reused (waiting
/// on its fence only if the GPU is still behind), then begins recording.
/// `RenderImage::present` consumes the image, so a frame is presented at
/// most once. An image dropped without presenting parks its release queue
/// behind the latest submission still in flight.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, Swapchain, Texture, TextureFormat};
use super::{RenderResources, TransientResources};

pub struct RenderSurface {
    device: Arc<dyn GraphicsDevice>,
    swapchain: Box<dyn Swapchain>,
    in_flight: Vec<Option<TransientResources>>,
    frame_counter: u64,
}

impl RenderSurface {
    /// # Errors
    ///
    /// Returns `InitializationFailed` if `frames_in_flight` is zero.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: Box<dyn Swapchain>,
        frames_in_flight: u32,
    ) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(Error::InitializationFailed(
                "a render surface needs at least one frame in flight".to_string(),
            ));
        }

        Ok(Self {
            device,
            swapchain,
            in_flight: (0..frames_in_flight).map(|_| None).collect(),
            frame_counter: 0,
        })
    }

    /// Number of frames presented so far
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn size(&self) -> (u32, u32) {
        (self.swapchain.width(), self.swapchain.height())
    }

    pub fn format(&self) -> TextureFormat {
        self.swapchain.format()
    }

    /// Acquire the next swapchain image and begin recording a frame
    pub fn acquire(&mut self) -> Result<RenderImage<'_>> {
        let slot = (self.frame_counter % self.in_flight.len() as u64) as usize;
        if let Some(mut previous) = self.in_flight[slot].take() {
            previous.flush_release_queue()?;
        }

        let image_index = self.swapchain.acquire_next_image()?;
        let texture = self.swapchain.image(image_index).ok_or_else(|| {
            Error::BackendError(format!("swapchain returned invalid image index {}", image_index))
        })?;

        let (width, height) = self.size();
        let resources = RenderResources::new(Arc::clone(&self.device), self.frame_counter, width, height)?;

        Ok(RenderImage {
            surface: self,
            resources,
            image_index,
            slot,
            texture,
        })
    }

    /// Wait for every frame in flight, then recreate the swapchain
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        for slot in self.in_flight.iter_mut() {
            if let Some(mut previous) = slot.take() {
                previous.flush_release_queue()?;
            }
        }
        crate::engine_debug!("nova::RenderSurface", "resizing swapchain to {}x{}", width, height);
        self.swapchain.recreate(width, height)
    }
}

/// One acquired swapchain image plus the frame's recording context
pub struct RenderImage<'s> {
    surface: &'s mut RenderSurface,
    resources: RenderResources,
    image_index: u32,
    slot: usize,
    texture: Arc<dyn Texture>,
}

impl RenderImage<'_> {
    pub fn resources(&mut self) -> &mut RenderResources {
        &mut self.resources
    }

    /// Swapchain texture this frame renders into
    pub fn texture(&self) -> &Arc<dyn Texture> {
        &self.texture
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn frame_index(&self) -> u64 {
        self.resources.frame_index()
    }

    pub fn size(&self) -> (u32, u32) {
        self.resources.size()
    }

    /// Submit the recorded frame and present it.
    ///
    /// The frame's release queue is parked in its in-flight slot and
    /// flushed when the slot comes around again.
    pub fn present(mut self) -> Result<()> {
        self.resources.submit()?;
        self.surface.frame_counter += 1;
        self.surface.swapchain.present(self.image_index)
    }
}

impl Drop for RenderImage<'_> {
    fn drop(&mut self) {
        let mut transient = self.resources.detach_transient();

        // Unsubmitted frame: its queue may hold objects earlier frames still read
        if transient.pending_submission().is_none() {
            let latest = self
                .surface
                .in_flight
                .iter()
                .flatten()
                .filter_map(TransientResources::pending_submission)
                .max();
            if let Some(latest) = latest {
                transient.set_pending_submission(latest);
            }
        }

        self.surface.in_flight[self.slot] = Some(transient);
    }
}

#[cfg(test)]
#[path = "render_image_tests.rs"]
mod tests;
