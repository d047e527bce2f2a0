/// RenderResources - scoped per-frame command-recording context.
///
/// Construction begins recording on a fresh command list. `submit()` ends
/// recording and hands the work to the device; the release queue then
/// waits for that submission. Dropping an unsubmitted context ends the
/// recording and flushes the queue on every exit path.

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, GraphicsDevice, SubmissionIndex};
use super::TransientResources;

pub struct RenderResources {
    transient: TransientResources,
    command_list: Option<Box<dyn CommandList>>,
    frame_index: u64,
    width: u32,
    height: u32,
}

impl RenderResources {
    /// Allocate a command list and begin recording
    pub fn new(device: Arc<dyn GraphicsDevice>, frame_index: u64, width: u32, height: u32) -> Result<Self> {
        let mut command_list = device.create_command_list()?;
        command_list.begin()?;

        Ok(Self {
            transient: TransientResources::new(device),
            command_list: Some(command_list),
            frame_index,
            width,
            height,
        })
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        self.transient.device()
    }

    /// Monotonic frame counter this context records for
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Output size in pixels
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether commands can still be recorded
    pub fn is_recording(&self) -> bool {
        self.command_list.is_some()
    }

    /// The command list being recorded
    ///
    /// # Errors
    ///
    /// Returns `InvalidResource` once the context has been submitted.
    pub fn command_list(&mut self) -> Result<&mut dyn CommandList> {
        match self.command_list.as_deref_mut() {
            Some(command_list) => Ok(command_list),
            None => Err(Error::InvalidResource(format!(
                "frame {} was already submitted", self.frame_index
            ))),
        }
    }

    pub fn transient(&self) -> &TransientResources {
        &self.transient
    }

    pub fn transient_mut(&mut self) -> &mut TransientResources {
        &mut self.transient
    }

    /// Defer destruction of `object` until this frame's GPU work completes
    pub fn push_for_release<T: Send + 'static>(&mut self, object: T) {
        self.transient.push_for_release(object);
    }

    /// Run `callback` once this frame's GPU work completes
    pub fn push_release_callback<F: FnOnce() + Send + 'static>(&mut self, callback: F) {
        self.transient.push_release_callback(callback);
    }

    /// End recording and submit to the device
    pub fn submit(&mut self) -> Result<SubmissionIndex> {
        let mut command_list = self.command_list.take().ok_or_else(|| {
            Error::InvalidResource(format!("frame {} was already submitted", self.frame_index))
        })?;

        command_list.end()?;
        let submission = self.transient.device().submit(command_list.as_ref())?;
        self.transient.set_pending_submission(submission);
        // The GPU reads the command list until the submission completes
        self.transient.push_for_release(command_list);

        crate::engine_trace!("nova::RenderResources",
            "frame {} submitted as {:?}", self.frame_index, submission);
        Ok(submission)
    }

    /// Detach the release queue so it can outlive this context
    pub fn detach_transient(&mut self) -> TransientResources {
        let device = Arc::clone(self.transient.device());
        std::mem::replace(&mut self.transient, TransientResources::new(device))
    }
}

impl Drop for RenderResources {
    fn drop(&mut self) {
        if let Some(mut command_list) = self.command_list.take() {
            crate::engine_warn!("nova::RenderResources",
                "frame {} dropped while recording; commands discarded", self.frame_index);
            if let Err(err) = command_list.end() {
                crate::engine_error!("nova::RenderResources",
                    "failed to end discarded command list: {}", err);
            }
        }
    }
}

#[cfg(test)]
#[path = "render_resources_tests.rs"]
mod tests;
