/// TransientResources - deferred release queue for in-flight GPU objects.
///
/// Objects that the GPU may still be reading (textures, buffers, binding
/// groups, stale render element owners) are moved into the queue instead
/// of being dropped. They are destroyed exactly once, when the submission
/// they belong to is known to be complete.

use std::any::Any;
use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, SubmissionIndex};

pub struct TransientResources {
    device: Arc<dyn GraphicsDevice>,
    pending_submission: Option<SubmissionIndex>,
    release_queue: Vec<Box<dyn Any + Send>>,
    release_callbacks: Vec<Box<dyn FnOnce() + Send>>,
}

impl TransientResources {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self {
            device,
            pending_submission: None,
            release_queue: Vec::new(),
            release_callbacks: Vec::new(),
        }
    }

    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// Defer destruction of `object` until this scope's GPU work completes.
    ///
    /// Ownership moves into the queue, so an object cannot be released twice.
    pub fn push_for_release<T: Send + 'static>(&mut self, object: T) {
        self.release_queue.push(Box::new(object));
    }

    /// Run `callback` once this scope's GPU work completes
    pub fn push_release_callback<F: FnOnce() + Send + 'static>(&mut self, callback: F) {
        self.release_callbacks.push(Box::new(callback));
    }

    /// Number of objects and callbacks waiting for release
    pub fn pending_release_count(&self) -> usize {
        self.release_queue.len() + self.release_callbacks.len()
    }

    /// Associate the queue with a submission; releases wait for it
    pub fn set_pending_submission(&mut self, submission: SubmissionIndex) {
        self.pending_submission = Some(match self.pending_submission {
            Some(previous) => previous.max(submission),
            None => submission,
        });
    }

    pub fn pending_submission(&self) -> Option<SubmissionIndex> {
        self.pending_submission
    }

    /// Whether the GPU is done with every queued object.
    ///
    /// True when nothing was submitted or the backend reports the pending
    /// submission's fence as signaled.
    pub fn is_safe_to_release(&self) -> bool {
        match self.pending_submission {
            Some(submission) => self.device.is_submission_complete(submission),
            None => true,
        }
    }

    /// Release everything if it is safe to do so without blocking.
    ///
    /// Returns whether the queue was flushed.
    pub fn try_flush_release_queue(&mut self) -> bool {
        if !self.is_safe_to_release() {
            return false;
        }
        self.release_all();
        true
    }

    /// Wait for the pending submission (if any), then release everything
    pub fn flush_release_queue(&mut self) -> Result<()> {
        if let Some(submission) = self.pending_submission {
            if !self.device.is_submission_complete(submission) {
                self.device.wait_for_submission(submission)?;
            }
        }
        self.release_all();
        Ok(())
    }

    fn release_all(&mut self) {
        let objects = self.release_queue.len();
        let callbacks = self.release_callbacks.len();
        if objects + callbacks > 0 {
            crate::engine_trace!("nova::TransientResources",
                "releasing {} objects and {} callbacks", objects, callbacks);
        }

        for object in self.release_queue.drain(..) {
            drop(object);
        }
        for callback in self.release_callbacks.drain(..) {
            callback();
        }
        self.pending_submission = None;
    }
}

impl Drop for TransientResources {
    fn drop(&mut self) {
        if let Err(err) = self.flush_release_queue() {
            // Device is gone: nothing can still be reading these objects
            crate::engine_error!("nova::TransientResources",
                "fence wait failed during release ({}); releasing anyway", err);
            self.release_all();
        }
    }
}

#[cfg(test)]
#[path = "transient_resources_tests.rs"]
mod tests;
