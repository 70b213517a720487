//! Completion tokens for submitted GPU work

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GpuError;

/// Something that eventually signals that a batch of GPU work has finished
pub trait Fence: Send + Sync {
    /// Non-blocking check.
    fn is_signaled(&self) -> bool;

    /// Block until the work has finished.
    fn wait(&self) -> Result<(), GpuError>;
}

/// Shared handle to a [`Fence`]
///
/// A default token has no fence and counts as already complete; it fills frame slots that have
/// never been used.
#[derive(Clone, Default)]
pub struct CompletionToken {
    fence: Option<Arc<dyn Fence>>,
}

impl CompletionToken {
    /// A token that is complete from the start.
    pub fn signaled() -> Self {
        Self::default()
    }

    pub fn from_fence(fence: impl Fence + 'static) -> Self {
        Self {
            fence: Some(Arc::new(fence)),
        }
    }

    /// Token for everything submitted to `device`'s queue up to and including `index`.
    pub fn for_submission(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        index: wgpu::SubmissionIndex,
    ) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        queue.on_submitted_work_done(move || flag.store(true, Ordering::Release));

        Self::from_fence(SubmissionFence {
            device: device.clone(),
            index,
            done,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.fence.as_ref().is_none_or(|fence| fence.is_signaled())
    }

    pub fn wait(&self) -> Result<(), GpuError> {
        match &self.fence {
            Some(fence) => fence.wait(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionToken")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Fence backed by a queue submission
struct SubmissionFence {
    device: wgpu::Device,
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

impl Fence for SubmissionFence {
    fn is_signaled(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn wait(&self) -> Result<(), GpuError> {
        if self.is_signaled() {
            return Ok(());
        }
        self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(self.index.clone()),
            timeout: None,
        })?;
        self.done.store(true, Ordering::Release);
        Ok(())
    }
}
