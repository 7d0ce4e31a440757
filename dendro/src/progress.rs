//! Progress reporting and cooperative cancellation for tree builds.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Voxels processed between two progress reports unless configured otherwise.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

/// Progress of the agglomeration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    /// Voxels processed so far.
    pub processed: usize,
    /// Voxels above `minimum_flux`.
    pub total: usize,
}

/// Callback type for progress reporting.
pub type ProgressCallback = Arc<dyn Fn(BuildProgress) + Send + Sync>;

/// Optional observers of a build.
#[derive(Clone)]
pub struct BuildHooks {
    pub progress: Option<ProgressCallback>,
    /// Checked between voxels; setting it aborts the build with
    /// [`Error::Cancelled`](crate::Error::Cancelled).
    pub cancel: Option<Arc<AtomicBool>>,
    /// Voxels between progress reports. 0 reports only at completion.
    pub progress_interval: usize,
}

impl Default for BuildHooks {
    fn default() -> Self {
        Self {
            progress: None,
            cancel: None,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl fmt::Debug for BuildHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildHooks")
            .field("progress", &self.progress.as_ref().map(|_| "Fn(BuildProgress)"))
            .field("cancel", &self.cancel)
            .field("progress_interval", &self.progress_interval)
            .finish()
    }
}

impl BuildHooks {
    pub fn with_progress(mut self, callback: impl Fn(BuildProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// True when `processed` lands on a reporting checkpoint.
    pub(crate) fn is_checkpoint(&self, processed: usize) -> bool {
        self.progress_interval > 0 && processed % self.progress_interval == 0
    }

    pub(crate) fn report(&self, processed: usize, total: usize) {
        report_progress(&self.progress, processed, total);
    }
}

/// Report progress using the callback if set.
pub fn report_progress(callback: &Option<ProgressCallback>, processed: usize, total: usize) {
    if let Some(f) = callback {
        f(BuildProgress { processed, total });
    }
}
