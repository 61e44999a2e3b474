/// Progress events emitted by long-running analysis stages.
#[derive(Debug, Clone)]
pub enum Progress {
    /// A named phase of the workflow has begun (detection, clustering, ...).
    PhaseStart { name: &'static str },
    /// The current phase has finished.
    PhaseFinish,

    /// A counted task has begun (e.g., one step per frame).
    TaskStart { total_steps: u64 },
    /// One step of the current task completed.
    TaskIncrement,
    /// The current task has finished.
    TaskFinish,

    /// A short status line replacing the previous one.
    StatusUpdate { text: String },
    /// A free-form message worth surfacing to the user.
    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional consumer callback.
///
/// The reporter is shared by concurrent frame workers, so callbacks must be
/// thread-safe.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::PhaseFinish);
    }

    #[test]
    fn reporter_forwards_events_to_callback() {
        let count = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|_| {
            count.fetch_add(1, Ordering::SeqCst);
        }));
        reporter.report(Progress::TaskStart { total_steps: 3 });
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::TaskFinish);
        drop(reporter);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
