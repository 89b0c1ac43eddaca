/// Phase marker passed to progress callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Start,
    Run,
    End,
}

/// Pull-style progress sink. Long-running passes report a percentage at
/// roughly uniform intervals; callers may ignore every call.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(usize, ProgressState);

/// Wraps an optional callback so engine code can report unconditionally.
pub struct Progress<'a> {
    callback: Option<ProgressCallback<'a>>,
    last_percent: usize,
}

impl<'a> Progress<'a> {
    pub fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Progress { callback, last_percent: usize::MAX }
    }

    pub fn none() -> Self {
        Progress { callback: None, last_percent: usize::MAX }
    }

    pub fn start(&mut self) {
        self.last_percent = usize::MAX;
        if let Some(cb) = self.callback.as_mut() {
            cb(0, ProgressState::Start);
        }
    }

    /// Reports `done / total` as a percentage, skipping repeats so a tight
    /// loop only surfaces ~100 calls.
    pub fn run(&mut self, done: usize, total: usize) {
        let percent = if total == 0 { 100 } else { done * 100 / total };
        if percent != self.last_percent {
            self.last_percent = percent;
            if let Some(cb) = self.callback.as_mut() {
                cb(percent, ProgressState::Run);
            }
        }
    }

    pub fn end(&mut self) {
        if let Some(cb) = self.callback.as_mut() {
            cb(100, ProgressState::End);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_deduplicates_percentages() {
        let mut seen = Vec::new();
        {
            let mut cb = |p: usize, s: ProgressState| seen.push((p, s));
            let mut progress = Progress::new(Some(&mut cb));
            progress.start();
            for i in 0..1000 {
                progress.run(i, 1000);
            }
            progress.end();
        }
        assert_eq!(seen.first(), Some(&(0, ProgressState::Start)));
        assert_eq!(seen.last(), Some(&(100, ProgressState::End)));
        // 0..100 percent plus start/end markers, nothing repeated mid-run.
        assert!(seen.len() <= 102);
    }

    #[test]
    fn test_progress_without_callback_is_noop() {
        let mut progress = Progress::none();
        progress.start();
        progress.run(5, 10);
        progress.end();
    }
}
