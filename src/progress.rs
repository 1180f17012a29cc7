//! Progress reporting for long-running encode and decode runs.
//!
//! Worker tasks report `Progress` events through the pool. The pool forwards
//! them to whichever `ProgressObserver` its coordinator installed. Rendering a
//! terminal bar is left to the caller; `LogProgress` reports through `log`.

/// Receives progress updates for one pipeline stage.
pub trait ProgressObserver: Send {
    /// Called with the cumulative completed units and the expected total, if known.
    fn on_progress(&mut self, label: &str, completed: u64, total: Option<u64>);

    /// Called once when the stage has finished successfully.
    fn on_finish(&mut self, _label: &str, _completed: u64) {}
}

/// Discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _label: &str, _completed: u64, _total: Option<u64>) {}
}

/// Logs every 5% step at info level. Without a known total it logs at debug
/// level every `unknown_total_step` units.
#[derive(Debug)]
pub struct LogProgress {
    last_percent: u64,
    last_logged_units: u64,
    unknown_total_step: u64,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self {
            last_percent: 0,
            last_logged_units: 0,
            unknown_total_step: 64 * 1024 * 1024,
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_progress(&mut self, label: &str, completed: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                let percent = (completed.min(total) * 100) / total;
                if percent >= self.last_percent + 5 {
                    self.last_percent = percent - percent % 5;
                    log::info!("{:<24} {:>3}% ({}/{})", label, percent, completed, total);
                }
            }
            _ => {
                if completed >= self.last_logged_units + self.unknown_total_step {
                    self.last_logged_units = completed;
                    log::debug!("{:<24} {} units", label, completed);
                }
            }
        }
    }

    fn on_finish(&mut self, label: &str, completed: u64) {
        self.last_percent = 0;
        self.last_logged_units = 0;
        log::info!("{:<24} done ({} units)", label, completed);
    }
}

/// Accumulates unit deltas for one stage and drives an observer.
pub(crate) struct ProgressTracker {
    label: String,
    completed: u64,
    total: Option<u64>,
    observer: Box<dyn ProgressObserver>,
}

impl ProgressTracker {
    pub(crate) fn new(observer: Box<dyn ProgressObserver>) -> Self {
        Self {
            label: String::new(),
            completed: 0,
            total: None,
            observer,
        }
    }

    /// Starts a new stage, resetting the counters.
    pub(crate) fn begin(&mut self, label: impl Into<String>, total: Option<u64>) {
        self.label = label.into();
        self.completed = 0;
        self.total = total;
    }

    pub(crate) fn advance(&mut self, units: u64) {
        self.completed += units;
        self.observer
            .on_progress(&self.label, self.completed, self.total);
    }

    pub(crate) fn finish(&mut self) {
        self.observer.on_finish(&self.label, self.completed);
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<(u64, Option<u64>)>>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&mut self, _label: &str, completed: u64, total: Option<u64>) {
            self.0.lock().unwrap().push((completed, total));
        }
    }

    #[test]
    fn test_tracker_accumulates_deltas() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut tracker = ProgressTracker::new(Box::new(Recorder(seen.clone())));
        tracker.begin("bytes", Some(10));
        tracker.advance(4);
        tracker.advance(6);
        assert_eq!(tracker.completed(), 10);
        assert_eq!(*seen.lock().unwrap(), vec![(4, Some(10)), (10, Some(10))]);

        tracker.begin("frames", None);
        tracker.advance(1);
        assert_eq!(tracker.completed(), 1);
    }

    #[test]
    fn test_log_progress_steps_in_five_percent_increments() {
        let mut progress = LogProgress::default();
        progress.on_progress("x", 3, Some(100));
        assert_eq!(progress.last_percent, 0);
        progress.on_progress("x", 12, Some(100));
        assert_eq!(progress.last_percent, 10);
        progress.on_progress("x", 100, Some(100));
        assert_eq!(progress.last_percent, 100);
    }
}
