//! Backpressure toggle and the sink-side depth monitor driving it, plus the
//! plan-wide stop signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use quiver_core::config::BackpressureOptions;
use tokio::sync::watch;

/// Shared pause flag observed by scans. `true` means paused.
#[derive(Clone, Debug)]
pub struct BackpressureToggle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for BackpressureToggle {
    fn default() -> Self {
        Self::new()
    }
}

impl BackpressureToggle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the toggle is (or becomes) unpaused.
    pub async fn wait_until_resumed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

/// Watches a queue's depth and flips the toggle with hysteresis: pause above
/// the high watermark, resume below the low one.
#[derive(Debug)]
pub struct BackpressureMonitor {
    options: BackpressureOptions,
    toggle: BackpressureToggle,
    paused: AtomicBool,
}

impl BackpressureMonitor {
    pub fn new(options: BackpressureOptions, toggle: BackpressureToggle) -> Self {
        Self {
            options,
            toggle,
            paused: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> BackpressureOptions {
        self.options
    }

    pub fn on_depth(&self, depth: usize) {
        if depth > self.options.high_watermark {
            if !self.paused.swap(true, Ordering::AcqRel) {
                tracing::debug!(depth, high = self.options.high_watermark, "backpressure: pausing");
                self.toggle.pause();
            }
        } else if depth < self.options.low_watermark && self.paused.swap(false, Ordering::AcqRel) {
            tracing::debug!(depth, low = self.options.low_watermark, "backpressure: resuming");
            self.toggle.resume();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

/// Plan-wide stop request. Once raised it stays raised.
#[derive(Clone, Debug)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Returns true for the call that actually raised the signal.
    pub fn stop(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn monitor_applies_hysteresis() {
        let toggle = BackpressureToggle::new();
        let monitor = BackpressureMonitor::new(BackpressureOptions::new(2, 4).unwrap(), toggle.clone());
        monitor.on_depth(4);
        assert!(!toggle.is_paused());
        monitor.on_depth(5);
        assert!(toggle.is_paused());
        monitor.on_depth(3);
        assert!(toggle.is_paused());
        monitor.on_depth(1);
        assert!(!toggle.is_paused());
    }

    #[tokio::test]
    async fn waiters_wake_on_resume_and_stop() {
        let toggle = BackpressureToggle::new();
        toggle.pause();
        let waiter = {
            let toggle = toggle.clone();
            tokio::spawn(async move { toggle.wait_until_resumed().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        toggle.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();

        let stop = StopSignal::new();
        assert!(stop.stop());
        assert!(!stop.stop());
        tokio::time::timeout(Duration::from_secs(1), stop.stopped()).await.unwrap();
    }
}
