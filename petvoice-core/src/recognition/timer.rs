use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;

/// The session's single silence timer.
///
/// Re-arming cancels the previous sleep. Every arm and cancel moves the
/// epoch forward, so a timer that already woke up and is waiting for the
/// session lock can tell it has been superseded.
#[derive(Debug, Default)]
pub struct SilenceTimer {
    handle: Option<AbortHandle>,
    epoch: u64,
}

impl SilenceTimer {
    /// Cancel any pending timer and schedule `on_fire(epoch)` after `after`.
    pub fn arm<F, Fut>(&mut self, after: Duration, on_fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let epoch = self.epoch;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire(epoch).await;
        });
        self.handle = Some(handle.abort_handle());
    }

    pub fn cancel(&mut self) {
        self.epoch += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SilenceTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = SilenceTimer::default();

        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_millis(5000), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(4999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_previous_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let last_epoch = Arc::new(AtomicU64::new(u64::MAX));
        let mut timer = SilenceTimer::default();

        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            let seen = Arc::clone(&last_epoch);
            timer.arm(Duration::from_millis(100), move |epoch| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                seen.store(epoch, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(60)).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(last_epoch.load(Ordering::SeqCst), timer.epoch());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = SilenceTimer::default();

        let counter = Arc::clone(&fired);
        timer.arm(Duration::from_millis(100), move |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
