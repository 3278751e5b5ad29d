//! Liveness watchdog for the stream connection.
//!
//! A single cancellable timer. The owner resets it on every inbound byte;
//! if the timeout elapses untouched, one stall signal is sent on the fire
//! channel and the timer disarms itself. The owner re-arms after handling
//! the stall.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Single-timer stall detector.
///
/// Dropping the watchdog aborts any pending timer, so it can never fire
/// against a torn-down connection.
#[derive(Debug)]
pub struct LivenessWatchdog {
    timeout: Duration,
    stall_tx: mpsc::UnboundedSender<()>,
    timer: Option<JoinHandle<()>>,
}

impl LivenessWatchdog {
    /// Creates a disarmed watchdog and the channel its stall signal fires on.
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (stall_tx, stall_rx) = mpsc::unbounded_channel();
        (
            Self {
                timeout,
                stall_tx,
                timer: None,
            },
            stall_rx,
        )
    }

    /// Schedules the stall signal after the configured timeout.
    ///
    /// Any pending timer is cancelled first; the signal fires at most once
    /// per arm cycle.
    pub fn arm(&mut self) {
        self.cancel();
        let stall_tx = self.stall_tx.clone();
        let timeout = self.timeout;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = stall_tx.send(());
        }));
    }

    /// Cancels and reschedules with the same timeout.
    pub fn reset(&mut self) {
        self.arm();
    }

    /// Cancels the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for LivenessWatchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::LivenessWatchdog;

    const SHORT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn fires_after_timeout() {
        let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(SHORT);
        watchdog.arm();
        timeout(Duration::from_secs(1), stall_rx.recv())
            .await
            .expect("stall signal within deadline")
            .expect("channel open");
    }

    #[tokio::test]
    async fn fires_at_most_once_per_arm() {
        let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(SHORT);
        watchdog.arm();
        timeout(Duration::from_secs(1), stall_rx.recv())
            .await
            .expect("first stall")
            .expect("channel open");
        tokio::time::sleep(SHORT * 4).await;
        assert!(stall_rx.try_recv().is_err(), "fired twice without re-arm");
    }

    #[tokio::test]
    async fn reset_postpones_the_fire() {
        let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(Duration::from_millis(80));
        watchdog.arm();
        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            watchdog.reset();
            assert!(stall_rx.try_recv().is_err(), "fired despite resets");
        }
        timeout(Duration::from_secs(1), stall_rx.recv())
            .await
            .expect("stall after resets stop")
            .expect("channel open");
    }

    #[tokio::test]
    async fn cancel_prevents_the_fire() {
        let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(SHORT);
        watchdog.arm();
        watchdog.cancel();
        tokio::time::sleep(SHORT * 4).await;
        assert!(stall_rx.try_recv().is_err(), "fired after cancel");
    }

    #[tokio::test]
    async fn rearm_after_fire_works() {
        let (mut watchdog, mut stall_rx) = LivenessWatchdog::new(SHORT);
        watchdog.arm();
        timeout(Duration::from_secs(1), stall_rx.recv())
            .await
            .expect("first stall")
            .expect("channel open");
        watchdog.arm();
        timeout(Duration::from_secs(1), stall_rx.recv())
            .await
            .expect("second stall")
            .expect("channel open");
    }
}
