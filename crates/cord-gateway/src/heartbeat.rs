//! Heartbeat cadence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handle for controlling the heartbeat task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct HeartbeatHandle {
    interval: Duration,
    cancel: CancellationToken,
    missed_acks: Arc<AtomicU32>,
    beats: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Negotiated interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Check if the heartbeat task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Heartbeats sent since the last acknowledgement.
    ///
    /// Informational only; nothing acts on a growing count yet.
    #[must_use]
    pub fn missed_acks(&self) -> u32 {
        self.missed_acks.load(Ordering::SeqCst)
    }

    /// Total heartbeats sent by this task.
    #[must_use]
    pub fn beats_sent(&self) -> u32 {
        self.beats.load(Ordering::SeqCst)
    }

    /// Reset the missed ack counter (call when ack received).
    pub fn ack_received(&self) {
        self.missed_acks.store(0, Ordering::SeqCst);
    }

    /// Stop the heartbeat task.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a periodic heartbeat task.
///
/// The first beat fires one full `interval` after the call. `beat` returns
/// `false` when the connection is gone, which ends the task.
pub fn start_heartbeat_task<F>(interval: Duration, mut beat: F) -> HeartbeatHandle
where
    F: FnMut() -> bool + Send + 'static,
{
    let cancel = CancellationToken::new();
    let missed_acks = Arc::new(AtomicU32::new(0));
    let beats = Arc::new(AtomicU32::new(0));

    let task = {
        let cancel = cancel.clone();
        let missed_acks = Arc::clone(&missed_acks);
        let beats = Arc::clone(&beats);

        tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(Instant::now() + interval, interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = timer.tick() => {}
                }

                if !beat() {
                    cancel.cancel();
                    break;
                }
                beats.fetch_add(1, Ordering::SeqCst);
                missed_acks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    HeartbeatHandle {
        interval,
        cancel,
        missed_acks,
        beats,
        task,
    }
}
