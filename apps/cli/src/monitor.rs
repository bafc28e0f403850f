//! Background progress reporting while an upload runs.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bigupload_transfer::{SpeedCalculator, StatusHandle, UploadStatus};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls a [`StatusHandle`] until stopped or the upload reaches a terminal state.
pub struct Monitor {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

impl Monitor {
    pub fn spawn(status: StatusHandle) -> Self {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::spawn(move || {
            let speed = SpeedCalculator::default();
            loop {
                match stopped.recv_timeout(POLL_INTERVAL) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let snapshot = status.snapshot();
                speed.observe(&snapshot);
                report(&snapshot, &speed);
                if snapshot.is_done() {
                    break;
                }
            }
        });
        Self { stop, thread }
    }

    /// Stops polling and waits for the thread to exit.
    pub fn finish(self) {
        let _ = self.stop.send(());
        if self.thread.join().is_err() {
            tracing::warn!("progress monitor panicked");
        }
    }
}

fn report(status: &UploadStatus, speed: &SpeedCalculator) {
    let remaining = status.total_size.saturating_sub(status.transferred_size);
    let eta = speed
        .eta(remaining)
        .map(format_duration)
        .unwrap_or_else(|| "--".into());

    tracing::info!(
        state = ?status.state,
        parts = %format!("{}/{}", status.transferred_parts, status.total_parts),
        "{:.1}% {} of {} at {}/s, eta {}",
        status.percent(),
        format_bytes(status.transferred_size),
        format_bytes(status.total_size),
        format_bytes(speed.bytes_per_second() as u64),
        eta,
    );
}

/// Human-readable byte count in binary units.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// `h:mm:ss`, or `m:ss` under an hour.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}
