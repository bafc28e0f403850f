use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::status::UploadStatus;

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Upload throughput over a sliding time window.
///
/// Fed either with raw byte counts ([`add_sample`](Self::add_sample)) or
/// with successive status snapshots ([`observe`](Self::observe)), in which
/// case only the growth of `transferred_size` is counted.
pub struct SpeedCalculator {
    window: Mutex<Window>,
}

struct Window {
    samples: VecDeque<(Instant, u64)>,
    span: Duration,
    capacity: usize,
    last_seen: u64,
}

impl Window {
    fn push(&mut self, bytes: u64) {
        let now = Instant::now();
        self.samples.push_back((now, bytes));

        while self
            .samples
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) > self.span)
        {
            self.samples.pop_front();
        }
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl SpeedCalculator {
    /// `span` defaults to 5 s, `capacity` to 100 samples.
    pub fn new(span: Option<Duration>, capacity: Option<usize>) -> Self {
        Self {
            window: Mutex::new(Window {
                samples: VecDeque::new(),
                span: span.unwrap_or(DEFAULT_WINDOW),
                capacity: capacity.unwrap_or(DEFAULT_MAX_SAMPLES).max(2),
                last_seen: 0,
            }),
        }
    }

    pub fn add_sample(&self, bytes: u64) {
        self.lock().push(bytes);
    }

    /// Records how far `transferred_size` moved since the previous call.
    pub fn observe(&self, status: &UploadStatus) {
        let mut w = self.lock();
        let delta = status.transferred_size.saturating_sub(w.last_seen);
        w.last_seen = status.transferred_size;
        w.push(delta);
    }

    /// Bytes per second across the window; 0.0 until two samples exist.
    pub fn bytes_per_second(&self) -> f64 {
        let w = self.lock();
        let (Some((start, _)), Some((end, _))) = (w.samples.front(), w.samples.back()) else {
            return 0.0;
        };
        let elapsed = end.duration_since(*start);
        if elapsed.is_zero() {
            return 0.0;
        }
        // The oldest sample marks where the window opens; its bytes predate it.
        let bytes: u64 = w.samples.iter().skip(1).map(|(_, b)| b).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Time left for `remaining_bytes` at the current speed.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    pub fn reset(&self) {
        let mut w = self.lock();
        w.samples.clear();
        w.last_seen = 0;
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
