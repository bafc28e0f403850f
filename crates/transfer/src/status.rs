use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

/// Lifecycle of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl UploadState {
    /// Returns `true` for `Succeeded` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Progress of an upload as acknowledged by the server.
///
/// Serializes with the derived `isDone` and `failed` flags alongside `state`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(into = "StatusReport")]
pub struct UploadStatus {
    /// Total bytes to transfer.
    pub total_size: u64,
    /// Bytes the server has acknowledged so far.
    pub transferred_size: u64,
    /// `ceil(total_size / chunk_size)`.
    pub total_parts: u64,
    /// Number of parts completed, in order.
    pub transferred_parts: u64,
    pub state: UploadState,
}

impl UploadStatus {
    /// Returns `true` once the upload reached `Succeeded` or `Failed`.
    pub fn is_done(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns `true` if the upload ended in an unrecoverable error.
    pub fn failed(&self) -> bool {
        self.state == UploadState::Failed
    }

    /// Acknowledged share of the payload in percent (100 for an empty payload).
    pub fn percent(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        self.transferred_size as f64 / self.total_size as f64 * 100.0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    total_size: u64,
    transferred_size: u64,
    total_parts: u64,
    transferred_parts: u64,
    state: UploadState,
    is_done: bool,
    failed: bool,
}

impl From<UploadStatus> for StatusReport {
    fn from(status: UploadStatus) -> Self {
        Self {
            is_done: status.is_done(),
            failed: status.failed(),
            total_size: status.total_size,
            transferred_size: status.transferred_size,
            total_parts: status.total_parts,
            transferred_parts: status.transferred_parts,
            state: status.state,
        }
    }
}

/// Shared view of an [`UploadStatus`].
///
/// The uploader is the only writer. Clones handed to other threads read a
/// consistent snapshot with [`snapshot`](Self::snapshot). Once the status is
/// terminal every mutation is ignored.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<UploadStatus>>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current status.
    pub fn snapshot(&self) -> UploadStatus {
        self.read().clone()
    }

    /// Returns `true` once the upload is terminal.
    pub fn is_done(&self) -> bool {
        self.read().is_done()
    }

    /// Returns the current state.
    pub fn state(&self) -> UploadState {
        self.read().state
    }

    /// Records the payload size and part count and moves to `Running`.
    pub(crate) fn begin(&self, total_size: u64, total_parts: u64) {
        let mut s = self.write();
        if s.is_done() {
            return;
        }
        s.total_size = total_size;
        s.total_parts = total_parts;
        s.state = UploadState::Running;
    }

    /// Adds an acknowledged chunk: `transferred_parts` becomes `index + 1`.
    pub(crate) fn record_part(&self, index: u64, delta: u64) {
        let mut s = self.write();
        if s.is_done() {
            return;
        }
        s.transferred_size = (s.transferred_size + delta).min(s.total_size);
        s.transferred_parts = (index + 1).min(s.total_parts);
    }

    /// Moves to `Succeeded` or `Failed`. No-op if already terminal.
    pub(crate) fn finish(&self, failed: bool) {
        let mut s = self.write();
        if s.is_done() {
            return;
        }
        s.state = if failed {
            UploadState::Failed
        } else {
            UploadState::Succeeded
        };
    }

    fn read(&self) -> RwLockReadGuard<'_, UploadStatus> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, UploadStatus> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_pending() {
        let handle = StatusHandle::new();
        let s = handle.snapshot();
        assert_eq!(s.state, UploadState::Pending);
        assert!(!s.is_done());
        assert!(!s.failed());
        assert_eq!(s.transferred_size, 0);
    }

    #[test]
    fn begin_sets_running() {
        let handle = StatusHandle::new();
        handle.begin(250, 3);
        let s = handle.snapshot();
        assert_eq!(s.state, UploadState::Running);
        assert_eq!(s.total_size, 250);
        assert_eq!(s.total_parts, 3);
    }

    #[test]
    fn record_part_accumulates() {
        let handle = StatusHandle::new();
        handle.begin(250, 3);
        handle.record_part(0, 100);
        handle.record_part(1, 100);
        let s = handle.snapshot();
        assert_eq!(s.transferred_size, 200);
        assert_eq!(s.transferred_parts, 2);
    }

    #[test]
    fn record_part_never_exceeds_total() {
        let handle = StatusHandle::new();
        handle.begin(100, 1);
        handle.record_part(0, 500);
        assert_eq!(handle.snapshot().transferred_size, 100);
    }

    #[test]
    fn finish_success() {
        let handle = StatusHandle::new();
        handle.begin(0, 0);
        handle.finish(false);
        let s = handle.snapshot();
        assert!(s.is_done());
        assert!(!s.failed());
        assert_eq!(s.state, UploadState::Succeeded);
        assert_eq!(s.percent(), 100.0);
    }

    #[test]
    fn terminal_status_is_frozen() {
        let handle = StatusHandle::new();
        handle.begin(250, 3);
        handle.record_part(0, 100);
        handle.finish(true);

        let frozen = handle.snapshot();
        handle.record_part(1, 100);
        handle.begin(999, 9);
        handle.finish(false);

        assert_eq!(handle.snapshot(), frozen);
        assert_eq!(handle.snapshot(), handle.snapshot());
        assert!(frozen.failed());
        assert_eq!(frozen.transferred_parts, 1);
    }

    #[test]
    fn status_serializes_camel_case() {
        let handle = StatusHandle::new();
        handle.begin(10, 1);
        let json = serde_json::to_value(handle.snapshot()).unwrap();
        assert_eq!(json["totalSize"], 10);
        assert_eq!(json["state"], "running");
        assert_eq!(json["isDone"], false);
        assert_eq!(json["failed"], false);
    }

    #[test]
    fn serialized_flags_follow_state() {
        let handle = StatusHandle::new();
        handle.begin(10, 1);
        handle.finish(true);
        let json = serde_json::to_value(handle.snapshot()).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["isDone"], true);
        assert_eq!(json["failed"], true);
        assert_eq!(json["transferredParts"], 0);
    }

    #[test]
    fn concurrent_readers_see_consistent_snapshots() {
        use std::thread;

        let handle = StatusHandle::new();
        handle.begin(1_000, 1_000);

        let mut readers = vec![];
        for _ in 0..8 {
            let h = handle.clone();
            readers.push(thread::spawn(move || {
                for _ in 0..200 {
                    let s = h.snapshot();
                    // Each part adds one byte, so the two counters move together.
                    assert_eq!(s.transferred_size, s.transferred_parts);
                }
            }));
        }

        for i in 0..1_000 {
            handle.record_part(i, 1);
        }
        for r in readers {
            r.join().unwrap();
        }

        assert_eq!(handle.snapshot().transferred_parts, 1_000);
    }
}
