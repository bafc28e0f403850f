//! Bounded retry for chunk sends.

use crate::TransferError;
use crate::logger::UploadLogger;
use crate::transport::{ChunkRequest, ChunkResponse, ChunkTransport};

/// Attempts per chunk, first try included.
pub const MAX_ATTEMPTS: usize = 3;

/// Runs `op` until it returns `Ok` or `max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. The last error is returned.
/// Attempts run back to back with no delay. A bound of 0 still runs once.
pub fn retry<T, E, F>(max_attempts: usize, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(_) => attempt += 1,
        }
    }
}

/// Sends one chunk, retrying transport errors and non-2xx responses.
pub fn send_with_retry(
    transport: &dyn ChunkTransport,
    request: &ChunkRequest<'_>,
    max_attempts: usize,
    logger: &mut UploadLogger,
) -> Result<ChunkResponse, TransferError> {
    retry(max_attempts, |attempt| {
        let result = transport.send(request).and_then(|response| {
            if response.is_success() {
                Ok(response)
            } else {
                Err(TransferError::ServerRejected {
                    status: response.status,
                    body: response.body,
                })
            }
        });

        match &result {
            Ok(response) => logger.debug(format_args!(
                "{} attempt {attempt}: HTTP {}",
                request.content_range, response.status
            )),
            Err(e) => logger.error(format_args!(
                "{} attempt {attempt}/{max_attempts} failed: {e}",
                request.content_range
            )),
        }
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers with `failures` errors first, then 200s.
    struct FlakyTransport {
        failures: usize,
        reject_with: Option<u16>,
        calls: AtomicUsize,
    }

    impl FlakyTransport {
        fn new(failures: usize, reject_with: Option<u16>) -> Self {
            Self {
                failures,
                reject_with,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChunkTransport for FlakyTransport {
        fn send(&self, _request: &ChunkRequest<'_>) -> Result<ChunkResponse, TransferError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.failures {
                return Ok(ChunkResponse {
                    status: 200,
                    body: String::new(),
                });
            }
            match self.reject_with {
                Some(status) => Ok(ChunkResponse {
                    status,
                    body: "nope".into(),
                }),
                None => Err(TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "reset",
                ))),
            }
        }
    }

    fn send(transport: &FlakyTransport) -> Result<ChunkResponse, TransferError> {
        let method = Method::PUT;
        let request = ChunkRequest {
            method: &method,
            url: "http://localhost/",
            session_id: "S",
            body: b"x",
            content_range: "bytes 0-1/1",
            file_name: "f",
            headers: &[],
        };
        send_with_retry(transport, &request, MAX_ATTEMPTS, &mut UploadLogger::silent())
    }

    #[test]
    fn retry_stops_at_first_success() {
        let mut seen = Vec::new();
        let result: Result<usize, ()> = retry(3, |attempt| {
            seen.push(attempt);
            if attempt == 2 { Ok(attempt) } else { Err(()) }
        });
        assert_eq!(result, Ok(2));
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn retry_returns_last_error() {
        let result: Result<(), usize> = retry(3, Err);
        assert_eq!(result, Err(3));
    }

    #[test]
    fn retry_zero_bound_runs_once() {
        let mut calls = 0;
        let _: Result<(), ()> = retry(0, |_| {
            calls += 1;
            Err(())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn succeeds_on_third_attempt() {
        let transport = FlakyTransport::new(2, None);
        let response = send(&transport).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(transport.calls(), 3);
    }

    #[test]
    fn transport_errors_exhaust_attempts() {
        let transport = FlakyTransport::new(usize::MAX, None);
        assert!(matches!(send(&transport), Err(TransferError::Io(_))));
        assert_eq!(transport.calls(), MAX_ATTEMPTS);
    }

    #[test]
    fn rejections_exhaust_attempts() {
        let transport = FlakyTransport::new(usize::MAX, Some(500));
        let err = send(&transport).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ServerRejected { status: 500, ref body } if body == "nope"
        ));
        assert_eq!(transport.calls(), MAX_ATTEMPTS);
    }

    #[test]
    fn rejection_then_success() {
        let transport = FlakyTransport::new(1, Some(503));
        assert!(send(&transport).is_ok());
        assert_eq!(transport.calls(), 2);
    }
}
