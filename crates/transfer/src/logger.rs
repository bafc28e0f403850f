//! Three-channel upload logger.
//!
//! Every message is emitted as a `tracing` event and also written as a
//! plain line to the sink configured for its level. Unset sinks default to
//! discard (debug), stdout (info) and stderr (error).

use std::fmt::Display;
use std::io::{self, Write};

use chrono::Local;

/// Destination for one log channel.
pub type LogSink = Box<dyn Write + Send>;

/// Sink overrides for [`UploadLogger`]. `None` selects the default.
#[derive(Default)]
pub struct LoggerConfig {
    pub debug_sink: Option<LogSink>,
    pub info_sink: Option<LogSink>,
    pub error_sink: Option<LogSink>,
}

impl LoggerConfig {
    pub fn with_debug(mut self, sink: impl Write + Send + 'static) -> Self {
        self.debug_sink = Some(Box::new(sink));
        self
    }

    pub fn with_info(mut self, sink: impl Write + Send + 'static) -> Self {
        self.info_sink = Some(Box::new(sink));
        self
    }

    pub fn with_error(mut self, sink: impl Write + Send + 'static) -> Self {
        self.error_sink = Some(Box::new(sink));
        self
    }
}

pub struct UploadLogger {
    debug: LogSink,
    info: LogSink,
    error: LogSink,
}

impl Default for UploadLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl UploadLogger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            debug: config.debug_sink.unwrap_or_else(|| Box::new(io::sink())),
            info: config.info_sink.unwrap_or_else(|| Box::new(io::stdout())),
            error: config.error_sink.unwrap_or_else(|| Box::new(io::stderr())),
        }
    }

    /// Logger whose plain-text channels all discard; `tracing` events are still emitted.
    pub fn silent() -> Self {
        Self {
            debug: Box::new(io::sink()),
            info: Box::new(io::sink()),
            error: Box::new(io::sink()),
        }
    }

    pub fn debug(&mut self, msg: impl Display) {
        tracing::debug!("{msg}");
        write_line(&mut self.debug, "DEBUG", &msg);
    }

    pub fn info(&mut self, msg: impl Display) {
        tracing::info!("{msg}");
        write_line(&mut self.info, "INFO", &msg);
    }

    pub fn error(&mut self, msg: impl Display) {
        tracing::error!("{msg}");
        write_line(&mut self.error, "ERROR", &msg);
    }
}

fn write_line(sink: &mut LogSink, level: &str, msg: &dyn Display) {
    let now = Local::now().format("%Y/%m/%d %H:%M:%S");
    // A broken log sink must not abort the upload.
    let _ = writeln!(sink, "{level}\t{now} {msg}");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory sink that can be inspected after being handed to a logger.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn channels_write_to_their_own_sink() {
        let debug = SharedBuf::default();
        let info = SharedBuf::default();
        let error = SharedBuf::default();
        let mut logger = UploadLogger::new(
            LoggerConfig::default()
                .with_debug(debug.clone())
                .with_info(info.clone())
                .with_error(error.clone()),
        );

        logger.debug("read 10 bytes");
        logger.info("upload done");
        logger.error("boom");

        assert!(debug.contents().starts_with("DEBUG\t"));
        assert!(debug.contents().ends_with(" read 10 bytes\n"));
        assert!(info.contents().starts_with("INFO\t"));
        assert!(info.contents().contains("upload done"));
        assert!(error.contents().starts_with("ERROR\t"));
        assert!(!info.contents().contains("boom"));
    }

    #[test]
    fn line_carries_timestamp() {
        let info = SharedBuf::default();
        let mut logger = UploadLogger::new(LoggerConfig::default().with_info(info.clone()));
        logger.info("x");

        let line = info.contents();
        let stamp = line
            .trim_start_matches("INFO\t")
            .split(' ')
            .next()
            .unwrap()
            .to_string();
        // YYYY/MM/DD
        assert_eq!(stamp.len(), 10);
        assert_eq!(stamp.matches('/').count(), 2);
    }

    #[test]
    fn silent_logger_does_not_panic() {
        let mut logger = UploadLogger::silent();
        logger.debug("a");
        logger.info("b");
        logger.error("c");
    }
}
