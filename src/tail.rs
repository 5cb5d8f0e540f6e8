//! Access-log tailer feeding the pipeline.

use engine_core::{AccessLogParser, Error, EventFilter, RawEvent, Result};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use telemetry::Metrics;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Where to start and whether to wait for more.
#[derive(Debug, Clone, Copy)]
pub struct TailOptions {
    pub from_beginning: bool,
    pub follow: bool,
    pub poll_interval: Duration,
}

impl Default for TailOptions {
    fn default() -> Self {
        Self {
            from_beginning: false,
            follow: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Reads log lines, parses and filters them, and sends the events on.
pub struct LogTailer {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    parser: AccessLogParser,
    filter: EventFilter,
    options: TailOptions,
    metrics: Arc<Metrics>,
}

impl LogTailer {
    /// Open the log, positioned per `options`.
    pub async fn open(
        path: impl Into<PathBuf>,
        parser: AccessLogParser,
        filter: EventFilter,
        options: TailOptions,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let path = path.into();
        let mut file = open_file(&path).await?;
        let position = if options.from_beginning {
            0
        } else {
            file.seek(SeekFrom::End(0)).await?
        };

        info!(
            path = %path.display(),
            position,
            follow = options.follow,
            "Opened access log"
        );

        Ok(Self {
            path,
            reader: BufReader::new(file),
            position,
            parser,
            filter,
            options,
            metrics,
        })
    }

    /// Read until end of file (without follow), cancellation, or the
    /// pipeline going away. Dropping `events` on return ends the stream.
    ///
    /// Returns the number of lines read.
    pub async fn run(
        mut self,
        events: mpsc::Sender<RawEvent>,
        cancel: CancellationToken,
    ) -> Result<u64> {
        let mut lines = 0u64;
        let mut buf = Vec::new();

        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Tailer cancelled");
                    break;
                }
                read = self.reader.read_until(b'\n', &mut buf) => read?,
            };
            self.position += read as u64;

            let complete = buf.ends_with(b"\n");
            if read == 0 || !complete {
                if !self.options.follow {
                    if !buf.is_empty() {
                        lines += 1;
                        if !self.dispatch(&buf, &events).await {
                            break;
                        }
                    }
                    debug!("Reached end of access log");
                    break;
                }
                // Wait for the rest of a partial line, or for new lines
                let before = self.position;
                if !self.wait(&cancel).await? {
                    break;
                }
                if self.position < before {
                    buf.clear();
                }
                continue;
            }

            lines += 1;
            let open = self.dispatch(&buf, &events).await;
            buf.clear();
            if !open {
                break;
            }
        }

        info!(lines, "Tailer finished");
        Ok(lines)
    }

    /// Parse one line and forward it; false once the pipeline is gone.
    ///
    /// Invalid UTF-8 is replaced, not rejected.
    async fn dispatch(&self, raw: &[u8], events: &mpsc::Sender<RawEvent>) -> bool {
        self.metrics.lines_read.inc();
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.trim_end_matches(['\n', '\r']);
        match self.parser.parse_event(line, &self.filter) {
            Some(event) => {
                if events.send(event).await.is_err() {
                    warn!("Pipeline stopped accepting events");
                    return false;
                }
                true
            }
            None => {
                self.metrics.events_dropped.inc();
                true
            }
        }
    }

    /// Sleep one poll interval and reopen the file if it shrank.
    /// Returns false if cancelled.
    async fn wait(&mut self, cancel: &CancellationToken) -> Result<bool> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(false),
            _ = tokio::time::sleep(self.options.poll_interval) => {}
        }

        let len = tokio::fs::metadata(&self.path).await?.len();
        if len < self.position {
            warn!(
                path = %self.path.display(),
                len,
                position = self.position,
                "Access log truncated, reading from the start"
            );
            self.reader = BufReader::new(open_file(&self.path).await?);
            self.position = 0;
        }
        Ok(true)
    }
}

async fn open_file(path: &Path) -> Result<File> {
    File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::InputNotFound(path.display().to_string()),
        _ => Error::InputRead(e),
    })
}
