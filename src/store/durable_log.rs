//! Durable log
//!
//! Append-only record of every accepted `(code, url)` pair, replayed at startup
//! to rebuild the mapping.
//!
//! Record format: [MAGIC:4][CODE_LEN:4][URL_LEN:4][CODE][URL][CRC32:4]
//! Lengths are little endian; the CRC covers both lengths and the payload.
//!
//! Appends go through a bounded queue drained by one dedicated writer thread,
//! so records reach the file in the order they were enqueued and a full queue
//! pushes back on the caller instead of dropping records.

use crate::common::{Error, Record, Result, SyncPolicy, METRICS};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};

const LOG_MAGIC: [u8; 4] = [0x4C, 0x4E, 0x4B, 0x31]; // "LNK1"
const HEADER_LEN: usize = 12;
const CRC_LEN: usize = 4;

/// Largest code or url a record may carry.
pub const MAX_FIELD_LEN: usize = 1024 * 1024;

/// Durable log options
#[derive(Debug, Clone, Copy)]
pub struct LogOptions {
    pub sync_policy: SyncPolicy,
    pub queue_capacity: usize,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            sync_policy: SyncPolicy::Batch,
            queue_capacity: 1024,
        }
    }
}

/// Result of scanning a log file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Records successfully decoded
    pub records: u64,
    /// Byte length of the decodable prefix
    pub valid_len: u64,
    /// Set when replay stopped before the end of the file
    pub stopped_early: bool,
}

/// Encode one record in log framing.
pub fn encode_record(record: &Record) -> Vec<u8> {
    let code = record.code.as_bytes();
    let url = record.url.as_bytes();

    let mut buf = Vec::with_capacity(HEADER_LEN + code.len() + url.len() + CRC_LEN);
    buf.extend_from_slice(&LOG_MAGIC);
    buf.extend_from_slice(&(code.len() as u32).to_le_bytes());
    buf.extend_from_slice(&(url.len() as u32).to_le_bytes());
    buf.extend_from_slice(code);
    buf.extend_from_slice(url);

    let checksum = crc32fast::hash(&buf[LOG_MAGIC.len()..]);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

/// Read one record. `Ok(None)` means a clean end of log.
/// Returns the record and the number of bytes it occupied.
fn read_record<R: Read>(reader: &mut R) -> Result<Option<(Record, u64)>> {
    let mut header = [0u8; HEADER_LEN];
    match read_full(reader, &mut header)? {
        0 => return Ok(None),
        n if n < HEADER_LEN => {
            return Err(Error::Corrupted(format!("truncated header ({} bytes)", n)))
        }
        _ => {}
    }

    if header[..4] != LOG_MAGIC {
        return Err(Error::Corrupted("invalid magic".into()));
    }

    let code_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let url_len = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if code_len > MAX_FIELD_LEN || url_len > MAX_FIELD_LEN {
        return Err(Error::Corrupted(format!(
            "implausible field lengths {}/{}",
            code_len, url_len
        )));
    }

    let mut payload = vec![0u8; code_len + url_len + CRC_LEN];
    let n = read_full(reader, &mut payload)?;
    if n < payload.len() {
        return Err(Error::Corrupted(format!(
            "truncated record ({} of {} payload bytes)",
            n,
            payload.len()
        )));
    }

    let (body, crc) = payload.split_at(code_len + url_len);
    let stored = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&header[4..]);
    hasher.update(body);
    if hasher.finalize() != stored {
        return Err(Error::Corrupted("checksum mismatch".into()));
    }

    let (code, url) = body.split_at(code_len);
    let code = String::from_utf8(code.to_vec())
        .map_err(|_| Error::Corrupted("invalid UTF-8 in code".into()))?;
    let url = String::from_utf8(url.to_vec())
        .map_err(|_| Error::Corrupted("invalid UTF-8 in url".into()))?;

    let size = (HEADER_LEN + payload.len()) as u64;
    Ok(Some((Record { code, url }, size)))
}

/// Like `read_exact`, but reports how much was read instead of failing at EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

enum LogCommand {
    Append(Record),
    Sync(oneshot::Sender<Result<()>>),
}

/// Reserved slot in the durability queue.
///
/// Sending through a permit never blocks, so it may be used while the
/// store's exclusive lock is held.
pub struct LogPermit<'a> {
    permit: mpsc::Permit<'a, LogCommand>,
}

impl LogPermit<'_> {
    pub fn append(self, record: Record) {
        self.permit.send(LogCommand::Append(record));
    }
}

/// Byte stream the writer thread appends to.
pub(crate) trait LogSink: Write + Send + 'static {
    /// Push buffered bytes down to stable storage.
    fn sync_data(&mut self) -> io::Result<()>;
}

impl LogSink for BufWriter<File> {
    fn sync_data(&mut self) -> io::Result<()> {
        self.flush()?;
        self.get_ref().sync_data()
    }
}

/// Handle to the durable log and its writer thread
pub struct DurableLog {
    tx: Option<mpsc::Sender<LogCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl DurableLog {
    /// Replay the log at `path` into `apply`, then start the writer.
    ///
    /// A missing file is an empty log. An undecodable tail is cut off so later
    /// appends stay reachable by the next replay. Failing to open the file for
    /// writing is fatal.
    pub fn open<F>(path: impl AsRef<Path>, options: LogOptions, apply: F) -> Result<Self>
    where
        F: FnMut(Record),
    {
        let path = path.as_ref().to_path_buf();
        let unavailable =
            |e: io::Error| Error::PersistenceUnavailable(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(unavailable)?;
        }

        tracing::info!("Replaying durable log from {:?}", path);
        let outcome = Self::replay(&path, apply).map_err(|e| match e {
            Error::Io(io) => unavailable(io),
            other => other,
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(unavailable)?;

        if outcome.stopped_early {
            let len = file.metadata().map_err(unavailable)?.len();
            tracing::warn!(
                discarded_bytes = len - outcome.valid_len,
                "Truncating durable log to last valid record"
            );
            file.set_len(outcome.valid_len).map_err(unavailable)?;
        }

        tracing::info!(records = outcome.records, "Durable log replayed");

        Self::start(BufWriter::new(file), options)
    }

    /// Start the writer thread on `sink` without replaying anything.
    pub(crate) fn start<W: LogSink>(sink: W, options: LogOptions) -> Result<Self> {
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let writer = LogWriter {
            sink,
            sync_policy: options.sync_policy,
        };
        let worker = std::thread::Builder::new()
            .name("linkstore-log".into())
            .spawn(move || writer.run(rx))
            .map_err(|e| Error::PersistenceUnavailable(format!("log writer thread: {}", e)))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Decode records in append order until the end of the log or the first
    /// undecodable record.
    pub fn replay<F>(path: impl AsRef<Path>, mut apply: F) -> Result<ReplayOutcome>
    where
        F: FnMut(Record),
    {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ReplayOutcome::default()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut outcome = ReplayOutcome::default();

        loop {
            match read_record(&mut reader) {
                Ok(Some((record, size))) => {
                    apply(record);
                    outcome.records += 1;
                    outcome.valid_len += size;
                }
                Ok(None) => break,
                Err(e @ Error::Corrupted(_)) => {
                    tracing::warn!(
                        offset = outcome.valid_len,
                        "Durable log replay stopped: {}",
                        e
                    );
                    outcome.stopped_early = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        METRICS.replayed_records.add(outcome.records);
        Ok(outcome)
    }

    fn sender(&self) -> Result<&mpsc::Sender<LogCommand>> {
        self.tx.as_ref().ok_or_else(writer_stopped)
    }

    /// Wait for a free slot in the durability queue.
    pub async fn reserve(&self) -> Result<LogPermit<'_>> {
        let permit = self
            .sender()?
            .reserve()
            .await
            .map_err(|_| writer_stopped())?;
        Ok(LogPermit { permit })
    }

    /// Flush and fsync everything enqueued so far.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.sender()?
            .send(LogCommand::Sync(ack_tx))
            .await
            .map_err(|_| writer_stopped())?;
        ack_rx.await.map_err(|_| writer_stopped())?
    }
}

impl Drop for DurableLog {
    fn drop(&mut self) {
        // Closing the queue lets the writer drain it and sync before exiting
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Durable log writer panicked");
            }
        }
    }
}

fn writer_stopped() -> Error {
    Error::PersistenceUnavailable("log writer stopped".into())
}

struct LogWriter<W> {
    sink: W,
    sync_policy: SyncPolicy,
}

impl<W: LogSink> LogWriter<W> {
    fn run(mut self, mut rx: mpsc::Receiver<LogCommand>) {
        while let Some(first) = rx.blocking_recv() {
            let mut next = Some(first);
            while let Some(command) = next.take() {
                self.handle(command);
                next = rx.try_recv().ok();
            }
            // queue drained
            if let Err(e) = self.commit() {
                tracing::error!("Durable log flush failed: {}", e);
            }
        }

        if let Err(e) = self.sync() {
            tracing::error!("Durable log final sync failed: {}", e);
        }
        tracing::debug!("Durable log writer stopped");
    }

    fn handle(&mut self, command: LogCommand) {
        match command {
            LogCommand::Append(record) => match self.append(&record) {
                Ok(()) => METRICS.log_appends.inc(),
                Err(e) => {
                    // Best effort: the mapping keeps the entry, only durability is lost
                    METRICS.log_append_errors.inc();
                    tracing::error!(code = %record.code, "Durable log append failed: {}", e);
                }
            },
            LogCommand::Sync(ack) => {
                let _ = ack.send(self.sync());
            }
        }
    }

    fn append(&mut self, record: &Record) -> Result<()> {
        self.sink.write_all(&encode_record(record))?;
        if self.sync_policy == SyncPolicy::Always {
            self.sync()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.sync_policy {
            SyncPolicy::Always => Ok(()),
            SyncPolicy::Batch => self.sync(),
            SyncPolicy::Never => {
                self.sink.flush()?;
                Ok(())
            }
        }
    }

    fn sync(&mut self) -> Result<()> {
        self.sink.sync_data()?;
        Ok(())
    }
}
