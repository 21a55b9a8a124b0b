use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Bytes of framing around each payload: the length prefix and the CRC.
const FRAME_OVERHEAD: u64 = 8;

/// Encode a single event to [len][bincode][crc32] format.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "event too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Fill `buf` completely. `Ok(false)` means the file ended first.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decode the next entry and its on-disk size. `Ok(None)` marks the end of
/// the usable log: clean EOF, a torn tail, or a checksum/payload mismatch.
fn decode_event(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let size = payload.len() as u64 + FRAME_OVERHEAD;
    Ok(bincode::deserialize::<Event>(&payload)
        .ok()
        .map(|event| (event, size)))
}

/// Events recovered from disk and the length of the valid prefix they came from.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    pub valid_len: u64,
}

/// Append-only write-ahead log of store events.
///
/// Entry layout: `[u32: len][bincode: Event][u32: crc32]`, little endian.
/// `len` covers the payload only. A torn last entry left by a crash fails the
/// length or CRC check, is dropped on replay and cut off by `truncate_to`.
///
/// Appends are staged in memory and reach the file only in `flush_sync`. The
/// file never holds more than `committed_len` bytes after a failed batch.
pub struct Wal {
    file: File,
    path: PathBuf,
    pending: Vec<u8>,
    pending_count: u64,
    committed_len: u64,
    appends_since_compact: u64,
    #[cfg(test)]
    fail_append_at: Option<u64>,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let committed_len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            pending: Vec::new(),
            pending_count: 0,
            committed_len,
            appends_since_compact: 0,
            #[cfg(test)]
            fail_append_at: None,
        })
    }

    /// Append and fsync one event. Production code batches through
    /// `append_buffered` + `flush_sync` instead.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Make the next append fail once `n` entries are already staged.
    #[cfg(test)]
    pub fn fail_append_at(&mut self, n: u64) {
        self.fail_append_at = Some(n);
    }

    /// Stage one event for the next `flush_sync`. On error nothing is staged
    /// for this event, but earlier staged entries stay until `discard_pending`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        #[cfg(test)]
        if self.fail_append_at == Some(self.pending_count) {
            self.fail_append_at = None;
            return Err(io::Error::new(io::ErrorKind::InvalidData, "injected encode failure"));
        }
        let mark = self.pending.len();
        if let Err(e) = encode_event(&mut self.pending, event) {
            self.pending.truncate(mark);
            return Err(e);
        }
        self.pending_count += 1;
        Ok(())
    }

    /// Drop every staged entry without touching the file.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
        self.pending_count = 0;
    }

    /// Write the staged entries and fsync. On failure the file is cut back to
    /// its last committed length, so none of the batch survives a restart.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        let result = self
            .file
            .write_all(&self.pending)
            .and_then(|()| self.file.sync_all());
        match result {
            Ok(()) => {
                self.committed_len += self.pending.len() as u64;
                self.appends_since_compact += self.pending_count;
                self.discard_pending();
                Ok(())
            }
            Err(e) => {
                self.discard_pending();
                if let Err(rollback) = self
                    .file
                    .set_len(self.committed_len)
                    .and_then(|()| self.file.sync_all())
                {
                    tracing::error!("WAL rollback to {} bytes failed: {rollback}", self.committed_len);
                }
                Err(e)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(path: &Path) -> PathBuf {
        path.with_extension("wal.tmp")
    }

    /// Write a snapshot of events to the temp file next to `path` and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::tmp_path(path))?);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp snapshot over the log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        fs::rename(Self::tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.file = file;
        self.discard_pending();
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Read every valid event from disk. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        while let Some((event, size)) = decode_event(&mut reader)? {
            replay.events.push(event);
            replay.valid_len += size;
        }
        Ok(replay)
    }

    /// Cut the log back to `len` bytes and fsync, dropping whatever replay
    /// could not read. Returns the number of bytes removed.
    pub fn truncate_to(path: &Path, len: u64) -> io::Result<u64> {
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let on_disk = file.metadata()?.len();
        if on_disk <= len {
            return Ok(0);
        }
        file.set_len(len)?;
        file.sync_all()?;
        Ok(on_disk - len)
    }
}
