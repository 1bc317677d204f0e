//! Append-only file store with CRC32 framing.
//!
//! Each [`add_batch`](crate::storage::ObjectStore::add_batch) call writes one
//! frame `[u32 length BE][u32 CRC32 BE][bincode Vec<Record>]` and fsyncs it
//! before returning, so a batch is the unit of atomicity. A frame cut short by
//! a crash is an uncommitted batch: [`LogStore::open`] cuts it off so later
//! appends land on a frame boundary, and scans stop in front of one with a
//! warning. A frame whose checksum does not match is corruption and fails the
//! scan.
//!
//! Uses `parking_lot::Mutex` to serialize appends.

use crate::config;
use crate::error::{Result, SearchError};
use crate::record::Record;
use crate::storage::store::{ObjectStore, RecordCursor};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Frames larger than this are treated as corruption rather than allocated.
const MAX_FRAME_LEN: usize = 1 << 30;

/// A named record container backed by a single log file.
pub struct LogStore {
    name: String,
    path: PathBuf,
    /// Append handle; also held during truncation.
    writer: Mutex<File>,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

impl LogStore {
    /// Open or create the container `name` under `dir`.
    ///
    /// A torn frame left at the end of an existing log is truncated away.
    /// Fails with [`SearchError::StorageUnavailable`] if the name is not a
    /// plain file stem, the directory or file cannot be created, or the torn
    /// tail cannot be removed.
    pub fn open(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(SearchError::StorageUnavailable(format!(
                "invalid store name '{name}'"
            )));
        }
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            SearchError::StorageUnavailable(format!("cannot create {}: {e}", dir.display()))
        })?;
        let path = dir.join(format!("{name}.{}", config::LOG_STORE_EXTENSION));
        let unavailable = |e: io::Error| {
            SearchError::StorageUnavailable(format!("cannot open {}: {e}", path.display()))
        };
        let file = open_append(&path).map_err(unavailable)?;

        let on_disk = file.metadata().map_err(unavailable)?.len();
        let committed = committed_len(&path).map_err(unavailable)?;
        if committed < on_disk {
            tracing::warn!(
                store = name,
                committed,
                dropped = on_disk - committed,
                "truncating uncommitted tail of log"
            );
            file.set_len(committed)
                .and_then(|()| file.sync_all())
                .map_err(unavailable)?;
        }
        tracing::debug!(store = name, path = %path.display(), "opened log store");

        Ok(Self {
            name: name.to_string(),
            path,
            writer: Mutex::new(file),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

/// Length of the log up to the end of its last complete frame.
///
/// Only frame headers are walked; checksums are left to the cursor.
fn committed_len(path: &Path) -> io::Result<u64> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut header = [0u8; 8];
    let mut offset = 0u64;
    while offset + 8 <= file_len {
        reader.read_exact(&mut header)?;
        let len = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let end = offset + 8 + len;
        if end > file_len {
            break;
        }
        reader.seek_relative(len as i64)?;
        offset = end;
    }
    Ok(offset)
}

/// Serialize a batch and prepend the length + CRC header.
fn serialize_and_frame(records: &[Record]) -> Result<Vec<u8>> {
    let payload = bincode::serialize(records)
        .map_err(|e| SearchError::StorageOperation(format!("cannot encode batch: {e}")))?;
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|&l| (l as usize) <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            SearchError::StorageOperation(format!("batch of {} bytes too large", payload.len()))
        })?;
    let crc = crc32fast::hash(&payload);

    let mut framed = Vec::with_capacity(8 + payload.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(&crc.to_be_bytes());
    framed.extend_from_slice(&payload);
    Ok(framed)
}

impl ObjectStore for LogStore {
    fn add_batch(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let framed = serialize_and_frame(records)?;

        let mut file = self.writer.lock();
        let committed = file.metadata()?.len();
        let written = file
            .write_all(&framed)
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_all());
        if let Err(e) = written {
            // Cut off the partial frame so the log stays readable.
            if let Err(rollback) = file.set_len(committed) {
                tracing::error!(
                    store = %self.name,
                    error = %rollback,
                    "failed to roll back partial batch"
                );
            }
            return Err(SearchError::StorageOperation(format!(
                "append to {} failed: {e}",
                self.path.display()
            )));
        }
        tracing::trace!(
            store = %self.name,
            records = records.len(),
            bytes = framed.len(),
            "appended batch"
        );
        Ok(())
    }

    fn cursor(&self) -> Result<Box<dyn RecordCursor + '_>> {
        let file = File::open(&self.path).map_err(|e| {
            SearchError::StorageUnavailable(format!("cannot open {}: {e}", self.path.display()))
        })?;
        Ok(Box::new(LogCursor {
            store: &self.name,
            reader: BufReader::new(file),
            pending: VecDeque::new(),
            exhausted: false,
            frames: 0,
            records: 0,
            truncated: false,
        }))
    }

    fn delete_all(&self) -> Result<()> {
        let file = self.writer.lock();
        file.set_len(0)?;
        file.sync_all()?;
        tracing::info!(store = %self.name, "log store truncated");
        Ok(())
    }
}

/// Forward-only frame reader over a log file.
struct LogCursor<'a> {
    store: &'a str,
    reader: BufReader<File>,
    /// Records decoded from the current frame but not yet handed out.
    pending: VecDeque<Record>,
    exhausted: bool,
    frames: usize,
    records: usize,
    truncated: bool,
}

impl LogCursor<'_> {
    /// Read and verify the next frame. `None` at end of log or at a torn tail.
    fn read_frame(&mut self) -> Result<Option<Vec<Record>>> {
        let mut header = [0u8; 8];
        match self.reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let stored_crc = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if len > MAX_FRAME_LEN {
            return Err(SearchError::StorageOperation(format!(
                "frame {} in '{}' declares {len} bytes",
                self.frames, self.store
            )));
        }

        let mut payload = vec![0u8; len];
        match self.reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::warn!(
                    store = self.store,
                    frame = self.frames,
                    "truncated batch at end of log; ignoring uncommitted tail"
                );
                self.truncated = true;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let computed = crc32fast::hash(&payload);
        if computed != stored_crc {
            return Err(SearchError::StorageOperation(format!(
                "checksum mismatch in frame {} of '{}' (stored={stored_crc:#010x}, computed={computed:#010x})",
                self.frames, self.store
            )));
        }

        let batch: Vec<Record> = bincode::deserialize(&payload).map_err(|e| {
            SearchError::StorageOperation(format!(
                "cannot decode frame {} of '{}': {e}",
                self.frames, self.store
            ))
        })?;
        self.frames += 1;
        Ok(Some(batch))
    }
}

impl RecordCursor for LogCursor<'_> {
    fn next_batch(&mut self, max: usize) -> Result<Vec<Record>> {
        let max = max.max(1);
        let mut batch = Vec::new();
        while batch.len() < max {
            if let Some(record) = self.pending.pop_front() {
                batch.push(record);
                continue;
            }
            if self.exhausted {
                break;
            }
            match self.read_frame()? {
                Some(records) => self.pending.extend(records),
                None => self.exhausted = true,
            }
        }
        self.records += batch.len();
        Ok(batch)
    }

    fn complete(&mut self) -> Result<()> {
        tracing::debug!(
            store = self.store,
            frames = self.frames,
            records = self.records,
            truncated = self.truncated,
            "log scan complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(id: i64) -> Record {
        Record::with_embedding(vec![id as f32, 0.5]).with("id", id)
    }

    fn scan(store: &LogStore, batch: usize) -> Result<Vec<Record>> {
        let mut cursor = store.cursor()?;
        let mut all = Vec::new();
        loop {
            let next = cursor.next_batch(batch)?;
            if next.is_empty() {
                break;
            }
            all.extend(next);
        }
        cursor.complete()?;
        Ok(all)
    }

    #[test]
    fn test_append_and_scan() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add(rec(0)).unwrap();
        store.add_batch(&[rec(1), rec(2), rec(3)]).unwrap();
        store.add_batch(&[]).unwrap();

        let all = scan(&store, 2).unwrap();
        assert_eq!(all, vec![rec(0), rec(1), rec(2), rec(3)]);
    }

    #[test]
    fn test_reopen_preserves_records() {
        let dir = TempDir::new().unwrap();
        {
            let store = LogStore::open(dir.path(), "docs").unwrap();
            store.add_batch(&[rec(1), rec(2)]).unwrap();
        }
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add(rec(3)).unwrap();
        assert_eq!(scan(&store, 10).unwrap().len(), 3);
    }

    #[test]
    fn test_truncated_tail_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add_batch(&[rec(1), rec(2)]).unwrap();
        store.add_batch(&[rec(3), rec(4)]).unwrap();

        // Simulate a crash mid-write of the second batch.
        let len = fs::metadata(store.path()).unwrap().len();
        let file = OpenOptions::new().write(true).open(store.path()).unwrap();
        file.set_len(len - 5).unwrap();

        let all = scan(&store, 10).unwrap();
        assert_eq!(all, vec![rec(1), rec(2)]);
    }

    #[test]
    fn test_reopen_drops_torn_tail_before_append() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = LogStore::open(dir.path(), "docs").unwrap();
            store.add(rec(1)).unwrap();
            store.path().to_path_buf()
        };

        // Header promising 200 bytes, followed by 2 of them.
        let mut torn = OpenOptions::new().append(true).open(&path).unwrap();
        torn.write_all(&200u32.to_be_bytes()).unwrap();
        torn.write_all(&0u32.to_be_bytes()).unwrap();
        torn.write_all(&[0xAB, 0xCD]).unwrap();
        drop(torn);
        let committed = fs::metadata(&path).unwrap().len() - 10;

        let store = LogStore::open(dir.path(), "docs").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), committed);
        store.add(rec(2)).unwrap();
        assert_eq!(scan(&store, 10).unwrap(), vec![rec(1), rec(2)]);
    }

    #[test]
    fn test_reopen_drops_partial_header() {
        let dir = TempDir::new().unwrap();
        let path = {
            let store = LogStore::open(dir.path(), "docs").unwrap();
            store.add_batch(&[rec(1), rec(2)]).unwrap();
            store.path().to_path_buf()
        };
        let mut torn = OpenOptions::new().append(true).open(&path).unwrap();
        torn.write_all(&[0, 0, 1]).unwrap();
        drop(torn);

        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add_batch(&[rec(3)]).unwrap();
        assert_eq!(scan(&store, 2).unwrap(), vec![rec(1), rec(2), rec(3)]);
    }

    #[test]
    fn test_reopen_keeps_intact_log() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add_batch(&[rec(1), rec(2)]).unwrap();
        let len = fs::metadata(store.path()).unwrap().len();
        drop(store);

        let store = LogStore::open(dir.path(), "docs").unwrap();
        assert_eq!(fs::metadata(store.path()).unwrap().len(), len);
    }

    #[test]
    fn test_crc_mismatch_fails_scan() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add_batch(&[rec(1), rec(2)]).unwrap();

        let mut data = fs::read(store.path()).unwrap();
        data[10] ^= 0xFF;
        fs::write(store.path(), &data).unwrap();

        let err = scan(&store, 10).unwrap_err();
        assert!(matches!(err, SearchError::StorageOperation(_)), "{err}");
    }

    #[test]
    fn test_delete_all_empties_store() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        store.add_batch(&[rec(1), rec(2)]).unwrap();
        store.delete_all().unwrap();
        assert!(scan(&store, 10).unwrap().is_empty());

        store.add(rec(9)).unwrap();
        assert_eq!(scan(&store, 10).unwrap(), vec![rec(9)]);
    }

    #[test]
    fn test_invalid_name_unavailable() {
        let dir = TempDir::new().unwrap();
        for name in ["", "a/b", ".."] {
            assert!(matches!(
                LogStore::open(dir.path(), name),
                Err(SearchError::StorageUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_missing_file_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path(), "docs").unwrap();
        fs::remove_file(store.path()).unwrap();
        assert!(matches!(
            store.cursor().err(),
            Some(SearchError::StorageUnavailable(_))
        ));
    }
}
