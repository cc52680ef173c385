use crate::archive;
use crate::event::Event;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const SCAN_CHUNK: usize = 8192;

/// Compute xxh64 hash of raw line bytes (without trailing newline), hex-encoded.
pub fn line_hash(line: &[u8]) -> String {
    let hash = xxhash_rust::xxh64::xxh64(line, 0);
    format!("{:016x}", hash)
}

/// Position and identity of a freshly appended line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    /// Byte offset where the line starts.
    pub start_offset: u64,
    /// Byte offset just past the trailing newline.
    pub end_offset: u64,
    /// Hash of the line as written.
    pub line_hash: String,
}

/// Append-only JSONL log of feed mutations, owned by a single writer.
///
/// Layout inside the data directory:
///
/// ```text
/// data/
///   app.jsonl            active log
///   archive.jsonl.zst    rotated history, one zstd frame per rotation
///   views/               snapshots of folded state
/// ```
///
/// The active log is locked exclusively for as long as the `EventLog` lives.
pub struct EventLog {
    dir: PathBuf,
    log_path: PathBuf,
    archive_path: PathBuf,
    views_dir: PathBuf,
    file: File,
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("dir", &self.dir)
            .finish()
    }
}

impl EventLog {
    /// Open or create the log in `dir` and take the writer lock.
    ///
    /// A trailing line without a newline (a crash mid-append) is truncated
    /// away so the next append starts on a clean line.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::AlreadyExists`] if another writer holds the
    /// lock, or any I/O error from creating the directory layout.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let views_dir = dir.join("views");
        let log_path = dir.join("app.jsonl");
        let archive_path = dir.join("archive.jsonl.zst");

        fs::create_dir_all(&views_dir)?;

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&log_path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "another writer holds the lock on {}",
                    log_path.display()
                ),
            ));
        }

        let mut log = EventLog {
            dir,
            log_path,
            archive_path,
            views_dir,
            file,
        };
        log.truncate_partial_tail()?;
        Ok(log)
    }

    /// Append an event as one line and flush it to disk.
    ///
    /// On failure the file is cut back to where the line started, so a torn
    /// or unsynced line never survives to be replayed.
    pub fn append(&mut self, event: &Event) -> io::Result<AppendResult> {
        self.append_with(event, |file, line| {
            file.write_all(line)?;
            file.sync_data()
        })
    }

    fn append_with(
        &mut self,
        event: &Event,
        write: impl FnOnce(&mut File, &[u8]) -> io::Result<()>,
    ) -> io::Result<AppendResult> {
        let json = serde_json::to_string(event)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let start_offset = self.file.seek(SeekFrom::End(0))?;

        let mut line = json.into_bytes();
        let line_hash = line_hash(&line);
        line.push(b'\n');

        if let Err(e) = write(&mut self.file, &line) {
            if let Err(cut) = self.file.set_len(start_offset) {
                log::error!(
                    "heartfeed: could not drop failed append at {} in {}: {cut}",
                    start_offset,
                    self.log_path.display()
                );
            }
            return Err(e);
        }

        Ok(AppendResult {
            start_offset,
            end_offset: start_offset + line.len() as u64,
            line_hash,
        })
    }

    /// Read events from the active log starting at the given byte offset.
    ///
    /// Yields `(event, next_byte_offset, line_hash)` for each complete line.
    /// Empty lines are skipped, as is a partial line at EOF.
    pub fn read_from(
        &self,
        offset: u64,
    ) -> io::Result<impl Iterator<Item = io::Result<(Event, u64, String)>> + use<>> {
        let mut file = File::open(&self.log_path)?;
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(offset))?;

        Ok(LogIterator {
            lines: BufReader::new(file).lines(),
            pos: offset,
            file_len,
        })
    }

    /// Read the archive followed by the active log, yielding
    /// `(event, line_hash)` for every event ever appended.
    pub fn read_full(
        &self,
    ) -> io::Result<Box<dyn Iterator<Item = io::Result<(Event, String)>>>> {
        let active = self
            .read_from(0)?
            .map(|r| r.map(|(event, _, hash)| (event, hash)));

        let Some(reader) = archive::open_archive_reader(&self.archive_path)? else {
            return Ok(Box::new(active));
        };

        let archived = reader
            .lines()
            .filter(|line| !matches!(line, Ok(l) if l.is_empty()))
            .map(|line| {
                let line = line?;
                let event: Event = serde_json::from_str(&line)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok((event, line_hash(line.as_bytes())))
            });

        Ok(Box::new(archived.chain(active)))
    }

    /// Move the active log into the compressed archive and truncate it.
    ///
    /// Any snapshot taken against the active log must reset its offset to 0
    /// afterwards.
    pub fn rotate(&mut self) -> io::Result<()> {
        let mut contents = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut contents)?;
        if contents.is_empty() {
            return Ok(());
        }

        archive::append_compressed_frame(&self.archive_path, &contents)?;
        self.file.set_len(0)?;
        self.file.sync_all()?;
        log::info!(
            "heartfeed: rotated {} bytes into {}",
            contents.len(),
            self.archive_path.display()
        );
        Ok(())
    }

    /// Returns the path to the active log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns the path to the views directory.
    pub fn views_dir(&self) -> &Path {
        &self.views_dir
    }

    /// Returns the current size in bytes of the active log file.
    pub fn active_log_size(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Hash of the line that ends right before `offset`.
    ///
    /// `offset` must point just past a newline. Returns `None` if offset is 0
    /// or beyond EOF.
    pub fn read_line_hash_before(&self, offset: u64) -> io::Result<Option<String>> {
        if offset == 0 {
            return Ok(None);
        }

        let mut file = File::open(&self.log_path)?;
        let file_len = file.metadata()?.len();
        if offset > file_len {
            return Ok(None);
        }

        // Walk back a chunk at a time until the previous newline.
        let newline_pos = offset - 1;
        let mut start = 0u64;
        let mut end = newline_pos;
        let mut chunk = vec![0u8; SCAN_CHUNK];
        while end > 0 {
            let chunk_start = end.saturating_sub(SCAN_CHUNK as u64);
            let buf = &mut chunk[..(end - chunk_start) as usize];
            file.seek(SeekFrom::Start(chunk_start))?;
            file.read_exact(buf)?;
            if let Some(pos) = buf.iter().rposition(|&b| b == b'\n') {
                start = chunk_start + pos as u64 + 1;
                break;
            }
            end = chunk_start;
        }

        file.seek(SeekFrom::Start(start))?;
        let mut line_buf = vec![0u8; (newline_pos - start) as usize];
        file.read_exact(&mut line_buf)?;

        Ok(Some(line_hash(&line_buf)))
    }

    fn truncate_partial_tail(&mut self) -> io::Result<()> {
        let len = self.file.metadata()?.len();
        if len == 0 {
            return Ok(());
        }

        let mut contents = Vec::with_capacity(len as usize);
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut contents)?;
        if contents.last() == Some(&b'\n') {
            return Ok(());
        }

        let keep = contents
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos as u64 + 1);
        log::warn!(
            "heartfeed: dropping {} bytes of partial line at end of {}",
            len - keep,
            self.log_path.display()
        );
        self.file.set_len(keep)?;
        self.file.sync_all()?;
        Ok(())
    }
}

struct LogIterator<I> {
    lines: I,
    pos: u64,
    file_len: u64,
}

impl<I: Iterator<Item = io::Result<String>>> Iterator for LogIterator<I> {
    type Item = io::Result<(Event, u64, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e)),
            };

            let line_bytes = line.len() as u64;

            // No trailing newline means the writer has not finished this line.
            if self.pos + line_bytes >= self.file_len {
                return None;
            }

            let next_pos = self.pos + line_bytes + 1;

            if line.is_empty() {
                self.pos = next_pos;
                continue;
            }

            let hash = line_hash(line.as_bytes());
            let event: Event = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(e) => {
                    return Some(Err(io::Error::new(io::ErrorKind::InvalidData, e)));
                }
            };

            self.pos = next_pos;
            return Some(Ok((event, next_pos, hash)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(id: u64) -> Event {
        Event::hearts_set(id, id * 10)
    }

    #[test]
    fn torn_write_is_cut_back() {
        let dir = tempdir().unwrap();
        let mut log = EventLog::open(dir.path()).unwrap();
        let first = log.append(&event(1)).unwrap();

        let err = log
            .append_with(&event(2), |file, line| {
                file.write_all(&line[..line.len() / 2])?;
                Err(io::Error::other("disk full"))
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(log.active_log_size().unwrap(), first.end_offset);

        let third = log.append(&event(3)).unwrap();
        assert_eq!(third.start_offset, first.end_offset);
        let ids: Vec<u64> = log
            .read_from(0)
            .unwrap()
            .map(|r| r.unwrap().0.data["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn failed_sync_drops_the_whole_line() {
        let dir = tempdir().unwrap();
        let mut log = EventLog::open(dir.path()).unwrap();

        log.append_with(&event(1), |file, line| {
            file.write_all(line)?;
            Err(io::Error::other("sync failed"))
        })
        .unwrap_err();

        assert_eq!(log.active_log_size().unwrap(), 0);
        assert_eq!(log.read_from(0).unwrap().count(), 0);
    }
}
