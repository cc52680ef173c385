use crate::event::Event;
use crate::log::EventLog;
use crate::model::{NewImage, PublishedImage};
use crate::snapshot::{Snapshot, SnapshotFile};
use crate::state::{FeedState, feed_reducer};
use chrono::{SubsecRound, Utc};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const DEFAULT_MAX_LOG_SIZE: u64 = 10_000_000;
const DEFAULT_SNAPSHOT_EVERY: u64 = 64;
const SNAPSHOT_NAME: &str = "feed";

/// Errors reported by a [`RecordStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The targeted record does not exist. Nothing was written.
    #[error("record {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A writer panicked while holding the store lock.
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Transactional home of [`PublishedImage`] records.
///
/// Every method is atomic on its own. No method spans another, so a
/// `count` followed by `find_page` may observe different snapshots under
/// concurrent inserts.
pub trait RecordStore: Send + Sync {
    /// Total number of records.
    fn count(&self) -> Result<u64, StoreError>;

    /// Records `[offset, offset + limit)` ordered by `createdAt` descending,
    /// ties broken by `id` descending.
    fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<PublishedImage>, StoreError>;

    /// A single record by id.
    fn find(&self, id: u64) -> Result<Option<PublishedImage>, StoreError>;

    /// Overwrite `hearts` with an absolute value ("update where id = X").
    ///
    /// Returns [`StoreError::NotFound`] without writing if `id` is unknown.
    fn update_hearts(&self, id: u64, hearts: u64) -> Result<PublishedImage, StoreError>;

    /// Add `by` to `hearts` in one step, so concurrent increments never lose
    /// updates.
    fn increment_hearts(&self, id: u64, by: u64) -> Result<PublishedImage, StoreError>;

    /// Insert a record with a fresh id, zero hearts and `createdAt = now`.
    fn create(&self, image: NewImage) -> Result<PublishedImage, StoreError>;
}

/// Builder for [`LogStore`].
///
/// # Examples
///
/// ```no_run
/// let store = heartfeed::LogStore::builder("./data")
///     .max_log_size(1_000_000)
///     .snapshot_every(16)
///     .open()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct LogStoreBuilder {
    dir: PathBuf,
    max_log_size: u64,
    snapshot_every: u64,
}

impl LogStoreBuilder {
    /// Rotate the active log into the archive once it grows past `bytes`.
    /// `0` disables rotation.
    pub fn max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    /// Checkpoint the folded table after this many appends. Clamped to at
    /// least 1.
    pub fn snapshot_every(mut self, appends: u64) -> Self {
        self.snapshot_every = appends.max(1);
        self
    }

    /// Open the log, restore the table from its snapshot, and replay
    /// whatever the snapshot has not seen yet.
    pub fn open(self) -> Result<LogStore, StoreError> {
        let log = EventLog::open(&self.dir)?;
        let snapshot_file = SnapshotFile::new(log.views_dir(), SNAPSHOT_NAME);

        let mut inner = Inner {
            log,
            snapshot_file,
            state: FeedState::default(),
            offset: 0,
            hash: String::new(),
            max_log_size: self.max_log_size,
            snapshot_every: self.snapshot_every,
            unsaved: 0,
        };
        inner.restore()?;

        log::info!(
            "heartfeed: opened store at {} with {} records",
            self.dir.display(),
            inner.state.len()
        );
        Ok(LogStore {
            inner: Mutex::new(inner),
        })
    }
}

/// A [`RecordStore`] persisted as an append-only event log.
///
/// One mutex guards append and fold together, which makes each mutation a
/// single atomic conditional write.
#[derive(Debug)]
pub struct LogStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    log: EventLog,
    snapshot_file: SnapshotFile,
    state: FeedState,
    offset: u64,
    hash: String,
    max_log_size: u64,
    snapshot_every: u64,
    unsaved: u64,
}

impl LogStore {
    /// Open with default settings.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::builder(dir).open()
    }

    pub fn builder(dir: impl AsRef<Path>) -> LogStoreBuilder {
        LogStoreBuilder {
            dir: dir.as_ref().to_path_buf(),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            snapshot_every: DEFAULT_SNAPSHOT_EVERY,
        }
    }

    /// Write a snapshot of everything appended so far.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.lock()?.save_snapshot()?;
        Ok(())
    }

    /// Rebuild the table by replaying the archive and active log from
    /// scratch, discarding the current snapshot.
    pub fn rebuild(&self) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        inner.snapshot_file.delete()?;
        inner.replay_full()?;
        inner.save_snapshot()?;
        Ok(inner.state.len())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Drop for LogStore {
    fn drop(&mut self) {
        let Ok(inner) = self.inner.get_mut() else {
            return;
        };
        if inner.unsaved == 0 {
            return;
        }
        if let Err(e) = inner.save_snapshot() {
            log::warn!("heartfeed: final snapshot failed: {e}");
        }
    }
}

impl RecordStore for LogStore {
    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.state.len())
    }

    fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<PublishedImage>, StoreError> {
        Ok(self.lock()?.state.page(offset, limit))
    }

    fn find(&self, id: u64) -> Result<Option<PublishedImage>, StoreError> {
        Ok(self.lock()?.state.get(id).cloned())
    }

    fn update_hearts(&self, id: u64, hearts: u64) -> Result<PublishedImage, StoreError> {
        let mut inner = self.lock()?;
        if inner.state.get(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        inner.commit(&Event::hearts_set(id, hearts))?;
        inner.record(id)
    }

    fn increment_hearts(&self, id: u64, by: u64) -> Result<PublishedImage, StoreError> {
        let mut inner = self.lock()?;
        if inner.state.get(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        inner.commit(&Event::hearts_incremented(id, by))?;
        inner.record(id)
    }

    fn create(&self, image: NewImage) -> Result<PublishedImage, StoreError> {
        let mut inner = self.lock()?;

        // Never go backwards in time, so feed order follows insertion order.
        let mut created_at = Utc::now().trunc_subsecs(3);
        if let Some(newest) = inner.state.newest() {
            created_at = created_at.max(newest.created_at);
        }

        let record = PublishedImage {
            id: inner.state.next_id.max(1),
            image_url: image.image_url,
            prompt: image.prompt,
            hearts: 0,
            created_at,
        };
        inner.commit(&Event::image_published(&record))?;
        inner.record(record.id)
    }
}

impl Inner {
    fn record(&self, id: u64) -> Result<PublishedImage, StoreError> {
        self.state.get(id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Append and fold. Once the line is on disk the write has happened:
    /// rotation and checkpoint failures are logged and retried on the next
    /// commit, and the log alone can rebuild what they would have held.
    fn commit(&mut self, event: &Event) -> Result<(), StoreError> {
        let appended = self.log.append(event)?;
        let state = std::mem::take(&mut self.state);
        self.state = feed_reducer(state, event);
        self.offset = appended.end_offset;
        self.hash = appended.line_hash;
        self.unsaved += 1;

        if self.max_log_size > 0 && self.offset > self.max_log_size {
            if let Err(e) = self.rotate() {
                log::warn!("heartfeed: log rotation failed, will retry: {e}");
            }
        } else if self.unsaved >= self.snapshot_every {
            if let Err(e) = self.save_snapshot() {
                log::warn!("heartfeed: snapshot failed, will retry: {e}");
            }
        }
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.log.rotate()?;
        self.offset = 0;
        self.hash.clear();
        self.save_snapshot()
    }

    fn save_snapshot(&mut self) -> io::Result<()> {
        self.snapshot_file.save(&Snapshot {
            state: self.state.clone(),
            offset: self.offset,
            hash: self.hash.clone(),
        })?;
        self.unsaved = 0;
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        let Some(snapshot) = self.snapshot_file.load()? else {
            return self.replay_full();
        };

        if !self.snapshot_matches_log(&snapshot)? {
            log::warn!(
                "heartfeed: snapshot at offset {} does not match {}, rebuilding",
                snapshot.offset,
                self.log.log_path().display()
            );
            return self.replay_full();
        }

        self.state = snapshot.state;
        self.offset = snapshot.offset;
        self.hash = snapshot.hash;

        let mut caught_up = 0u64;
        for result in self.log.read_from(self.offset)? {
            let (event, next_offset, line_hash) = result?;
            let state = std::mem::take(&mut self.state);
            self.state = feed_reducer(state, &event);
            self.offset = next_offset;
            self.hash = line_hash;
            caught_up += 1;
        }
        if caught_up > 0 {
            log::debug!("heartfeed: replayed {caught_up} events past snapshot");
            self.save_snapshot()?;
        }
        Ok(())
    }

    fn replay_full(&mut self) -> io::Result<()> {
        let mut state = FeedState::default();
        let mut hash = String::new();
        for result in self.log.read_full()? {
            let (event, line_hash) = result?;
            state = feed_reducer(state, &event);
            hash = line_hash;
        }

        let size = self.log.active_log_size()?;
        self.state = state;
        self.offset = size;
        self.hash = if size == 0 { String::new() } else { hash };
        self.save_snapshot()
    }

    fn snapshot_matches_log(&self, snapshot: &Snapshot) -> io::Result<bool> {
        if snapshot.offset > self.log.active_log_size()? {
            return Ok(false);
        }
        match self.log.read_line_hash_before(snapshot.offset)? {
            Some(hash) => Ok(hash == snapshot.hash),
            None => Ok(snapshot.hash.is_empty()),
        }
    }
}
