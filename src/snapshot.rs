//! Checkpoints of the folded feed table.

use crate::state::FeedState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A persisted checkpoint of the feed table.
///
/// ```text
/// $ jq '{offset, hash, count: (.state.images | length)}' views/feed.snapshot.json
/// { "offset": 1284, "hash": "a3f2e1b09c4d...", "count": 12 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The folded table.
    pub state: FeedState,

    /// Byte offset into `app.jsonl` after the last event consumed. Always
    /// relative to the active log; the archive is fully consumed by any
    /// snapshot that exists.
    pub offset: u64,

    /// Hex-encoded xxh64 hash of the last line consumed, empty at offset 0.
    pub hash: String,
}

/// Location of a snapshot on disk, with its `.tmp` sibling.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot named `name` inside `views_dir`.
    pub fn new(views_dir: &Path, name: &str) -> Self {
        SnapshotFile {
            path: views_dir.join(format!("{name}.snapshot.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Write through a `.tmp` file and rename, so a crash mid-write leaves
    /// the previous snapshot intact.
    pub fn save(&self, snapshot: &Snapshot) -> io::Result<()> {
        let tmp_path = self.tmp_path();
        let json = serde_json::to_vec(snapshot)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_data()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
    }

    /// Load the snapshot. A missing or unparsable file is `Ok(None)`, which
    /// makes the caller rebuild from the log.
    pub fn load(&self) -> io::Result<Option<Snapshot>> {
        let contents = match fs::read(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        match serde_json::from_slice(&contents) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                log::warn!(
                    "heartfeed: ignoring unreadable snapshot {}: {e}",
                    self.path.display()
                );
                Ok(None)
            }
        }
    }

    /// Remove the snapshot and any leftover `.tmp`. Missing files are fine.
    pub fn delete(&self) -> io::Result<()> {
        for path in [self.path.clone(), self.tmp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
