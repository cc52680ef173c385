#![allow(dead_code)]

use chrono::{Duration, TimeZone, Utc};
use heartfeed::{
    FeedService, ImageProvider, LogStore, NewImage, PicsumProvider, ProviderError,
    PublishedImage, RecordStore, StoreError,
};
use std::path::Path;
use std::sync::Mutex;

pub fn new_image(i: usize) -> NewImage {
    NewImage {
        image_url: format!("https://picsum.photos/seed/{i}/512/512"),
        prompt: format!("prompt {i}"),
    }
}

/// Publish `n` images; ids come back 1..=n.
pub fn seed<S: RecordStore>(store: &S, n: usize) -> Vec<PublishedImage> {
    (1..=n).map(|i| store.create(new_image(i)).unwrap()).collect()
}

pub fn log_service(dir: &Path) -> FeedService<LogStore, PicsumProvider> {
    FeedService::new(
        LogStore::open(dir).unwrap(),
        PicsumProvider::new(std::time::Duration::ZERO),
    )
}

/// In-memory store with the same ordering rules as `LogStore`, for tests
/// that need many stores cheaply.
#[derive(Default)]
pub struct VecStore {
    images: Mutex<Vec<PublishedImage>>,
}

impl RecordStore for VecStore {
    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.images.lock().unwrap().len() as u64)
    }

    fn find_page(&self, offset: u64, limit: u64) -> Result<Vec<PublishedImage>, StoreError> {
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn find(&self, id: u64) -> Result<Option<PublishedImage>, StoreError> {
        Ok(self.images.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    fn update_hearts(&self, id: u64, hearts: u64) -> Result<PublishedImage, StoreError> {
        let mut images = self.images.lock().unwrap();
        let image = images
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound(id))?;
        image.hearts = hearts;
        Ok(image.clone())
    }

    fn increment_hearts(&self, id: u64, by: u64) -> Result<PublishedImage, StoreError> {
        let mut images = self.images.lock().unwrap();
        let image = images
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound(id))?;
        image.hearts += by;
        Ok(image.clone())
    }

    fn create(&self, image: NewImage) -> Result<PublishedImage, StoreError> {
        let mut images = self.images.lock().unwrap();
        let id = images.len() as u64 + 1;
        let record = PublishedImage {
            id,
            image_url: image.image_url,
            prompt: image.prompt,
            hearts: 0,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(id as i64),
        };
        images.push(record.clone());
        Ok(record)
    }
}

/// A store whose every call fails, to exercise the 500 path.
pub struct BrokenStore;

impl RecordStore for BrokenStore {
    fn count(&self) -> Result<u64, StoreError> {
        Err(broken())
    }
    fn find_page(&self, _: u64, _: u64) -> Result<Vec<PublishedImage>, StoreError> {
        Err(broken())
    }
    fn find(&self, _: u64) -> Result<Option<PublishedImage>, StoreError> {
        Err(broken())
    }
    fn update_hearts(&self, _: u64, _: u64) -> Result<PublishedImage, StoreError> {
        Err(broken())
    }
    fn increment_hearts(&self, _: u64, _: u64) -> Result<PublishedImage, StoreError> {
        Err(broken())
    }
    fn create(&self, _: NewImage) -> Result<PublishedImage, StoreError> {
        Err(broken())
    }
}

fn broken() -> StoreError {
    StoreError::Io(std::io::Error::other("connection refused"))
}

/// A provider that is always down.
pub struct DownProvider;

impl ImageProvider for DownProvider {
    fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        Err(ProviderError::Unavailable("timed out".into()))
    }
}
