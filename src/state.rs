use crate::event::{Event, HEARTS_INCREMENTED, HEARTS_SET, IMAGE_PUBLISHED};
use crate::model::PublishedImage;
use serde::{Deserialize, Serialize};

/// The record table derived by folding the feed log.
///
/// `images` is kept sorted ascending by `(created_at, id)`, so the feed
/// (newest first) is the table read back to front.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedState {
    pub images: Vec<PublishedImage>,
    pub next_id: u64,
}

#[derive(Deserialize)]
struct HeartsSet {
    id: u64,
    hearts: u64,
}

#[derive(Deserialize)]
struct HeartsIncremented {
    id: u64,
    by: u64,
}

/// Fold one event into the table.
///
/// Unknown event types and malformed payloads are skipped so older binaries
/// can read logs written by newer ones.
pub fn feed_reducer(mut state: FeedState, event: &Event) -> FeedState {
    match event.event_type.as_str() {
        IMAGE_PUBLISHED => {
            match serde_json::from_value::<PublishedImageData>(event.data.clone()) {
                Ok(data) => state.insert(data.into_image()),
                Err(e) => log::warn!("heartfeed: skipping malformed {IMAGE_PUBLISHED}: {e}"),
            }
        }
        HEARTS_SET => match serde_json::from_value::<HeartsSet>(event.data.clone()) {
            Ok(HeartsSet { id, hearts }) => {
                if let Some(image) = state.get_mut(id) {
                    image.hearts = hearts;
                }
            }
            Err(e) => log::warn!("heartfeed: skipping malformed {HEARTS_SET}: {e}"),
        },
        HEARTS_INCREMENTED => {
            match serde_json::from_value::<HeartsIncremented>(event.data.clone()) {
                Ok(HeartsIncremented { id, by }) => {
                    if let Some(image) = state.get_mut(id) {
                        image.hearts = image.hearts.saturating_add(by);
                    }
                }
                Err(e) => log::warn!("heartfeed: skipping malformed {HEARTS_INCREMENTED}: {e}"),
            }
        }
        _ => {}
    }
    state
}

/// Payload of `image_published`; `hearts` always starts at zero.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishedImageData {
    id: u64,
    image_url: String,
    prompt: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PublishedImageData {
    fn into_image(self) -> PublishedImage {
        PublishedImage {
            id: self.id,
            image_url: self.image_url,
            prompt: self.prompt,
            hearts: 0,
            created_at: self.created_at,
        }
    }
}

impl FeedState {
    /// Number of records.
    pub fn len(&self) -> u64 {
        self.images.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Look up a record by id.
    pub fn get(&self, id: u64) -> Option<&PublishedImage> {
        self.images.iter().rev().find(|image| image.id == id)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut PublishedImage> {
        self.images.iter_mut().rev().find(|image| image.id == id)
    }

    /// The newest record, which bounds the next `createdAt`.
    pub fn newest(&self) -> Option<&PublishedImage> {
        self.images.last()
    }

    /// Records `[offset, offset + limit)` in feed order: `createdAt`
    /// descending, then `id` descending.
    pub fn page(&self, offset: u64, limit: u64) -> Vec<PublishedImage> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        self.images
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn insert(&mut self, image: PublishedImage) {
        if self.get(image.id).is_some() {
            log::warn!("heartfeed: duplicate record id {} in log, keeping first", image.id);
            return;
        }
        self.next_id = self.next_id.max(image.id.saturating_add(1));
        let key = (image.created_at, image.id);
        let at = self
            .images
            .partition_point(|existing| (existing.created_at, existing.id) <= key);
        self.images.insert(at, image);
    }
}
