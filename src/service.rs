use crate::error::FeedError;
use crate::model::{FeedPage, GeneratedImage, NewImage, PublishedImage};
use crate::provider::ImageProvider;
use crate::store::RecordStore;
use crate::validate::{self, FeedQuery, HeartsUpdate};
use serde_json::Value;

/// Feed reader, engagement updater and publish workflow over one store.
///
/// The service holds no mutable state of its own; every request is
/// independent and all shared state lives in the [`RecordStore`].
#[derive(Debug)]
pub struct FeedService<S, P> {
    store: S,
    provider: P,
}

/// Pages needed to show `total` records `limit` at a time; 0 when empty.
pub fn total_pages(total: u64, limit: u64) -> u64 {
    total.div_ceil(limit.max(1))
}

impl<S: RecordStore, P: ImageProvider> FeedService<S, P> {
    pub fn new(store: S, provider: P) -> Self {
        FeedService { store, provider }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One page of the feed, newest first.
    ///
    /// `total` and `images` come from two separate reads, so a concurrent
    /// publish can shift the page boundary between them. A page past the end
    /// is an empty `images` list, not an error.
    pub fn get_feed(&self, query: FeedQuery) -> Result<FeedPage, FeedError> {
        const SUMMARY: &str = "Failed to fetch feed";

        let total = self
            .store
            .count()
            .map_err(|e| FeedError::from_store(SUMMARY, e))?;
        let images = self
            .store
            .find_page(query.offset(), query.limit)
            .map_err(|e| FeedError::from_store(SUMMARY, e))?;

        let total_pages = total_pages(total, query.limit);
        log::debug!(
            "heartfeed: feed page {} limit {}: {} of {total} records, {total_pages} pages",
            query.page,
            query.limit,
            images.len()
        );

        Ok(FeedPage {
            images,
            total,
            page: query.page,
            total_pages,
        })
    }

    /// [`FeedService::get_feed`] from raw query-string values.
    pub fn get_feed_from_params(
        &self,
        page: Option<&str>,
        limit: Option<&str>,
    ) -> Result<FeedPage, FeedError> {
        self.get_feed(FeedQuery::from_params(page, limit)?)
    }

    /// Overwrite a record's hearts with the caller's absolute value.
    ///
    /// Concurrent writers race and the last write wins; use
    /// [`FeedService::increment_hearts`] when increments must not be lost.
    pub fn set_hearts(&self, update: HeartsUpdate) -> Result<PublishedImage, FeedError> {
        let image = self
            .store
            .update_hearts(update.id, update.hearts)
            .map_err(|e| FeedError::from_store("Failed to update hearts", e))?;
        log::info!("heartfeed: image {} hearts set to {}", image.id, image.hearts);
        Ok(image)
    }

    /// Validate a `{id, hearts}` body, then [`FeedService::set_hearts`].
    pub fn update_hearts(&self, body: &Value) -> Result<PublishedImage, FeedError> {
        self.set_hearts(validate::validate_hearts_update(body)?)
    }

    /// Add `by` to a record's hearts atomically in the store.
    pub fn increment_hearts(&self, id: u64, by: u64) -> Result<PublishedImage, FeedError> {
        let image = self
            .store
            .increment_hearts(id, by)
            .map_err(|e| FeedError::from_store("Failed to update hearts", e))?;
        log::info!("heartfeed: image {} hearts now {}", image.id, image.hearts);
        Ok(image)
    }

    /// Insert a validated image into the feed.
    ///
    /// Not idempotent: publishing the same image twice yields two records.
    pub fn publish_image(&self, image: NewImage) -> Result<PublishedImage, FeedError> {
        let image = self
            .store
            .create(image)
            .map_err(|e| FeedError::from_store("Failed to publish image", e))?;
        log::info!("heartfeed: published image {} ({})", image.id, image.image_url);
        Ok(image)
    }

    /// Validate a `{imageUrl, prompt}` body, then [`FeedService::publish_image`].
    pub fn publish(&self, body: &Value) -> Result<PublishedImage, FeedError> {
        self.publish_image(validate::validate_publish_payload(body)?)
    }

    /// Ask the provider for an image for `{prompt}`. Nothing is persisted.
    pub fn generate(&self, body: &Value) -> Result<GeneratedImage, FeedError> {
        let prompt = validate::validate_generate_prompt(body)?;
        let image_url = self
            .provider
            .generate(&prompt)
            .map_err(FeedError::from_provider)?;
        log::debug!("heartfeed: generated {image_url}");
        Ok(GeneratedImage { image_url, prompt })
    }
}
