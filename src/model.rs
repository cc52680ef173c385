//! Wire and storage shapes for feed records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated image admitted to the feed.
///
/// Only `hearts` ever changes after creation. Serialized in camelCase
/// (`imageUrl`, `createdAt`) with `createdAt` as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedImage {
    pub id: u64,
    pub image_url: String,
    pub prompt: String,
    pub hearts: u64,
    pub created_at: DateTime<Utc>,
}

/// A validated insert request. The store assigns `id`, `hearts` and
/// `createdAt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub image_url: String,
    pub prompt: String,
}

/// One page of the feed plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub images: Vec<PublishedImage>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

/// Result of a prompt-to-image generation, before it is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub image_url: String,
    pub prompt: String,
}
