use crate::model::PublishedImage;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::{SystemTime, UNIX_EPOCH};

/// Event type written when a record enters the feed.
pub const IMAGE_PUBLISHED: &str = "image_published";
/// Event type written when a record's counter is set to an absolute value.
pub const HEARTS_SET: &str = "hearts_set";
/// Event type written when a record's counter is bumped by a delta.
pub const HEARTS_INCREMENTED: &str = "hearts_incremented";

/// An immutable mutation record stored in the feed log.
///
/// Events are serialized as single JSON lines in `app.jsonl`. The `data`
/// payload stays untyped ([`serde_json::Value`]) on disk; the feed reducer
/// in [`crate::state`] gives each event type its meaning.
///
/// # Examples
///
/// ```
/// use heartfeed::Event;
///
/// let event = Event::hearts_set(7, 5);
/// assert_eq!(event.event_type, "hearts_set");
/// assert_eq!(event.data["hearts"], 5);
/// assert!(event.ts > 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The event type identifier (e.g. `"image_published"`).
    ///
    /// Serialized as `"type"` in JSON for brevity.
    #[serde(rename = "type")]
    pub event_type: String,

    /// JSON payload, interpreted by the reducer.
    pub data: Value,

    /// Unix timestamp in milliseconds, auto-populated by [`Event::new`].
    pub ts: u64,
}

impl Event {
    /// Create a new event with the given type and data, stamped with the
    /// current time in milliseconds since the Unix epoch.
    ///
    /// A clock set before the epoch stamps `0` rather than failing; the
    /// timestamp is informational and does not drive feed ordering.
    pub fn new(event_type: &str, data: Value) -> Self {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Event {
            event_type: event_type.to_string(),
            data,
            ts,
        }
    }

    /// A fully materialized record entering the feed.
    pub fn image_published(image: &PublishedImage) -> Self {
        Event::new(
            IMAGE_PUBLISHED,
            json!({
                "id": image.id,
                "imageUrl": image.image_url,
                "prompt": image.prompt,
                "createdAt": image.created_at,
            }),
        )
    }

    /// Overwrite a record's counter with an absolute value.
    pub fn hearts_set(id: u64, hearts: u64) -> Self {
        Event::new(HEARTS_SET, json!({ "id": id, "hearts": hearts }))
    }

    /// Add `by` to a record's counter.
    pub fn hearts_incremented(id: u64, by: u64) -> Self {
        Event::new(HEARTS_INCREMENTED, json!({ "id": id, "by": by }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn published_payload_uses_wire_names() {
        let image = PublishedImage {
            id: 3,
            image_url: "http://x/y.png".into(),
            prompt: "cat".into(),
            hearts: 0,
            created_at: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        };
        let event = Event::image_published(&image);
        assert_eq!(event.event_type, IMAGE_PUBLISHED);
        assert_eq!(event.data["id"], 3);
        assert_eq!(event.data["imageUrl"], "http://x/y.png");
        assert_eq!(event.data["prompt"], "cat");
        assert!(event.data.get("hearts").is_none());
    }

    #[test]
    fn type_field_is_renamed_on_disk() {
        let line = serde_json::to_string(&Event::hearts_incremented(1, 2)).unwrap();
        assert!(line.contains(r#""type":"hearts_incremented""#));
    }
}
