//! Optimistic "like" handling for a client holding one feed page.
//!
//! Each like moves an item through `Idle -> OptimisticApplied ->
//! Reconciled | RolledBack`. At most one like per item may be in flight;
//! a second tap before the first resolves is refused rather than racing it.

use crate::model::{FeedPage, PublishedImage};
use crate::validate::HeartsUpdate;
use std::collections::HashMap;
use std::fmt::Display;

/// Where an item's most recent like stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeState {
    #[default]
    Idle,
    /// Shown as `previous + 1` locally; waiting for the server.
    OptimisticApplied { previous: u64 },
    /// Overwritten with the server's record.
    Reconciled,
    /// Restored to `previous` after a failed write.
    RolledBack,
}

impl LikeState {
    pub fn in_flight(&self) -> bool {
        matches!(self, LikeState::OptimisticApplied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LikeError {
    #[error("image {0} is not on this page")]
    UnknownItem(u64),
    #[error("a like for image {0} is already in flight")]
    InFlight(u64),
    #[error("like for image {id} rolled back: {reason}")]
    RolledBack { id: u64, reason: String },
}

/// Ticket for an applied optimistic like. Consumed by
/// [`LocalFeed::confirm`] or [`LocalFeed::rollback`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an optimistic like must be confirmed or rolled back"]
pub struct PendingLike {
    id: u64,
    previous: u64,
}

impl PendingLike {
    /// The absolute write to send to the server.
    pub fn request(&self) -> HeartsUpdate {
        HeartsUpdate {
            id: self.id,
            hearts: self.previous.saturating_add(1),
        }
    }
}

/// Client-side view of one feed page.
#[derive(Debug, Clone, Default)]
pub struct LocalFeed {
    items: Vec<PublishedImage>,
    states: HashMap<u64, LikeState>,
}

impl LocalFeed {
    pub fn new(items: Vec<PublishedImage>) -> Self {
        LocalFeed {
            items,
            states: HashMap::new(),
        }
    }

    pub fn from_page(page: FeedPage) -> Self {
        LocalFeed::new(page.images)
    }

    /// Swap in a freshly fetched page. In-flight likes keep their tickets;
    /// resolving one for an item no longer shown is a no-op.
    pub fn replace_page(&mut self, page: FeedPage) {
        self.items = page.images;
        self.states.retain(|_, state| state.in_flight());
    }

    pub fn items(&self) -> &[PublishedImage] {
        &self.items
    }

    pub fn get(&self, id: u64) -> Option<&PublishedImage> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn state(&self, id: u64) -> LikeState {
        self.states.get(&id).copied().unwrap_or_default()
    }

    /// Show `hearts + 1` immediately and hand back the ticket to send.
    pub fn begin_like(&mut self, id: u64) -> Result<PendingLike, LikeError> {
        if self.state(id).in_flight() {
            return Err(LikeError::InFlight(id));
        }
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(LikeError::UnknownItem(id))?;

        let previous = item.hearts;
        item.hearts = previous.saturating_add(1);
        self.states
            .insert(id, LikeState::OptimisticApplied { previous });
        Ok(PendingLike { id, previous })
    }

    /// Replace the item with the server's authoritative record.
    pub fn confirm(&mut self, pending: PendingLike, record: PublishedImage) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == pending.id) {
            *item = record;
        }
        self.states.insert(pending.id, LikeState::Reconciled);
    }

    /// Restore the counter shown before the like. No retry is attempted.
    pub fn rollback(&mut self, pending: PendingLike) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == pending.id) {
            item.hearts = pending.previous;
        }
        self.states.insert(pending.id, LikeState::RolledBack);
    }

    /// Run one like end to end: apply optimistically, send through `send`,
    /// then reconcile with its answer or roll back on failure.
    pub fn like<F, E>(&mut self, id: u64, send: F) -> Result<&PublishedImage, LikeError>
    where
        F: FnOnce(HeartsUpdate) -> Result<PublishedImage, E>,
        E: Display,
    {
        let pending = self.begin_like(id)?;
        match send(pending.request()) {
            Ok(record) => {
                self.confirm(pending, record);
                self.get(id).ok_or(LikeError::UnknownItem(id))
            }
            Err(e) => {
                self.rollback(pending);
                Err(LikeError::RolledBack {
                    id,
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: u64, hearts: u64) -> PublishedImage {
        PublishedImage {
            id,
            image_url: format!("http://x/{id}.png"),
            prompt: String::new(),
            hearts,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn optimistic_then_reconciled_with_server_value() {
        let mut feed = LocalFeed::new(vec![item(1, 4), item(2, 0)]);

        let pending = feed.begin_like(1).unwrap();
        assert_eq!(pending.request(), HeartsUpdate { id: 1, hearts: 5 });
        assert_eq!(feed.get(1).unwrap().hearts, 5);
        assert_eq!(feed.state(1), LikeState::OptimisticApplied { previous: 4 });

        // Another session won the race; the server value is authoritative.
        feed.confirm(pending, item(1, 9));
        assert_eq!(feed.get(1).unwrap().hearts, 9);
        assert_eq!(feed.state(1), LikeState::Reconciled);
        assert_eq!(feed.state(2), LikeState::Idle);
    }

    #[test]
    fn failure_rolls_back_to_previous() {
        let mut feed = LocalFeed::new(vec![item(1, 4)]);
        let err = feed
            .like(1, |_| Err::<PublishedImage, _>("503 Service Unavailable"))
            .unwrap_err();
        assert_eq!(
            err,
            LikeError::RolledBack {
                id: 1,
                reason: "503 Service Unavailable".into()
            }
        );
        assert_eq!(feed.get(1).unwrap().hearts, 4);
        assert_eq!(feed.state(1), LikeState::RolledBack);
    }

    #[test]
    fn second_like_while_in_flight_is_refused() {
        let mut feed = LocalFeed::new(vec![item(1, 0)]);
        let first = feed.begin_like(1).unwrap();
        assert_eq!(feed.begin_like(1), Err(LikeError::InFlight(1)));
        assert_eq!(feed.get(1).unwrap().hearts, 1);

        feed.rollback(first);
        assert_eq!(feed.get(1).unwrap().hearts, 0);
        let again = feed.begin_like(1).unwrap();
        assert_eq!(again.request().hearts, 1);
        feed.confirm(again, item(1, 1));
    }

    #[test]
    fn like_sends_absolute_value() {
        let mut feed = LocalFeed::new(vec![item(3, 7)]);
        let record = feed
            .like(3, |update| {
                assert_eq!(update, HeartsUpdate { id: 3, hearts: 8 });
                Ok::<_, String>(item(3, update.hearts))
            })
            .unwrap();
        assert_eq!(record.hearts, 8);
    }

    #[test]
    fn unknown_item() {
        let mut feed = LocalFeed::default();
        assert_eq!(feed.begin_like(5), Err(LikeError::UnknownItem(5)));
    }

    #[test]
    fn replace_page_keeps_in_flight_tickets() {
        let mut feed = LocalFeed::new(vec![item(1, 0), item(2, 0)]);
        let pending = feed.begin_like(1).unwrap();
        let other = feed.begin_like(2).unwrap();
        feed.confirm(other, item(2, 1));

        feed.replace_page(FeedPage {
            images: vec![item(2, 1)],
            total: 1,
            page: 1,
            total_pages: 1,
        });
        assert!(feed.state(1).in_flight());
        assert_eq!(feed.state(2), LikeState::Idle);

        feed.rollback(pending);
        assert!(feed.get(1).is_none());
    }
}
