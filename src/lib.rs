mod archive;
pub mod config;
mod error;
mod event;
pub mod http;
mod log;
mod model;
pub mod provider;
pub mod reconcile;
mod service;
pub mod snapshot;
pub mod state;
mod store;
pub mod validate;

pub use config::Config;
pub use error::FeedError;
pub use event::Event;
pub use crate::log::{AppendResult, EventLog, line_hash};
pub use model::{FeedPage, GeneratedImage, NewImage, PublishedImage};
pub use provider::{ImageProvider, PicsumProvider, ProviderError};
pub use reconcile::{LikeError, LikeState, LocalFeed, PendingLike};
pub use service::{FeedService, total_pages};
pub use store::{LogStore, LogStoreBuilder, RecordStore, StoreError};
pub use validate::{FeedQuery, HeartsUpdate, ValidationError};
