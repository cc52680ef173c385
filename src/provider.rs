use rand::Rng;
use std::time::Duration;

/// Failure reported by an [`ImageProvider`].
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("image provider unavailable: {0}")]
    Unavailable(String),
}

/// Maps a prompt to the URL of a generated image.
///
/// Calls may block for as long as the provider takes; callers run them off
/// the async executor.
pub trait ImageProvider: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Stand-in provider that hands out seeded 512x512 photos from picsum.photos.
#[derive(Debug, Clone)]
pub struct PicsumProvider {
    latency: Duration,
}

impl PicsumProvider {
    /// `latency` is slept before answering, to mimic a real generation call.
    pub fn new(latency: Duration) -> Self {
        PicsumProvider { latency }
    }
}

impl Default for PicsumProvider {
    fn default() -> Self {
        PicsumProvider::new(Duration::from_millis(500))
    }
}

impl ImageProvider for PicsumProvider {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let seed = rand::thread_rng().gen_range(0..100_000u64) + prompt.chars().count() as u64;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        Ok(format!("https://picsum.photos/seed/{seed}/512/512"))
    }
}
