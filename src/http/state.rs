use crate::audio::AudioSource;
use crate::error::Result;
use crate::recorder::Recorder;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Builds the audio source for each new session
pub type SourceFactory = Arc<dyn Fn() -> Result<Box<dyn AudioSource>> + Send + Sync>;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single recorder controlled over HTTP
    pub recorder: Arc<Mutex<Recorder>>,
    pub sources: SourceFactory,
}

impl AppState {
    pub fn new(recorder: Recorder, sources: SourceFactory) -> Self {
        Self {
            recorder: Arc::new(Mutex::new(recorder)),
            sources,
        }
    }
}
