use std::sync::{Arc, PoisonError, RwLock};

use engine::AnalysisSnapshot;
use tracing::{debug, instrument};

pub mod retry;
pub mod source;

pub use retry::{fetch_with_retry, load_into, RetryPolicy};
pub use source::{read_analysis, AnalysisSource, FetchError, JsonFileSource};

/// Analysis of the song that is currently playing.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAnalysis {
    pub track_id: String,
    pub snapshot: AnalysisSnapshot,
}

/// Shared handle to the current song's analysis.
///
/// A new song replaces the whole `Arc` in a single write. Readers clone the
/// `Arc` out, so a rate computation keeps the snapshot it started with even
/// if the song changes halfway through.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: RwLock<Option<Arc<LoadedAnalysis>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<Arc<LoadedAnalysis>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in `loaded` and returns the analysis it replaced.
    pub fn replace(&self, loaded: LoadedAnalysis) -> Option<Arc<LoadedAnalysis>> {
        self.replace_arc(Arc::new(loaded))
    }

    #[instrument(skip_all, fields(track_id = %loaded.track_id), level = "debug")]
    pub fn replace_arc(&self, loaded: Arc<LoadedAnalysis>) -> Option<Arc<LoadedAnalysis>> {
        let mut write = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = write.replace(loaded);
        drop(write);
        debug!(previous = previous.as_ref().map(|p| p.track_id.as_str()), "swapped analysis");
        previous
    }

    pub fn clear(&self) -> Option<Arc<LoadedAnalysis>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn current_track_id(&self) -> Option<String> {
        self.load().map(|loaded| loaded.track_id.clone())
    }
}
