use std::{
    io,
    path::{Path, PathBuf},
};

use engine::AnalysisSnapshot;
use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{instrument, trace};

#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider has no analysis for the track yet.
    #[error("analysis for {0} is not available yet")]
    NotReady(String),
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed analysis in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Whether asking again later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::NotReady(_) => true,
            FetchError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            FetchError::Parse { .. } => false,
        }
    }
}

/// Something that can hand out the analysis of a track.
pub trait AnalysisSource: Send + Sync {
    fn fetch<'a>(&'a self, track_id: &'a str) -> BoxFuture<'a, Result<AnalysisSnapshot, FetchError>>;
}

/// Reads `<dir>/<track_id>.json`.
///
/// A missing file or a `null` document means the analysis is not ready yet.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, track_id: &str) -> PathBuf {
        self.dir.join(format!("{track_id}.json"))
    }
}

impl AnalysisSource for JsonFileSource {
    fn fetch<'a>(&'a self, track_id: &'a str) -> BoxFuture<'a, Result<AnalysisSnapshot, FetchError>> {
        Box::pin(async move {
            let path = self.path_for(track_id);
            match read_analysis(&path).await {
                Err(FetchError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                    Err(FetchError::NotReady(track_id.to_string()))
                }
                Err(FetchError::NotReady(_)) => Err(FetchError::NotReady(track_id.to_string())),
                other => other,
            }
        })
    }
}

/// Reads one analysis document. A `null` document is [`FetchError::NotReady`].
#[instrument(level = "trace")]
pub async fn read_analysis(path: &Path) -> Result<AnalysisSnapshot, FetchError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
        path: path.to_owned(),
        source,
    })?;
    trace!(len = bytes.len(), "read analysis");

    let snapshot: Option<AnalysisSnapshot> =
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Parse {
            path: path.to_owned(),
            source,
        })?;

    snapshot.ok_or_else(|| FetchError::NotReady(path.display().to_string()))
}
