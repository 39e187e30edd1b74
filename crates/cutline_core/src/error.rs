use crate::keyframes::KeyframeParseError;
use crate::renderer::MirrorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot find {what} on track {track} at frame {frame}")]
    ItemNotFound {
        what: &'static str,
        track: usize,
        frame: i64,
    },

    #[error("Item not found: {0}")]
    UnknownItem(uuid::Uuid),

    #[error("{0}")]
    Collision(String),

    #[error("Error when {action}: {source}")]
    Renderer {
        action: &'static str,
        #[source]
        source: MirrorError,
    },

    #[error("Invalid track {0}")]
    InvalidTrack(usize),

    #[error("Track {0} is locked")]
    TrackLocked(usize),

    #[error("Invalid keyframes: {0}")]
    Keyframes(#[from] KeyframeParseError),

    #[error("Another edit is in progress")]
    GestureInProgress,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

impl CoreError {
    pub(crate) fn renderer(action: &'static str, source: MirrorError) -> Self {
        CoreError::Renderer { action, source }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
