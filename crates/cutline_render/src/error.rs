use cutline_core::renderer::MirrorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no track {0}")]
    InvalidTrack(usize),

    #[error("no clip on track {track} at frame {frame}")]
    ClipNotFound { track: usize, frame: i64 },

    #[error("track {track} is not free at frame {frame}")]
    Overlap { track: usize, frame: i64 },

    #[error("space before frame {frame} on track {track} is not blank")]
    NotBlank { track: usize, frame: i64 },

    #[error("invalid clip length {0}")]
    InvalidLength(i64),

    #[error("invalid speed {0}")]
    InvalidSpeed(f64),

    #[error("no transition on track {track} at frame {frame}")]
    TransitionNotFound { track: usize, frame: i64 },

    #[error("transition on track {track} at frame {frame} overlaps another one")]
    TransitionOverlap { track: usize, frame: i64 },

    #[error("no effect with index {0}")]
    EffectNotFound(usize),

    #[error("track {0} still holds clips")]
    TrackNotEmpty(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for MirrorError {
    fn from(err: RenderError) -> Self {
        MirrorError(err.to_string())
    }
}
