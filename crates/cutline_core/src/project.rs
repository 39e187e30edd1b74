use crate::document::ProjectDocument;
use crate::error::Result;
use crate::clip::HANDLE_SIZE;
use crate::geometry::MINIMUM_DURATION_FRAMES;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// TimelineSettings
// ---------------------------------------------------------------------------

/// Editing preferences handed to the editor at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineSettings {
    pub fps: f64,
    pub snap_to_points: bool,
    pub snap_threshold_frames: i64,
    pub history_limit: usize,
    pub handle_size_px: f64,
    pub minimum_duration_frames: i64,
    pub track_height_px: f64,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        preset_pal()
    }
}

fn preset(fps: f64) -> TimelineSettings {
    TimelineSettings {
        fps,
        snap_to_points: true,
        snap_threshold_frames: 5,
        history_limit: 100,
        handle_size_px: HANDLE_SIZE,
        minimum_duration_frames: MINIMUM_DURATION_FRAMES,
        track_height_px: 50.0,
    }
}

/// 25fps preset.
pub fn preset_pal() -> TimelineSettings {
    preset(25.0)
}

/// 29.97fps preset.
pub fn preset_ntsc() -> TimelineSettings {
    preset(30000.0 / 1001.0)
}

/// 24fps preset.
pub fn preset_film() -> TimelineSettings {
    preset(24.0)
}

/// 50fps preset.
pub fn preset_hd_50() -> TimelineSettings {
    preset(50.0)
}

/// 60fps preset.
pub fn preset_hd_60() -> TimelineSettings {
    preset(60.0)
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

impl ProjectDocument {
    /// Save the document to a file as pretty-printed JSON.
    /// Automatically appends `.cutline` extension if not present.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = ensure_extension(path.as_ref());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        tracing::debug!("saved project to {}", path.display());
        Ok(())
    }

    /// Load a document from a JSON file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let doc: ProjectDocument = serde_json::from_str(&data)?;
        Ok(doc)
    }
}

fn ensure_extension(path: &Path) -> std::path::PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some("cutline") {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".cutline");
        p.set_file_name(name);
        p
    }
}
