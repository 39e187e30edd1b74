use crate::time::GenTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of an item in the timeline arena.
pub type ItemId = Uuid;

// ---------------------------------------------------------------------------
// ItemInfo
// ---------------------------------------------------------------------------

/// Where an item sits: the snapshot used for lookups and for undo state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub start_pos: GenTime,
    pub end_pos: GenTime,
    pub crop_start: GenTime,
    pub track: usize,
}

impl ItemInfo {
    pub fn new(start_pos: GenTime, end_pos: GenTime, crop_start: GenTime, track: usize) -> Self {
        Self {
            start_pos,
            end_pos,
            crop_start,
            track,
        }
    }

    pub fn duration(&self) -> GenTime {
        self.end_pos - self.start_pos
    }

    /// Same item translated in time and track space.
    pub fn translated(&self, offset: GenTime, track: usize) -> Self {
        Self {
            start_pos: self.start_pos + offset,
            end_pos: self.end_pos + offset,
            crop_start: self.crop_start,
            track,
        }
    }

    pub fn contains(&self, time: GenTime) -> bool {
        self.start_pos <= time && time < self.end_pos
    }
}

/// Check if two spans on the same track overlap (half-open `[start, end)`).
pub fn spans_overlap(a_start: GenTime, a_end: GenTime, b_start: GenTime, b_end: GenTime) -> bool {
    a_start < b_end && b_start < a_end
}

// ---------------------------------------------------------------------------
// ItemCategory
// ---------------------------------------------------------------------------

/// Collision class: items only collide with items of the same category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Clip,
    Transition,
}

// ---------------------------------------------------------------------------
// ClipType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipType {
    Video,
    Audio,
    AV,
    Image,
    Text,
    Color,
    SlideShow,
    Playlist,
}

impl ClipType {
    /// Generated sources can be stretched without limit and have no
    /// meaningful crop offset.
    pub fn is_generated(&self) -> bool {
        matches!(self, ClipType::Image | ClipType::Text | ClipType::Color)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self, ClipType::Audio | ClipType::AV | ClipType::Playlist)
    }
}

// ---------------------------------------------------------------------------
// ClipState
// ---------------------------------------------------------------------------

/// Which streams of an AV source a clip plays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipState {
    #[default]
    Normal,
    AudioOnly,
    VideoOnly,
}

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub kind: TrackKind,
    pub name: String,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub locked: bool,
}

impl TrackInfo {
    pub fn video(name: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Video,
            name: name.into(),
            muted: false,
            hidden: false,
            locked: false,
        }
    }

    pub fn audio(name: impl Into<String>) -> Self {
        Self {
            kind: TrackKind::Audio,
            name: name.into(),
            muted: false,
            hidden: false,
            locked: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Guide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub time: GenTime,
    pub comment: String,
}

// ---------------------------------------------------------------------------
// OperationMode
// ---------------------------------------------------------------------------

/// What a pointer press on the timeline will do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationMode {
    #[default]
    None,
    Move,
    ResizeStart,
    ResizeEnd,
    FadeIn,
    FadeOut,
    TransitionStart,
    TransitionEnd,
    KeyFrame,
    Spacer,
    MoveGuide,
    Seek,
}

// ---------------------------------------------------------------------------
// Pointer hit-testing inputs
// ---------------------------------------------------------------------------

/// Pointer position relative to the item's top-left corner, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPos {
    pub x: f64,
    pub y: f64,
}

/// How the item is currently drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewMetrics {
    /// Pixels per frame.
    pub scale: f64,
    /// Item height in pixels.
    pub height: f64,
    /// Width of the edge and fade handles in pixels.
    pub handle_size: f64,
    pub selected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> GenTime {
        GenTime::from_seconds(s)
    }

    #[test]
    fn adjacent_spans_dont_overlap() {
        assert!(!spans_overlap(secs(0.0), secs(5.0), secs(5.0), secs(10.0)));
        assert!(!spans_overlap(secs(5.0), secs(10.0), secs(0.0), secs(5.0)));
    }

    #[test]
    fn overlapping_spans_detected() {
        assert!(spans_overlap(secs(0.0), secs(5.0), secs(4.96), secs(10.0)));
        assert!(spans_overlap(secs(2.0), secs(3.0), secs(0.0), secs(10.0)));
    }

    #[test]
    fn info_translation_keeps_crop() {
        let info = ItemInfo::new(secs(1.0), secs(4.0), secs(2.0), 0);
        let moved = info.translated(secs(2.0), 3);
        assert_eq!(moved.start_pos, secs(3.0));
        assert_eq!(moved.end_pos, secs(6.0));
        assert_eq!(moved.crop_start, secs(2.0));
        assert_eq!(moved.track, 3);
        assert_eq!(moved.duration(), info.duration());
    }

    #[test]
    fn info_contains_is_half_open() {
        let info = ItemInfo::new(secs(1.0), secs(4.0), GenTime::ZERO, 0);
        assert!(info.contains(secs(1.0)));
        assert!(info.contains(secs(3.99)));
        assert!(!info.contains(secs(4.0)));
    }

    #[test]
    fn generated_clip_types() {
        assert!(ClipType::Color.is_generated());
        assert!(!ClipType::AV.is_generated());
        assert!(ClipType::AV.has_audio());
        assert!(!ClipType::Image.has_audio());
    }
}
