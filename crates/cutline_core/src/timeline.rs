use crate::clip::ClipItem;
use crate::geometry::{ItemGeometry, MINIMUM_DURATION_FRAMES};
use crate::time::GenTime;
use crate::transition::Transition;
use crate::types::*;

// ---------------------------------------------------------------------------
// TimelineItem
// ---------------------------------------------------------------------------

/// Anything placed on a track.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem {
    Clip(ClipItem),
    Transition(Transition),
}

impl TimelineItem {
    pub fn id(&self) -> ItemId {
        match self {
            TimelineItem::Clip(c) => c.id(),
            TimelineItem::Transition(t) => t.id(),
        }
    }

    pub fn geometry(&self) -> &ItemGeometry {
        match self {
            TimelineItem::Clip(c) => c.geometry(),
            TimelineItem::Transition(t) => t.geometry(),
        }
    }

    pub(crate) fn geometry_mut(&mut self) -> &mut ItemGeometry {
        match self {
            TimelineItem::Clip(c) => c.geometry_mut(),
            TimelineItem::Transition(t) => t.geometry_mut(),
        }
    }

    pub fn info(&self) -> ItemInfo {
        self.geometry().info()
    }

    pub fn category(&self) -> ItemCategory {
        match self {
            TimelineItem::Clip(_) => ItemCategory::Clip,
            TimelineItem::Transition(_) => ItemCategory::Transition,
        }
    }

    pub fn as_clip(&self) -> Option<&ClipItem> {
        match self {
            TimelineItem::Clip(c) => Some(c),
            TimelineItem::Transition(_) => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            TimelineItem::Transition(t) => Some(t),
            TimelineItem::Clip(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// The item arena plus track layout. Track 0 is the bottom track.
///
/// Items are addressed by id internally and by (track, time) from the edit
/// API. Nothing here checks collisions on insertion; that is the editor's
/// job.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    fps: f64,
    pub tracks: Vec<TrackInfo>,
    items: Vec<TimelineItem>,
    pub guides: Vec<Guide>,
    /// Applied to every item's geometry on insertion.
    min_duration_frames: i64,
}

impl Timeline {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            tracks: Vec::new(),
            items: Vec::new(),
            guides: Vec::new(),
            min_duration_frames: MINIMUM_DURATION_FRAMES,
        }
    }

    pub fn with_tracks(fps: f64, tracks: Vec<TrackInfo>) -> Self {
        Self {
            tracks,
            ..Self::new(fps)
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn min_duration_frames(&self) -> i64 {
        self.min_duration_frames
    }

    /// Change the resize floor for the items already placed and for every
    /// item inserted later.
    pub fn set_min_duration_frames(&mut self, frames: i64) {
        self.min_duration_frames = frames.max(1);
        for item in &mut self.items {
            item.geometry_mut().set_min_duration_frames(self.min_duration_frames);
        }
    }

    pub fn track(&self, index: usize) -> Option<&TrackInfo> {
        self.tracks.get(index)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_track_locked(&self, index: usize) -> bool {
        self.tracks.get(index).is_some_and(|t| t.locked)
    }

    pub fn items(&self) -> impl Iterator<Item = &TimelineItem> {
        self.items.iter()
    }

    pub fn clips(&self) -> impl Iterator<Item = &ClipItem> {
        self.items.iter().filter_map(TimelineItem::as_clip)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.items.iter().filter_map(TimelineItem::as_transition)
    }

    pub fn item(&self, id: ItemId) -> Option<&TimelineItem> {
        self.items.iter().find(|i| i.id() == id)
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut TimelineItem> {
        self.items.iter_mut().find(|i| i.id() == id)
    }

    pub fn clip(&self, id: ItemId) -> Option<&ClipItem> {
        self.item(id).and_then(TimelineItem::as_clip)
    }

    pub(crate) fn clip_mut(&mut self, id: ItemId) -> Option<&mut ClipItem> {
        match self.item_mut(id)? {
            TimelineItem::Clip(c) => Some(c),
            TimelineItem::Transition(_) => None,
        }
    }

    pub fn transition(&self, id: ItemId) -> Option<&Transition> {
        self.item(id).and_then(TimelineItem::as_transition)
    }

    pub(crate) fn transition_mut(&mut self, id: ItemId) -> Option<&mut Transition> {
        match self.item_mut(id)? {
            TimelineItem::Transition(t) => Some(t),
            TimelineItem::Clip(_) => None,
        }
    }

    /// Clip on `track` whose span covers `time`.
    pub fn clip_at(&self, track: usize, time: GenTime) -> Option<&ClipItem> {
        self.clips().find(|c| {
            let info = c.info();
            info.track == track && info.contains(time)
        })
    }

    /// Clip on `track` starting exactly at `time`.
    pub fn clip_starting_at(&self, track: usize, time: GenTime) -> Option<&ClipItem> {
        self.clips()
            .find(|c| c.info().track == track && c.info().start_pos == time)
    }

    /// Transition on `track` whose window covers `time`.
    pub fn transition_at(&self, track: usize, time: GenTime) -> Option<&Transition> {
        self.transitions().find(|t| {
            let info = t.info();
            info.track == track && info.contains(time)
        })
    }

    /// Item of `category` on `track` covering `time`.
    pub fn item_at(&self, category: ItemCategory, track: usize, time: GenTime) -> Option<&TimelineItem> {
        self.items.iter().find(|i| {
            let info = i.info();
            i.category() == category && info.track == track && info.contains(time)
        })
    }

    /// Item of `category` on `track` starting exactly at `time`.
    pub fn item_starting_at(&self, category: ItemCategory, track: usize, time: GenTime) -> Option<ItemId> {
        self.items
            .iter()
            .find(|i| {
                let info = i.info();
                i.category() == category && info.track == track && info.start_pos == time
            })
            .map(TimelineItem::id)
    }

    /// Whether `[start, end)` on `track` overlaps an item of the same
    /// category that is not in `exclude`.
    pub fn collides(
        &self,
        category: ItemCategory,
        track: usize,
        start: GenTime,
        end: GenTime,
        exclude: &[ItemId],
    ) -> bool {
        self.items.iter().any(|i| {
            let info = i.info();
            i.category() == category
                && info.track == track
                && !exclude.contains(&i.id())
                && spans_overlap(start, end, info.start_pos, info.end_pos)
        })
    }

    /// Start positions of the other same-category items on `track`, used to
    /// stop an end resize at the next neighbour.
    pub fn obstacle_starts(&self, category: ItemCategory, track: usize, exclude: ItemId) -> Vec<GenTime> {
        self.items
            .iter()
            .filter(|i| i.category() == category && i.info().track == track && i.id() != exclude)
            .map(|i| i.info().start_pos)
            .collect()
    }

    /// End of the latest same-category item on `track` ending at or before
    /// `time`, or zero.
    pub fn previous_end(&self, category: ItemCategory, track: usize, time: GenTime, exclude: &[ItemId]) -> GenTime {
        self.items
            .iter()
            .filter(|i| i.category() == category && i.info().track == track && !exclude.contains(&i.id()))
            .map(|i| i.info().end_pos)
            .filter(|end| *end <= time)
            .fold(GenTime::ZERO, GenTime::max)
    }

    /// Nearest video track below `track`, or 0 when there is none.
    pub fn previous_video_track(&self, track: usize) -> usize {
        (0..track.min(self.tracks.len()))
            .rev()
            .find(|ix| self.tracks[*ix].kind == TrackKind::Video)
            .unwrap_or(0)
    }

    /// Transitions referencing `clip` as reference or second clip.
    pub fn dependent_transitions(&self, clip: ItemId) -> Vec<ItemId> {
        self.transitions()
            .filter(|t| t.depends_on(clip))
            .map(Transition::id)
            .collect()
    }

    /// Items starting at or after `time`, on `track` or on every track.
    pub fn items_starting_from(&self, time: GenTime, track: Option<usize>) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|i| {
                let info = i.info();
                info.start_pos >= time && track.map_or(true, |t| t == info.track)
            })
            .map(TimelineItem::id)
            .collect()
    }

    /// End of the last item.
    pub fn duration(&self) -> GenTime {
        self.items
            .iter()
            .map(|i| i.info().end_pos)
            .fold(GenTime::ZERO, GenTime::max)
    }

    pub(crate) fn insert_item(&mut self, mut item: TimelineItem) {
        item.geometry_mut().set_min_duration_frames(self.min_duration_frames);
        self.items.push(item);
    }

    pub(crate) fn remove_item(&mut self, id: ItemId) -> Option<TimelineItem> {
        let pos = self.items.iter().position(|i| i.id() == id)?;
        Some(self.items.remove(pos))
    }

    /// Move every item on a track at or above `from` by one track, up when
    /// a track was inserted, down when one was removed. Transition end
    /// tracks follow the same rule.
    pub(crate) fn shift_tracks(&mut self, from: usize, inserted: bool) {
        let shift = |track: usize| if inserted { track + 1 } else { track.saturating_sub(1) };
        for item in self.items.iter_mut() {
            let track = item.info().track;
            if track >= from {
                item.geometry_mut().set_track(shift(track));
            }
            if let TimelineItem::Transition(t) = item {
                let end = t.transition_end_track();
                if end >= from {
                    t.set_forced_track(t.is_forced_track(), shift(end));
                }
            }
        }
    }

    /// Re-derive the end track of every transition that is not pinned.
    pub(crate) fn refresh_transition_end_tracks(&mut self) {
        let targets: Vec<(ItemId, usize)> = self
            .transitions()
            .map(|t| (t.id(), self.previous_video_track(t.info().track)))
            .collect();
        for (id, track) in targets {
            if let Some(t) = self.transition_mut(id) {
                t.update_transition_end_track(track);
            }
        }
    }
}
