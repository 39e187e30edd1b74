use crate::clip::ClipItem;
use crate::document::TransitionRecord;
use crate::geometry::ItemGeometry;
use crate::time::GenTime;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Longest transition, in seconds.
pub const MAX_TRANSITION_SECONDS: f64 = 600.0;

/// The user-editable part of a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionProperties {
    pub params: BTreeMap<String, String>,
    /// `Some(track)` pins the end track; `None` lets it follow the layout.
    pub forced_track: Option<usize>,
    pub inverted: bool,
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// A compositing operation between the item's track and its end track.
///
/// A transition is either free, anchored to one reference clip (its window
/// stays inside that clip), or spans a reference clip and a second clip, in
/// which case its window is derived from both clips.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    id: ItemId,
    geometry: ItemGeometry,
    tag: String,
    name: String,
    params: BTreeMap<String, String>,
    automatic: bool,
    forced_track: bool,
    transition_track: usize,
    inverted: bool,
    reference_clip: Option<ItemId>,
    second_clip: Option<ItemId>,
}

impl Transition {
    /// A free transition over `info`.
    pub fn new(tag: impl Into<String>, info: &ItemInfo, transition_track: usize, fps: f64) -> Self {
        let tag = tag.into();
        let mut geometry = ItemGeometry::new(
            &ItemInfo::new(info.start_pos, info.end_pos, GenTime::ZERO, info.track),
            fps,
        );
        geometry.set_max_duration(GenTime::from_seconds(MAX_TRANSITION_SECONDS));
        Self {
            id: Uuid::new_v4(),
            geometry,
            name: tag.clone(),
            tag,
            params: BTreeMap::new(),
            automatic: false,
            forced_track: false,
            transition_track,
            inverted: false,
            reference_clip: None,
            second_clip: None,
        }
    }

    /// A transition anchored to `reference`, over `[start, end)` clamped to
    /// the clip.
    pub fn anchored(
        tag: impl Into<String>,
        reference: &ClipItem,
        start: GenTime,
        end: GenTime,
        transition_track: usize,
        automatic: bool,
    ) -> Self {
        let clip = reference.info();
        let start = start.max(clip.start_pos).min(clip.end_pos);
        let end = end.min(clip.end_pos).max(start);
        let info = ItemInfo::new(start, end, GenTime::ZERO, clip.track);
        let mut transition = Self::new(tag, &info, transition_track, reference.geometry().fps());
        transition.reference_clip = Some(reference.id());
        transition.automatic = automatic;
        transition
    }

    /// A transition spanning the overlap of two clips.
    pub fn between(
        tag: impl Into<String>,
        reference: &ClipItem,
        second: &ClipItem,
        transition_track: usize,
    ) -> Self {
        let (start, end) = Self::derived_window(&reference.info(), &second.info());
        let info = ItemInfo::new(start, end.max(start), GenTime::ZERO, reference.info().track);
        let mut transition = Self::new(tag, &info, transition_track, reference.geometry().fps());
        transition.reference_clip = Some(reference.id());
        transition.second_clip = Some(second.id());
        transition
    }

    /// Rebuild from a persisted record; `in`/`out` are absolute inclusive
    /// frames.
    pub fn from_record(record: &TransitionRecord, fps: f64) -> Self {
        let info = ItemInfo::new(
            GenTime::from_frames(record.in_frame, fps),
            GenTime::from_frames(record.out_frame + 1, fps),
            GenTime::ZERO,
            record.a_track,
        );
        let mut transition = Self::new(record.mlt_service.as_str(), &info, record.b_track, fps);
        if !record.name.is_empty() {
            transition.name = record.name.clone();
        }
        transition.params = record.params.clone();
        if let Some(geometry) = &record.geometry {
            transition.params.insert("geometry".to_string(), geometry.clone());
        }
        transition.automatic = record.automatic;
        transition.forced_track = record.force_track;
        transition.inverted = record.inverted;
        transition
    }

    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn to_record(&self) -> TransitionRecord {
        let mut params = self.params.clone();
        let geometry = params.remove("geometry");
        let fps = self.geometry.fps();
        TransitionRecord {
            mlt_service: self.tag.clone(),
            name: self.name.clone(),
            a_track: self.geometry.track(),
            b_track: self.transition_track,
            in_frame: self.geometry.start_pos().frames(fps),
            out_frame: self.geometry.end_pos().frames(fps) - 1,
            geometry,
            automatic: self.automatic,
            force_track: self.forced_track,
            inverted: self.inverted,
            params,
        }
    }

    /// Same transition under a fresh id, detached from any clip.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.reference_clip = None;
        copy.second_clip = None;
        copy
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn geometry(&self) -> &ItemGeometry {
        &self.geometry
    }

    pub(crate) fn geometry_mut(&mut self) -> &mut ItemGeometry {
        &mut self.geometry
    }

    pub fn info(&self) -> ItemInfo {
        self.geometry.info()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn is_automatic(&self) -> bool {
        self.automatic
    }

    pub fn is_forced_track(&self) -> bool {
        self.forced_track
    }

    pub fn transition_end_track(&self) -> usize {
        self.transition_track
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn reference_clip(&self) -> Option<ItemId> {
        self.reference_clip
    }

    pub fn second_clip(&self) -> Option<ItemId> {
        self.second_clip
    }

    pub(crate) fn set_reference_clip(&mut self, clip: Option<ItemId>) {
        self.reference_clip = clip;
    }

    pub(crate) fn set_second_clip(&mut self, clip: Option<ItemId>) {
        self.second_clip = clip;
    }

    /// Anchored to a single clip rather than spanning two.
    pub fn is_anchored(&self) -> bool {
        self.reference_clip.is_some() && self.second_clip.is_none()
    }

    pub fn depends_on(&self, clip: ItemId) -> bool {
        self.reference_clip == Some(clip) || self.second_clip == Some(clip)
    }

    pub fn set_forced_track(&mut self, force: bool, track: usize) {
        self.forced_track = force;
        self.transition_track = track;
    }

    /// Follow a layout change unless the end track is pinned.
    pub fn update_transition_end_track(&mut self, track: usize) {
        if !self.forced_track {
            self.transition_track = track;
        }
    }

    pub fn properties(&self) -> TransitionProperties {
        TransitionProperties {
            params: self.params.clone(),
            forced_track: self.forced_track.then_some(self.transition_track),
            inverted: self.inverted,
        }
    }

    /// Apply edited properties. An unpinned end track keeps its current
    /// value until the next layout refresh.
    pub(crate) fn apply_properties(&mut self, properties: &TransitionProperties) {
        self.params = properties.params.clone();
        self.inverted = properties.inverted;
        match properties.forced_track {
            Some(track) => self.set_forced_track(true, track),
            None => self.forced_track = false,
        }
    }

    pub fn transition_start_time(&self) -> GenTime {
        self.geometry.start_pos()
    }

    pub fn transition_end_time(&self) -> GenTime {
        self.geometry.end_pos()
    }

    pub fn transition_duration(&self) -> GenTime {
        self.geometry.crop_duration()
    }

    /// A transition whose window has collapsed must be removed.
    pub fn is_valid(&self) -> bool {
        let duration = self.transition_duration();
        !duration.is_zero() && duration > GenTime::ZERO
    }

    /// Window shared by two clips: the later start (capped at the reference
    /// end) to the earlier end (floored at the reference start).
    pub fn derived_window(reference: &ItemInfo, second: &ItemInfo) -> (GenTime, GenTime) {
        let start = reference.start_pos.max(second.start_pos).min(reference.end_pos);
        let end = reference.end_pos.min(second.end_pos).max(reference.start_pos);
        (start, end)
    }

    /// Recompute the window from both clips. Returns true if it changed.
    pub(crate) fn refresh_window(&mut self, reference: &ItemInfo, second: &ItemInfo) -> bool {
        let (start, end) = Self::derived_window(reference, second);
        let duration = end - start;
        let duration = if duration > GenTime::ZERO { duration } else { GenTime::ZERO };
        let changed = self.geometry.start_pos() != start
            || self.geometry.crop_duration() != duration
            || self.geometry.track() != reference.track;
        self.geometry.set_start_pos(start);
        self.geometry.set_crop_duration(duration);
        self.geometry.set_track(reference.track);
        changed
    }

    fn frames(&self, time: GenTime) -> i64 {
        self.geometry.frames(time)
    }

    /// Resize the start edge, staying inside `anchor` and keeping the
    /// minimum duration.
    pub fn resize_transition_start(&mut self, new_start_frame: i64, anchor: &ItemInfo) -> bool {
        let lowest = self.frames(anchor.start_pos);
        let highest = self.frames(self.geometry.end_pos()) - self.geometry.min_duration_frames();
        let target = new_start_frame.min(highest).max(lowest);
        self.geometry.resize_start(target, 1.0, false)
    }

    /// Resize the end edge, staying inside `anchor` and keeping the minimum
    /// duration.
    pub fn resize_transition_end(&mut self, new_end_frame: i64, anchor: &ItemInfo) -> bool {
        let lowest = self.frames(self.geometry.start_pos()) + self.geometry.min_duration_frames();
        let highest = self.frames(anchor.end_pos);
        let target = new_end_frame.max(lowest).min(highest);
        self.geometry.resize_end(target, 1.0, &[])
    }

    /// Move the window, keeping it inside `anchor`. A window longer than the
    /// anchor is shrunk to fit.
    pub fn move_transition(&mut self, new_start_frame: i64, anchor: &ItemInfo) -> bool {
        let old = self.info();
        let anchor_start = self.frames(anchor.start_pos);
        let anchor_end = self.frames(anchor.end_pos);
        let mut duration = self.frames(self.geometry.crop_duration());
        if duration > anchor_end - anchor_start {
            duration = (anchor_end - anchor_start).max(0);
            let time = self.geometry.time(duration);
            self.geometry.set_crop_duration(time);
        }
        let start = new_start_frame.max(anchor_start).min(anchor_end - duration);
        let start = self.geometry.time(start);
        self.geometry.set_start_pos(start);
        self.geometry.set_track(anchor.track);
        self.info() != old
    }

    /// Classify a pointer position over this transition.
    pub fn operation_mode(&self, pos: PointerPos, view: ViewMetrics, locked: bool) -> OperationMode {
        if locked || view.scale <= 0.0 {
            return OperationMode::None;
        }
        let tolerance = view.handle_size / view.scale;
        let x = pos.x / view.scale;
        let width = self.frames(self.geometry.crop_duration()) as f64;
        if x.abs() < tolerance {
            OperationMode::ResizeStart
        } else if (x - width).abs() < tolerance {
            OperationMode::ResizeEnd
        } else {
            OperationMode::Move
        }
    }
}
