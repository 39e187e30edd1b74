use crate::keyframes::KeyframeEditor;
use crate::time::GenTime;
use crate::types::ItemInfo;

/// Shortest duration an end-resize can collapse an item to, in frames.
pub const MINIMUM_DURATION_FRAMES: i64 = 3;

// ---------------------------------------------------------------------------
// ItemGeometry
// ---------------------------------------------------------------------------

/// Placement shared by clips and transitions.
///
/// The end position is always derived from `start_pos + crop_duration`.
/// Resizes never fail: they clamp to the nearest valid shape and report
/// whether anything changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemGeometry {
    start_pos: GenTime,
    crop_start: GenTime,
    crop_duration: GenTime,
    track: usize,
    /// Source length ceiling; zero means unconstrained.
    max_duration: GenTime,
    /// Floor an end-resize collapses to, in frames.
    min_duration_frames: i64,
    fps: f64,
    pub keyframes: KeyframeEditor,
}

impl ItemGeometry {
    pub fn new(info: &ItemInfo, fps: f64) -> Self {
        Self {
            start_pos: info.start_pos,
            crop_start: info.crop_start,
            crop_duration: info.duration(),
            track: info.track,
            max_duration: GenTime::ZERO,
            min_duration_frames: MINIMUM_DURATION_FRAMES,
            fps,
            keyframes: KeyframeEditor::default(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn start_pos(&self) -> GenTime {
        self.start_pos
    }

    pub fn end_pos(&self) -> GenTime {
        self.start_pos + self.crop_duration
    }

    pub fn crop_start(&self) -> GenTime {
        self.crop_start
    }

    pub fn crop_duration(&self) -> GenTime {
        self.crop_duration
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn max_duration(&self) -> GenTime {
        self.max_duration
    }

    pub fn min_duration_frames(&self) -> i64 {
        self.min_duration_frames
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo::new(self.start_pos, self.end_pos(), self.crop_start, self.track)
    }

    pub fn frames(&self, time: GenTime) -> i64 {
        time.frames(self.fps)
    }

    pub fn time(&self, frames: i64) -> GenTime {
        GenTime::from_frames(frames, self.fps)
    }

    pub(crate) fn set_max_duration(&mut self, max: GenTime) {
        self.max_duration = max;
    }

    pub(crate) fn set_min_duration_frames(&mut self, frames: i64) {
        self.min_duration_frames = frames.max(1);
    }

    pub(crate) fn set_start_pos(&mut self, start: GenTime) {
        self.start_pos = start;
    }

    pub(crate) fn set_track(&mut self, track: usize) {
        self.track = track;
    }

    pub(crate) fn set_crop_start(&mut self, crop_start: GenTime) {
        self.crop_start = crop_start;
    }

    pub(crate) fn set_crop_duration(&mut self, duration: GenTime) {
        self.crop_duration = duration;
    }

    /// Restore a full placement.
    pub(crate) fn set_info(&mut self, info: &ItemInfo) {
        self.start_pos = info.start_pos;
        self.crop_start = info.crop_start;
        self.crop_duration = info.duration();
        self.track = info.track;
    }

    /// Move the start edge to `new_start_frame`, keeping the end in place.
    ///
    /// With `has_size_limit` the crop offset cannot go below zero, so the
    /// start cannot be pulled earlier than the beginning of the source. A
    /// resize that would leave no duration is rejected.
    pub fn resize_start(&mut self, new_start_frame: i64, speed_factor: f64, has_size_limit: bool) -> bool {
        let mut diff = new_start_frame - self.frames(self.start_pos);
        if diff == 0 {
            return false;
        }
        if has_size_limit && speed_factor > 0.0 {
            let crop = self.frames(self.crop_start) as f64;
            if crop + diff as f64 * speed_factor < 0.0 {
                diff = (-crop / speed_factor).ceil() as i64;
                if diff == 0 {
                    return false;
                }
            }
        }
        let duration = self.frames(self.crop_duration) as f64;
        if diff as f64 * speed_factor >= duration {
            return false;
        }
        let delta = self.time(diff);
        self.start_pos += delta;
        if has_size_limit {
            self.crop_start += delta * speed_factor;
        }
        self.crop_duration -= delta * speed_factor;
        true
    }

    /// Move the end edge to `new_end_frame`, keeping the start in place.
    ///
    /// Shrinking never goes below the minimum duration; growing stops at
    /// the source ceiling and at the first of `obstacle_starts` that begins
    /// after this item. Obstacles are the starts of same-category items on
    /// the same track.
    pub fn resize_end(&mut self, new_end_frame: i64, speed_factor: f64, obstacle_starts: &[GenTime]) -> bool {
        let old_duration = self.crop_duration;
        let diff = new_end_frame - self.frames(self.end_pos());
        if diff == 0 {
            return false;
        }
        let mut delta = self.time(diff) * speed_factor;
        let duration_frames = self.frames(self.crop_duration) as f64;
        if duration_frames + diff as f64 * speed_factor <= 0.0 {
            delta = self.time(self.min_duration_frames) - self.crop_duration;
        } else if diff > 0 && !self.max_duration.is_zero() {
            let headroom = self.max_duration - self.crop_start - self.crop_duration;
            if delta > headroom {
                delta = headroom.max(GenTime::ZERO);
            }
        }
        self.crop_duration += delta;

        if diff > 0 {
            let end = self.end_pos();
            let blocker = obstacle_starts
                .iter()
                .copied()
                .filter(|s| *s > self.start_pos && *s < end)
                .fold(None, |acc: Option<GenTime>, s| Some(acc.map_or(s, |a| a.min(s))));
            if let Some(limit) = blocker {
                self.crop_duration = limit - self.start_pos;
            }
        }
        self.crop_duration != old_duration
    }
}
