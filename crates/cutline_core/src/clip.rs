use crate::effects::{EffectRecord, EffectsList, EffectsParameterList, ParamValue, FREEZE};
use crate::geometry::ItemGeometry;
use crate::keyframes::{KeyframeEditor, Keyframes};
use crate::time::GenTime;
use crate::types::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default width of the resize and fade handles, in pixels.
pub const HANDLE_SIZE: f64 = 8.0;
/// Height of the strip at the top of a clip where fade handles live.
pub const FADE_HANDLE_HEIGHT: f64 = 10.0;
/// Height of the strip at the bottom reserved for transition handles.
pub const TRANSITION_HANDLE_HEIGHT: f64 = 10.0;
/// Clips drawn shorter than this have no transition strip.
pub const MIN_HEIGHT_FOR_TRANSITIONS: f64 = 30.0;

// ---------------------------------------------------------------------------
// ClipSource
// ---------------------------------------------------------------------------

/// The media a clip plays. Opaque beyond its id, type and length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSource {
    pub id: String,
    pub name: String,
    pub clip_type: ClipType,
    /// Full length of the media; zero for generated sources.
    pub duration: GenTime,
}

impl ClipSource {
    pub fn new(id: impl Into<String>, clip_type: ClipType, duration: GenTime) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            clip_type,
            duration,
        }
    }
}

// ---------------------------------------------------------------------------
// ClipItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClipItem {
    id: ItemId,
    geometry: ItemGeometry,
    source: ClipSource,
    effects: EffectsList,
    effect_names: Vec<String>,
    fade_in: i64,
    fade_out: i64,
    speed: f64,
    strobe: u32,
    /// Crop window in frames as it would be at speed 1.0.
    unscaled_crop_start: i64,
    unscaled_crop_duration: i64,
    state: ClipState,
    selected_effect: Option<usize>,
    thumbnails_dirty: bool,
}

impl ClipItem {
    pub fn new(source: ClipSource, info: &ItemInfo, fps: f64) -> Self {
        let mut clip = Self {
            id: Uuid::new_v4(),
            geometry: ItemGeometry::new(info, fps),
            source,
            effects: EffectsList::new(),
            effect_names: Vec::new(),
            fade_in: 0,
            fade_out: 0,
            speed: 1.0,
            strobe: 1,
            unscaled_crop_start: 0,
            unscaled_crop_duration: 0,
            state: ClipState::Normal,
            selected_effect: None,
            thumbnails_dirty: false,
        };
        clip.update_unscaled_crop();
        clip.geometry.set_max_duration(clip.max_duration());
        clip
    }

    /// Rebuild a clip whose crop window is already expressed at `speed`.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ItemId,
        source: ClipSource,
        info: &ItemInfo,
        fps: f64,
        speed: f64,
        strobe: u32,
        state: ClipState,
        effects: EffectsList,
    ) -> Self {
        let mut clip = Self::new(source, info, fps);
        clip.id = id;
        clip.speed = clamp_speed(speed);
        clip.strobe = strobe.max(1);
        clip.state = state;
        clip.update_unscaled_crop();
        clip.geometry.set_max_duration(clip.max_duration());
        clip.set_effect_list(&effects);
        clip
    }

    /// Copy of this clip under a fresh id.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        copy.thumbnails_dirty = true;
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

    pub fn source(&self) -> &ClipSource {
        &self.source
    }

    pub fn clip_type(&self) -> ClipType {
        self.source.clip_type
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn strobe(&self) -> u32 {
        self.strobe
    }

    pub fn state(&self) -> ClipState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ClipState) {
        self.state = state;
    }

    pub fn fade_in(&self) -> i64 {
        self.fade_in
    }

    pub fn fade_out(&self) -> i64 {
        self.fade_out
    }

    pub fn effects(&self) -> &EffectsList {
        &self.effects
    }

    pub fn effect_at(&self, index: usize) -> Option<&EffectRecord> {
        self.effects.at(index)
    }

    pub fn effect_names(&self) -> &[String] {
        &self.effect_names
    }

    pub fn selected_effect(&self) -> Option<usize> {
        self.selected_effect
    }

    /// Whether a thumbnail refresh is pending, clearing the request.
    pub fn take_thumbnail_request(&mut self) -> bool {
        std::mem::take(&mut self.thumbnails_dirty)
    }

    /// Handle the renderer uses to find the producer for this clip.
    pub fn producer_handle(&self) -> String {
        let base = match self.state {
            ClipState::Normal => self.source.id.clone(),
            ClipState::AudioOnly => format!("{}_audio", self.source.id),
            ClipState::VideoOnly => format!("{}_video", self.source.id),
        };
        if self.speed != 1.0 || self.strobe > 1 {
            format!("slowmotion:{}:{}:{}", base, self.speed, self.strobe)
        } else {
            base
        }
    }

    fn frames(&self, time: GenTime) -> i64 {
        self.geometry.frames(time)
    }

    fn crop_frames(&self) -> (i64, i64) {
        (
            self.frames(self.geometry.crop_start()),
            self.frames(self.geometry.crop_duration()),
        )
    }

    // -----------------------------------------------------------------------
    // Geometry
    // -----------------------------------------------------------------------

    /// Source ceiling at the current speed; zero means unconstrained.
    pub fn max_duration(&self) -> GenTime {
        if self.source.clip_type.is_generated() || self.source.duration.is_zero() {
            return GenTime::ZERO;
        }
        let raw = self.frames(self.source.duration) as f64;
        let scaled = (raw / self.speed.abs()).round() as i64;
        if scaled <= 0 {
            GenTime::ZERO
        } else {
            self.geometry.time(scaled)
        }
    }

    pub fn resize_start(&mut self, new_start_frame: i64) -> bool {
        let limited = !self.source.clip_type.is_generated();
        let changed = self.geometry.resize_start(new_start_frame, 1.0, limited);
        if changed {
            self.update_unscaled_crop();
            self.thumbnails_dirty = true;
        }
        changed
    }

    pub fn resize_end(&mut self, new_end_frame: i64, obstacle_starts: &[GenTime]) -> bool {
        let changed = self.geometry.resize_end(new_end_frame, 1.0, obstacle_starts);
        if changed {
            self.update_unscaled_crop();
            self.thumbnails_dirty = true;
        }
        changed
    }

    /// Split at `time`, which must lie strictly inside the clip.
    ///
    /// This clip keeps the part before `time` and drops its fade-out; the
    /// returned clip, under a fresh id, plays the rest and drops the fade-in.
    /// Both halves re-fit their effects to the new crop windows.
    pub(crate) fn split_at(&mut self, time: GenTime) -> Option<ClipItem> {
        let info = self.info();
        if time <= info.start_pos || time >= info.end_pos {
            return None;
        }
        let offset = time - info.start_pos;
        let mut second = self.duplicate();
        second.geometry.set_start_pos(time);
        if !self.source.clip_type.is_generated() {
            second.geometry.set_crop_start(info.crop_start + offset);
        }
        second.geometry.set_crop_duration(info.end_pos - time);
        self.geometry.set_crop_duration(offset);

        self.remove_effects_where(EffectRecord::is_fade_out);
        second.remove_effects_where(EffectRecord::is_fade_in);
        for half in [&mut *self, &mut second] {
            half.update_unscaled_crop();
            half.adjust_effects_to_crop();
            half.thumbnails_dirty = true;
        }
        Some(second)
    }

    /// Grow this clip over `next`, which directly follows it on the same
    /// track. Effects are left for the caller to settle.
    pub(crate) fn absorb(&mut self, next: &ClipItem) {
        let end = next.info().end_pos;
        self.geometry.set_crop_duration(end - self.geometry.start_pos());
        self.update_unscaled_crop();
        self.thumbnails_dirty = true;
    }

    /// The stack this clip should carry once grown over `next`, which
    /// continues it from a cut.
    ///
    /// Effects both halves share are joined, keyframes before the cut coming
    /// from this clip and after it from `next`. A fade-in only this clip has
    /// and a fade-out only `next` has are kept; anything else `next` alone
    /// carries is dropped.
    pub(crate) fn merged_effects(&self, next: &ClipItem) -> EffectsList {
        let (start, duration) = self.crop_frames();
        let cut = start + duration;
        let first: Vec<&EffectRecord> = self.effects.iter().collect();
        let second: Vec<&EffectRecord> = next.effects.iter().collect();
        let first_fades_out = first.iter().any(|e| e.is_fade_out());
        let second_fades_in = second.iter().any(|e| e.is_fade_in());

        let mut merged = EffectsList::new();
        let (mut i, mut j) = (0, 0);
        loop {
            match (first.get(i), second.get(j)) {
                (Some(a), Some(b)) if a.tag == b.tag && a.id == b.id => {
                    merged.append(join_effect(a, b, cut));
                    i += 1;
                    j += 1;
                }
                (Some(a), _) if a.is_fade_in() && !second_fades_in => {
                    merged.append((*a).clone());
                    i += 1;
                }
                (_, Some(b)) if b.is_fade_out() && !first_fades_out => {
                    merged.append((*b).clone());
                    j += 1;
                }
                (Some(a), _) => {
                    merged.append((*a).clone());
                    i += 1;
                }
                (None, Some(_)) => j += 1,
                (None, None) => break,
            }
        }
        merged
    }

    /// Whether `next` plays on from where this clip stops in the same source.
    pub fn continues_into(&self, next: &ClipItem) -> bool {
        let this = self.info();
        let other = next.info();
        if self.source.id != next.source.id || this.track != other.track || this.end_pos != other.start_pos {
            return false;
        }
        self.source.clip_type.is_generated() || other.crop_start == this.crop_start + this.duration()
    }

    fn remove_effects_where(&mut self, pred: impl Fn(&EffectRecord) -> bool) {
        let doomed: Vec<usize> = self.effects.iter().filter(|e| pred(e)).map(|e| e.index).collect();
        for ix in doomed.into_iter().rev() {
            self.delete_effect(ix);
        }
    }

    fn update_unscaled_crop(&mut self) {
        let (start, duration) = self.crop_frames();
        let speed = self.speed.abs();
        self.unscaled_crop_start = (start as f64 * speed).round() as i64;
        self.unscaled_crop_duration = (duration as f64 * speed).round() as i64;
    }

    /// Change the playback rate, rescaling the crop window from its speed 1.0
    /// shadow. Speeds in `(-1, 0]` become `-1`.
    pub fn set_speed(&mut self, speed: f64, strobe: u32) {
        self.speed = clamp_speed(speed);
        self.strobe = strobe.max(1);
        let speed = self.speed.abs();
        let start = (self.unscaled_crop_start as f64 / speed).round() as i64;
        let duration = ((self.unscaled_crop_duration as f64 / speed).round() as i64).max(1);
        self.geometry.set_crop_start(self.geometry.time(start));
        self.geometry.set_crop_duration(self.geometry.time(duration));
        self.geometry.set_max_duration(self.max_duration());
        self.thumbnails_dirty = true;
    }

    /// Classify a pointer position over this clip.
    pub fn operation_mode(&self, pos: PointerPos, view: ViewMetrics, locked: bool) -> OperationMode {
        if locked || view.scale <= 0.0 {
            return OperationMode::None;
        }
        let tolerance = view.handle_size / view.scale;
        let x = pos.x / view.scale;
        let width = self.frames(self.geometry.crop_duration()) as f64;

        if view.selected && self.geometry.keyframes.has_key_frames() {
            let frame = x.round() as i64 + self.frames(self.geometry.crop_start());
            if self
                .geometry
                .keyframes
                .key_frame_near(frame, tolerance.ceil() as i64)
                .is_some()
            {
                return OperationMode::KeyFrame;
            }
        }

        let transition_strip = if view.height < MIN_HEIGHT_FOR_TRANSITIONS
            || self.source.clip_type == ClipType::Audio
            || self.state == ClipState::AudioOnly
        {
            0.0
        } else {
            TRANSITION_HANDLE_HEIGHT
        };
        let above_strip = view.height - pos.y > transition_strip;

        if (x - self.fade_in as f64).abs() < tolerance && pos.y < FADE_HANDLE_HEIGHT {
            return OperationMode::FadeIn;
        }
        if x <= width / 2.0 && x < tolerance && above_strip {
            return OperationMode::ResizeStart;
        }
        if (x - (width - self.fade_out as f64)).abs() < tolerance && pos.y < FADE_HANDLE_HEIGHT {
            return OperationMode::FadeOut;
        }
        if x >= width / 2.0 && width - x < tolerance && above_strip {
            return OperationMode::ResizeEnd;
        }
        if x < tolerance && !above_strip {
            return OperationMode::TransitionStart;
        }
        if width - x < tolerance && !above_strip {
            return OperationMode::TransitionEnd;
        }
        OperationMode::Move
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    /// Replace the whole stack and rebuild every derived cache.
    pub fn set_effect_list(&mut self, list: &EffectsList) {
        self.effects = list.clone();
        self.refresh_effect_state();
        self.set_selected_effect(if self.effects.is_empty() { None } else { Some(1) });
    }

    fn refresh_effect_state(&mut self) {
        self.effect_names = self.effects.effect_names();
        self.fade_in = self
            .effects
            .iter()
            .find(|e| e.is_fade_in())
            .and_then(EffectRecord::fade_length)
            .unwrap_or(0)
            .max(0);
        self.fade_out = self
            .effects
            .iter()
            .find(|e| e.is_fade_out())
            .and_then(EffectRecord::fade_length)
            .unwrap_or(0)
            .max(0);
    }

    fn stamp_in_out(&self, effect: &mut EffectRecord) {
        let (start, duration) = self.crop_frames();
        effect.in_point = Some(start);
        effect.out_point = Some(start + duration - 1);
    }

    /// Add an effect, inserting at its requested index when that is inside
    /// the stack. Returns the parameters to mirror to the renderer.
    pub fn add_effect(&mut self, record: EffectRecord) -> EffectsParameterList {
        let mut effect = record;
        if effect.index == 0 {
            effect.index = self.effects.len() + 1;
        }
        if effect.needs_in_out_sync() {
            self.stamp_in_out(&mut effect);
        }
        let ix = self.effects.insert(effect);
        self.refresh_effect_state();
        if self.selected_effect.is_none() {
            self.set_selected_effect(Some(ix));
        }
        self.effects
            .at(ix)
            .map(EffectsParameterList::from_effect)
            .unwrap_or_default()
    }

    /// Remove the effect at `index` and move the selection to a neighbour.
    pub fn delete_effect(&mut self, index: usize) -> Option<EffectRecord> {
        let removed = self.effects.remove_at(index)?;
        self.refresh_effect_state();
        let count = self.effects.len();
        let selected = match self.selected_effect {
            _ if count == 0 => None,
            Some(s) if s == index => Some(index.min(count)),
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        self.set_selected_effect(selected);
        Some(removed)
    }

    /// Replace the effect at the record's index. Returns renderer parameters.
    pub fn update_effect(&mut self, record: EffectRecord) -> Option<EffectsParameterList> {
        let mut effect = record;
        if effect.needs_in_out_sync() {
            self.stamp_in_out(&mut effect);
        }
        let ix = effect.index;
        self.effects.update_effect(effect)?;
        self.refresh_effect_state();
        if self.selected_effect == Some(ix) {
            self.set_selected_effect(Some(ix));
        }
        self.effects.at(ix).map(EffectsParameterList::from_effect)
    }

    pub fn move_effect(&mut self, from: usize, to: usize) -> bool {
        if !self.effects.move_effect(from, to) {
            return false;
        }
        self.refresh_effect_state();
        if self.selected_effect == Some(from) {
            self.set_selected_effect(Some(to));
        }
        true
    }

    pub fn enable_effects(&mut self, indexes: &[usize], disable: bool) {
        self.effects.enable_effects(indexes, disable);
        self.refresh_effect_state();
    }

    /// Select an effect and show its first keyframe parameter on the clip.
    pub fn set_selected_effect(&mut self, index: Option<usize>) {
        let previous = self.geometry.keyframes.edited_key_frame();
        let reselect = index.is_some() && index == self.selected_effect;
        self.selected_effect = index.filter(|ix| self.effects.at(*ix).is_some());
        let editor = self
            .selected_effect
            .and_then(|ix| self.effects.at(ix))
            .filter(|e| !e.disabled)
            .and_then(|e| {
                e.params.iter().find_map(|p| match &p.value {
                    ParamValue::Keyframes(keys) => Some(KeyframeEditor::with_range(
                        keys.clone(),
                        p.min.unwrap_or(0.0),
                        p.max.unwrap_or(100.0),
                    )),
                    _ => None,
                })
            });
        let mut editor = editor.unwrap_or_default();
        if let Some(pos) = previous.filter(|_| reselect) {
            editor.set_edited_key_frame(pos);
        }
        self.geometry.keyframes = editor;
    }

    /// Adapt a freshly cloned effect definition to this clip.
    ///
    /// Empty keyframe parameters get one keyframe at the crop start with the
    /// parameter default. Keyframes authored against a clip cropped at
    /// `offset` are re-anchored onto this clip's crop start. Fades are placed
    /// against the crop window, halved if longer than the clip.
    pub fn init_effect(&self, record: &EffectRecord, offset_diff: i64, offset: i64) -> EffectRecord {
        let mut effect = record.clone();
        let (crop_start, duration) = self.crop_frames();
        let crop_end = crop_start + duration;

        if effect.id == FREEZE && offset_diff > 0 {
            effect.set_scalar("frame", offset_diff as f64);
        }

        for param in effect.params.iter_mut() {
            if let ParamValue::Keyframes(keys) = &mut param.value {
                if keys.is_empty() {
                    keys.insert(crop_start, param.default.unwrap_or(0.0));
                } else if offset != crop_start {
                    keys.shift(crop_start - offset);
                    keys.clamp_to_range(crop_start, crop_end - 1);
                }
            }
        }

        if effect.is_fade_out() {
            let end = crop_end - 1;
            let mut length = effect.fade_length().unwrap_or(0).max(0);
            if length > duration {
                length = duration / 2;
            }
            effect.set_scalar("in", (end - length) as f64);
            effect.set_scalar("out", end as f64);
        } else if effect.is_fade_in() {
            let mut length = effect.fade_length().unwrap_or(0).max(0);
            if length > duration {
                length = duration / 2;
            }
            effect.set_scalar("in", crop_start as f64);
            effect.set_scalar("out", (crop_start + length) as f64);
        }

        if effect.needs_in_out_sync() {
            self.stamp_in_out(&mut effect);
        }
        effect
    }

    /// Bring every keyframe inside `[crop_start, crop_start + crop_duration]`.
    /// Returns true if any effect changed.
    pub fn check_keyframes(&mut self) -> bool {
        let (start, duration) = self.crop_frames();
        let mut modified = false;
        for effect in self.effects.iter_mut() {
            for param in effect.params.iter_mut() {
                if let ParamValue::Keyframes(keys) = &mut param.value {
                    modified |= keys.clamp_to_range(start, start + duration);
                }
            }
        }
        if modified && self.selected_effect.is_some() {
            self.set_selected_effect(self.selected_effect);
        }
        modified
    }

    /// Re-place fade effects against the crop window, keeping each fade's
    /// length up to the clip duration. Returns true if any effect changed.
    pub fn update_fades(&mut self) -> bool {
        let (start, duration) = self.crop_frames();
        let mut modified = false;
        for effect in self.effects.iter_mut() {
            let (new_in, new_out) = if effect.is_fade_in() {
                let length = effect.fade_length().unwrap_or(0).clamp(0, duration);
                (start, start + length)
            } else if effect.is_fade_out() {
                let length = effect.fade_length().unwrap_or(0).clamp(0, duration);
                let end = start + duration - 1;
                (end - length, end)
            } else {
                continue;
            };
            if effect.scalar("in") != Some(new_in as f64) || effect.scalar("out") != Some(new_out as f64) {
                effect.set_scalar("in", new_in as f64);
                effect.set_scalar("out", new_out as f64);
                modified = true;
            }
        }
        if modified {
            self.refresh_effect_state();
        }
        modified
    }

    /// Follow a crop window change in every effect: fades, synced in/out
    /// points and keyframes. Returns true if any effect changed.
    pub fn adjust_effects_to_crop(&mut self) -> bool {
        let mut modified = self.update_fades();
        let (start, duration) = self.crop_frames();
        for effect in self.effects.iter_mut() {
            if effect.needs_in_out_sync() {
                let new_in = Some(start);
                let new_out = Some(start + duration - 1);
                if effect.in_point != new_in || effect.out_point != new_out {
                    effect.in_point = new_in;
                    effect.out_point = new_out;
                    modified = true;
                }
            }
        }
        modified |= self.check_keyframes();
        modified
    }
}

fn join_effect(head: &EffectRecord, tail: &EffectRecord, cut: i64) -> EffectRecord {
    let mut joined = head.clone();
    for param in joined.params.iter_mut() {
        if let ParamValue::Keyframes(keys) = &mut param.value {
            if let Some(after) = tail.keyframes(&param.name) {
                *keys = Keyframes::join(keys, after, cut);
            }
        }
    }
    joined
}

fn clamp_speed(speed: f64) -> f64 {
    if speed <= 0.0 && speed > -1.0 {
        -1.0
    } else {
        speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{EffectParameter, FADE_FROM_BLACK, FADE_IN};

    const FPS: f64 = 25.0;

    fn secs(s: f64) -> GenTime {
        GenTime::from_seconds(s)
    }

    fn frames(f: i64) -> GenTime {
        GenTime::from_frames(f, FPS)
    }

    fn av_clip(start: f64, duration: f64, crop: f64) -> ClipItem {
        ClipItem::new(
            ClipSource::new("src", ClipType::AV, secs(60.0)),
            &ItemInfo::new(secs(start), secs(start + duration), secs(crop), 0),
            FPS,
        )
    }

    fn view() -> ViewMetrics {
        ViewMetrics {
            scale: 1.0,
            height: 50.0,
            handle_size: HANDLE_SIZE,
            selected: false,
        }
    }

    #[test]
    fn fade_in_cache_follows_effect() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.add_effect(EffectRecord::fade_in(0, 25));
        assert_eq!(clip.fade_in(), 25);
        clip.delete_effect(1);
        assert_eq!(clip.fade_in(), 0);
    }

    #[test]
    fn second_fade_source_keeps_cache() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.add_effect(EffectRecord::fade_in(0, 25));
        let mut black = EffectRecord::new("brightness", FADE_FROM_BLACK);
        black.set_scalar("in", 0.0);
        black.set_scalar("out", 10.0);
        clip.add_effect(black);
        clip.delete_effect(1);
        assert_eq!(clip.fade_in(), 10);
    }

    #[test]
    fn set_effect_list_rebuilds_caches() {
        let mut list = EffectsList::new();
        list.append(EffectRecord::fade_out(249, 50));
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.set_effect_list(&list);
        assert_eq!(clip.fade_out(), 50);
        assert_eq!(clip.selected_effect(), Some(1));
        assert_eq!(clip.effect_names(), &["fadeout".to_string()]);
    }

    #[test]
    fn add_effect_inserts_and_returns_params() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.add_effect(EffectRecord::new("a", "a"));
        clip.add_effect(EffectRecord::new("b", "b"));
        let params = clip.add_effect(EffectRecord::new("c", "c").with_index(1));
        assert_eq!(params.index(), Some(1));
        let ids: Vec<_> = clip.effects().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn add_effect_syncs_geometry_in_out() {
        let mut clip = av_clip(2.0, 4.0, 1.0);
        let effect = EffectRecord::new("affine", "pan_zoom")
            .with_param(EffectParameter::geometry("transition.geometry", "0=0,0:100%x100%"));
        let params = clip.add_effect(effect);
        assert_eq!(params.param_value("in"), Some("25"));
        assert_eq!(params.param_value("out"), Some("124"));
        assert_eq!(params.param_value("kdenlive:sync_in_out"), Some("1"));
    }

    #[test]
    fn delete_moves_selection_to_neighbour() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        for id in ["a", "b", "c"] {
            clip.add_effect(EffectRecord::new(id, id));
        }
        clip.set_selected_effect(Some(3));
        clip.delete_effect(3);
        assert_eq!(clip.selected_effect(), Some(2));
        clip.set_selected_effect(Some(2));
        clip.delete_effect(1);
        assert_eq!(clip.selected_effect(), Some(1));
        clip.delete_effect(1);
        assert_eq!(clip.selected_effect(), None);
    }

    #[test]
    fn speed_round_trip_restores_crop() {
        let mut clip = av_clip(0.0, 10.0, 2.0);
        let (start, duration) = (clip.geometry().crop_start(), clip.geometry().crop_duration());
        clip.set_speed(2.0, 1);
        assert_eq!(clip.geometry().crop_duration(), secs(5.0));
        assert_eq!(clip.geometry().crop_start(), secs(1.0));
        clip.set_speed(1.0, 1);
        assert!(clip.geometry().crop_start().same_frame(start, FPS));
        assert!(clip.geometry().crop_duration().same_frame(duration, FPS));
    }

    #[test]
    fn speed_in_forbidden_band_snaps_to_reverse() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        clip.set_speed(-0.5, 1);
        assert_eq!(clip.speed(), -1.0);
        clip.set_speed(0.0, 1);
        assert_eq!(clip.speed(), -1.0);
        assert_eq!(clip.geometry().crop_duration(), secs(4.0));
    }

    #[test]
    fn max_duration_scales_with_speed() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        assert_eq!(clip.max_duration(), secs(60.0));
        clip.set_speed(2.0, 1);
        assert_eq!(clip.max_duration(), secs(30.0));
        clip.set_speed(0.5, 1);
        assert_eq!(clip.max_duration(), secs(120.0));
    }

    #[test]
    fn generated_clips_are_unconstrained() {
        let clip = ClipItem::new(
            ClipSource::new("color", ClipType::Color, GenTime::ZERO),
            &ItemInfo::new(secs(0.0), secs(4.0), GenTime::ZERO, 0),
            FPS,
        );
        assert!(clip.max_duration().is_zero());
    }

    #[test]
    fn resize_start_stops_at_source_start() {
        let mut clip = av_clip(10.0, 5.0, 2.0);
        assert!(clip.resize_start(0));
        assert_eq!(clip.geometry().start_pos(), secs(8.0));
        assert_eq!(clip.geometry().crop_start(), GenTime::ZERO);
        assert!(clip.take_thumbnail_request());
        assert!(!clip.take_thumbnail_request());
    }

    #[test]
    fn generated_clip_resize_start_extends_freely() {
        let mut clip = ClipItem::new(
            ClipSource::new("title", ClipType::Text, GenTime::ZERO),
            &ItemInfo::new(secs(10.0), secs(15.0), GenTime::ZERO, 0),
            FPS,
        );
        assert!(clip.resize_start(secs(2.0).frames(FPS)));
        assert_eq!(clip.geometry().start_pos(), secs(2.0));
        assert_eq!(clip.geometry().end_pos(), secs(15.0));
    }

    #[test]
    fn resize_updates_unscaled_crop() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.set_speed(2.0, 1);
        clip.resize_end(secs(3.0).frames(FPS), &[]);
        clip.set_speed(1.0, 1);
        assert_eq!(clip.geometry().crop_duration(), secs(6.0));
    }

    #[test]
    fn keyframe_clamped_after_start_resize() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        clip.add_effect(
            EffectRecord::new("volume", "gain")
                .with_param(EffectParameter::keyframes("level", Keyframes::from_points([(10, 50.0)]))),
        );
        assert!(clip.resize_start(20));
        assert!(clip.check_keyframes());
        let keys = clip.effect_at(1).unwrap().keyframes("level").unwrap();
        assert_eq!(keys.iter().collect::<Vec<_>>(), vec![(20, 50.0)]);
        assert!(!clip.check_keyframes());
    }

    #[test]
    fn check_keyframes_interpolates_end() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        clip.add_effect(
            EffectRecord::new("volume", "gain").with_param(EffectParameter::keyframes(
                "level",
                Keyframes::from_points([(0, 0.0), (100, 100.0)]),
            )),
        );
        clip.resize_end(50, &[]);
        assert!(clip.check_keyframes());
        let keys = clip.effect_at(1).unwrap().keyframes("level").unwrap();
        assert_eq!(keys.last(), Some((50, 50.0)));
    }

    #[test]
    fn init_effect_seeds_default_keyframe() {
        let clip = av_clip(0.0, 4.0, 2.0);
        let template = EffectRecord::new("volume", "gain").with_param(
            EffectParameter::keyframes("level", Keyframes::new()).with_default(80.0),
        );
        let effect = clip.init_effect(&template, 0, 0);
        let keys = effect.keyframes("level").unwrap();
        assert_eq!(keys.iter().collect::<Vec<_>>(), vec![(50, 80.0)]);
    }

    #[test]
    fn init_effect_reanchors_keyframes() {
        let clip = av_clip(0.0, 4.0, 2.0);
        let template = EffectRecord::new("volume", "gain").with_param(EffectParameter::keyframes(
            "level",
            Keyframes::from_points([(0, 10.0), (20, 30.0)]),
        ));
        let effect = clip.init_effect(&template, 0, 0);
        let keys = effect.keyframes("level").unwrap();
        assert_eq!(keys.iter().collect::<Vec<_>>(), vec![(50, 10.0), (70, 30.0)]);
    }

    #[test]
    fn init_effect_places_fades() {
        let clip = av_clip(0.0, 2.0, 1.0);
        let fade = clip.init_effect(&EffectRecord::fade_out(0, 10), 0, 0);
        assert_eq!(fade.scalar("out"), Some(74.0));
        assert_eq!(fade.scalar("in"), Some(64.0));
        let long = clip.init_effect(&EffectRecord::fade_in(0, 80), 0, 0);
        assert_eq!(long.scalar("in"), Some(25.0));
        assert_eq!(long.fade_length(), Some(25));
    }

    #[test]
    fn init_effect_sets_freeze_frame() {
        let clip = av_clip(0.0, 2.0, 0.0);
        let effect = clip.init_effect(&EffectRecord::new("freeze", FREEZE), 12, 0);
        assert_eq!(effect.scalar("frame"), Some(12.0));
    }

    #[test]
    fn update_fades_follows_resize() {
        let mut clip = av_clip(0.0, 10.0, 0.0);
        clip.add_effect(EffectRecord::fade_out(249, 50));
        clip.resize_end(secs(6.0).frames(FPS), &[]);
        assert!(clip.update_fades());
        let fade = clip.effect_at(1).unwrap();
        assert_eq!(fade.scalar("out"), Some(149.0));
        assert_eq!(fade.scalar("in"), Some(99.0));
        assert_eq!(clip.fade_out(), 50);
        assert!(!clip.update_fades());
    }

    #[test]
    fn operation_mode_zones() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        let v = view();
        let at = |x: f64, y: f64| PointerPos { x, y };
        assert_eq!(clip.operation_mode(at(50.0, 20.0), v, false), OperationMode::Move);
        assert_eq!(clip.operation_mode(at(2.0, 20.0), v, false), OperationMode::ResizeStart);
        assert_eq!(clip.operation_mode(at(98.0, 20.0), v, false), OperationMode::ResizeEnd);
        assert_eq!(clip.operation_mode(at(2.0, 45.0), v, false), OperationMode::TransitionStart);
        assert_eq!(clip.operation_mode(at(98.0, 45.0), v, false), OperationMode::TransitionEnd);
        assert_eq!(clip.operation_mode(at(2.0, 5.0), v, false), OperationMode::FadeIn);
        assert_eq!(clip.operation_mode(at(50.0, 20.0), v, true), OperationMode::None);

        clip.add_effect(EffectRecord::fade_in(0, 25));
        assert_eq!(clip.operation_mode(at(26.0, 5.0), v, false), OperationMode::FadeIn);
    }

    #[test]
    fn short_clips_have_no_transition_strip() {
        let clip = av_clip(0.0, 4.0, 0.0);
        let v = ViewMetrics {
            height: 20.0,
            ..view()
        };
        let pos = PointerPos { x: 2.0, y: 18.0 };
        assert_eq!(clip.operation_mode(pos, v, false), OperationMode::ResizeStart);
    }

    #[test]
    fn keyframe_hit_wins_when_selected() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        clip.add_effect(EffectRecord::new("volume", "gain").with_param(
            EffectParameter::keyframes("level", Keyframes::from_points([(0, 0.0), (3, 1.0)])),
        ));
        let v = ViewMetrics {
            selected: true,
            ..view()
        };
        let pos = PointerPos { x: 3.0, y: 20.0 };
        assert_eq!(clip.operation_mode(pos, v, false), OperationMode::KeyFrame);
    }

    #[test]
    fn producer_handle_encodes_state_and_speed() {
        let mut clip = av_clip(0.0, 4.0, 0.0);
        assert_eq!(clip.producer_handle(), "src");
        clip.set_state(ClipState::AudioOnly);
        assert_eq!(clip.producer_handle(), "src_audio");
        clip.set_speed(2.0, 1);
        assert_eq!(clip.producer_handle(), "slowmotion:src_audio:2:1");
    }

    #[test]
    fn fade_in_id_constant() {
        assert!(EffectRecord::new("volume", FADE_IN).is_fade_in());
    }
}
