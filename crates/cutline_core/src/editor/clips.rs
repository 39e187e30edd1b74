use super::{clip_params, TimelineEditor};
use crate::clip::{ClipItem, ClipSource};
use crate::effects::{EffectRecord, EffectsList};
use crate::error::{CoreError, Result};
use crate::history::{
    AddTimelineClipCommand, AddTransitionCommand, ChangeClipStateCommand, ChangeSpeedCommand, EditEffectCommand,
    MergeClipCommand, MoveClipCommand, RazorClipCommand, ResizeClipCommand,
};
use crate::time::GenTime;
use crate::timeline::TimelineItem;
use crate::transition::Transition;
use crate::types::*;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Clipboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardEntry {
    Clip(ClipItem),
    Transition(Transition),
}

impl ClipboardEntry {
    fn category(&self) -> ItemCategory {
        match self {
            ClipboardEntry::Clip(_) => ItemCategory::Clip,
            ClipboardEntry::Transition(_) => ItemCategory::Transition,
        }
    }

    fn info(&self) -> ItemInfo {
        match self {
            ClipboardEntry::Clip(c) => c.info(),
            ClipboardEntry::Transition(t) => t.info(),
        }
    }
}

/// Copied items, positioned relative to the earliest start and lowest track
/// among them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clipboard {
    entries: Vec<ClipboardEntry>,
    origin: GenTime,
    base_track: usize,
}

impl Clipboard {
    pub fn entries(&self) -> &[ClipboardEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TimelineEditor {
    // -----------------------------------------------------------------------
    // Clip edits
    // -----------------------------------------------------------------------

    /// Place a new clip from `source` at `info`. Each of `effects` is fitted
    /// to the clip and attached in order.
    pub fn add_clip(&mut self, source: ClipSource, info: ItemInfo, effects: &[EffectRecord]) -> Result<ItemId> {
        self.edit("Add clip", |editor| {
            editor.check_track(info.track)?;
            if info.start_pos < GenTime::ZERO || info.duration() <= GenTime::ZERO {
                return Err(CoreError::InvalidOperation(format!(
                    "Cannot place clip at {} with duration {}",
                    info.start_pos,
                    info.duration()
                )));
            }
            let mut clip = ClipItem::new(source, &info, editor.fps());
            let offset = clip.geometry().frames(clip.geometry().crop_start());
            for effect in effects {
                let mut effect = clip.init_effect(effect, 0, offset);
                effect.index = 0;
                clip.add_effect(effect);
            }
            let id = editor.restore_clip(clip.clone())?;
            editor.record(Box::new(AddTimelineClipCommand::new(clip, true)));
            Ok(id)
        })
    }

    /// Delete the clip covering `time`, with every transition depending on
    /// it.
    pub fn delete_clip(&mut self, track: usize, time: GenTime) -> Result<()> {
        self.edit("Delete clip", |editor| {
            editor.check_track(track)?;
            let id = editor.clip_id_at(track, time)?;
            editor.delete_clip_recorded(id)
        })
    }

    /// Move the clip covering `time` so it starts at `new_start` on
    /// `new_track`.
    pub fn move_clip(&mut self, track: usize, time: GenTime, new_track: usize, new_start: GenTime) -> Result<()> {
        self.edit("Move clip", |editor| {
            editor.check_track(track)?;
            editor.check_track(new_track)?;
            let id = editor.clip_id_at(track, time)?;
            let from = editor.clip_ref(id)?.info();
            let to = from.translated(new_start - from.start_pos, new_track);
            if to == from {
                return Ok(());
            }
            editor.check_clip_space(id, &to, "move clip to position")?;
            editor.prune_collapsing_transitions(id, &to)?;
            editor.move_clip_item(&from, &to)?;
            editor.record(Box::new(MoveClipCommand::new(from, to)));
            Ok(())
        })
    }

    /// Drag the start edge of the clip covering `time` to `new_start`, as far
    /// as its source allows.
    pub fn resize_clip_start(&mut self, track: usize, time: GenTime, new_start: GenTime) -> Result<()> {
        self.edit("Resize clip", |editor| editor.resize_clip_recorded(track, time, new_start, true))
    }

    /// Drag the end edge of the clip covering `time` to `new_end`, as far as
    /// its source and the next clip allow.
    pub fn resize_clip_end(&mut self, track: usize, time: GenTime, new_end: GenTime) -> Result<()> {
        self.edit("Resize clip", |editor| editor.resize_clip_recorded(track, time, new_end, false))
    }

    /// Cut the clip covering `time` in two. Returns the id of the second
    /// half.
    pub fn cut_clip(&mut self, track: usize, time: GenTime) -> Result<ItemId> {
        self.edit("Razor clip", |editor| {
            editor.check_track(track)?;
            let id = editor
                .clip_id_at(track, time)
                .map_err(|_| editor.not_found("clip to cut", track, time))?;
            let fps = editor.fps();
            let time = GenTime::from_frames(time.frames(fps), fps);
            let clip = editor.clip_ref(id)?;
            let info = clip.info();
            let effects = clip.effects().clone();
            if time <= info.start_pos || time >= info.end_pos {
                return Err(CoreError::InvalidOperation(format!("Cannot cut clip at its edge ({})", time)));
            }
            let second = editor.cut_clip_item(&info, time)?;
            editor.record(Box::new(RazorClipCommand::new(info, time, effects)));
            Ok(second)
        })
    }

    /// Join the clip ending at `time` with the one starting there, when the
    /// second continues the first in the same source.
    pub fn merge_clips(&mut self, track: usize, time: GenTime) -> Result<()> {
        self.edit("Merge clips", |editor| {
            editor.check_track(track)?;
            let first = editor
                .timeline
                .clips()
                .find(|c| c.info().track == track && c.info().end_pos == time)
                .ok_or_else(|| editor.not_found("clip ending", track, time))?;
            let second = editor
                .timeline
                .clip_starting_at(track, time)
                .ok_or_else(|| editor.not_found("clip", track, time))?;
            let info = first.info();
            let first_effects = first.effects().clone();
            let second_effects = second.effects().clone();
            editor.merge_clip_items(&info, time, None)?;
            editor.record(Box::new(MergeClipCommand::new(info, time, first_effects, second_effects)));
            Ok(())
        })
    }

    pub fn change_speed(&mut self, track: usize, time: GenTime, speed: f64, strobe: u32) -> Result<()> {
        self.edit("Change clip speed", |editor| {
            editor.check_track(track)?;
            let id = editor.clip_id_at(track, time)?;
            let clip = editor.clip_ref(id)?;
            if clip.clip_type().is_generated() {
                return Err(CoreError::InvalidOperation(format!(
                    "Cannot change the speed of a {:?} clip",
                    clip.clip_type()
                )));
            }
            let start = clip.info().start_pos;
            let old = (clip.speed(), clip.strobe());
            let mut probe = clip.clone();
            probe.set_speed(speed, strobe);
            let new = (probe.speed(), probe.strobe());
            if new == old {
                return Ok(());
            }
            editor.prune_collapsing_transitions(id, &probe.info())?;
            editor.set_clip_speed(track, start, new.0, new.1)?;
            editor.record(Box::new(ChangeSpeedCommand::new(track, start, old, new)));
            Ok(())
        })
    }

    /// Play only the audio or only the video of a clip, or both again.
    pub fn set_clip_state(&mut self, track: usize, time: GenTime, state: ClipState) -> Result<()> {
        self.edit("Change clip state", |editor| {
            editor.check_track(track)?;
            let id = editor.clip_id_at(track, time)?;
            let clip = editor.clip_ref(id)?;
            let clip_type = clip.clip_type();
            let allowed = match state {
                ClipState::Normal => true,
                ClipState::AudioOnly => clip_type.has_audio(),
                ClipState::VideoOnly => clip_type != ClipType::Audio,
            };
            if !allowed {
                return Err(CoreError::InvalidOperation(format!(
                    "A {:?} clip cannot be set to {:?}",
                    clip_type, state
                )));
            }
            let start = clip.info().start_pos;
            let old = editor.replace_clip_state(track, start, state)?;
            if old != state {
                editor.record(Box::new(ChangeClipStateCommand::new(track, start, old, state)));
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Clipboard
    // -----------------------------------------------------------------------

    /// Copy the given items. Unknown ids are skipped.
    pub fn copy(&self, ids: &[ItemId]) -> Clipboard {
        let entries: Vec<ClipboardEntry> = ids
            .iter()
            .filter_map(|id| self.timeline.item(*id))
            .map(|item| match item {
                TimelineItem::Clip(c) => ClipboardEntry::Clip(c.clone()),
                TimelineItem::Transition(t) => ClipboardEntry::Transition(t.clone()),
            })
            .collect();
        let origin = entries
            .iter()
            .map(|e| e.info().start_pos)
            .reduce(GenTime::min)
            .unwrap_or(GenTime::ZERO);
        let base_track = entries.iter().map(|e| e.info().track).min().unwrap_or(0);
        Clipboard {
            entries,
            origin,
            base_track,
        }
    }

    /// Paste copies of the clipboard so its earliest item starts at `time`
    /// and its lowest item lands on `track`. Either everything fits or
    /// nothing is pasted. Returns the new ids, clips first.
    pub fn paste(&mut self, clipboard: &Clipboard, time: GenTime, track: usize) -> Result<Vec<ItemId>> {
        self.edit("Paste", |editor| {
            let offset = time - clipboard.origin;
            let track_offset = track as isize - clipboard.base_track as isize;
            let mut targets = Vec::with_capacity(clipboard.len());
            for entry in &clipboard.entries {
                let info = entry.info();
                let target_track = info
                    .track
                    .checked_add_signed(track_offset)
                    .ok_or(CoreError::InvalidTrack(track))?;
                editor.check_track(target_track)?;
                let to = info.translated(offset, target_track);
                if to.start_pos < GenTime::ZERO
                    || editor
                        .timeline
                        .collides(entry.category(), target_track, to.start_pos, to.end_pos, &[])
                {
                    return Err(CoreError::Collision(format!(
                        "Cannot paste at {}: the space is not free",
                        time
                    )));
                }
                targets.push(to);
            }

            let mut pasted = Vec::new();
            let mut new_ids: HashMap<ItemId, ItemId> = HashMap::new();
            for (entry, to) in clipboard.entries.iter().zip(&targets) {
                if let ClipboardEntry::Clip(clip) = entry {
                    let mut copy = clip.duplicate();
                    copy.geometry_mut().set_start_pos(to.start_pos);
                    copy.geometry_mut().set_track(to.track);
                    let id = editor.restore_clip(copy.clone())?;
                    editor.record(Box::new(AddTimelineClipCommand::new(copy, true)));
                    new_ids.insert(clip.id(), id);
                    pasted.push(id);
                }
            }
            for (entry, to) in clipboard.entries.iter().zip(&targets) {
                if let ClipboardEntry::Transition(transition) = entry {
                    let mut copy = transition.duplicate();
                    copy.geometry_mut().set_start_pos(to.start_pos);
                    copy.geometry_mut().set_track(to.track);
                    copy.set_reference_clip(transition.reference_clip().and_then(|c| new_ids.get(&c).copied()));
                    copy.set_second_clip(transition.second_clip().and_then(|c| new_ids.get(&c).copied()));
                    copy.update_transition_end_track(editor.timeline.previous_video_track(to.track));
                    let id = editor.restore_transition(copy.clone())?;
                    editor.record(Box::new(AddTransitionCommand::new(copy, true)));
                    pasted.push(id);
                }
            }
            Ok(pasted)
        })
    }

    // -----------------------------------------------------------------------
    // Recorded building blocks
    // -----------------------------------------------------------------------

    pub(super) fn delete_clip_recorded(&mut self, id: ItemId) -> Result<()> {
        for tid in self.timeline.dependent_transitions(id) {
            let info = self.transition_ref(tid)?.info();
            self.delete_transition_recorded(&info)?;
        }
        let info = self.clip_ref(id)?.info();
        let clip = self.take_clip(&info)?;
        self.record(Box::new(AddTimelineClipCommand::new(clip, false)));
        Ok(())
    }

    fn resize_clip_recorded(&mut self, track: usize, time: GenTime, edge: GenTime, at_start: bool) -> Result<()> {
        self.check_track(track)?;
        let id = self.clip_id_at(track, time)?;
        let fps = self.fps();
        let obstacles = self.timeline.obstacle_starts(ItemCategory::Clip, track, id);
        let mut probe = self.clip_ref(id)?.clone();
        let from = probe.info();
        let changed = if at_start {
            probe.resize_start(edge.frames(fps))
        } else {
            probe.resize_end(edge.frames(fps), &obstacles)
        };
        if !changed {
            return Ok(());
        }
        let to = probe.info();
        self.check_clip_space(id, &to, "resize clip to")?;
        self.prune_collapsing_transitions(id, &to)?;
        let changes = self.resize_clip_item(&from, &to, at_start)?;
        self.record(Box::new(ResizeClipCommand::new(from, to, at_start)));
        for (old, new) in changes {
            self.record(Box::new(EditEffectCommand::new(track, to.start_pos, old, new)));
        }
        Ok(())
    }

    /// `to` lies on the timeline and overlaps no clip other than `id`.
    fn check_clip_space(&self, id: ItemId, to: &ItemInfo, action: &str) -> Result<()> {
        if to.track >= self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(to.track));
        }
        if to.start_pos < GenTime::ZERO
            || self
                .timeline
                .collides(ItemCategory::Clip, to.track, to.start_pos, to.end_pos, &[id])
        {
            return Err(CoreError::Collision(format!("Cannot {} {}", action, to.start_pos)));
        }
        Ok(())
    }

    /// Delete, as recorded edits, the two-clip transitions that would
    /// collapse once `clip` sits at `to`.
    fn prune_collapsing_transitions(&mut self, clip: ItemId, to: &ItemInfo) -> Result<()> {
        let mut doomed = Vec::new();
        for tid in self.timeline.dependent_transitions(clip) {
            let transition = self.transition_ref(tid)?;
            let (Some(reference), Some(second)) = (transition.reference_clip(), transition.second_clip()) else {
                continue;
            };
            let placed = |id: ItemId| {
                if id == clip {
                    Some(*to)
                } else {
                    self.timeline.clip(id).map(ClipItem::info)
                }
            };
            let (Some(reference), Some(second)) = (placed(reference), placed(second)) else {
                continue;
            };
            let (start, end) = Transition::derived_window(&reference, &second);
            if end <= start {
                doomed.push(transition.info());
            }
        }
        for info in doomed {
            self.delete_transition_recorded(&info)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entry points shared with undo/redo
    // -----------------------------------------------------------------------

    pub(crate) fn restore_clip(&mut self, clip: ClipItem) -> Result<ItemId> {
        let info = clip.info();
        if info.track >= self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(info.track));
        }
        if self
            .timeline
            .collides(ItemCategory::Clip, info.track, info.start_pos, info.end_pos, &[])
        {
            return Err(CoreError::Collision(format!(
                "Cannot add clip at {} on track {}",
                info.start_pos, info.track
            )));
        }
        let id = clip.id();
        let producer = clip.producer_handle();
        let params = clip_params(&clip);
        self.timeline.insert_item(TimelineItem::Clip(clip));
        if let Err(e) = self.mirror("adding clip", |r| r.insert_clip(&info, &producer, &params)) {
            self.timeline.remove_item(id);
            return Err(e);
        }
        tracing::debug!("added clip {} at {} on track {}", id, info.start_pos, info.track);
        Ok(id)
    }

    pub(crate) fn take_clip(&mut self, info: &ItemInfo) -> Result<ClipItem> {
        let id = self.clip_id_starting_at(info)?;
        let Some(TimelineItem::Clip(clip)) = self.timeline.remove_item(id) else {
            return Err(CoreError::UnknownItem(id));
        };
        if let Err(e) = self.mirror("removing clip", |r| r.remove_clip(info.track, info.start_pos)) {
            self.timeline.insert_item(TimelineItem::Clip(clip));
            return Err(e);
        }
        tracing::debug!("removed clip {}", id);
        Ok(clip)
    }

    pub(crate) fn move_clip_item(&mut self, from: &ItemInfo, to: &ItemInfo) -> Result<()> {
        let id = self.clip_id_starting_at(from)?;
        self.check_clip_space(id, to, "move clip to position")?;
        let fps = self.fps();
        let clip = self.clip_mut(id)?;
        clip.geometry_mut().set_start_pos(to.start_pos);
        clip.geometry_mut().set_track(to.track);
        let producer = clip.producer_handle();
        let (old_frame, new_frame) = (from.start_pos.frames(fps), to.start_pos.frames(fps));
        if let Err(e) = self.mirror("moving clip", |r| r.move_clip(from.track, to.track, old_frame, new_frame, &producer)) {
            let clip = self.clip_mut(id)?;
            clip.geometry_mut().set_start_pos(from.start_pos);
            clip.geometry_mut().set_track(from.track);
            return Err(e);
        }
        if let Err(e) = self.sync_dependent_transitions(id, from) {
            let clip = self.clip_mut(id)?;
            clip.geometry_mut().set_start_pos(from.start_pos);
            clip.geometry_mut().set_track(from.track);
            self.compensate("moving clip", |r| r.move_clip(to.track, from.track, new_frame, old_frame, &producer));
            return Err(e);
        }
        tracing::debug!("moved clip {} to {} on track {}", id, to.start_pos, to.track);
        Ok(())
    }

    /// Resize one edge of the clip at `from` towards `to`. Effects follow
    /// the new crop window; the changed ones are returned as (old, new).
    pub(crate) fn resize_clip_item(
        &mut self,
        from: &ItemInfo,
        to: &ItemInfo,
        at_start: bool,
    ) -> Result<Vec<(EffectRecord, EffectRecord)>> {
        let id = self.clip_id_starting_at(from)?;
        self.check_clip_space(id, to, "resize clip to")?;
        let fps = self.fps();
        let obstacles = self.timeline.obstacle_starts(ItemCategory::Clip, from.track, id);
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let changed = if at_start {
            clip.resize_start(to.start_pos.frames(fps))
        } else {
            clip.resize_end(to.end_pos.frames(fps), &obstacles)
        };
        if !changed {
            return Ok(Vec::new());
        }
        let resized = clip.info();

        let mirrored = if at_start {
            self.mirror("resizing clip start", |r| {
                r.resize_clip_start(from, resized.start_pos - from.start_pos)
            })
        } else {
            self.mirror("resizing clip end", |r| r.resize_clip_end(from, resized.end_pos - from.end_pos))
        };
        if let Err(e) = mirrored {
            self.replace_clip(snapshot);
            return Err(e);
        }

        let clip = self.clip_mut(id)?;
        clip.adjust_effects_to_crop();
        let after = clip.effects().clone();
        let followed = match self.mirror_effect_stack(from.track, resized.start_pos, snapshot.effects(), &after) {
            Ok(()) => self.sync_dependent_transitions(id, from).map_err(|e| {
                self.compensate_effect_stack(from.track, resized.start_pos, &after, snapshot.effects());
                e
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = followed {
            if at_start {
                self.compensate("resizing clip start", |r| {
                    r.resize_clip_start(&resized, from.start_pos - resized.start_pos)
                });
            } else {
                self.compensate("resizing clip end", |r| r.resize_clip_end(&resized, from.end_pos - resized.end_pos));
            }
            self.replace_clip(snapshot);
            return Err(e);
        }

        tracing::debug!("resized clip {} to {} - {}", id, resized.start_pos, resized.end_pos);
        Ok(snapshot
            .effects()
            .iter()
            .zip(after.iter())
            .filter(|(old, new)| old != new)
            .map(|(old, new)| (old.clone(), new.clone()))
            .collect())
    }

    fn compensate_effect_stack(&mut self, track: usize, start: GenTime, from: &EffectsList, to: &EffectsList) {
        if let Err(e) = self.mirror_effect_stack(track, start, from, to) {
            tracing::error!("failed to revert effect stack: {}", e);
        }
    }

    /// Cut the clip at `info` at `time`. Transitions starting at or after
    /// the cut move to the second half.
    pub(crate) fn cut_clip_item(&mut self, info: &ItemInfo, time: GenTime) -> Result<ItemId> {
        let id = self.clip_id_starting_at(info)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let Some(second) = clip.split_at(time) else {
            return Err(CoreError::InvalidOperation(format!("Cannot cut clip at {}", time)));
        };
        let first_effects = clip.effects().clone();
        let second_id = second.id();
        let second_effects = second.effects().clone();
        let whole = snapshot.info();
        let (track, start) = (whole.track, whole.start_pos);
        let first_part = ItemInfo { end_pos: time, ..whole };
        self.timeline.insert_item(TimelineItem::Clip(second));

        if let Err(e) = self.mirror("cutting clip", |r| r.cut_clip(track, time)) {
            self.timeline.remove_item(second_id);
            self.replace_clip(snapshot);
            return Err(e);
        }
        if let Err(e) = self.mirror_effect_stack(track, start, snapshot.effects(), &first_effects) {
            self.compensate("cutting clip", |r| r.remove_clip(track, time));
            self.compensate("cutting clip", |r| r.resize_clip_end(&first_part, whole.end_pos - time));
            self.timeline.remove_item(second_id);
            self.replace_clip(snapshot);
            return Err(e);
        }
        if let Err(e) = self.mirror_effect_stack(track, time, snapshot.effects(), &second_effects) {
            self.compensate_effect_stack(track, start, &first_effects, snapshot.effects());
            self.compensate("cutting clip", |r| r.remove_clip(track, time));
            self.compensate("cutting clip", |r| r.resize_clip_end(&first_part, whole.end_pos - time));
            self.timeline.remove_item(second_id);
            self.replace_clip(snapshot);
            return Err(e);
        }

        let moved: Vec<ItemId> = self
            .timeline
            .transitions()
            .filter(|t| t.depends_on(id) && t.info().start_pos >= time)
            .map(Transition::id)
            .collect();
        for tid in moved {
            if let Some(t) = self.timeline.transition_mut(tid) {
                if t.reference_clip() == Some(id) {
                    t.set_reference_clip(Some(second_id));
                }
                if t.second_clip() == Some(id) {
                    t.set_second_clip(Some(second_id));
                }
            }
        }
        tracing::debug!("cut clip {} at {}", id, time);
        Ok(second_id)
    }

    /// Merge the clip at `info` with the clip starting at `time` right
    /// after it. `effects`, when given, becomes the merged clip's stack;
    /// otherwise the two halves' stacks are joined and fitted to the longer
    /// window.
    pub(crate) fn merge_clip_items(
        &mut self,
        info: &ItemInfo,
        time: GenTime,
        effects: Option<&EffectsList>,
    ) -> Result<()> {
        let first_id = self.clip_id_starting_at(info)?;
        let second_id = self
            .timeline
            .item_starting_at(ItemCategory::Clip, info.track, time)
            .ok_or_else(|| self.not_found("clip", info.track, time))?;
        let first = self.clip_ref(first_id)?.clone();
        let second = self.clip_ref(second_id)?.clone();
        if first_id == second_id || !first.continues_into(&second) {
            return Err(CoreError::InvalidOperation(format!("Cannot merge clips at {}", time)));
        }
        let track = info.track;
        let start = first.info().start_pos;
        let rebuilt = match effects {
            Some(list) => list.clone(),
            None => first.merged_effects(&second),
        };

        self.timeline.remove_item(second_id);
        if let Err(e) = self.mirror("removing clip", |r| r.remove_clip(track, time)) {
            self.timeline.insert_item(TimelineItem::Clip(second));
            return Err(e);
        }
        let clip = self.clip_mut(first_id)?;
        clip.absorb(&second);
        clip.set_effect_list(&rebuilt);
        if effects.is_none() {
            clip.adjust_effects_to_crop();
        }
        let merged_effects = clip.effects().clone();
        let merged = clip.info();
        let first_info = first.info();

        let result = match self.mirror("resizing clip end", |r| {
            r.resize_clip_end(&first_info, merged.end_pos - first_info.end_pos)
        }) {
            Ok(()) => self
                .mirror_effect_stack(track, start, first.effects(), &merged_effects)
                .map_err(|e| {
                    self.compensate("resizing clip end", |r| {
                        r.resize_clip_end(&merged, first_info.end_pos - merged.end_pos)
                    });
                    e
                }),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.replace_clip(first);
            let params = clip_params(&second);
            let (second_info, producer) = (second.info(), second.producer_handle());
            self.timeline.insert_item(TimelineItem::Clip(second));
            self.compensate("removing clip", |r| r.insert_clip(&second_info, &producer, &params));
            return Err(e);
        }

        for tid in self.timeline.dependent_transitions(second_id) {
            if let Some(t) = self.timeline.transition_mut(tid) {
                if t.reference_clip() == Some(second_id) {
                    t.set_reference_clip(Some(first_id));
                }
                if t.second_clip() == Some(second_id) {
                    t.set_second_clip(Some(first_id));
                }
            }
        }
        tracing::debug!("merged clips at {} on track {}", time, track);
        Ok(())
    }

    /// Change the speed of the clip covering `start`. Returns the new
    /// placement, whose end comes from the renderer.
    pub(crate) fn set_clip_speed(&mut self, track: usize, start: GenTime, speed: f64, strobe: u32) -> Result<ItemInfo> {
        let id = self.clip_id_at(track, start)?;
        let fps = self.fps();
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let old_info = snapshot.info();
        clip.set_speed(speed, strobe);
        let predicted = clip.info();
        let (new_speed, new_strobe, producer) = (clip.speed(), clip.strobe(), clip.producer_handle());
        if self
            .timeline
            .collides(ItemCategory::Clip, track, predicted.start_pos, predicted.end_pos, &[id])
        {
            self.replace_clip(snapshot);
            return Err(CoreError::Collision(format!(
                "Not enough space to change the speed of the clip at {}",
                old_info.start_pos
            )));
        }

        let end_frame = match self.mirror("changing clip speed", |r| {
            r.change_clip_speed(&old_info, new_speed, snapshot.speed(), new_strobe, &producer)
        }) {
            Ok(frame) => frame,
            Err(e) => {
                self.replace_clip(snapshot);
                return Err(e);
            }
        };

        let clip = self.clip_mut(id)?;
        let end = GenTime::from_frames(end_frame, fps);
        if end > old_info.start_pos {
            clip.geometry_mut().set_crop_duration(end - old_info.start_pos);
        }
        clip.adjust_effects_to_crop();
        let info = clip.info();
        let after = clip.effects().clone();

        let followed = match self.mirror_effect_stack(track, info.start_pos, snapshot.effects(), &after) {
            Ok(()) => self.sync_dependent_transitions(id, &old_info).map_err(|e| {
                self.compensate_effect_stack(track, info.start_pos, &after, snapshot.effects());
                e
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = followed {
            let old_producer = snapshot.producer_handle();
            self.compensate("changing clip speed", |r| {
                r.change_clip_speed(&info, snapshot.speed(), new_speed, snapshot.strobe(), &old_producer)
                    .map(|_| ())
            });
            self.replace_clip(snapshot);
            return Err(e);
        }
        tracing::debug!("clip {} now plays at {}x", id, new_speed);
        Ok(info)
    }

    /// Swap the clip's producer for one playing `state`. Returns the
    /// previous state.
    pub(crate) fn replace_clip_state(&mut self, track: usize, start: GenTime, state: ClipState) -> Result<ClipState> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let old = clip.state();
        if old == state {
            return Ok(old);
        }
        let info = clip.info();
        let old_producer = clip.producer_handle();
        clip.set_state(state);
        let producer = clip.producer_handle();
        let params = clip_params(clip);

        if let Err(e) = self.mirror("changing clip state", |r| r.remove_clip(info.track, info.start_pos)) {
            self.clip_mut(id)?.set_state(old);
            return Err(e);
        }
        if let Err(e) = self.mirror("changing clip state", |r| r.insert_clip(&info, &producer, &params)) {
            self.clip_mut(id)?.set_state(old);
            self.compensate("changing clip state", |r| r.insert_clip(&info, &old_producer, &params));
            return Err(e);
        }
        tracing::debug!("clip {} state {:?} -> {:?}", id, old, state);
        Ok(old)
    }

    // -----------------------------------------------------------------------
    // Dependent transitions
    // -----------------------------------------------------------------------

    /// Bring the transitions depending on `clip` in line with its current
    /// placement; `old` is where the clip was before the edit.
    ///
    /// Two-clip transitions re-derive their window. Anchored ones travel
    /// with a moved clip and stay inside a resized one; an automatic one
    /// that covered the whole clip keeps covering it. A window that
    /// collapses is removed.
    fn sync_dependent_transitions(&mut self, clip: ItemId, old: &ItemInfo) -> Result<()> {
        let Some(anchor) = self.timeline.clip(clip).map(ClipItem::info) else {
            return Ok(());
        };
        let fps = self.fps();
        // (state before the sync, whether it was removed)
        let mut applied: Vec<(Transition, bool)> = Vec::new();

        for tid in self.timeline.dependent_transitions(clip) {
            let before = self.transition_ref(tid)?.clone();
            let mut after = before.clone();
            match (before.reference_clip(), before.second_clip()) {
                (Some(reference), Some(second)) => {
                    let reference = self.timeline.clip(reference).map(ClipItem::info);
                    let second = self.timeline.clip(second).map(ClipItem::info);
                    if let (Some(reference), Some(second)) = (reference, second) {
                        after.refresh_window(&reference, &second);
                    }
                }
                _ => {
                    let window = before.info();
                    if before.is_automatic() && window.start_pos == old.start_pos && window.end_pos == old.end_pos {
                        after
                            .geometry_mut()
                            .set_info(&ItemInfo::new(anchor.start_pos, anchor.end_pos, GenTime::ZERO, anchor.track));
                    } else {
                        // a move keeps the duration; a resize leaves the
                        // content where it was
                        let shift = if anchor.duration() == old.duration() {
                            anchor.start_pos - old.start_pos
                        } else {
                            GenTime::ZERO
                        };
                        after.move_transition((window.start_pos + shift).frames(fps), &anchor);
                    }
                }
            }
            after.update_transition_end_track(self.timeline.previous_video_track(after.info().track));
            if after == before {
                continue;
            }

            let old_record = before.to_record();
            let result = if after.is_valid() {
                let new_record = after.to_record();
                self.replace_transition(after);
                self.mirror("moving transition", |r| r.move_transition(&old_record, &new_record))
            } else {
                self.timeline.remove_item(tid);
                self.mirror("deleting transition", |r| r.delete_transition(&old_record))
            };
            let removed = self.timeline.transition(tid).is_none();
            if let Err(e) = result {
                if removed {
                    self.timeline.insert_item(TimelineItem::Transition(before));
                } else {
                    self.replace_transition(before);
                }
                self.revert_transition_sync(applied);
                return Err(e);
            }
            applied.push((before, removed));
        }
        Ok(())
    }

    fn revert_transition_sync(&mut self, applied: Vec<(Transition, bool)>) {
        for (before, removed) in applied.into_iter().rev() {
            let record = before.to_record();
            if removed {
                self.timeline.insert_item(TimelineItem::Transition(before));
                self.compensate("deleting transition", |r| r.add_transition(&record));
            } else if let Some(current) = self.timeline.transition(before.id()).map(Transition::to_record) {
                self.replace_transition(before);
                self.compensate("moving transition", |r| r.move_transition(&current, &record));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::effects::{EffectParameter, FADE_IN};
    use crate::keyframes::Keyframes;
    use crate::project::{preset_pal, TimelineSettings};
    use crate::renderer::MirrorCall;

    #[test]
    fn overlapping_add_is_rejected() {
        let (mut editor, recorder) = editor();
        add_clip(&mut editor, 0.0, 5.0, 0);
        let err = editor
            .add_clip(source(), ItemInfo::new(secs(4.0), secs(6.0), GenTime::ZERO, 0), &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::Collision(_)));
        assert_eq!(editor.timeline().clips().count(), 1);
        assert_eq!(recorder.borrow().count("insert_clip"), 1);
    }

    #[test]
    fn rejected_move_changes_nothing() {
        let (mut editor, recorder) = editor();
        add_clip(&mut editor, 0.0, 5.0, 0);
        let b = add_clip(&mut editor, 10.0, 15.0, 0);
        let undo_before = editor.history().undo_len();
        recorder.borrow_mut().clear();

        let err = editor.move_clip(0, secs(10.0), 0, secs(3.0)).unwrap_err();
        assert!(matches!(err, CoreError::Collision(_)));
        assert_eq!(editor.timeline().clip(b).unwrap().info().start_pos, secs(10.0));
        assert_eq!(editor.history().undo_len(), undo_before);
        assert!(recorder.borrow().calls().is_empty());
        assert_eq!(editor.last_message(), Some("Cannot move clip to position 00:00:03.000"));
    }

    #[test]
    fn move_undo_redo() {
        let (mut editor, recorder) = editor();
        let id = add_clip(&mut editor, 0.0, 5.0, 0);
        recorder.borrow_mut().clear();

        editor.move_clip(0, secs(1.0), 1, secs(20.0)).unwrap();
        let info = editor.timeline().clip(id).unwrap().info();
        assert_eq!((info.start_pos, info.track), (secs(20.0), 1));
        assert_eq!(
            recorder.borrow().calls(),
            &[MirrorCall::MoveClip {
                old_track: 0,
                new_track: 1,
                old_start: 0,
                new_start: 500
            }]
        );

        editor.undo().unwrap();
        let info = editor.timeline().clip(id).unwrap().info();
        assert_eq!((info.start_pos, info.track), (secs(0.0), 0));
        editor.redo().unwrap();
        assert_eq!(editor.timeline().clip(id).unwrap().info().start_pos, secs(20.0));
    }

    #[test]
    fn refused_move_rolls_back() {
        let (mut editor, recorder) = editor();
        let id = add_clip(&mut editor, 0.0, 5.0, 0);
        let undo_before = editor.history().undo_len();
        recorder.borrow_mut().fail_next("move_clip");

        assert!(editor.move_clip(0, secs(0.0), 0, secs(8.0)).is_err());
        assert_eq!(editor.timeline().clip(id).unwrap().info().start_pos, secs(0.0));
        assert_eq!(editor.history().undo_len(), undo_before);
        assert_eq!(
            editor.last_message(),
            Some("Error when moving clip: move_clip refused")
        );
    }

    #[test]
    fn resize_end_stops_at_neighbour() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 5.0, 0);
        add_clip(&mut editor, 8.0, 10.0, 0);
        editor.resize_clip_end(0, secs(1.0), secs(12.0)).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().info().end_pos, secs(8.0));
        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().info().end_pos, secs(5.0));
    }

    #[test]
    fn resize_end_floor_follows_settings() {
        let settings = TimelineSettings {
            minimum_duration_frames: 10,
            ..preset_pal()
        };
        let (mut editor, _) = editor_with(settings);
        let a = add_clip(&mut editor, 1.0, 3.0, 0);
        editor.resize_clip_end(0, secs(2.0), secs(0.0)).unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.geometry().frames(clip.info().duration()), 10);
    }

    #[test]
    fn resize_start_into_neighbour_is_rejected() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 0.0, 5.0, 0);
        let b = editor
            .add_clip(source(), ItemInfo::new(secs(6.0), secs(10.0), secs(10.0), 0), &[])
            .unwrap();
        let err = editor.resize_clip_start(0, secs(7.0), secs(3.0)).unwrap_err();
        assert!(matches!(err, CoreError::Collision(_)));
        assert_eq!(editor.timeline().clip(b).unwrap().info().start_pos, secs(6.0));
    }

    #[test]
    fn refused_resize_restores_clip() {
        let (mut editor, recorder) = editor();
        let a = editor
            .add_clip(source(), ItemInfo::new(secs(0.0), secs(5.0), GenTime::ZERO, 0), &[EffectRecord::fade_out(0, 25)])
            .unwrap();
        let before = editor.timeline().clip(a).unwrap().clone();
        recorder.borrow_mut().fail_next("resize_clip_end");
        assert!(editor.resize_clip_end(0, secs(1.0), secs(3.0)).is_err());
        assert_eq!(editor.timeline().clip(a).unwrap(), &before);
    }

    #[test]
    fn resize_moves_fade_out_and_undo_restores_it() {
        let (mut editor, recorder) = editor();
        let a = editor
            .add_clip(source(), ItemInfo::new(secs(0.0), secs(5.0), GenTime::ZERO, 0), &[EffectRecord::fade_out(0, 25)])
            .unwrap();
        let before = editor.timeline().clip(a).unwrap().effects().clone();
        assert_eq!(before.at(1).unwrap().scalar("out"), Some(124.0));
        recorder.borrow_mut().clear();

        editor.resize_clip_end(0, secs(1.0), secs(3.0)).unwrap();
        let fade = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().clone();
        assert_eq!(fade.scalar("in"), Some(49.0));
        assert_eq!(fade.scalar("out"), Some(74.0));
        assert_eq!(recorder.borrow().count("edit_effect"), 1);
        assert_eq!(editor.history().undo_description(), Some("Resize clip"));

        editor.undo().unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.info().end_pos, secs(5.0));
        assert_eq!(clip.effects(), &before);
    }

    #[test]
    fn cut_then_undo_restores_clip() {
        let (mut editor, recorder) = editor();
        let keys = Keyframes::from_points([(0, 0.0), (200, 100.0)]);
        let effects = [
            EffectRecord::fade_in(0, 25),
            EffectRecord::fade_out(0, 25),
            EffectRecord::new("filter", "volume").with_param(EffectParameter::keyframes("gain", keys)),
        ];
        let a = editor
            .add_clip(source(), ItemInfo::new(secs(0.0), secs(10.0), GenTime::ZERO, 0), &effects)
            .unwrap();
        let before = editor.timeline().clip(a).unwrap().clone();
        recorder.borrow_mut().clear();

        let b = editor.cut_clip(0, secs(4.0)).unwrap();
        let first = editor.timeline().clip(a).unwrap();
        let second = editor.timeline().clip(b).unwrap();
        assert_eq!(first.info().end_pos, secs(4.0));
        assert_eq!(second.info(), ItemInfo::new(secs(4.0), secs(10.0), secs(4.0), 0));
        assert!(first.effects().iter().all(|e| !e.is_fade_out()));
        assert!(second.effects().iter().all(|e| !e.is_fade_in()));
        assert_eq!(first.fade_out(), 0);
        assert_eq!(recorder.borrow().count("cut_clip"), 1);

        editor.undo().unwrap();
        assert!(editor.timeline().clip(b).is_none());
        let merged = editor.timeline().clip(a).unwrap();
        assert_eq!(merged.info(), before.info());
        assert_eq!(merged.effects(), before.effects());
    }

    #[test]
    fn cut_at_edge_is_rejected() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 2.0, 6.0, 0);
        assert!(matches!(editor.cut_clip(0, secs(2.0)), Err(CoreError::InvalidOperation(_))));
        let err = editor.cut_clip(0, secs(8.0)).unwrap_err();
        assert_eq!(err.to_string(), "Cannot find clip to cut on track 0 at frame 200");
    }

    #[test]
    fn refused_cut_leaves_one_clip() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        recorder.borrow_mut().fail_next("cut_clip");
        assert!(editor.cut_clip(0, secs(5.0)).is_err());
        assert_eq!(editor.timeline().clips().count(), 1);
        assert_eq!(editor.timeline().clip(a).unwrap().info().end_pos, secs(10.0));
    }

    #[test]
    fn merge_then_undo_splits_again() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        editor.cut_clip(0, secs(4.0)).unwrap();
        editor.add_effect(0, secs(5.0), EffectRecord::new("filter", "sepia")).unwrap();

        editor.merge_clips(0, secs(4.0)).unwrap();
        assert_eq!(editor.timeline().clips().count(), 1);
        assert_eq!(editor.timeline().clip(a).unwrap().info().end_pos, secs(10.0));

        editor.undo().unwrap();
        assert_eq!(editor.timeline().clips().count(), 2);
        let second = editor.timeline().clip_starting_at(0, secs(4.0)).unwrap();
        assert_eq!(second.effects().len(), 1);
        assert!(editor.timeline().clip(a).unwrap().effects().is_empty());
    }

    #[test]
    fn cut_then_merge_restores_fades_and_keyframes() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        editor.set_fade_out(0, secs(1.0), 10).unwrap();
        let keys = Keyframes::from_points([(0, 0.0), (99, 100.0)]);
        editor
            .add_effect(0, secs(1.0), EffectRecord::new("volume", "gain").with_param(EffectParameter::keyframes("level", keys)))
            .unwrap();
        let before = editor.timeline().clip(a).unwrap().clone();

        editor.cut_clip(0, secs(2.0)).unwrap();
        editor.merge_clips(0, secs(2.0)).unwrap();

        let after = editor.timeline().clip(a).unwrap();
        assert_eq!(after.info(), before.info());
        assert_eq!(after.effects(), before.effects());
        assert_eq!(after.fade_out(), 10);
    }

    #[test]
    fn merged_stack_is_mirrored() {
        let (mut editor, recorder) = editor();
        add_clip(&mut editor, 0.0, 4.0, 0);
        editor.set_fade_out(0, secs(1.0), 10).unwrap();
        editor.cut_clip(0, secs(2.0)).unwrap();
        recorder.borrow_mut().clear();

        editor.merge_clips(0, secs(2.0)).unwrap();
        assert_eq!(recorder.borrow().count("add_effect"), 1);
    }

    #[test]
    fn merge_needs_continuous_source() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 0.0, 4.0, 0);
        add_clip(&mut editor, 4.0, 8.0, 0);
        assert!(matches!(editor.merge_clips(0, secs(4.0)), Err(CoreError::InvalidOperation(_))));
    }

    #[test]
    fn delete_clip_takes_its_transitions_and_undo_returns_them() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        let clip = editor.timeline().clip(a).unwrap().clone();
        let transition = Transition::anchored("luma", &clip, secs(2.0), secs(4.0), 0, false);
        let t = editor.add_transition(transition).unwrap();

        editor.delete_clip(0, secs(1.0)).unwrap();
        assert!(editor.timeline().items().next().is_none());

        editor.undo().unwrap();
        assert!(editor.timeline().clip(a).is_some());
        assert_eq!(editor.timeline().transition(t).unwrap().reference_clip(), Some(a));
    }

    #[test]
    fn speed_change_uses_renderer_end() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        editor.change_speed(0, secs(1.0), 2.0, 1).unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.speed(), 2.0);
        assert_eq!(clip.info().end_pos, secs(5.0));

        editor.undo().unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.speed(), 1.0);
        assert_eq!(clip.info().end_pos, secs(10.0));
    }

    #[test]
    fn slowdown_into_neighbour_is_rejected() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        add_clip(&mut editor, 12.0, 14.0, 0);
        recorder.borrow_mut().clear();
        assert!(matches!(editor.change_speed(0, secs(1.0), 0.5, 1), Err(CoreError::Collision(_))));
        assert_eq!(editor.timeline().clip(a).unwrap().speed(), 1.0);
        assert!(recorder.borrow().calls().is_empty());
    }

    #[test]
    fn clip_state_is_mirrored_as_replace() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 10.0, 0);
        recorder.borrow_mut().clear();
        editor.set_clip_state(0, secs(1.0), ClipState::AudioOnly).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().state(), ClipState::AudioOnly);
        let names: Vec<&str> = recorder.borrow().calls().iter().map(MirrorCall::name).collect();
        assert_eq!(names, vec!["remove_clip", "insert_clip"]);
    }

    #[test]
    fn clip_state_respects_clip_type() {
        let (mut editor, _) = editor();
        editor
            .add_clip(
                ClipSource::new("title", ClipType::Text, GenTime::ZERO),
                ItemInfo::new(secs(0.0), secs(5.0), GenTime::ZERO, 0),
                &[],
            )
            .unwrap();
        assert!(editor.set_clip_state(0, secs(1.0), ClipState::AudioOnly).is_err());
    }

    #[test]
    fn paste_is_all_or_nothing() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 3.0, 5.0, 0);
        add_clip(&mut editor, 24.0, 30.0, 1);
        let clipboard = editor.copy(&[a, b]);
        let undo_before = editor.history().undo_len();
        recorder.borrow_mut().clear();

        // b would land on 23..25 of track 1, where a clip already sits
        assert!(matches!(editor.paste(&clipboard, secs(20.0), 1), Err(CoreError::Collision(_))));
        assert_eq!(editor.timeline().clips().count(), 3);
        assert!(recorder.borrow().calls().is_empty());
        assert_eq!(editor.history().undo_len(), undo_before);
    }

    #[test]
    fn paste_is_one_undo_step() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 3.0, 5.0, 1);
        let clipboard = editor.copy(&[a, b]);
        let pasted = editor.paste(&clipboard, secs(10.0), 1).unwrap();
        assert_eq!(pasted.len(), 2);
        let first = editor.timeline().clip(pasted[0]).unwrap().info();
        let second = editor.timeline().clip(pasted[1]).unwrap().info();
        assert_eq!((first.start_pos, first.track), (secs(10.0), 1));
        assert_eq!((second.start_pos, second.track), (secs(13.0), 2));
        assert_eq!(editor.history().undo_description(), Some("Paste"));

        editor.undo().unwrap();
        assert_eq!(editor.timeline().clips().count(), 2);
    }

    #[test]
    fn added_fade_in_is_fitted_to_the_clip() {
        let (mut editor, _) = editor();
        let a = editor
            .add_clip(
                source(),
                ItemInfo::new(secs(0.0), secs(1.0), secs(2.0), 0),
                &[EffectRecord::new("filter", FADE_IN).with_param(EffectParameter::scalar("in", 0.0)).with_param(EffectParameter::scalar("out", 100.0))],
            )
            .unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        // 100 frames do not fit in 25, so the fade is halved
        assert_eq!(clip.fade_in(), 12);
        assert_eq!(clip.effect_at(1).unwrap().scalar("in"), Some(50.0));
    }
}
