use super::TimelineEditor;
use crate::error::{CoreError, Result};
use crate::history::{AddTransitionCommand, EditTransitionCommand, MoveTransitionCommand};
use crate::time::GenTime;
use crate::timeline::TimelineItem;
use crate::transition::{Transition, TransitionProperties};
use crate::types::*;

impl TimelineEditor {
    // -----------------------------------------------------------------------
    // Transition edits
    // -----------------------------------------------------------------------

    /// Add a transition. Unless its end track is pinned, the end track is
    /// the nearest video track below.
    pub fn add_transition(&mut self, transition: Transition) -> Result<ItemId> {
        self.edit("Add transition", |editor| {
            let mut transition = transition;
            let track = transition.info().track;
            editor.check_track(track)?;
            transition.update_transition_end_track(editor.timeline.previous_video_track(track));
            let id = editor.restore_transition(transition.clone())?;
            editor.record(Box::new(AddTransitionCommand::new(transition, true)));
            Ok(id)
        })
    }

    pub fn delete_transition(&mut self, track: usize, time: GenTime) -> Result<()> {
        self.edit("Delete transition", |editor| {
            editor.check_track(track)?;
            let info = editor.transition_info_at(track, time)?;
            editor.delete_transition_recorded(&info)
        })
    }

    /// Move or resize the transition covering `time` to the window `to`.
    pub fn move_transition(&mut self, track: usize, time: GenTime, to: ItemInfo) -> Result<()> {
        self.edit("Move transition", |editor| {
            editor.check_track(track)?;
            editor.check_track(to.track)?;
            let from = editor.transition_info_at(track, time)?;
            let to = ItemInfo {
                crop_start: GenTime::ZERO,
                ..to
            };
            if to == from {
                return Ok(());
            }
            editor.move_transition_item(&from, &to)?;
            editor.record(Box::new(MoveTransitionCommand::new(from, to)));
            Ok(())
        })
    }

    /// Change the parameters, pinned end track and inversion of the
    /// transition covering `time`.
    pub fn edit_transition(&mut self, track: usize, time: GenTime, properties: TransitionProperties) -> Result<()> {
        self.edit("Edit transition", |editor| {
            editor.check_track(track)?;
            let info = editor.transition_info_at(track, time)?;
            let old = editor.set_transition_properties(&info, &properties)?;
            let new = editor.transition_ref(editor.transition_id_starting_at(&info)?)?.properties();
            if old != new {
                editor.record(Box::new(EditTransitionCommand::new(info, old, new)));
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Recorded building blocks
    // -----------------------------------------------------------------------

    fn transition_info_at(&self, track: usize, time: GenTime) -> Result<ItemInfo> {
        self.timeline
            .transition_at(track, time)
            .map(Transition::info)
            .ok_or_else(|| self.not_found("transition", track, time))
    }

    pub(super) fn delete_transition_recorded(&mut self, info: &ItemInfo) -> Result<()> {
        let transition = self.take_transition(info)?;
        self.record(Box::new(AddTransitionCommand::new(transition, false)));
        Ok(())
    }

    /// A window `transition` may occupy: on an existing track, not empty,
    /// clear of other transitions on its track and inside its anchor clip.
    fn check_transition_window(&self, transition: &Transition, window: &ItemInfo, action: &str) -> Result<()> {
        if window.track >= self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(window.track));
        }
        if window.duration() <= GenTime::ZERO {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot {} {}: the transition has no duration",
                action, window.start_pos
            )));
        }
        if window.start_pos < GenTime::ZERO
            || self.timeline.collides(
                ItemCategory::Transition,
                window.track,
                window.start_pos,
                window.end_pos,
                &[transition.id()],
            )
        {
            return Err(CoreError::Collision(format!("Cannot {} {}", action, window.start_pos)));
        }
        for clip in [transition.reference_clip(), transition.second_clip()].into_iter().flatten() {
            if self.timeline.clip(clip).is_none() {
                return Err(CoreError::UnknownItem(clip));
            }
        }
        if let Some(anchor) = transition
            .reference_clip()
            .filter(|_| transition.is_anchored())
            .and_then(|id| self.timeline.clip(id))
            .map(|c| c.info())
        {
            if window.track != anchor.track || window.start_pos < anchor.start_pos || window.end_pos > anchor.end_pos {
                return Err(CoreError::InvalidOperation(format!(
                    "Cannot {} {}: the transition must stay inside its clip",
                    action, window.start_pos
                )));
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entry points shared with undo/redo
    // -----------------------------------------------------------------------

    pub(crate) fn restore_transition(&mut self, transition: Transition) -> Result<ItemId> {
        let info = transition.info();
        self.check_transition_window(&transition, &info, "add transition at")?;
        let id = transition.id();
        let record = transition.to_record();
        self.timeline.insert_item(TimelineItem::Transition(transition));
        if let Err(e) = self.mirror("adding transition", |r| r.add_transition(&record)) {
            self.timeline.remove_item(id);
            return Err(e);
        }
        tracing::debug!("added transition {} at {} on track {}", id, info.start_pos, info.track);
        Ok(id)
    }

    pub(crate) fn take_transition(&mut self, info: &ItemInfo) -> Result<Transition> {
        let id = self.transition_id_starting_at(info)?;
        let Some(TimelineItem::Transition(transition)) = self.timeline.remove_item(id) else {
            return Err(CoreError::UnknownItem(id));
        };
        let record = transition.to_record();
        if let Err(e) = self.mirror("deleting transition", |r| r.delete_transition(&record)) {
            self.timeline.insert_item(TimelineItem::Transition(transition));
            return Err(e);
        }
        tracing::debug!("removed transition {}", id);
        Ok(transition)
    }

    /// Place the transition starting at `from` on the window `to`. A
    /// transition between two clips follows them and cannot be moved by
    /// itself.
    pub(crate) fn move_transition_item(&mut self, from: &ItemInfo, to: &ItemInfo) -> Result<()> {
        let id = self.transition_id_starting_at(from)?;
        let before = self.transition_ref(id)?.clone();
        if before.second_clip().is_some() {
            return Err(CoreError::InvalidOperation(format!(
                "Cannot move transition at {}: it follows its clips",
                from.start_pos
            )));
        }
        let to = ItemInfo {
            crop_start: GenTime::ZERO,
            ..*to
        };
        self.check_transition_window(&before, &to, "move transition to position")?;

        let previous_video = self.timeline.previous_video_track(to.track);
        let transition = self.transition_mut(id)?;
        transition.geometry_mut().set_info(&to);
        transition.update_transition_end_track(previous_video);
        let (old_record, new_record) = (before.to_record(), transition.to_record());
        if let Err(e) = self.mirror("moving transition", |r| r.move_transition(&old_record, &new_record)) {
            self.replace_transition(before);
            return Err(e);
        }
        tracing::debug!("moved transition {} to {}", id, to.start_pos);
        Ok(())
    }

    /// Apply `properties` to the transition starting at `info`. Returns the
    /// properties it had.
    pub(crate) fn set_transition_properties(
        &mut self,
        info: &ItemInfo,
        properties: &TransitionProperties,
    ) -> Result<TransitionProperties> {
        if let Some(track) = properties.forced_track {
            if track >= self.timeline.track_count() {
                return Err(CoreError::InvalidTrack(track));
            }
        }
        let id = self.transition_id_starting_at(info)?;
        let previous_video = self.timeline.previous_video_track(info.track);
        let before = self.transition_ref(id)?.clone();
        let transition = self.transition_mut(id)?;
        transition.apply_properties(properties);
        transition.update_transition_end_track(previous_video);
        let (old_record, new_record) = (before.to_record(), transition.to_record());
        if let Err(e) = self.mirror("updating transition", |r| r.update_transition(&old_record, &new_record)) {
            self.replace_transition(before);
            return Err(e);
        }
        Ok(before.properties())
    }
}
