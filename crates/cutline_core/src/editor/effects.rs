use super::TimelineEditor;
use crate::clip::ClipItem;
use crate::effects::{EffectRecord, EffectsList, ParamValue};
use crate::error::{CoreError, Result};
use crate::history::{
    AddEffectCommand, ChangeEffectStateCommand, EditEffectCommand, EditKeyframeCommand, MoveEffectCommand,
};
use crate::keyframes::Keyframes;
use crate::time::GenTime;

impl TimelineEditor {
    // -----------------------------------------------------------------------
    // Effect edits
    // -----------------------------------------------------------------------

    /// Attach an effect to the clip covering `time`. A non-zero
    /// `record.index` inserts at that stack position; otherwise the effect
    /// is appended. Returns the 1-based index it landed at.
    pub fn add_effect(&mut self, track: usize, time: GenTime, record: EffectRecord) -> Result<usize> {
        self.edit("Add effect", |editor| {
            editor.check_track(track)?;
            let id = editor.clip_id_at(track, time)?;
            let clip = editor.clip_ref(id)?;
            let start = clip.info().start_pos;
            let offset = clip.geometry().frames(clip.geometry().crop_start());
            let effect = clip.init_effect(&record, 0, offset);
            editor.add_effect_recorded(track, start, effect)
        })
    }

    pub fn delete_effect(&mut self, track: usize, time: GenTime, index: usize) -> Result<()> {
        self.edit("Delete effect", |editor| {
            editor.check_track(track)?;
            let start = editor.clip_start_at(track, time)?;
            let effect = editor.take_effect(track, start, index)?;
            editor.record(Box::new(AddEffectCommand::new(track, start, effect, false)));
            Ok(())
        })
    }

    /// Replace the effect at `record.index` with `record`.
    pub fn edit_effect(&mut self, track: usize, time: GenTime, record: EffectRecord) -> Result<()> {
        self.edit("Edit effect", |editor| {
            editor.check_track(track)?;
            let start = editor.clip_start_at(track, time)?;
            editor.edit_effect_recorded(track, start, record)
        })
    }

    /// Move the effect at `from` to stack position `to`.
    pub fn move_effect(&mut self, track: usize, time: GenTime, from: usize, to: usize) -> Result<()> {
        self.edit("Move effect", |editor| {
            editor.check_track(track)?;
            let start = editor.clip_start_at(track, time)?;
            if from == to {
                return Ok(());
            }
            editor.reorder_effect(track, start, from, to)?;
            editor.record(Box::new(MoveEffectCommand::new(track, start, from, to)));
            Ok(())
        })
    }

    /// Disable (or re-enable) the effects at `indexes` as one step.
    pub fn enable_effects(&mut self, track: usize, time: GenTime, indexes: &[usize], disable: bool) -> Result<()> {
        let description = if disable { "Disable effects" } else { "Enable effects" };
        self.edit(description, |editor| {
            editor.check_track(track)?;
            let start = editor.clip_start_at(track, time)?;
            let previous = editor.set_effects_disabled(track, start, indexes, disable)?;
            editor.record(Box::new(ChangeEffectStateCommand::new(
                track,
                start,
                indexes.to_vec(),
                disable,
                previous,
            )));
            Ok(())
        })
    }

    /// Replace the keyframes of `param` in the effect at `index`.
    pub fn edit_keyframes(
        &mut self,
        track: usize,
        time: GenTime,
        index: usize,
        param: &str,
        keys: Keyframes,
    ) -> Result<()> {
        self.edit("Edit keyframes", |editor| {
            editor.check_track(track)?;
            let start = editor.clip_start_at(track, time)?;
            let old = editor.replace_keyframes(track, start, index, param, keys.clone())?;
            if old != keys {
                editor.record(Box::new(EditKeyframeCommand::new(
                    track,
                    start,
                    index,
                    param,
                    old.to_string(),
                    keys.to_string(),
                )));
            }
            Ok(())
        })
    }

    /// Set the fade-in to `length` frames; zero removes it.
    pub fn set_fade_in(&mut self, track: usize, time: GenTime, length: i64) -> Result<()> {
        self.edit("Fade in", |editor| editor.set_fade(track, time, length, true))
    }

    /// Set the fade-out to `length` frames; zero removes it.
    pub fn set_fade_out(&mut self, track: usize, time: GenTime, length: i64) -> Result<()> {
        self.edit("Fade out", |editor| editor.set_fade(track, time, length, false))
    }

    /// Append copies of `from`'s effects to the clip covering `time`,
    /// re-anchoring keyframes from `from`'s crop window onto the target's.
    pub fn paste_effects(&mut self, track: usize, time: GenTime, from: &ClipItem) -> Result<()> {
        self.edit("Paste effects", |editor| {
            editor.check_track(track)?;
            let id = editor.clip_id_at(track, time)?;
            let target = editor.clip_ref(id)?;
            let start = target.info().start_pos;
            let offset = from.geometry().frames(from.geometry().crop_start());
            let effects: Vec<EffectRecord> = from
                .effects()
                .iter()
                .map(|e| {
                    let mut effect = target.init_effect(e, 0, offset);
                    effect.index = 0;
                    effect
                })
                .collect();
            for effect in effects {
                editor.add_effect_recorded(track, start, effect)?;
            }
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Recorded building blocks
    // -----------------------------------------------------------------------

    fn clip_start_at(&self, track: usize, time: GenTime) -> Result<GenTime> {
        let id = self.clip_id_at(track, time)?;
        Ok(self.clip_ref(id)?.info().start_pos)
    }

    fn add_effect_recorded(&mut self, track: usize, start: GenTime, effect: EffectRecord) -> Result<usize> {
        let index = self.insert_effect(track, start, effect)?;
        let id = self.clip_id_at(track, start)?;
        let stored = self
            .clip_ref(id)?
            .effect_at(index)
            .cloned()
            .ok_or_else(|| no_effect(index))?;
        self.record(Box::new(AddEffectCommand::new(track, start, stored, true)));
        Ok(index)
    }

    fn edit_effect_recorded(&mut self, track: usize, start: GenTime, record: EffectRecord) -> Result<()> {
        let index = record.index;
        let old = self.replace_effect(track, start, record)?;
        let id = self.clip_id_at(track, start)?;
        let new = self
            .clip_ref(id)?
            .effect_at(index)
            .cloned()
            .ok_or_else(|| no_effect(index))?;
        if old != new {
            self.record(Box::new(EditEffectCommand::new(track, start, old, new)));
        }
        Ok(())
    }

    fn set_fade(&mut self, track: usize, time: GenTime, length: i64, fade_in: bool) -> Result<()> {
        self.check_track(track)?;
        let id = self.clip_id_at(track, time)?;
        let clip = self.clip_ref(id)?;
        let start = clip.info().start_pos;
        let crop_start = clip.geometry().frames(clip.geometry().crop_start());
        let duration = clip.geometry().frames(clip.geometry().crop_duration());
        let length = length.clamp(0, duration);
        let existing = clip
            .effects()
            .iter()
            .find(|e| if fade_in { e.is_fade_in() } else { e.is_fade_out() })
            .cloned();
        let end = crop_start + duration - 1;

        match existing {
            Some(effect) if length == 0 => {
                let removed = self.take_effect(track, start, effect.index)?;
                self.record(Box::new(AddEffectCommand::new(track, start, removed, false)));
            }
            Some(effect) => {
                let mut updated = effect.clone();
                if fade_in {
                    updated.set_scalar("in", crop_start as f64);
                    updated.set_scalar("out", (crop_start + length) as f64);
                } else {
                    updated.set_scalar("in", (end - length) as f64);
                    updated.set_scalar("out", end as f64);
                }
                if updated != effect {
                    self.edit_effect_recorded(track, start, updated)?;
                }
            }
            None if length > 0 => {
                let effect = if fade_in {
                    EffectRecord::fade_in(crop_start, length)
                } else {
                    EffectRecord::fade_out(end, length)
                };
                self.add_effect_recorded(track, start, effect)?;
            }
            None => {}
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entry points shared with undo/redo
    // -----------------------------------------------------------------------

    pub(crate) fn insert_effect(&mut self, track: usize, start: GenTime, effect: EffectRecord) -> Result<usize> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let params = clip.add_effect(effect);
        let index = params.index().unwrap_or(clip.effects().len());
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror("adding effect", |r| r.add_effect(track, start, &params)) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        tracing::debug!("added effect {} to clip {}", index, id);
        Ok(index)
    }

    pub(crate) fn take_effect(&mut self, track: usize, start: GenTime, index: usize) -> Result<EffectRecord> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let removed = clip.delete_effect(index).ok_or_else(|| no_effect(index))?;
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror("removing effect", |r| r.remove_effect(track, start, index)) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        tracing::debug!("removed effect {} from clip {}", index, id);
        Ok(removed)
    }

    /// Replace the effect at `effect.index`. Returns the previous record.
    pub(crate) fn replace_effect(&mut self, track: usize, start: GenTime, effect: EffectRecord) -> Result<EffectRecord> {
        let id = self.clip_id_at(track, start)?;
        let index = effect.index;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let old = clip.effect_at(index).cloned().ok_or_else(|| no_effect(index))?;
        let params = clip.update_effect(effect).ok_or_else(|| no_effect(index))?;
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror("updating effect", |r| r.edit_effect(track, start, &params)) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        Ok(old)
    }

    pub(crate) fn reorder_effect(&mut self, track: usize, start: GenTime, from: usize, to: usize) -> Result<()> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        if !clip.move_effect(from, to) {
            return Err(CoreError::InvalidOperation(format!("Cannot move effect {} to {}", from, to)));
        }
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror("moving effect", |r| r.move_effect(track, start, from, to)) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        Ok(())
    }

    /// Set the disabled flag of every effect in `indexes`. Returns the flags
    /// they had before, in the same order.
    pub(crate) fn set_effects_disabled(
        &mut self,
        track: usize,
        start: GenTime,
        indexes: &[usize],
        disable: bool,
    ) -> Result<Vec<bool>> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        let previous = indexes
            .iter()
            .map(|ix| clip.effect_at(*ix).map(|e| e.disabled).ok_or_else(|| no_effect(*ix)))
            .collect::<Result<Vec<bool>>>()?;
        clip.enable_effects(indexes, disable);
        let after = clip.effects().clone();
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror_effect_stack(track, start, snapshot.effects(), &after) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        Ok(previous)
    }

    /// Replace the keyframes of `param` in the effect at `index`. Returns the
    /// previous keyframes.
    pub(crate) fn replace_keyframes(
        &mut self,
        track: usize,
        start: GenTime,
        index: usize,
        param: &str,
        keys: Keyframes,
    ) -> Result<Keyframes> {
        let id = self.clip_id_at(track, start)?;
        let mut effect = self
            .clip_ref(id)?
            .effect_at(index)
            .cloned()
            .ok_or_else(|| no_effect(index))?;
        let old = match effect.param_mut(param).map(|p| &mut p.value) {
            Some(ParamValue::Keyframes(current)) => std::mem::replace(current, keys),
            _ => {
                return Err(CoreError::InvalidOperation(format!(
                    "Effect {} has no keyframed parameter {}",
                    index, param
                )))
            }
        };
        self.replace_effect(track, start, effect)?;
        Ok(old)
    }

    /// Give the clip at `start` a whole new effect stack. Returns the stack
    /// it had.
    pub(crate) fn replace_effect_stack(
        &mut self,
        track: usize,
        start: GenTime,
        effects: &EffectsList,
    ) -> Result<EffectsList> {
        let id = self.clip_id_at(track, start)?;
        let clip = self.clip_mut(id)?;
        let snapshot = clip.clone();
        clip.set_effect_list(effects);
        let after = clip.effects().clone();
        let start = clip.info().start_pos;
        if let Err(e) = self.mirror_effect_stack(track, start, snapshot.effects(), &after) {
            self.replace_clip(snapshot);
            return Err(e);
        }
        Ok(snapshot.effects().clone())
    }
}

fn no_effect(index: usize) -> CoreError {
    CoreError::InvalidOperation(format!("No effect at index {}", index))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::effects::EffectParameter;
    use crate::renderer::MirrorCall;
    use crate::types::ItemInfo;

    fn sepia() -> EffectRecord {
        EffectRecord::new("filter", "sepia").with_param(EffectParameter::scalar("u", 75.0))
    }

    fn blur() -> EffectRecord {
        EffectRecord::new("filter", "boxblur").with_param(EffectParameter::scalar("hori", 2.0))
    }

    #[test]
    fn add_effect_appends_and_mirrors() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 2.0, 6.0, 0);
        recorder.borrow_mut().clear();

        assert_eq!(editor.add_effect(0, secs(3.0), sepia()).unwrap(), 1);
        assert_eq!(editor.add_effect(0, secs(3.0), blur()).unwrap(), 2);
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.effect_names(), &["sepia".to_string(), "boxblur".to_string()]);
        assert_eq!(
            recorder.borrow().calls()[0],
            MirrorCall::AddEffect {
                track: 0,
                start: 50,
                index: Some(1)
            }
        );

        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effects().len(), 1);
    }

    #[test]
    fn delete_effect_undo_restores_position() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 5.0, 0);
        editor.add_effect(0, secs(1.0), sepia()).unwrap();
        editor.add_effect(0, secs(1.0), blur()).unwrap();

        editor.delete_effect(0, secs(1.0), 1).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().id, "boxblur");

        editor.undo().unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.effect_at(1).unwrap().id, "sepia");
        assert_eq!(clip.effect_at(2).unwrap().id, "boxblur");
    }

    #[test]
    fn refused_effect_edit_keeps_old_value() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 5.0, 0);
        editor.add_effect(0, secs(1.0), sepia()).unwrap();
        let mut edited = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().clone();
        edited.set_scalar("u", 10.0);

        recorder.borrow_mut().fail_next("edit_effect");
        assert!(editor.edit_effect(0, secs(1.0), edited.clone()).is_err());
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().scalar("u"), Some(75.0));

        editor.edit_effect(0, secs(1.0), edited).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().scalar("u"), Some(10.0));
        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().scalar("u"), Some(75.0));
    }

    #[test]
    fn move_and_disable_effects() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 5.0, 0);
        editor.add_effect(0, secs(1.0), sepia()).unwrap();
        editor.add_effect(0, secs(1.0), blur()).unwrap();

        editor.move_effect(0, secs(1.0), 2, 1).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().id, "boxblur");
        assert!(editor.move_effect(0, secs(1.0), 1, 5).is_err());

        editor.enable_effects(0, secs(1.0), &[1, 2], true).unwrap();
        assert!(editor.timeline().clip(a).unwrap().effects().iter().all(|e| e.disabled));
        editor.undo().unwrap();
        assert!(editor.timeline().clip(a).unwrap().effects().iter().all(|e| !e.disabled));
        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().id, "sepia");
    }

    #[test]
    fn keyframe_edit_round_trips_through_history() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        let volume = EffectRecord::new("filter", "volume").with_param(EffectParameter::keyframes("gain", Keyframes::new()));
        editor.add_effect(0, secs(1.0), volume).unwrap();
        // an empty parameter is seeded at the crop start
        let seeded = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().keyframes("gain").cloned().unwrap();
        assert_eq!(seeded.len(), 1);

        let keys = Keyframes::from_points([(0, 20.0), (50, 80.0)]);
        editor.edit_keyframes(0, secs(1.0), 1, "gain", keys.clone()).unwrap();
        let effect = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().clone();
        assert_eq!(effect.keyframes("gain"), Some(&keys));

        editor.undo().unwrap();
        let effect = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().clone();
        assert_eq!(effect.keyframes("gain"), Some(&seeded));
        assert!(editor.edit_keyframes(0, secs(1.0), 1, "missing", keys).is_err());
    }

    #[test]
    fn fade_length_zero_removes_the_fade() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        editor.set_fade_in(0, secs(1.0), 20).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().fade_in(), 20);

        editor.set_fade_in(0, secs(1.0), 30).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().fade_in(), 30);
        assert_eq!(editor.timeline().clip(a).unwrap().effects().len(), 1);

        editor.set_fade_in(0, secs(1.0), 0).unwrap();
        assert!(editor.timeline().clip(a).unwrap().effects().is_empty());
        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().fade_in(), 30);
    }

    #[test]
    fn fade_out_is_capped_by_the_clip() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        editor.set_fade_out(0, secs(1.0), 500).unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.fade_out(), 50);
        assert_eq!(clip.effect_at(1).unwrap().scalar("out"), Some(49.0));
    }

    #[test]
    fn paste_effects_reanchors_keyframes() {
        let (mut editor, _) = editor();
        let a = editor
            .add_clip(source(), ItemInfo::new(secs(0.0), secs(4.0), secs(2.0), 0), &[])
            .unwrap();
        let keys = Keyframes::from_points([(50, 0.0), (60, 100.0)]);
        let volume = EffectRecord::new("filter", "volume").with_param(EffectParameter::keyframes("gain", keys));
        editor.add_effect(0, secs(1.0), volume).unwrap();
        let b = add_clip(&mut editor, 10.0, 14.0, 0);

        let from = editor.timeline().clip(a).unwrap().clone();
        editor.paste_effects(0, secs(11.0), &from).unwrap();
        let pasted = editor.timeline().clip(b).unwrap().effect_at(1).unwrap().clone();
        assert_eq!(pasted.keyframes("gain").unwrap().first(), Some((0, 0.0)));
        assert_eq!(pasted.keyframes("gain").unwrap().last(), Some((10, 100.0)));
    }

    #[test]
    fn replayed_effect_add_lands_at_same_index() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 5.0, 0);
        editor.add_effect(0, secs(1.0), sepia()).unwrap();
        editor.add_effect(0, secs(1.0), blur().with_index(1)).unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().effect_at(1).unwrap().id, "boxblur");
        editor.undo().unwrap();
        editor.redo().unwrap();
        let clip = editor.timeline().clip(a).unwrap();
        assert_eq!(clip.effect_at(1).unwrap().id, "boxblur");
        assert_eq!(clip.effect_at(2).unwrap().id, "sepia");
    }
}
