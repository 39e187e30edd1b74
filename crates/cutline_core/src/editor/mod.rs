//! The timeline controller.
//!
//! [`TimelineEditor`] owns the model, the renderer handle and the undo
//! history. Every public edit validates against the model, mutates it,
//! mirrors the change to the renderer and records an undoable command. A
//! refused mirror call rolls the model back before the error is returned, so
//! the model and the renderer never drift apart.

mod clips;
mod effects;
mod gestures;
mod space;
#[cfg(test)]
mod testing;
mod transitions;

pub use clips::{Clipboard, ClipboardEntry};
pub use gestures::GesturePreview;

use crate::clip::ClipItem;
use crate::document::{ProjectDocument, TransitionRecord};
use crate::effects::{EffectsList, EffectsParameterList};
use crate::error::{CoreError, Result};
use crate::history::{AddTrackCommand, Command, CommandGroup, EditGuideCommand, History};
use crate::project::TimelineSettings;
use crate::renderer::{MirrorResult, Renderer};
use crate::time::GenTime;
use crate::timeline::{Timeline, TimelineItem};
use crate::transition::Transition;
use crate::types::*;

#[derive(Debug)]
pub struct TimelineEditor {
    timeline: Timeline,
    settings: TimelineSettings,
    renderer: Box<dyn Renderer>,
    history: History,
    gesture: Option<gestures::Gesture>,
    /// Open transactions; commands recorded while non-zero are buffered.
    macro_depth: usize,
    macro_buffer: Vec<Box<dyn Command>>,
    message: Option<String>,
}

impl TimelineEditor {
    /// An editor over an empty timeline with no tracks.
    pub fn new(settings: TimelineSettings, renderer: Box<dyn Renderer>) -> Self {
        let mut timeline = Timeline::new(settings.fps);
        timeline.set_min_duration_frames(settings.minimum_duration_frames);
        Self {
            timeline,
            history: History::new(settings.history_limit),
            settings,
            renderer,
            gesture: None,
            macro_depth: 0,
            macro_buffer: Vec::new(),
            message: None,
        }
    }

    /// An editor over `tracks`, each one mirrored to the renderer.
    pub fn with_tracks(
        settings: TimelineSettings,
        tracks: Vec<TrackInfo>,
        renderer: Box<dyn Renderer>,
    ) -> Result<Self> {
        let mut editor = Self::new(settings, renderer);
        for (index, track) in tracks.into_iter().enumerate() {
            let kind = track.kind;
            editor.mirror("adding track", |r| r.insert_track(index, kind))?;
            editor.timeline.tracks.push(track);
        }
        Ok(editor)
    }

    /// Open a persisted document and hand all of it to the renderer.
    ///
    /// The document's frame rate overrides the one in `settings`.
    pub fn open(doc: &ProjectDocument, settings: TimelineSettings, renderer: Box<dyn Renderer>) -> Result<Self> {
        let mut timeline = Timeline::from_document(doc)?;
        timeline.set_min_duration_frames(settings.minimum_duration_frames);
        let settings = TimelineSettings {
            fps: doc.fps,
            ..settings
        };
        let mut editor = Self::new(settings, renderer);
        for (index, track) in timeline.tracks.iter().enumerate() {
            editor.mirror("adding track", |r| r.insert_track(index, track.kind))?;
        }
        for clip in timeline.clips() {
            let params = clip_params(clip);
            editor.mirror("adding clip", |r| {
                r.insert_clip(&clip.info(), &clip.producer_handle(), &params)
            })?;
        }
        for transition in timeline.transitions() {
            editor.mirror("adding transition", |r| r.add_transition(&transition.to_record()))?;
        }
        tracing::debug!(
            "opened document with {} tracks and {} items",
            timeline.track_count(),
            timeline.items().count()
        );
        editor.timeline = timeline;
        Ok(editor)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn fps(&self) -> f64 {
        self.timeline.fps()
    }

    /// The message of the last aborted operation.
    pub fn last_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn to_document(&self) -> ProjectDocument {
        self.timeline.to_document()
    }

    // -----------------------------------------------------------------------
    // Undo / redo
    // -----------------------------------------------------------------------

    pub fn undo(&mut self) -> Result<()> {
        self.run(|editor| {
            if editor.gesture.is_some() {
                return Err(CoreError::GestureInProgress);
            }
            let cmd = editor.history.pop_undo().ok_or(CoreError::NothingToUndo)?;
            if let Err(e) = cmd.undo(editor) {
                editor.history.restore_undo(cmd);
                return Err(e);
            }
            tracing::debug!("undo: {}", cmd.description());
            editor.history.restore_redo(cmd);
            Ok(())
        })
    }

    pub fn redo(&mut self) -> Result<()> {
        self.run(|editor| {
            if editor.gesture.is_some() {
                return Err(CoreError::GestureInProgress);
            }
            let cmd = editor.history.pop_redo().ok_or(CoreError::NothingToRedo)?;
            if let Err(e) = cmd.execute(editor) {
                editor.history.restore_redo(cmd);
                return Err(e);
            }
            tracing::debug!("redo: {}", cmd.description());
            editor.history.restore_undo(cmd);
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Run `f`, reporting a failure to the user.
    fn run<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = f(self);
        if let Err(e) = &result {
            tracing::warn!("{}", e);
            self.message = Some(e.to_string());
        }
        result
    }

    /// A user-level edit: one transaction, refused while a gesture is open.
    fn edit<T>(&mut self, description: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.run(|editor| {
            if editor.gesture.is_some() {
                return Err(CoreError::GestureInProgress);
            }
            let value = editor.transaction(description, f)?;
            tracing::debug!("{}", description);
            Ok(value)
        })
    }

    /// Group every command recorded by `f` into one history entry. If `f`
    /// fails, the commands it already recorded are undone in reverse.
    fn transaction<T>(&mut self, description: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mark = self.macro_buffer.len();
        self.macro_depth += 1;
        let result = f(self);
        self.macro_depth -= 1;
        let mut commands: Vec<Box<dyn Command>> = self.macro_buffer.drain(mark..).collect();

        match result {
            Ok(value) => {
                let cmd: Option<Box<dyn Command>> = match commands.len() {
                    0 => None,
                    1 => commands.pop(),
                    _ => Some(Box::new(CommandGroup::new(description, commands))),
                };
                if let Some(cmd) = cmd {
                    self.record(cmd);
                }
                Ok(value)
            }
            Err(e) => {
                for cmd in commands.iter().rev() {
                    if let Err(inner) = cmd.undo(self) {
                        tracing::error!("failed to revert {}: {}", cmd.description(), inner);
                    }
                }
                Err(e)
            }
        }
    }

    fn record(&mut self, cmd: Box<dyn Command>) {
        if self.macro_depth > 0 {
            self.macro_buffer.push(cmd);
        } else {
            self.history.push(cmd);
        }
    }

    // -----------------------------------------------------------------------
    // Renderer plumbing
    // -----------------------------------------------------------------------

    fn mirror<T>(
        &mut self,
        action: &'static str,
        call: impl FnOnce(&mut dyn Renderer) -> MirrorResult<T>,
    ) -> Result<T> {
        call(&mut *self.renderer).map_err(|e| CoreError::renderer(action, e))
    }

    /// A mirror call made while already unwinding. Failure is logged only.
    fn compensate(&mut self, action: &'static str, call: impl FnOnce(&mut dyn Renderer) -> MirrorResult<()>) {
        if let Err(e) = call(&mut *self.renderer) {
            tracing::error!("failed to revert {}: {}", action, e);
        }
    }

    /// Take an item out of the renderer (`present == false`) or put it back,
    /// using the item's current placement.
    fn mirror_item(&mut self, id: ItemId, present: bool) -> Result<()> {
        match self.timeline.item(id).cloned() {
            Some(TimelineItem::Clip(clip)) => {
                let info = clip.info();
                if present {
                    let params = clip_params(&clip);
                    self.mirror("adding clip", |r| r.insert_clip(&info, &clip.producer_handle(), &params))
                } else {
                    self.mirror("removing clip", |r| r.remove_clip(info.track, info.start_pos))
                }
            }
            Some(TimelineItem::Transition(t)) => {
                let record = t.to_record();
                if present {
                    self.mirror("adding transition", |r| r.add_transition(&record))
                } else {
                    self.mirror("deleting transition", |r| r.delete_transition(&record))
                }
            }
            None => Err(CoreError::UnknownItem(id)),
        }
    }

    /// Mirror the difference between two effect stacks of the clip at
    /// `start`. Equal lengths become per-effect edits; anything else is a
    /// full restack. A refusal undoes the calls already made.
    fn mirror_effect_stack(
        &mut self,
        track: usize,
        start: GenTime,
        before: &EffectsList,
        after: &EffectsList,
    ) -> Result<()> {
        if before == after {
            return Ok(());
        }
        if before.len() == after.len() {
            let mut edited = Vec::new();
            for (old, new) in before.iter().zip(after.iter()) {
                if old == new {
                    continue;
                }
                let params = EffectsParameterList::from_effect(new);
                if let Err(e) = self.mirror("updating effect", |r| r.edit_effect(track, start, &params)) {
                    for old in edited.iter().rev() {
                        let params = EffectsParameterList::from_effect(old);
                        self.compensate("updating effect", |r| r.edit_effect(track, start, &params));
                    }
                    return Err(e);
                }
                edited.push(old.clone());
            }
            return Ok(());
        }

        for index in (1..=before.len()).rev() {
            if let Err(e) = self.mirror("removing effect", |r| r.remove_effect(track, start, index)) {
                for effect in before.iter().skip(index) {
                    let params = EffectsParameterList::from_effect(effect);
                    self.compensate("removing effect", |r| r.add_effect(track, start, &params));
                }
                return Err(e);
            }
        }
        for (added, effect) in after.iter().enumerate() {
            let params = EffectsParameterList::from_effect(effect);
            if let Err(e) = self.mirror("adding effect", |r| r.add_effect(track, start, &params)) {
                for index in (1..=added).rev() {
                    self.compensate("adding effect", |r| r.remove_effect(track, start, index));
                }
                for effect in before.iter() {
                    let params = EffectsParameterList::from_effect(effect);
                    self.compensate("adding effect", |r| r.add_effect(track, start, &params));
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn transition_records(&self) -> Vec<(ItemId, TransitionRecord)> {
        self.timeline
            .transitions()
            .map(|t| (t.id(), t.to_record()))
            .collect()
    }

    /// Push every transition whose record differs from `known` to the
    /// renderer. A refusal reverts the updates already sent.
    fn mirror_transition_updates(&mut self, known: &[(ItemId, TransitionRecord)]) -> Result<()> {
        let mut sent: Vec<(TransitionRecord, TransitionRecord)> = Vec::new();
        for (id, old) in known {
            let Some(new) = self.timeline.transition(*id).map(Transition::to_record) else {
                continue;
            };
            if &new == old {
                continue;
            }
            if let Err(e) = self.mirror("updating transition", |r| r.update_transition(old, &new)) {
                for (old, new) in sent.iter().rev() {
                    self.compensate("updating transition", |r| r.update_transition(new, old));
                }
                return Err(e);
            }
            sent.push((old.clone(), new));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// The track exists and accepts edits.
    fn check_track(&self, track: usize) -> Result<()> {
        if track >= self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(track));
        }
        if self.timeline.is_track_locked(track) {
            return Err(CoreError::TrackLocked(track));
        }
        Ok(())
    }

    fn not_found(&self, what: &'static str, track: usize, time: GenTime) -> CoreError {
        CoreError::ItemNotFound {
            what,
            track,
            frame: time.frames(self.fps()),
        }
    }

    /// Clip on `track` covering `time`.
    fn clip_id_at(&self, track: usize, time: GenTime) -> Result<ItemId> {
        self.timeline
            .clip_at(track, time)
            .map(ClipItem::id)
            .ok_or_else(|| self.not_found("clip", track, time))
    }

    /// Clip placed exactly at `info`'s track and start.
    fn clip_id_starting_at(&self, info: &ItemInfo) -> Result<ItemId> {
        self.timeline
            .item_starting_at(ItemCategory::Clip, info.track, info.start_pos)
            .ok_or_else(|| self.not_found("clip", info.track, info.start_pos))
    }

    fn transition_id_starting_at(&self, info: &ItemInfo) -> Result<ItemId> {
        self.timeline
            .item_starting_at(ItemCategory::Transition, info.track, info.start_pos)
            .ok_or_else(|| self.not_found("transition", info.track, info.start_pos))
    }

    fn clip_ref(&self, id: ItemId) -> Result<&ClipItem> {
        self.timeline.clip(id).ok_or(CoreError::UnknownItem(id))
    }

    fn clip_mut(&mut self, id: ItemId) -> Result<&mut ClipItem> {
        self.timeline.clip_mut(id).ok_or(CoreError::UnknownItem(id))
    }

    fn transition_ref(&self, id: ItemId) -> Result<&Transition> {
        self.timeline.transition(id).ok_or(CoreError::UnknownItem(id))
    }

    fn transition_mut(&mut self, id: ItemId) -> Result<&mut Transition> {
        self.timeline.transition_mut(id).ok_or(CoreError::UnknownItem(id))
    }

    /// Put a saved copy of a clip back in place.
    fn replace_clip(&mut self, clip: ClipItem) {
        if let Some(slot) = self.timeline.clip_mut(clip.id()) {
            *slot = clip;
        }
    }

    fn replace_transition(&mut self, transition: Transition) {
        if let Some(slot) = self.timeline.transition_mut(transition.id()) {
            *slot = transition;
        }
    }

    // -----------------------------------------------------------------------
    // Tracks
    // -----------------------------------------------------------------------

    /// Insert a track at `index`; items on tracks at or above it move up.
    pub fn add_track(&mut self, index: usize, info: TrackInfo) -> Result<()> {
        self.edit("Add track", |editor| {
            editor.insert_track_at(index, info.clone())?;
            editor.record(Box::new(AddTrackCommand::new(index, info, true)));
            Ok(())
        })
    }

    /// Delete a track along with everything on it.
    pub fn remove_track(&mut self, index: usize) -> Result<()> {
        self.edit("Delete track", |editor| {
            editor.check_track(index)?;
            let clips: Vec<ItemId> = editor
                .timeline
                .clips()
                .filter(|c| c.info().track == index)
                .map(ClipItem::id)
                .collect();
            for id in clips {
                editor.delete_clip_recorded(id)?;
            }
            let transitions: Vec<ItemInfo> = editor
                .timeline
                .transitions()
                .filter(|t| t.info().track == index)
                .map(Transition::info)
                .collect();
            for info in transitions {
                editor.delete_transition_recorded(&info)?;
            }
            let info = editor.take_track(index)?;
            editor.record(Box::new(AddTrackCommand::new(index, info, false)));
            Ok(())
        })
    }

    /// Lock or unlock a track. Not an undoable edit.
    pub fn set_track_locked(&mut self, index: usize, locked: bool) -> Result<()> {
        self.run(|editor| {
            let track = editor
                .timeline
                .tracks
                .get_mut(index)
                .ok_or(CoreError::InvalidTrack(index))?;
            track.locked = locked;
            Ok(())
        })
    }

    pub(crate) fn insert_track_at(&mut self, index: usize, info: TrackInfo) -> Result<()> {
        if index > self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(index));
        }
        let kind = info.kind;
        let saved = self.timeline.clone();
        self.timeline.tracks.insert(index, info);
        self.timeline.shift_tracks(index, true);
        // the renderer shifts end tracks the same way on its side
        let shifted = self.transition_records();
        if let Err(e) = self.mirror("adding track", |r| r.insert_track(index, kind)) {
            self.timeline = saved;
            return Err(e);
        }
        self.timeline.refresh_transition_end_tracks();
        if let Err(e) = self.mirror_transition_updates(&shifted) {
            self.compensate("adding track", |r| r.remove_track(index));
            self.timeline = saved;
            return Err(e);
        }
        tracing::debug!("inserted {:?} track at {}", kind, index);
        Ok(())
    }

    pub(crate) fn take_track(&mut self, index: usize) -> Result<TrackInfo> {
        if index >= self.timeline.track_count() {
            return Err(CoreError::InvalidTrack(index));
        }
        if self.timeline.items().any(|i| i.info().track == index) {
            return Err(CoreError::InvalidOperation(format!("Track {} is not empty", index)));
        }
        let saved = self.timeline.clone();
        let info = self.timeline.tracks.remove(index);
        self.timeline.shift_tracks(index + 1, false);
        let shifted = self.transition_records();
        if let Err(e) = self.mirror("deleting track", |r| r.remove_track(index)) {
            self.timeline = saved;
            return Err(e);
        }
        self.timeline.refresh_transition_end_tracks();
        if let Err(e) = self.mirror_transition_updates(&shifted) {
            let kind = info.kind;
            self.compensate("deleting track", |r| r.insert_track(index, kind));
            self.timeline = saved;
            return Err(e);
        }
        tracing::debug!("removed track {}", index);
        Ok(info)
    }

    // -----------------------------------------------------------------------
    // Guides
    // -----------------------------------------------------------------------

    pub fn add_guide(&mut self, time: GenTime, comment: impl Into<String>) -> Result<()> {
        let guide = Guide {
            time,
            comment: comment.into(),
        };
        self.edit("Add guide", |editor| {
            editor.replace_guide(None, Some(&guide))?;
            editor.record(Box::new(EditGuideCommand::new(None, Some(guide))));
            Ok(())
        })
    }

    /// Move and rename the guide at `time`.
    pub fn edit_guide(&mut self, time: GenTime, new_time: GenTime, comment: impl Into<String>) -> Result<()> {
        let comment = comment.into();
        self.edit("Edit guide", |editor| {
            let old = editor.guide_at(time)?;
            let new = Guide {
                time: new_time,
                comment,
            };
            editor.replace_guide(Some(&old), Some(&new))?;
            editor.record(Box::new(EditGuideCommand::new(Some(old), Some(new))));
            Ok(())
        })
    }

    pub fn delete_guide(&mut self, time: GenTime) -> Result<()> {
        self.edit("Delete guide", |editor| {
            let old = editor.guide_at(time)?;
            editor.replace_guide(Some(&old), None)?;
            editor.record(Box::new(EditGuideCommand::new(Some(old), None)));
            Ok(())
        })
    }

    fn guide_at(&self, time: GenTime) -> Result<Guide> {
        self.timeline
            .guides
            .iter()
            .find(|g| g.time == time)
            .cloned()
            .ok_or_else(|| CoreError::InvalidOperation(format!("No guide at {}", time)))
    }

    pub(crate) fn replace_guide(&mut self, old: Option<&Guide>, new: Option<&Guide>) -> Result<()> {
        if let Some(old) = old {
            let pos = self
                .timeline
                .guides
                .iter()
                .position(|g| g == old)
                .ok_or_else(|| CoreError::InvalidOperation(format!("No guide at {}", old.time)))?;
            self.timeline.guides.remove(pos);
        }
        if let Some(new) = new {
            let pos = self.timeline.guides.partition_point(|g| g.time <= new.time);
            self.timeline.guides.insert(pos, new.clone());
        }
        Ok(())
    }
}

/// Renderer parameters for every effect on `clip`, in stack order.
fn clip_params(clip: &ClipItem) -> Vec<EffectsParameterList> {
    clip.effects()
        .iter()
        .map(EffectsParameterList::from_effect)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::renderer::{MirrorCall, RecordingRenderer};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn undo_on_empty_history_reports() {
        let (mut editor, _) = editor();
        assert!(matches!(editor.undo(), Err(CoreError::NothingToUndo)));
        assert_eq!(editor.last_message(), Some("Nothing to undo"));
        assert!(matches!(editor.redo(), Err(CoreError::NothingToRedo)));
    }

    #[test]
    fn history_limit_comes_from_settings() {
        let recorder = Rc::new(RefCell::new(RecordingRenderer::new(FPS)));
        let settings = TimelineSettings {
            history_limit: 2,
            ..crate::project::preset_pal()
        };
        let mut editor =
            TimelineEditor::with_tracks(settings, vec![TrackInfo::video("V1")], Box::new(recorder)).unwrap();
        for guide in 0..4 {
            editor.add_guide(secs(guide as f64), "g").unwrap();
        }
        assert_eq!(editor.history().undo_len(), 2);
    }

    #[test]
    fn add_and_remove_track_shift_items() {
        let (mut editor, recorder) = editor();
        let id = add_clip(&mut editor, 0.0, 5.0, 1);
        editor.add_track(0, TrackInfo::audio("A1")).unwrap();
        assert_eq!(editor.timeline().track_count(), 4);
        assert_eq!(editor.timeline().clip(id).unwrap().info().track, 2);
        assert!(recorder.borrow().calls().contains(&MirrorCall::InsertTrack { index: 0 }));

        editor.undo().unwrap();
        assert_eq!(editor.timeline().track_count(), 3);
        assert_eq!(editor.timeline().clip(id).unwrap().info().track, 1);
    }

    #[test]
    fn remove_track_is_one_undo_step() {
        let (mut editor, _) = editor();
        let id = add_clip(&mut editor, 0.0, 5.0, 1);
        let before = editor.history().undo_len();
        editor.remove_track(1).unwrap();
        assert_eq!(editor.timeline().track_count(), 2);
        assert!(editor.timeline().clip(id).is_none());
        assert_eq!(editor.history().undo_len(), before + 1);

        editor.undo().unwrap();
        assert_eq!(editor.timeline().track_count(), 3);
        assert_eq!(editor.timeline().clip(id).unwrap().info().track, 1);
    }

    #[test]
    fn refused_track_insert_leaves_layout() {
        let (mut editor, recorder) = editor();
        recorder.borrow_mut().fail_next("insert_track");
        assert!(editor.add_track(1, TrackInfo::video("V4")).is_err());
        assert_eq!(editor.timeline().track_count(), 3);
        assert!(!editor.history().can_undo());
        assert!(editor.last_message().unwrap().starts_with("Error when adding track"));
    }

    #[test]
    fn locked_track_rejects_edits() {
        let (mut editor, recorder) = editor();
        add_clip(&mut editor, 0.0, 5.0, 0);
        editor.set_track_locked(0, true).unwrap();
        recorder.borrow_mut().clear();
        let err = editor.move_clip(0, secs(1.0), 0, secs(10.0)).unwrap_err();
        assert!(matches!(err, CoreError::TrackLocked(0)));
        assert!(recorder.borrow().calls().is_empty());
    }

    #[test]
    fn guides_stay_sorted_and_undo() {
        let (mut editor, _) = editor();
        editor.add_guide(secs(10.0), "chorus").unwrap();
        editor.add_guide(secs(2.0), "intro").unwrap();
        let times: Vec<GenTime> = editor.timeline().guides.iter().map(|g| g.time).collect();
        assert_eq!(times, vec![secs(2.0), secs(10.0)]);

        editor.edit_guide(secs(2.0), secs(12.0), "outro").unwrap();
        assert_eq!(editor.timeline().guides[1].comment, "outro");
        editor.undo().unwrap();
        assert_eq!(editor.timeline().guides[0].comment, "intro");

        editor.delete_guide(secs(10.0)).unwrap();
        assert_eq!(editor.timeline().guides.len(), 1);
        assert!(editor.delete_guide(secs(10.0)).is_err());
    }

    #[test]
    fn open_mirrors_the_document() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 0.0, 5.0, 0);
        add_clip(&mut editor, 5.0, 8.0, 1);
        let doc = editor.to_document();

        let recorder = Rc::new(RefCell::new(RecordingRenderer::new(FPS)));
        let reopened =
            TimelineEditor::open(&doc, crate::project::preset_film(), Box::new(recorder.clone())).unwrap();
        assert_eq!(reopened.fps(), FPS);
        assert_eq!(reopened.timeline().clips().count(), 2);
        assert_eq!(recorder.borrow().count("insert_track"), 3);
        assert_eq!(recorder.borrow().count("insert_clip"), 2);
        assert!(!reopened.history().can_undo());
    }
}
