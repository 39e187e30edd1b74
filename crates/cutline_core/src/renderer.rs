use crate::document::TransitionRecord;
use crate::effects::EffectsParameterList;
use crate::time::GenTime;
use crate::types::{ItemInfo, TrackKind};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Rejection from the render engine, with its own explanation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct MirrorError(pub String);

pub type MirrorResult<T> = std::result::Result<T, MirrorError>;

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// The render engine's copy of the timeline.
///
/// Every structural change the editor makes to its own model is mirrored
/// here right after. A call may refuse; the engine is then assumed unchanged
/// and the editor rolls its model back. Tracks and start positions address
/// clips; effects are addressed by their 1-based stack index.
pub trait Renderer: std::fmt::Debug {
    fn insert_clip(&mut self, info: &ItemInfo, producer: &str, effects: &[EffectsParameterList]) -> MirrorResult<()>;

    fn remove_clip(&mut self, track: usize, start: GenTime) -> MirrorResult<()>;

    fn move_clip(
        &mut self,
        old_track: usize,
        new_track: usize,
        old_start_frame: i64,
        new_start_frame: i64,
        producer: &str,
    ) -> MirrorResult<()>;

    /// Move the start edge of the clip at `info` by `delta`.
    fn resize_clip_start(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()>;

    /// Move the end edge of the clip at `info` by `delta`.
    fn resize_clip_end(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()>;

    /// Split the clip covering `time` in two, both keeping its filters.
    fn cut_clip(&mut self, track: usize, time: GenTime) -> MirrorResult<()>;

    /// Returns the clip's new end frame, which may differ from what the
    /// editor computed because of the engine's own rounding.
    fn change_clip_speed(
        &mut self,
        info: &ItemInfo,
        new_speed: f64,
        old_speed: f64,
        strobe: u32,
        producer: &str,
    ) -> MirrorResult<i64>;

    fn add_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()>;

    fn delete_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()>;

    fn move_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()>;

    fn update_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()>;

    fn add_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()>;

    /// Replace the effect whose `kdenlive_ix` matches `params`.
    fn edit_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()>;

    fn remove_effect(&mut self, track: usize, start: GenTime, index: usize) -> MirrorResult<()>;

    fn move_effect(&mut self, track: usize, start: GenTime, old_index: usize, new_index: usize) -> MirrorResult<()>;

    /// Insert (positive `duration`) or remove (negative) blank space at
    /// `time` on one track or, with `None`, on every track.
    fn insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> MirrorResult<()>;

    fn insert_track(&mut self, index: usize, kind: TrackKind) -> MirrorResult<()>;

    fn remove_track(&mut self, index: usize) -> MirrorResult<()>;
}

/// A shared renderer, so a caller can keep a handle and inspect it while the
/// editor owns the other.
impl<R: Renderer> Renderer for Rc<RefCell<R>> {
    fn insert_clip(&mut self, info: &ItemInfo, producer: &str, effects: &[EffectsParameterList]) -> MirrorResult<()> {
        self.borrow_mut().insert_clip(info, producer, effects)
    }

    fn remove_clip(&mut self, track: usize, start: GenTime) -> MirrorResult<()> {
        self.borrow_mut().remove_clip(track, start)
    }

    fn move_clip(
        &mut self,
        old_track: usize,
        new_track: usize,
        old_start_frame: i64,
        new_start_frame: i64,
        producer: &str,
    ) -> MirrorResult<()> {
        self.borrow_mut()
            .move_clip(old_track, new_track, old_start_frame, new_start_frame, producer)
    }

    fn resize_clip_start(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        self.borrow_mut().resize_clip_start(info, delta)
    }

    fn resize_clip_end(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        self.borrow_mut().resize_clip_end(info, delta)
    }

    fn cut_clip(&mut self, track: usize, time: GenTime) -> MirrorResult<()> {
        self.borrow_mut().cut_clip(track, time)
    }

    fn change_clip_speed(
        &mut self,
        info: &ItemInfo,
        new_speed: f64,
        old_speed: f64,
        strobe: u32,
        producer: &str,
    ) -> MirrorResult<i64> {
        self.borrow_mut()
            .change_clip_speed(info, new_speed, old_speed, strobe, producer)
    }

    fn add_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        self.borrow_mut().add_transition(transition)
    }

    fn delete_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        self.borrow_mut().delete_transition(transition)
    }

    fn move_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()> {
        self.borrow_mut().move_transition(old, new)
    }

    fn update_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()> {
        self.borrow_mut().update_transition(old, new)
    }

    fn add_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        self.borrow_mut().add_effect(track, start, params)
    }

    fn edit_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        self.borrow_mut().edit_effect(track, start, params)
    }

    fn remove_effect(&mut self, track: usize, start: GenTime, index: usize) -> MirrorResult<()> {
        self.borrow_mut().remove_effect(track, start, index)
    }

    fn move_effect(&mut self, track: usize, start: GenTime, old_index: usize, new_index: usize) -> MirrorResult<()> {
        self.borrow_mut().move_effect(track, start, old_index, new_index)
    }

    fn insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> MirrorResult<()> {
        self.borrow_mut().insert_space(time, track, duration)
    }

    fn insert_track(&mut self, index: usize, kind: TrackKind) -> MirrorResult<()> {
        self.borrow_mut().insert_track(index, kind)
    }

    fn remove_track(&mut self, index: usize) -> MirrorResult<()> {
        self.borrow_mut().remove_track(index)
    }
}

// ---------------------------------------------------------------------------
// RecordingRenderer
// ---------------------------------------------------------------------------

/// One mirror call as seen by [`RecordingRenderer`], positions in frames.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorCall {
    InsertClip { track: usize, start: i64, producer: String, effects: usize },
    RemoveClip { track: usize, start: i64 },
    MoveClip { old_track: usize, new_track: usize, old_start: i64, new_start: i64 },
    ResizeClipStart { track: usize, start: i64, delta: i64 },
    ResizeClipEnd { track: usize, start: i64, delta: i64 },
    CutClip { track: usize, time: i64 },
    ChangeClipSpeed { track: usize, start: i64, speed: f64 },
    AddTransition { track: usize, start: i64 },
    DeleteTransition { track: usize, start: i64 },
    MoveTransition { old_start: i64, new_start: i64 },
    UpdateTransition { track: usize, start: i64 },
    AddEffect { track: usize, start: i64, index: Option<usize> },
    EditEffect { track: usize, start: i64, index: Option<usize> },
    RemoveEffect { track: usize, start: i64, index: usize },
    MoveEffect { track: usize, start: i64, from: usize, to: usize },
    InsertSpace { time: i64, track: Option<usize>, duration: i64 },
    InsertTrack { index: usize },
    RemoveTrack { index: usize },
}

impl MirrorCall {
    pub fn name(&self) -> &'static str {
        match self {
            MirrorCall::InsertClip { .. } => "insert_clip",
            MirrorCall::RemoveClip { .. } => "remove_clip",
            MirrorCall::MoveClip { .. } => "move_clip",
            MirrorCall::ResizeClipStart { .. } => "resize_clip_start",
            MirrorCall::ResizeClipEnd { .. } => "resize_clip_end",
            MirrorCall::CutClip { .. } => "cut_clip",
            MirrorCall::ChangeClipSpeed { .. } => "change_clip_speed",
            MirrorCall::AddTransition { .. } => "add_transition",
            MirrorCall::DeleteTransition { .. } => "delete_transition",
            MirrorCall::MoveTransition { .. } => "move_transition",
            MirrorCall::UpdateTransition { .. } => "update_transition",
            MirrorCall::AddEffect { .. } => "add_effect",
            MirrorCall::EditEffect { .. } => "edit_effect",
            MirrorCall::RemoveEffect { .. } => "remove_effect",
            MirrorCall::MoveEffect { .. } => "move_effect",
            MirrorCall::InsertSpace { .. } => "insert_space",
            MirrorCall::InsertTrack { .. } => "insert_track",
            MirrorCall::RemoveTrack { .. } => "remove_track",
        }
    }
}

/// A renderer that accepts everything and remembers what it was asked.
///
/// Failures can be scheduled per call name, which is how rollback paths are
/// exercised without a real engine. Refused calls are not recorded.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    fps: f64,
    calls: Vec<MirrorCall>,
    /// Call name to the number of matching calls left before one fails.
    failures: HashMap<&'static str, usize>,
}

impl RecordingRenderer {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[MirrorCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| c.name() == name).count()
    }

    /// Refuse the next call named `name`.
    pub fn fail_next(&mut self, name: &'static str) {
        self.fail_on_nth(name, 1);
    }

    /// Refuse the `n`th upcoming call named `name` (1-based).
    pub fn fail_on_nth(&mut self, name: &'static str, n: usize) {
        self.failures.insert(name, n.max(1));
    }

    fn frames(&self, time: GenTime) -> i64 {
        time.frames(self.fps)
    }

    fn record(&mut self, call: MirrorCall) -> MirrorResult<()> {
        let name = call.name();
        if let Some(left) = self.failures.get_mut(name) {
            *left -= 1;
            if *left == 0 {
                self.failures.remove(name);
                return Err(MirrorError(format!("{} refused", name)));
            }
        }
        self.calls.push(call);
        Ok(())
    }
}

impl Renderer for RecordingRenderer {
    fn insert_clip(&mut self, info: &ItemInfo, producer: &str, effects: &[EffectsParameterList]) -> MirrorResult<()> {
        let call = MirrorCall::InsertClip {
            track: info.track,
            start: self.frames(info.start_pos),
            producer: producer.to_string(),
            effects: effects.len(),
        };
        self.record(call)
    }

    fn remove_clip(&mut self, track: usize, start: GenTime) -> MirrorResult<()> {
        let start = self.frames(start);
        self.record(MirrorCall::RemoveClip { track, start })
    }

    fn move_clip(
        &mut self,
        old_track: usize,
        new_track: usize,
        old_start_frame: i64,
        new_start_frame: i64,
        _producer: &str,
    ) -> MirrorResult<()> {
        self.record(MirrorCall::MoveClip {
            old_track,
            new_track,
            old_start: old_start_frame,
            new_start: new_start_frame,
        })
    }

    fn resize_clip_start(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        let call = MirrorCall::ResizeClipStart {
            track: info.track,
            start: self.frames(info.start_pos),
            delta: self.frames(delta),
        };
        self.record(call)
    }

    fn resize_clip_end(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        let call = MirrorCall::ResizeClipEnd {
            track: info.track,
            start: self.frames(info.start_pos),
            delta: self.frames(delta),
        };
        self.record(call)
    }

    fn cut_clip(&mut self, track: usize, time: GenTime) -> MirrorResult<()> {
        let time = self.frames(time);
        self.record(MirrorCall::CutClip { track, time })
    }

    fn change_clip_speed(
        &mut self,
        info: &ItemInfo,
        new_speed: f64,
        old_speed: f64,
        _strobe: u32,
        _producer: &str,
    ) -> MirrorResult<i64> {
        let start = self.frames(info.start_pos);
        let length = self.frames(info.duration()) as f64;
        let new_length = ((length * old_speed.abs() / new_speed.abs()).round() as i64).max(1);
        self.record(MirrorCall::ChangeClipSpeed {
            track: info.track,
            start,
            speed: new_speed,
        })?;
        Ok(start + new_length)
    }

    fn add_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        self.record(MirrorCall::AddTransition {
            track: transition.a_track,
            start: transition.in_frame,
        })
    }

    fn delete_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        self.record(MirrorCall::DeleteTransition {
            track: transition.a_track,
            start: transition.in_frame,
        })
    }

    fn move_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()> {
        self.record(MirrorCall::MoveTransition {
            old_start: old.in_frame,
            new_start: new.in_frame,
        })
    }

    fn update_transition(&mut self, old: &TransitionRecord, _new: &TransitionRecord) -> MirrorResult<()> {
        self.record(MirrorCall::UpdateTransition {
            track: old.a_track,
            start: old.in_frame,
        })
    }

    fn add_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        let start = self.frames(start);
        self.record(MirrorCall::AddEffect {
            track,
            start,
            index: params.index(),
        })
    }

    fn edit_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        let start = self.frames(start);
        self.record(MirrorCall::EditEffect {
            track,
            start,
            index: params.index(),
        })
    }

    fn remove_effect(&mut self, track: usize, start: GenTime, index: usize) -> MirrorResult<()> {
        let start = self.frames(start);
        self.record(MirrorCall::RemoveEffect { track, start, index })
    }

    fn move_effect(&mut self, track: usize, start: GenTime, old_index: usize, new_index: usize) -> MirrorResult<()> {
        let start = self.frames(start);
        self.record(MirrorCall::MoveEffect {
            track,
            start,
            from: old_index,
            to: new_index,
        })
    }

    fn insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> MirrorResult<()> {
        let call = MirrorCall::InsertSpace {
            time: self.frames(time),
            track,
            duration: self.frames(duration),
        };
        self.record(call)
    }

    fn insert_track(&mut self, index: usize, _kind: TrackKind) -> MirrorResult<()> {
        self.record(MirrorCall::InsertTrack { index })
    }

    fn remove_track(&mut self, index: usize) -> MirrorResult<()> {
        self.record(MirrorCall::RemoveTrack { index })
    }
}
