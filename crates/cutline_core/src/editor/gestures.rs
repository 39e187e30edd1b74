//! Pointer gestures.
//!
//! A gesture starts on a press, follows the pointer with previews that live
//! only in the gesture state, and on release commits through the same public
//! edits a programmatic caller would use. Cancelling drops the preview; the
//! model and the renderer never saw it.

use super::TimelineEditor;
use crate::effects::ParamValue;
use crate::error::{CoreError, Result};
use crate::group::ItemGroup;
use crate::keyframes::{KeyframeDrag, KeyframeEditor, Keyframes};
use crate::snapping::{collect_snap_points, find_snap_point};
use crate::time::GenTime;
use crate::timeline::TimelineItem;
use crate::transition::{Transition, MAX_TRANSITION_SECONDS};
use crate::types::*;

/// Service of a transition created from a clip's transition handle.
const HANDLE_TRANSITION_TAG: &str = "luma";
/// Length of a transition created from a clip's transition handle.
const HANDLE_TRANSITION_SECONDS: f64 = 1.0;

/// What an in-progress gesture would do if released now.
#[derive(Debug, Clone, PartialEq)]
pub enum GesturePreview {
    /// Where a moved or resized item would land.
    Item { id: ItemId, info: ItemInfo },
    /// Fade length in frames.
    Fade { id: ItemId, fade_in: bool, length: i64 },
    /// The edited curve of a keyframe drag.
    KeyFrames {
        id: ItemId,
        effect: usize,
        param: String,
        keys: Keyframes,
    },
    /// How far the items right of the spacer would move.
    Spacer {
        time: GenTime,
        track: Option<usize>,
        offset: GenTime,
    },
    /// The window of a transition about to be added to a clip.
    Transition { clip: ItemId, window: ItemInfo },
}

#[derive(Debug)]
pub(crate) struct Gesture {
    mode: OperationMode,
    press_frame: i64,
    kind: GestureKind,
}

#[derive(Debug)]
enum GestureKind {
    Item {
        id: ItemId,
        category: ItemCategory,
        origin: ItemInfo,
        preview: ItemInfo,
    },
    Fade {
        id: ItemId,
        origin: ItemInfo,
        fade_in: bool,
        initial: i64,
        length: i64,
    },
    KeyFrame {
        id: ItemId,
        origin: ItemInfo,
        effect: usize,
        param: String,
        editor: KeyframeEditor,
    },
    Spacer {
        time: GenTime,
        track: Option<usize>,
        group: ItemGroup,
    },
    TransitionHandle {
        id: ItemId,
        window: ItemInfo,
    },
}

impl Gesture {
    fn preview(&self) -> GesturePreview {
        match &self.kind {
            GestureKind::Item { id, preview, .. } => GesturePreview::Item { id: *id, info: *preview },
            GestureKind::Fade {
                id, fade_in, length, ..
            } => GesturePreview::Fade {
                id: *id,
                fade_in: *fade_in,
                length: *length,
            },
            GestureKind::KeyFrame {
                id,
                effect,
                param,
                editor,
                ..
            } => GesturePreview::KeyFrames {
                id: *id,
                effect: *effect,
                param: param.clone(),
                keys: editor.keys().clone(),
            },
            GestureKind::Spacer { time, track, group } => GesturePreview::Spacer {
                time: *time,
                track: *track,
                offset: group.time_offset(),
            },
            GestureKind::TransitionHandle { id, window } => GesturePreview::Transition {
                clip: *id,
                window: *window,
            },
        }
    }
}

/// Frame inside the clip's source under timeline frame `frame`.
fn source_frame(origin: &ItemInfo, frame: i64, fps: f64) -> i64 {
    frame - origin.start_pos.frames(fps) + origin.crop_start.frames(fps)
}

fn crop_window(origin: &ItemInfo, fps: f64) -> (i64, i64) {
    let start = origin.crop_start.frames(fps);
    (start, start + origin.duration().frames(fps))
}

fn no_gesture() -> CoreError {
    CoreError::InvalidOperation("No gesture in progress".to_string())
}

impl TimelineEditor {
    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> OperationMode {
        self.gesture.as_ref().map_or(OperationMode::None, |g| g.mode)
    }

    pub fn gesture_preview(&self) -> Option<GesturePreview> {
        self.gesture.as_ref().map(Gesture::preview)
    }

    /// How an item is drawn at `scale` pixels per frame under the editor's
    /// settings.
    pub fn view_metrics(&self, scale: f64, selected: bool) -> ViewMetrics {
        ViewMetrics {
            scale,
            height: self.settings.track_height_px,
            handle_size: self.settings.handle_size_px,
            selected,
        }
    }

    /// What a press at `pos`, relative to the item's top-left corner, would
    /// start.
    pub fn operation_mode_at(&self, id: ItemId, pos: PointerPos, view: ViewMetrics) -> OperationMode {
        match self.timeline.item(id) {
            Some(TimelineItem::Clip(clip)) => {
                clip.operation_mode(pos, view, self.timeline.is_track_locked(clip.info().track))
            }
            Some(TimelineItem::Transition(t)) => {
                t.operation_mode(pos, view, self.timeline.is_track_locked(t.info().track))
            }
            None => OperationMode::None,
        }
    }

    // -----------------------------------------------------------------------
    // Press
    // -----------------------------------------------------------------------

    /// Start a gesture of `mode` on `id`, pressed at timeline frame `frame`.
    pub fn begin_gesture(&mut self, id: ItemId, mode: OperationMode, frame: i64) -> Result<()> {
        self.run(|editor| {
            if editor.gesture.is_some() {
                return Err(CoreError::GestureInProgress);
            }
            let item = editor.timeline.item(id).ok_or(CoreError::UnknownItem(id))?;
            let (origin, category) = (item.info(), item.category());
            editor.check_track(origin.track)?;

            let kind = match (mode, category) {
                (OperationMode::Move | OperationMode::ResizeStart | OperationMode::ResizeEnd, _) => GestureKind::Item {
                    id,
                    category,
                    origin,
                    preview: origin,
                },
                (OperationMode::FadeIn | OperationMode::FadeOut, ItemCategory::Clip) => {
                    let clip = editor.clip_ref(id)?;
                    let fade_in = mode == OperationMode::FadeIn;
                    let initial = if fade_in { clip.fade_in() } else { clip.fade_out() };
                    GestureKind::Fade {
                        id,
                        origin,
                        fade_in,
                        initial,
                        length: initial,
                    }
                }
                (OperationMode::KeyFrame, ItemCategory::Clip) => editor.key_frame_gesture(id, frame)?,
                (OperationMode::TransitionStart | OperationMode::TransitionEnd, ItemCategory::Clip) => {
                    let length = GenTime::from_seconds(HANDLE_TRANSITION_SECONDS).min(origin.duration());
                    let (start, end) = if mode == OperationMode::TransitionStart {
                        (origin.start_pos, origin.start_pos + length)
                    } else {
                        (origin.end_pos - length, origin.end_pos)
                    };
                    GestureKind::TransitionHandle {
                        id,
                        window: ItemInfo::new(start, end, GenTime::ZERO, origin.track),
                    }
                }
                _ => {
                    return Err(CoreError::InvalidOperation(format!(
                        "Cannot start {:?} on this item",
                        mode
                    )))
                }
            };
            editor.gesture = Some(Gesture {
                mode,
                press_frame: frame,
                kind,
            });
            tracing::debug!("began {:?} on {}", mode, id);
            Ok(())
        })
    }

    /// Start a spacer drag moving everything that starts at or after `time`.
    pub fn begin_spacer(&mut self, time: GenTime, track: Option<usize>, frame: i64) -> Result<()> {
        self.run(|editor| {
            if editor.gesture.is_some() {
                return Err(CoreError::GestureInProgress);
            }
            if let Some(track) = track {
                editor.check_track(track)?;
            }
            let ids = editor.timeline.items_starting_from(time, track);
            if ids.is_empty() {
                return Err(CoreError::InvalidOperation(format!("Nothing to move after {}", time)));
            }
            let group = ItemGroup::new(&editor.timeline, &ids);
            editor.gesture = Some(Gesture {
                mode: OperationMode::Spacer,
                press_frame: frame,
                kind: GestureKind::Spacer { time, track, group },
            });
            tracing::debug!("began spacer at {} with {} items", time, ids.len());
            Ok(())
        })
    }

    fn key_frame_gesture(&self, id: ItemId, frame: i64) -> Result<GestureKind> {
        let no_key = || CoreError::InvalidOperation(format!("No keyframe at frame {}", frame));
        let clip = self.clip_ref(id)?;
        let effect = clip.selected_effect().ok_or_else(no_key)?;
        let param = clip
            .effect_at(effect)
            .and_then(|e| {
                e.params
                    .iter()
                    .find(|p| matches!(p.value, ParamValue::Keyframes(_)))
            })
            .map(|p| p.name.clone())
            .ok_or_else(no_key)?;
        let origin = clip.info();
        let mut editor = clip.geometry().keyframes.clone();
        let pos = source_frame(&origin, frame, self.fps());
        let key = editor
            .key_frame_near(pos, self.settings.snap_threshold_frames)
            .ok_or_else(no_key)?;
        editor.set_edited_key_frame(key);
        Ok(GestureKind::KeyFrame {
            id,
            origin,
            effect,
            param,
            editor,
        })
    }

    // -----------------------------------------------------------------------
    // Drag
    // -----------------------------------------------------------------------

    /// Follow the pointer to timeline frame `frame` over `track`.
    pub fn drag_to(&mut self, frame: i64, track: usize) -> Result<GesturePreview> {
        self.run(|editor| {
            let mut gesture = editor.gesture.take().ok_or_else(no_gesture)?;
            editor.update_preview(&mut gesture, frame, track);
            let preview = gesture.preview();
            editor.gesture = Some(gesture);
            Ok(preview)
        })
    }

    /// Drag the edited keyframe to timeline frame `frame` with a 0 to 100
    /// display value.
    pub fn drag_key_frame_to(&mut self, frame: i64, value: f64) -> Result<KeyframeDrag> {
        self.run(|editor| {
            let fps = editor.fps();
            let Some(Gesture {
                kind: GestureKind::KeyFrame { origin, editor: keys, .. },
                ..
            }) = editor.gesture.as_mut()
            else {
                return Err(CoreError::InvalidOperation("No keyframe is being dragged".to_string()));
            };
            let (start, end) = crop_window(origin, fps);
            Ok(keys.update_key_frame_pos(source_frame(origin, frame, fps), value, start, end))
        })
    }

    fn update_preview(&self, gesture: &mut Gesture, frame: i64, track: usize) {
        let fps = self.fps();
        let mode = gesture.mode;
        let delta = frame - gesture.press_frame;
        match &mut gesture.kind {
            GestureKind::Item {
                id,
                category,
                origin,
                preview,
            } => {
                let next = match mode {
                    OperationMode::Move => self.preview_move(*id, *category, origin, delta, track),
                    OperationMode::ResizeStart => self.preview_resize(*id, origin, delta, true),
                    _ => self.preview_resize(*id, origin, delta, false),
                };
                if let Some(next) = next {
                    *preview = next;
                }
            }
            GestureKind::Fade {
                origin,
                fade_in,
                initial,
                length,
                ..
            } => {
                let proposed = if *fade_in { *initial + delta } else { *initial - delta };
                *length = proposed.clamp(0, origin.duration().frames(fps));
            }
            GestureKind::KeyFrame { origin, editor, .. } => {
                let value = editor
                    .edited_key_frame()
                    .and_then(|k| editor.keys().get(k))
                    .map_or(0.0, |v| editor.to_display(v));
                let (start, end) = crop_window(origin, fps);
                editor.update_key_frame_pos(source_frame(origin, frame, fps), value, start, end);
            }
            GestureKind::Spacer { group, .. } => {
                let offset = group.clamp_time_offset(&self.timeline, GenTime::from_frames(delta, fps));
                group.set_offset(offset, 0);
            }
            GestureKind::TransitionHandle { .. } => {}
        }
    }

    fn snap(&self, frame: i64, exclude: ItemId) -> i64 {
        if !self.settings.snap_to_points {
            return frame;
        }
        let points = collect_snap_points(&self.timeline, &[exclude], None);
        find_snap_point(frame, &points, self.settings.snap_threshold_frames)
    }

    /// Where a move by `delta` frames lands: snapped on either edge, then
    /// pulled back in front of the first obstacle. `None` when no position
    /// on that track works.
    fn preview_move(
        &self,
        id: ItemId,
        category: ItemCategory,
        origin: &ItemInfo,
        delta: i64,
        track: usize,
    ) -> Option<ItemInfo> {
        let fps = self.fps();
        let duration = origin.duration().frames(fps);
        let proposed = origin.start_pos.frames(fps) + delta;
        let snapped = self.snap(proposed, id);
        let start = match snapped != proposed {
            true => snapped,
            false => self.snap(proposed + duration, id) - duration,
        };
        let start = start.max(0);

        if category == ItemCategory::Transition {
            let transition = self.timeline.transition(id)?;
            if transition.second_clip().is_some() {
                return None;
            }
            let anchor = self.transition_anchor(transition);
            let mut probe = transition.clone();
            probe.move_transition(start, &anchor);
            return Some(probe.info());
        }

        let track = track.min(self.timeline.track_count().checked_sub(1)?);
        let track_offset = track as isize - origin.track as isize;
        let mut group = ItemGroup::new(&self.timeline, &[id]);
        group.set_offset(GenTime::ZERO, track_offset);
        let offset = group.clamp_time_offset(&self.timeline, GenTime::from_frames(start, fps) - origin.start_pos);
        group.set_offset(offset, track_offset);
        group.fits(&self.timeline).then(|| origin.translated(offset, track))
    }

    /// Where dragging one edge by `delta` frames lands, clamped by the
    /// geometry rules and the neighbours.
    fn preview_resize(&self, id: ItemId, origin: &ItemInfo, delta: i64, at_start: bool) -> Option<ItemInfo> {
        let fps = self.fps();
        let edge = if at_start { origin.start_pos } else { origin.end_pos };
        let target = self.snap(edge.frames(fps) + delta, id);
        match self.timeline.item(id)? {
            TimelineItem::Clip(clip) => {
                let mut probe = clip.clone();
                if at_start {
                    let floor = self
                        .timeline
                        .previous_end(ItemCategory::Clip, origin.track, origin.start_pos, &[id])
                        .frames(fps);
                    probe.resize_start(target.max(floor));
                } else {
                    let obstacles = self.timeline.obstacle_starts(ItemCategory::Clip, origin.track, id);
                    probe.resize_end(target, &obstacles);
                }
                Some(probe.info())
            }
            TimelineItem::Transition(t) => {
                if t.second_clip().is_some() {
                    return None;
                }
                let anchor = self.transition_anchor(t);
                let mut probe = t.clone();
                if at_start {
                    probe.resize_transition_start(target, &anchor);
                } else {
                    probe.resize_transition_end(target, &anchor);
                }
                Some(probe.info())
            }
        }
    }

    /// Span a transition may occupy: its clip when anchored, otherwise the
    /// gap between its neighbouring transitions.
    fn transition_anchor(&self, transition: &Transition) -> ItemInfo {
        let info = transition.info();
        if let Some(clip) = transition
            .reference_clip()
            .filter(|_| transition.is_anchored())
            .and_then(|id| self.timeline.clip(id))
        {
            return clip.info();
        }
        let start = self
            .timeline
            .previous_end(ItemCategory::Transition, info.track, info.start_pos, &[transition.id()]);
        let end = self
            .timeline
            .obstacle_starts(ItemCategory::Transition, info.track, transition.id())
            .into_iter()
            .filter(|s| *s >= info.end_pos)
            .fold(info.start_pos + GenTime::from_seconds(MAX_TRANSITION_SECONDS), GenTime::min);
        ItemInfo::new(start, end, GenTime::ZERO, info.track)
    }

    // -----------------------------------------------------------------------
    // Release
    // -----------------------------------------------------------------------

    /// Commit the gesture through the matching edit. A gesture that ends
    /// where it started records nothing.
    pub fn end_gesture(&mut self) -> Result<()> {
        let gesture = self.run(|editor| editor.gesture.take().ok_or_else(no_gesture))?;
        tracing::debug!("ending {:?}", gesture.mode);
        match gesture.kind {
            GestureKind::Item {
                category,
                origin,
                preview,
                ..
            } => {
                if preview == origin {
                    return Ok(());
                }
                match (category, gesture.mode) {
                    (ItemCategory::Clip, OperationMode::Move) => {
                        self.move_clip(origin.track, origin.start_pos, preview.track, preview.start_pos)
                    }
                    (ItemCategory::Clip, OperationMode::ResizeStart) => {
                        self.resize_clip_start(origin.track, origin.start_pos, preview.start_pos)
                    }
                    (ItemCategory::Clip, _) => self.resize_clip_end(origin.track, origin.start_pos, preview.end_pos),
                    (ItemCategory::Transition, _) => self.move_transition(origin.track, origin.start_pos, preview),
                }
            }
            GestureKind::Fade {
                origin,
                fade_in,
                initial,
                length,
                ..
            } => {
                if length == initial {
                    Ok(())
                } else if fade_in {
                    self.set_fade_in(origin.track, origin.start_pos, length)
                } else {
                    self.set_fade_out(origin.track, origin.start_pos, length)
                }
            }
            GestureKind::KeyFrame {
                id,
                origin,
                effect,
                param,
                editor,
            } => {
                let current = self
                    .timeline
                    .clip(id)
                    .and_then(|c| c.effect_at(effect))
                    .and_then(|e| e.keyframes(&param));
                if current == Some(editor.keys()) {
                    return Ok(());
                }
                self.edit_keyframes(origin.track, origin.start_pos, effect, &param, editor.keys().clone())
            }
            GestureKind::Spacer { time, track, group } => {
                let offset = group.time_offset();
                if offset.is_zero() {
                    return Ok(());
                }
                self.insert_space(time, track, offset)
            }
            GestureKind::TransitionHandle { id, window } => {
                let Some(clip) = self.timeline.clip(id) else {
                    return self.run(|_| Err(CoreError::UnknownItem(id)));
                };
                let transition =
                    Transition::anchored(HANDLE_TRANSITION_TAG, clip, window.start_pos, window.end_pos, 0, false);
                self.add_transition(transition).map(|_| ())
            }
        }
    }

    /// Drop the gesture. Nothing was applied, so nothing is undone.
    pub fn cancel_gesture(&mut self) -> bool {
        let cancelled = self.gesture.take();
        if let Some(gesture) = &cancelled {
            tracing::debug!("cancelled {:?}", gesture.mode);
        }
        cancelled.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::effects::{EffectParameter, EffectRecord};
    use crate::project::{preset_pal, TimelineSettings};

    fn view() -> ViewMetrics {
        ViewMetrics {
            scale: 1.0,
            height: 50.0,
            handle_size: 8.0,
            selected: false,
        }
    }

    #[test]
    fn move_preview_touches_nothing_until_release() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        recorder.borrow_mut().clear();

        editor.begin_gesture(a, OperationMode::Move, 25).unwrap();
        assert_eq!(editor.mode(), OperationMode::Move);
        let preview = editor.drag_to(125, 1).unwrap();
        let expected = ItemInfo::new(secs(4.0), secs(6.0), GenTime::ZERO, 1);
        assert_eq!(preview, GesturePreview::Item { id: a, info: expected });
        assert_eq!(editor.timeline().clip(a).unwrap().info().start_pos, secs(0.0));
        assert!(recorder.borrow().calls().is_empty());

        editor.end_gesture().unwrap();
        assert_eq!(editor.mode(), OperationMode::None);
        assert_eq!(editor.timeline().clip(a).unwrap().info(), expected);
        assert_eq!(editor.history().undo_len(), 2);
        editor.undo().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().info().track, 0);
    }

    #[test]
    fn drag_stops_in_front_of_a_neighbour() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        add_clip(&mut editor, 5.0, 7.0, 0);

        editor.begin_gesture(a, OperationMode::Move, 0).unwrap();
        let preview = editor.drag_to(100, 0).unwrap();
        let GesturePreview::Item { info, .. } = preview else {
            panic!("expected an item preview");
        };
        assert_eq!(info.start_pos, secs(3.0));
    }

    #[test]
    fn drag_snaps_to_edges_on_other_tracks() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        add_clip(&mut editor, 5.0, 7.0, 1);

        editor.begin_gesture(a, OperationMode::Move, 0).unwrap();
        let GesturePreview::Item { info, .. } = editor.drag_to(122, 0).unwrap() else {
            panic!("expected an item preview");
        };
        assert_eq!(info.start_pos, secs(5.0));
    }

    #[test]
    fn cancel_leaves_no_trace() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let before = editor.history().undo_len();
        recorder.borrow_mut().clear();

        editor.begin_gesture(a, OperationMode::Move, 0).unwrap();
        editor.drag_to(200, 0).unwrap();
        assert!(editor.cancel_gesture());
        assert!(!editor.cancel_gesture());
        assert_eq!(editor.timeline().clip(a).unwrap().info().start_pos, secs(0.0));
        assert_eq!(editor.history().undo_len(), before);
        assert!(recorder.borrow().calls().is_empty());
        assert!(editor.gesture_preview().is_none());
    }

    #[test]
    fn one_gesture_at_a_time() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        editor.begin_gesture(a, OperationMode::Move, 0).unwrap();

        assert!(matches!(
            editor.begin_gesture(a, OperationMode::ResizeEnd, 50),
            Err(CoreError::GestureInProgress)
        ));
        assert!(matches!(editor.add_guide(secs(1.0), "x"), Err(CoreError::GestureInProgress)));
        editor.end_gesture().unwrap();
        assert!(editor.end_gesture().is_err());
        editor.add_guide(secs(1.0), "x").unwrap();
    }

    #[test]
    fn resize_end_gesture_commits_a_resize() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        editor.begin_gesture(a, OperationMode::ResizeEnd, 100).unwrap();
        editor.drag_to(50, 0).unwrap();
        editor.end_gesture().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().info().end_pos, secs(2.0));
        assert_eq!(editor.history().undo_description(), Some("Resize clip"));
    }

    #[test]
    fn fade_gestures_create_fades() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);

        editor.begin_gesture(a, OperationMode::FadeIn, 0).unwrap();
        let preview = editor.drag_to(20, 0).unwrap();
        assert_eq!(
            preview,
            GesturePreview::Fade {
                id: a,
                fade_in: true,
                length: 20
            }
        );
        editor.end_gesture().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().fade_in(), 20);

        editor.begin_gesture(a, OperationMode::FadeOut, 100).unwrap();
        editor.drag_to(90, 0).unwrap();
        editor.end_gesture().unwrap();
        assert_eq!(editor.timeline().clip(a).unwrap().fade_out(), 10);
    }

    #[test]
    fn spacer_drag_is_clamped_and_commits_as_space() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 4.0, 6.0, 0);

        editor.begin_spacer(secs(3.0), Some(0), 75).unwrap();
        editor.drag_to(125, 0).unwrap();
        editor.end_gesture().unwrap();
        assert_eq!(editor.timeline().clip(b).unwrap().info().start_pos, secs(6.0));

        editor.begin_spacer(secs(5.0), Some(0), 125).unwrap();
        let preview = editor.drag_to(0, 0).unwrap();
        assert_eq!(
            preview,
            GesturePreview::Spacer {
                time: secs(5.0),
                track: Some(0),
                offset: secs(-4.0)
            }
        );
        editor.end_gesture().unwrap();
        assert_eq!(editor.timeline().clip(b).unwrap().info().start_pos, secs(2.0));
        assert_eq!(editor.history().undo_description(), Some("Remove space"));
    }

    #[test]
    fn key_frame_drag_commits_the_curve() {
        let (mut editor, _) = editor();
        let keys = Keyframes::from_points([(0, 0.0), (50, 50.0), (99, 100.0)]);
        let volume = EffectRecord::new("filter", "volume").with_param(EffectParameter::keyframes("gain", keys));
        let a = editor
            .add_clip(source(), ItemInfo::new(secs(0.0), secs(4.0), GenTime::ZERO, 0), &[volume])
            .unwrap();

        editor.begin_gesture(a, OperationMode::KeyFrame, 51).unwrap();
        let drag = editor.drag_key_frame_to(60, 80.0).unwrap();
        assert_eq!(drag, KeyframeDrag::Moved { pos: 60, value: 80.0 });
        editor.end_gesture().unwrap();

        let curve = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().keyframes("gain").cloned().unwrap();
        assert_eq!(curve.get(60), Some(80.0));
        assert!(!curve.contains(50));

        editor.undo().unwrap();
        let curve = editor.timeline().clip(a).unwrap().effect_at(1).unwrap().keyframes("gain").cloned().unwrap();
        assert_eq!(curve.get(50), Some(50.0));
    }

    #[test]
    fn transition_handle_adds_a_transition() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 1);
        editor.begin_gesture(a, OperationMode::TransitionEnd, 100).unwrap();
        editor.end_gesture().unwrap();

        let t = editor.timeline().transitions().next().unwrap();
        assert_eq!((t.info().start_pos, t.info().end_pos), (secs(3.0), secs(4.0)));
        assert_eq!(t.reference_clip(), Some(a));
        assert_eq!(t.transition_end_track(), 0);
    }

    #[test]
    fn pointer_classification_respects_locks() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        let middle = PointerPos { x: 50.0, y: 25.0 };
        assert_eq!(editor.operation_mode_at(a, middle, view()), OperationMode::Move);

        editor.set_track_locked(0, true).unwrap();
        assert_eq!(editor.operation_mode_at(a, middle, view()), OperationMode::None);
        assert!(matches!(
            editor.begin_gesture(a, OperationMode::Move, 50),
            Err(CoreError::TrackLocked(0))
        ));
    }

    #[test]
    fn handle_width_and_track_height_come_from_settings() {
        let settings = TimelineSettings {
            handle_size_px: 20.0,
            track_height_px: 80.0,
            ..preset_pal()
        };
        let (mut editor, _) = editor_with(settings);
        let a = add_clip(&mut editor, 0.0, 4.0, 0);
        let wide = editor.view_metrics(1.0, false);
        assert_eq!((wide.height, wide.handle_size), (80.0, 20.0));

        let near_start = PointerPos { x: 15.0, y: 40.0 };
        assert_eq!(editor.operation_mode_at(a, near_start, wide), OperationMode::ResizeStart);
        assert_eq!(editor.operation_mode_at(a, near_start, view()), OperationMode::Move);
    }
}
