use crate::clip::ClipItem;
use crate::editor::TimelineEditor;
use crate::effects::{EffectRecord, EffectsList};
use crate::error::Result;
use crate::time::GenTime;
use crate::transition::{Transition, TransitionProperties};
use crate::types::*;

/// A command that can be executed, undone, and described.
///
/// Commands are created after the edit they describe has been applied and
/// mirrored. Both directions go back through the editor's validated entry
/// points, so a replay that no longer fits the timeline fails cleanly.
pub trait Command: std::fmt::Debug {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()>;
    fn undo(&self, editor: &mut TimelineEditor) -> Result<()>;
    fn description(&self) -> &str;
}

/// Undo/redo history stack.
#[derive(Debug)]
pub struct History {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_size: usize,
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_size,
        }
    }

    /// Record an applied command. Clears the redo stack.
    pub fn push(&mut self, cmd: Box<dyn Command>) {
        self.redo_stack.clear();
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Box<dyn Command>> {
        self.undo_stack.pop()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Box<dyn Command>> {
        self.redo_stack.pop()
    }

    /// Put a command back on the undo stack without touching redo.
    pub(crate) fn restore_undo(&mut self, cmd: Box<dyn Command>) {
        self.undo_stack.push(cmd);
    }

    pub(crate) fn restore_redo(&mut self, cmd: Box<dyn Command>) {
        self.redo_stack.push(cmd);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|cmd| cmd.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|cmd| cmd.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ---------------------------------------------------------------------------
// CommandGroup
// ---------------------------------------------------------------------------

/// Several commands undone and redone as one step.
#[derive(Debug)]
pub struct CommandGroup {
    description: String,
    commands: Vec<Box<dyn Command>>,
}

impl CommandGroup {
    pub fn new(description: impl Into<String>, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            description: description.into(),
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for CommandGroup {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        for (done, cmd) in self.commands.iter().enumerate() {
            if let Err(e) = cmd.execute(editor) {
                for applied in self.commands[..done].iter().rev() {
                    if let Err(inner) = applied.undo(editor) {
                        tracing::error!("cannot revert {}: {}", applied.description(), inner);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        for (done, cmd) in self.commands.iter().rev().enumerate() {
            if let Err(e) = cmd.undo(editor) {
                let undone = self.commands.len() - done;
                for reverted in &self.commands[undone..] {
                    if let Err(inner) = reverted.execute(editor) {
                        tracing::error!("cannot reapply {}: {}", reverted.description(), inner);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

// ---------------------------------------------------------------------------
// AddTimelineClipCommand
// ---------------------------------------------------------------------------

/// Adds (or, with `add == false`, deletes) a clip.
#[derive(Debug)]
pub struct AddTimelineClipCommand {
    clip: ClipItem,
    add: bool,
}

impl AddTimelineClipCommand {
    pub fn new(clip: ClipItem, add: bool) -> Self {
        Self { clip, add }
    }

    fn apply(&self, editor: &mut TimelineEditor, add: bool) -> Result<()> {
        if add {
            editor.restore_clip(self.clip.clone()).map(|_| ())
        } else {
            editor.take_clip(&self.clip.info()).map(|_| ())
        }
    }
}

impl Command for AddTimelineClipCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, self.add)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, !self.add)
    }

    fn description(&self) -> &str {
        if self.add {
            "Add clip"
        } else {
            "Delete clip"
        }
    }
}

// ---------------------------------------------------------------------------
// MoveClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MoveClipCommand {
    from: ItemInfo,
    to: ItemInfo,
}

impl MoveClipCommand {
    pub fn new(from: ItemInfo, to: ItemInfo) -> Self {
        Self { from, to }
    }
}

impl Command for MoveClipCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_clip_item(&self.from, &self.to)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_clip_item(&self.to, &self.from)
    }

    fn description(&self) -> &str {
        "Move clip"
    }
}

// ---------------------------------------------------------------------------
// ResizeClipCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ResizeClipCommand {
    from: ItemInfo,
    to: ItemInfo,
    at_start: bool,
}

impl ResizeClipCommand {
    pub fn new(from: ItemInfo, to: ItemInfo, at_start: bool) -> Self {
        Self { from, to, at_start }
    }
}

impl Command for ResizeClipCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .resize_clip_item(&self.from, &self.to, self.at_start)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .resize_clip_item(&self.to, &self.from, self.at_start)
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Resize clip"
    }
}

// ---------------------------------------------------------------------------
// RazorClipCommand
// ---------------------------------------------------------------------------

/// Cuts a clip in two. Undo merges the halves and restores the effect stack
/// the clip had before the cut.
#[derive(Debug)]
pub struct RazorClipCommand {
    info: ItemInfo,
    cut_time: GenTime,
    effects: EffectsList,
}

impl RazorClipCommand {
    pub fn new(info: ItemInfo, cut_time: GenTime, effects: EffectsList) -> Self {
        Self {
            info,
            cut_time,
            effects,
        }
    }
}

impl Command for RazorClipCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.cut_clip_item(&self.info, self.cut_time).map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.merge_clip_items(&self.info, self.cut_time, Some(&self.effects))
    }

    fn description(&self) -> &str {
        "Razor clip"
    }
}

// ---------------------------------------------------------------------------
// MergeClipCommand
// ---------------------------------------------------------------------------

/// Joins two halves of a cut. Undo cuts again and gives each half back its
/// own effect stack.
#[derive(Debug)]
pub struct MergeClipCommand {
    info: ItemInfo,
    time: GenTime,
    first_effects: EffectsList,
    second_effects: EffectsList,
}

impl MergeClipCommand {
    pub fn new(info: ItemInfo, time: GenTime, first_effects: EffectsList, second_effects: EffectsList) -> Self {
        Self {
            info,
            time,
            first_effects,
            second_effects,
        }
    }
}

impl Command for MergeClipCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.merge_clip_items(&self.info, self.time, None)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.cut_clip_item(&self.info, self.time)?;
        editor.replace_effect_stack(self.info.track, self.info.start_pos, &self.first_effects)?;
        editor.replace_effect_stack(self.info.track, self.time, &self.second_effects)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Merge clips"
    }
}

// ---------------------------------------------------------------------------
// InsertSpaceCommand
// ---------------------------------------------------------------------------

/// Inserts (positive) or removes (negative) blank space.
#[derive(Debug)]
pub struct InsertSpaceCommand {
    time: GenTime,
    track: Option<usize>,
    duration: GenTime,
}

impl InsertSpaceCommand {
    pub fn new(time: GenTime, track: Option<usize>, duration: GenTime) -> Self {
        Self { time, track, duration }
    }
}

impl Command for InsertSpaceCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.shift_space(self.time, self.track, self.duration)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.shift_space(self.time + self.duration, self.track, -self.duration)
    }

    fn description(&self) -> &str {
        if self.duration > GenTime::ZERO {
            "Insert space"
        } else {
            "Remove space"
        }
    }
}

// ---------------------------------------------------------------------------
// MoveGroupCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MoveGroupCommand {
    /// Placements before the move.
    members: Vec<(ItemCategory, ItemInfo)>,
    time_offset: GenTime,
    track_offset: isize,
}

impl MoveGroupCommand {
    pub fn new(members: Vec<(ItemCategory, ItemInfo)>, time_offset: GenTime, track_offset: isize) -> Self {
        Self {
            members,
            time_offset,
            track_offset,
        }
    }

    fn moved(&self) -> Vec<(ItemCategory, ItemInfo)> {
        self.members
            .iter()
            .map(|(category, info)| {
                let track = info.track.saturating_add_signed(self.track_offset);
                (*category, info.translated(self.time_offset, track))
            })
            .collect()
    }
}

impl Command for MoveGroupCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_group_items(&self.members, self.time_offset, self.track_offset)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_group_items(&self.moved(), -self.time_offset, -self.track_offset)
    }

    fn description(&self) -> &str {
        "Move group"
    }
}

// ---------------------------------------------------------------------------
// ChangeSpeedCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChangeSpeedCommand {
    track: usize,
    start: GenTime,
    old: (f64, u32),
    new: (f64, u32),
}

impl ChangeSpeedCommand {
    pub fn new(track: usize, start: GenTime, old: (f64, u32), new: (f64, u32)) -> Self {
        Self { track, start, old, new }
    }
}

impl Command for ChangeSpeedCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .set_clip_speed(self.track, self.start, self.new.0, self.new.1)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .set_clip_speed(self.track, self.start, self.old.0, self.old.1)
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Change clip speed"
    }
}

// ---------------------------------------------------------------------------
// ChangeClipStateCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChangeClipStateCommand {
    track: usize,
    start: GenTime,
    old: ClipState,
    new: ClipState,
}

impl ChangeClipStateCommand {
    pub fn new(track: usize, start: GenTime, old: ClipState, new: ClipState) -> Self {
        Self { track, start, old, new }
    }
}

impl Command for ChangeClipStateCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_clip_state(self.track, self.start, self.new)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_clip_state(self.track, self.start, self.old)
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Change clip state"
    }
}

// ---------------------------------------------------------------------------
// AddEffectCommand
// ---------------------------------------------------------------------------

/// Adds (or, with `add == false`, deletes) the effect at its stamped index.
#[derive(Debug)]
pub struct AddEffectCommand {
    track: usize,
    start: GenTime,
    effect: EffectRecord,
    add: bool,
}

impl AddEffectCommand {
    pub fn new(track: usize, start: GenTime, effect: EffectRecord, add: bool) -> Self {
        Self {
            track,
            start,
            effect,
            add,
        }
    }

    fn apply(&self, editor: &mut TimelineEditor, add: bool) -> Result<()> {
        if add {
            editor
                .insert_effect(self.track, self.start, self.effect.clone())
                .map(|_| ())
        } else {
            editor
                .take_effect(self.track, self.start, self.effect.index)
                .map(|_| ())
        }
    }
}

impl Command for AddEffectCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, self.add)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, !self.add)
    }

    fn description(&self) -> &str {
        if self.add {
            "Add effect"
        } else {
            "Delete effect"
        }
    }
}

// ---------------------------------------------------------------------------
// EditEffectCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EditEffectCommand {
    track: usize,
    start: GenTime,
    old: EffectRecord,
    new: EffectRecord,
}

impl EditEffectCommand {
    pub fn new(track: usize, start: GenTime, old: EffectRecord, new: EffectRecord) -> Self {
        Self { track, start, old, new }
    }
}

impl Command for EditEffectCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_effect(self.track, self.start, self.new.clone())
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_effect(self.track, self.start, self.old.clone())
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Edit effect"
    }
}

// ---------------------------------------------------------------------------
// MoveEffectCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MoveEffectCommand {
    track: usize,
    start: GenTime,
    from: usize,
    to: usize,
}

impl MoveEffectCommand {
    pub fn new(track: usize, start: GenTime, from: usize, to: usize) -> Self {
        Self { track, start, from, to }
    }
}

impl Command for MoveEffectCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.reorder_effect(self.track, self.start, self.from, self.to)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.reorder_effect(self.track, self.start, self.to, self.from)
    }

    fn description(&self) -> &str {
        "Move effect"
    }
}

// ---------------------------------------------------------------------------
// ChangeEffectStateCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ChangeEffectStateCommand {
    track: usize,
    start: GenTime,
    indexes: Vec<usize>,
    disable: bool,
    /// Disabled flag of each index before the change.
    previous: Vec<bool>,
}

impl ChangeEffectStateCommand {
    pub fn new(track: usize, start: GenTime, indexes: Vec<usize>, disable: bool, previous: Vec<bool>) -> Self {
        Self {
            track,
            start,
            indexes,
            disable,
            previous,
        }
    }
}

impl Command for ChangeEffectStateCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .set_effects_disabled(self.track, self.start, &self.indexes, self.disable)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        for state in [true, false] {
            let indexes: Vec<usize> = self
                .indexes
                .iter()
                .zip(&self.previous)
                .filter(|(_, was)| **was == state)
                .map(|(ix, _)| *ix)
                .collect();
            if !indexes.is_empty() {
                editor.set_effects_disabled(self.track, self.start, &indexes, state)?;
            }
        }
        Ok(())
    }

    fn description(&self) -> &str {
        if self.disable {
            "Disable effects"
        } else {
            "Enable effects"
        }
    }
}

// ---------------------------------------------------------------------------
// EditKeyframeCommand
// ---------------------------------------------------------------------------

/// Replaces one keyframe curve, stored in its `"pos:val;pos:val"` form.
#[derive(Debug)]
pub struct EditKeyframeCommand {
    track: usize,
    start: GenTime,
    index: usize,
    param: String,
    old: String,
    new: String,
}

impl EditKeyframeCommand {
    pub fn new(
        track: usize,
        start: GenTime,
        index: usize,
        param: impl Into<String>,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Self {
        Self {
            track,
            start,
            index,
            param: param.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

impl Command for EditKeyframeCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_keyframes(self.track, self.start, self.index, &self.param, self.new.parse()?)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .replace_keyframes(self.track, self.start, self.index, &self.param, self.old.parse()?)
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Edit keyframes"
    }
}

// ---------------------------------------------------------------------------
// AddTransitionCommand
// ---------------------------------------------------------------------------

/// Adds (or, with `add == false`, deletes) a transition.
#[derive(Debug)]
pub struct AddTransitionCommand {
    transition: Transition,
    add: bool,
}

impl AddTransitionCommand {
    pub fn new(transition: Transition, add: bool) -> Self {
        Self { transition, add }
    }

    fn apply(&self, editor: &mut TimelineEditor, add: bool) -> Result<()> {
        if add {
            editor
                .restore_transition(self.transition.clone())
                .map(|_| ())
        } else {
            editor
                .take_transition(&self.transition.info())
                .map(|_| ())
        }
    }
}

impl Command for AddTransitionCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, self.add)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, !self.add)
    }

    fn description(&self) -> &str {
        if self.add {
            "Add transition"
        } else {
            "Delete transition"
        }
    }
}

// ---------------------------------------------------------------------------
// MoveTransitionCommand
// ---------------------------------------------------------------------------

/// Moves or resizes a transition window.
#[derive(Debug)]
pub struct MoveTransitionCommand {
    from: ItemInfo,
    to: ItemInfo,
}

impl MoveTransitionCommand {
    pub fn new(from: ItemInfo, to: ItemInfo) -> Self {
        Self { from, to }
    }
}

impl Command for MoveTransitionCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_transition_item(&self.from, &self.to)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.move_transition_item(&self.to, &self.from)
    }

    fn description(&self) -> &str {
        "Move transition"
    }
}

// ---------------------------------------------------------------------------
// EditTransitionCommand
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EditTransitionCommand {
    info: ItemInfo,
    old: TransitionProperties,
    new: TransitionProperties,
}

impl EditTransitionCommand {
    pub fn new(info: ItemInfo, old: TransitionProperties, new: TransitionProperties) -> Self {
        Self { info, old, new }
    }
}

impl Command for EditTransitionCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .set_transition_properties(&self.info, &self.new)
            .map(|_| ())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor
            .set_transition_properties(&self.info, &self.old)
            .map(|_| ())
    }

    fn description(&self) -> &str {
        "Edit transition"
    }
}

// ---------------------------------------------------------------------------
// AddTrackCommand
// ---------------------------------------------------------------------------

/// Inserts (or, with `add == false`, removes) an empty track.
#[derive(Debug)]
pub struct AddTrackCommand {
    index: usize,
    info: TrackInfo,
    add: bool,
}

impl AddTrackCommand {
    pub fn new(index: usize, info: TrackInfo, add: bool) -> Self {
        Self { index, info, add }
    }

    fn apply(&self, editor: &mut TimelineEditor, add: bool) -> Result<()> {
        if add {
            editor.insert_track_at(self.index, self.info.clone())
        } else {
            editor.take_track(self.index).map(|_| ())
        }
    }
}

impl Command for AddTrackCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, self.add)
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        self.apply(editor, !self.add)
    }

    fn description(&self) -> &str {
        if self.add {
            "Add track"
        } else {
            "Delete track"
        }
    }
}

// ---------------------------------------------------------------------------
// EditGuideCommand
// ---------------------------------------------------------------------------

/// Adds (`old == None`), deletes (`new == None`) or edits a guide.
#[derive(Debug)]
pub struct EditGuideCommand {
    old: Option<Guide>,
    new: Option<Guide>,
}

impl EditGuideCommand {
    pub fn new(old: Option<Guide>, new: Option<Guide>) -> Self {
        Self { old, new }
    }
}

impl Command for EditGuideCommand {
    fn execute(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.replace_guide(self.old.as_ref(), self.new.as_ref())
    }

    fn undo(&self, editor: &mut TimelineEditor) -> Result<()> {
        editor.replace_guide(self.new.as_ref(), self.old.as_ref())
    }

    fn description(&self) -> &str {
        match (&self.old, &self.new) {
            (None, _) => "Add guide",
            (_, None) => "Delete guide",
            _ => "Edit guide",
        }
    }
}
