use super::TimelineEditor;
use crate::error::{CoreError, Result};
use crate::group::{GroupMove, ItemGroup};
use crate::history::{InsertSpaceCommand, MoveGroupCommand};
use crate::time::GenTime;
use crate::timeline::TimelineItem;
use crate::types::*;

impl TimelineEditor {
    // -----------------------------------------------------------------------
    // Space
    // -----------------------------------------------------------------------

    /// Shift every item starting at or after `time` by `duration`, on
    /// `track` or, with `None`, on every track. A negative duration removes
    /// space and needs the gap before `time` to be blank.
    pub fn insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> Result<()> {
        let description = if duration < GenTime::ZERO {
            "Remove space"
        } else {
            "Insert space"
        };
        self.edit(description, |editor| {
            if let Some(track) = track {
                editor.check_track(track)?;
            }
            if duration.is_zero() || editor.timeline.items_starting_from(time, track).is_empty() {
                return Ok(());
            }
            editor.shift_space(time, track, duration)?;
            editor.record(Box::new(InsertSpaceCommand::new(time, track, duration)));
            Ok(())
        })
    }

    /// Close `duration` of blank space ending at `time`.
    pub fn remove_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> Result<()> {
        self.insert_space(time, track, -duration.abs())
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    /// Move `ids` as one body by `time_offset` and `track_offset`.
    /// Transitions whose clips all move are carried along.
    pub fn move_group(&mut self, ids: &[ItemId], time_offset: GenTime, track_offset: isize) -> Result<()> {
        self.edit("Move group", |editor| {
            for id in ids {
                let item = editor.timeline.item(*id).ok_or(CoreError::UnknownItem(*id))?;
                editor.check_track(item.info().track)?;
            }
            let mut members = ids.to_vec();
            for transition in editor.timeline.transitions() {
                let clips: Vec<ItemId> = [transition.reference_clip(), transition.second_clip()]
                    .into_iter()
                    .flatten()
                    .collect();
                if !clips.is_empty() && clips.iter().all(|c| ids.contains(c)) && !members.contains(&transition.id()) {
                    members.push(transition.id());
                }
            }
            if members.is_empty() || (time_offset.is_zero() && track_offset == 0) {
                return Ok(());
            }
            let placements: Vec<(ItemCategory, ItemInfo)> = ItemGroup::new(&editor.timeline, &members)
                .members()
                .iter()
                .map(|m| (m.category, m.info))
                .collect();
            editor.move_group_items(&placements, time_offset, track_offset)?;
            editor.record(Box::new(MoveGroupCommand::new(placements, time_offset, track_offset)));
            Ok(())
        })
    }

    /// Moving items must take their transitions along, and moving
    /// transitions their clips.
    fn check_detached_transitions(&self, moving: &[ItemId], action: &str) -> Result<()> {
        for transition in self.timeline.transitions() {
            let moves = moving.contains(&transition.id());
            let detached = [transition.reference_clip(), transition.second_clip()]
                .into_iter()
                .flatten()
                .any(|clip| moving.contains(&clip) != moves);
            if detached {
                return Err(CoreError::InvalidOperation(format!(
                    "Cannot {}: the transition at {} would leave its clips",
                    action,
                    transition.info().start_pos
                )));
            }
        }
        Ok(())
    }

    fn place_members(&mut self, moves: &[GroupMove], forward: bool) {
        for m in moves {
            let to = if forward { m.to } else { m.from };
            let end_track = self.timeline.previous_video_track(to.track);
            if let Some(item) = self.timeline.item_mut(m.id) {
                item.geometry_mut().set_start_pos(to.start_pos);
                item.geometry_mut().set_track(to.track);
                if let TimelineItem::Transition(t) = item {
                    t.update_transition_end_track(end_track);
                }
            }
        }
    }

    /// Mirror each of `ids` back in or out, newest first, while unwinding.
    fn compensate_items(&mut self, ids: &[ItemId], present: bool) {
        for id in ids.iter().rev() {
            if let Err(e) = self.mirror_item(*id, present) {
                tracing::error!("failed to revert group member {}: {}", id, e);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Entry points shared with undo/redo
    // -----------------------------------------------------------------------

    pub(crate) fn shift_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> Result<()> {
        let ids = self.timeline.items_starting_from(time, track);
        if ids.is_empty() || duration.is_zero() {
            return Ok(());
        }
        let action = if duration < GenTime::ZERO {
            "remove space"
        } else {
            "insert space"
        };
        if duration < GenTime::ZERO && self.timeline.items_starting_from(time + duration, track).len() != ids.len() {
            return Err(CoreError::Collision(format!(
                "Cannot {} at {}: the space is not blank",
                action, time
            )));
        }
        self.check_detached_transitions(&ids, action)?;

        let mut group = ItemGroup::new(&self.timeline, &ids);
        group.set_offset(duration, 0);
        let moves = group
            .decompose()
            .filter(|_| group.fits(&self.timeline))
            .ok_or_else(|| CoreError::Collision(format!("Cannot {} at {}", action, time)))?;

        self.place_members(&moves, true);
        if let Err(e) = self.mirror("inserting space", |r| r.insert_space(time, track, duration)) {
            self.place_members(&moves, false);
            return Err(e);
        }
        tracing::debug!("shifted {} items at {} by {}", moves.len(), time, duration);
        Ok(())
    }

    /// Move the items placed at `members` by both offsets. Every member
    /// leaves the renderer before any is put back, so members never collide
    /// with each other on the way.
    pub(crate) fn move_group_items(
        &mut self,
        members: &[(ItemCategory, ItemInfo)],
        time_offset: GenTime,
        track_offset: isize,
    ) -> Result<()> {
        let ids = members
            .iter()
            .map(|(category, info)| {
                let what = match category {
                    ItemCategory::Clip => "clip",
                    ItemCategory::Transition => "transition",
                };
                self.timeline
                    .item_starting_at(*category, info.track, info.start_pos)
                    .ok_or_else(|| self.not_found(what, info.track, info.start_pos))
            })
            .collect::<Result<Vec<ItemId>>>()?;
        self.check_detached_transitions(&ids, "move group")?;

        let mut group = ItemGroup::new(&self.timeline, &ids);
        group.set_offset(time_offset, track_offset);
        let start = group.clip_bounds().map_or(time_offset, |(start, ..)| start + time_offset);
        let moves = group
            .decompose()
            .filter(|_| group.fits(&self.timeline))
            .ok_or_else(|| CoreError::Collision(format!("Cannot move group to position {}", start)))?;

        let mut removed = Vec::with_capacity(moves.len());
        for m in &moves {
            if let Err(e) = self.mirror_item(m.id, false) {
                self.compensate_items(&removed, true);
                return Err(e);
            }
            removed.push(m.id);
        }

        self.place_members(&moves, true);
        let mut inserted = Vec::with_capacity(moves.len());
        for m in &moves {
            if let Err(e) = self.mirror_item(m.id, true) {
                self.compensate_items(&inserted, false);
                self.place_members(&moves, false);
                self.compensate_items(&removed, true);
                return Err(e);
            }
            inserted.push(m.id);
        }
        tracing::debug!("moved group of {} items by {}", moves.len(), time_offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::renderer::MirrorCall;
    use crate::transition::Transition;

    fn start_of(editor: &TimelineEditor, id: ItemId) -> GenTime {
        editor.timeline().item(id).unwrap().info().start_pos
    }

    #[test]
    fn insert_space_shifts_later_items_on_one_track() {
        let (mut editor, recorder) = editor();
        let early = add_clip(&mut editor, 0.0, 1.0, 1);
        let at = add_clip(&mut editor, 2.0, 4.0, 1);
        let late = add_clip(&mut editor, 6.0, 8.0, 1);
        let other = add_clip(&mut editor, 3.0, 5.0, 0);
        recorder.borrow_mut().clear();

        editor.insert_space(secs(2.0), Some(1), secs(5.0)).unwrap();
        assert_eq!(start_of(&editor, early), secs(0.0));
        assert_eq!(start_of(&editor, at), secs(7.0));
        assert_eq!(start_of(&editor, late), secs(11.0));
        assert_eq!(start_of(&editor, other), secs(3.0));
        assert_eq!(
            recorder.borrow().calls(),
            &[MirrorCall::InsertSpace {
                time: 50,
                track: Some(1),
                duration: 125
            }]
        );

        editor.undo().unwrap();
        assert_eq!(start_of(&editor, at), secs(2.0));
        assert_eq!(start_of(&editor, late), secs(6.0));
    }

    #[test]
    fn remove_space_needs_blank() {
        let (mut editor, _) = editor();
        add_clip(&mut editor, 0.0, 4.0, 0);
        let b = add_clip(&mut editor, 6.0, 8.0, 0);

        let err = editor.remove_space(secs(6.0), Some(0), secs(3.0)).unwrap_err();
        assert!(matches!(err, CoreError::Collision(_)));
        assert_eq!(start_of(&editor, b), secs(6.0));

        editor.remove_space(secs(6.0), Some(0), secs(2.0)).unwrap();
        assert_eq!(start_of(&editor, b), secs(4.0));
        assert_eq!(editor.history().undo_description(), Some("Remove space"));
        editor.undo().unwrap();
        assert_eq!(start_of(&editor, b), secs(6.0));
    }

    #[test]
    fn refused_space_insert_rolls_back() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 4.0, 6.0, 0);
        let before = editor.history().undo_len();
        recorder.borrow_mut().fail_next("insert_space");

        assert!(editor.insert_space(secs(1.0), None, secs(2.0)).is_err());
        assert_eq!(start_of(&editor, a), secs(4.0));
        assert_eq!(editor.history().undo_len(), before);
    }

    #[test]
    fn space_on_every_track_carries_transitions() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 4.0, 8.0, 1);
        let b = add_clip(&mut editor, 0.0, 2.0, 0);
        let transition = Transition::anchored("luma", editor.timeline().clip(a).unwrap(), secs(5.0), secs(6.0), 0, false);
        let t = editor.add_transition(transition).unwrap();

        editor.insert_space(secs(3.0), None, secs(2.0)).unwrap();
        assert_eq!(start_of(&editor, a), secs(6.0));
        assert_eq!(start_of(&editor, t), secs(7.0));
        assert_eq!(start_of(&editor, b), secs(0.0));
    }

    #[test]
    fn group_members_do_not_collide_with_each_other() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 2.0, 4.0, 0);

        editor.move_group(&[a, b], secs(2.0), 0).unwrap();
        assert_eq!(start_of(&editor, a), secs(2.0));
        assert_eq!(start_of(&editor, b), secs(4.0));

        editor.undo().unwrap();
        assert_eq!(start_of(&editor, a), secs(0.0));
        assert_eq!(start_of(&editor, b), secs(2.0));
    }

    #[test]
    fn group_move_onto_an_outsider_is_rejected() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 2.0, 4.0, 0);
        add_clip(&mut editor, 7.0, 9.0, 0);
        recorder.borrow_mut().clear();

        let err = editor.move_group(&[a, b], secs(4.0), 0).unwrap_err();
        assert!(matches!(err, CoreError::Collision(_)));
        assert_eq!(start_of(&editor, b), secs(2.0));
        assert!(recorder.borrow().calls().is_empty());
    }

    #[test]
    fn refused_group_insert_restores_every_member() {
        let (mut editor, recorder) = editor();
        let a = add_clip(&mut editor, 0.0, 2.0, 0);
        let b = add_clip(&mut editor, 2.0, 4.0, 0);
        let before = editor.history().undo_len();
        recorder.borrow_mut().clear();
        recorder.borrow_mut().fail_on_nth("insert_clip", 2);

        assert!(editor.move_group(&[a, b], secs(10.0), 1).is_err());
        let a_info = editor.timeline().clip(a).unwrap().info();
        let b_info = editor.timeline().clip(b).unwrap().info();
        assert_eq!((a_info.start_pos, a_info.track), (secs(0.0), 0));
        assert_eq!((b_info.start_pos, b_info.track), (secs(2.0), 0));
        assert_eq!(recorder.borrow().count("remove_clip"), 3);
        assert_eq!(recorder.borrow().count("insert_clip"), 3);
        assert_eq!(editor.history().undo_len(), before);
    }

    #[test]
    fn group_track_move_takes_anchored_transitions() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 4.0, 1);
        let transition = Transition::anchored("luma", editor.timeline().clip(a).unwrap(), secs(1.0), secs(2.0), 0, false);
        let t = editor.add_transition(transition).unwrap();

        editor.move_group(&[a], GenTime::ZERO, 1).unwrap();
        let moved = editor.timeline().transition(t).unwrap();
        assert_eq!(moved.info().track, 2);
        assert_eq!(moved.transition_end_track(), 1);

        editor.undo().unwrap();
        let moved = editor.timeline().transition(t).unwrap();
        assert_eq!(moved.info().track, 1);
        assert_eq!(moved.transition_end_track(), 0);
    }

    #[test]
    fn group_cannot_split_a_two_clip_transition() {
        let (mut editor, _) = editor();
        let a = add_clip(&mut editor, 0.0, 6.0, 0);
        let b = add_clip(&mut editor, 4.0, 10.0, 1);
        let between = {
            let timeline = editor.timeline();
            Transition::between("dissolve", timeline.clip(a).unwrap(), timeline.clip(b).unwrap(), 0)
        };
        editor.add_transition(between).unwrap();

        let err = editor.move_group(&[b], secs(1.0), 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation(_)));
        editor.move_group(&[a, b], secs(1.0), 0).unwrap();
        assert_eq!(start_of(&editor, a), secs(1.0));
    }
}
