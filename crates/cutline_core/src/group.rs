use crate::time::GenTime;
use crate::timeline::Timeline;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMember {
    pub id: ItemId,
    pub category: ItemCategory,
    /// Placement when the group was formed.
    pub info: ItemInfo,
}

/// Where one member ends up once the group is dissolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMove {
    pub id: ItemId,
    pub category: ItemCategory,
    pub from: ItemInfo,
    pub to: ItemInfo,
}

// ---------------------------------------------------------------------------
// ItemGroup
// ---------------------------------------------------------------------------

/// A transient set of items dragged as one body.
///
/// Members are never touched while the group moves; only the offsets
/// change. [`ItemGroup::decompose`] turns the net displacement back into one
/// placement per member.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemGroup {
    members: Vec<GroupMember>,
    time_offset: GenTime,
    track_offset: isize,
}

impl ItemGroup {
    /// Group the given items. Unknown ids are skipped.
    pub fn new(timeline: &Timeline, ids: &[ItemId]) -> Self {
        let members = ids
            .iter()
            .filter_map(|id| timeline.item(*id))
            .map(|item| GroupMember {
                id: item.id(),
                category: item.category(),
                info: item.info(),
            })
            .collect();
        Self {
            members,
            time_offset: GenTime::ZERO,
            track_offset: 0,
        }
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.members.iter().map(|m| m.id).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn time_offset(&self) -> GenTime {
        self.time_offset
    }

    pub fn track_offset(&self) -> isize {
        self.track_offset
    }

    pub fn set_offset(&mut self, time_offset: GenTime, track_offset: isize) {
        self.time_offset = time_offset;
        self.track_offset = track_offset;
    }

    /// Time span and track range covered by the clip members. Transitions
    /// are carried along but do not shape the group.
    pub fn clip_bounds(&self) -> Option<(GenTime, GenTime, usize, usize)> {
        self.members
            .iter()
            .filter(|m| m.category == ItemCategory::Clip)
            .map(|m| (m.info.start_pos, m.info.end_pos, m.info.track, m.info.track))
            .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1), a.2.min(b.2), a.3.max(b.3)))
    }

    fn target(&self, info: &ItemInfo) -> Option<ItemInfo> {
        let track = info.track.checked_add_signed(self.track_offset)?;
        Some(info.translated(self.time_offset, track))
    }

    /// Final placement of every member, or `None` if the track offset would
    /// push a member below track 0.
    pub fn decompose(&self) -> Option<Vec<GroupMove>> {
        self.members
            .iter()
            .map(|m| {
                self.target(&m.info).map(|to| GroupMove {
                    id: m.id,
                    category: m.category,
                    from: m.info,
                    to,
                })
            })
            .collect()
    }

    /// Whether every member can land at the current offsets without leaving
    /// the track range, starting before zero, landing on a locked track or
    /// overlapping an item outside the group.
    pub fn fits(&self, timeline: &Timeline) -> bool {
        let Some(moves) = self.decompose() else {
            return false;
        };
        let ids = self.ids();
        moves.iter().all(|m| {
            m.to.track < timeline.track_count()
                && !timeline.is_track_locked(m.to.track)
                && m.to.start_pos >= GenTime::ZERO
                && !timeline.collides(m.category, m.to.track, m.to.start_pos, m.to.end_pos, &ids)
        })
    }

    /// The largest time offset in the direction of `proposed` that keeps
    /// every member clear of items outside the group on its target track.
    pub fn clamp_time_offset(&self, timeline: &Timeline, proposed: GenTime) -> GenTime {
        let ids = self.ids();
        let mut offset = proposed;
        for member in &self.members {
            let Some(track) = member.info.track.checked_add_signed(self.track_offset) else {
                continue;
            };
            let others = timeline.items().filter(|i| {
                i.category() == member.category && i.info().track == track && !ids.contains(&i.id())
            });
            if proposed > GenTime::ZERO {
                for other in others {
                    let other = other.info();
                    if other.start_pos >= member.info.end_pos {
                        offset = offset.min(other.start_pos - member.info.end_pos);
                    }
                }
            } else {
                offset = offset.max(-member.info.start_pos);
                for other in others {
                    let other = other.info();
                    if other.end_pos <= member.info.start_pos {
                        offset = offset.max(other.end_pos - member.info.start_pos);
                    }
                }
            }
        }
        offset
    }
}
