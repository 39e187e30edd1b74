//! An in-memory multi-track playlist standing in for the render engine.
//!
//! Each track is a sequence of clips separated by explicit blanks, so every
//! mirror call has to find room the same way an engine playlist would. Calls
//! that are structurally impossible are refused and leave the playlist as it
//! was.

use crate::error::{RenderError, Result};
use cutline_core::document::TransitionRecord;
use cutline_core::effects::EffectsParameterList;
use cutline_core::renderer::{MirrorResult, Renderer};
use cutline_core::time::GenTime;
use cutline_core::types::{ItemInfo, TrackKind};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Playlist
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistClip {
    pub producer: String,
    /// First source frame played.
    pub in_frame: i64,
    pub length: i64,
    pub filters: Vec<EffectsParameterList>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Entry {
    Blank(i64),
    Clip(PlaylistClip),
}

impl Entry {
    fn length(&self) -> i64 {
        match self {
            Entry::Blank(len) => *len,
            Entry::Clip(clip) => clip.length,
        }
    }
}

/// One track. Entries never hold empty or adjacent blanks and never end
/// with a blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Playlist {
    pub kind: TrackKind,
    entries: Vec<Entry>,
}

impl Playlist {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Frame after the last clip.
    pub fn length(&self) -> i64 {
        self.entries.iter().map(Entry::length).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every clip with its start frame, in order.
    pub fn clips(&self) -> impl Iterator<Item = (i64, &PlaylistClip)> {
        self.positions().filter_map(|(start, entry)| match entry {
            Entry::Clip(clip) => Some((start, clip)),
            Entry::Blank(_) => None,
        })
    }

    pub fn clip_at(&self, start: i64) -> Option<&PlaylistClip> {
        self.clips().find(|(s, _)| *s == start).map(|(_, clip)| clip)
    }

    fn positions(&self) -> impl Iterator<Item = (i64, &Entry)> {
        self.entries.iter().scan(0, |pos, entry| {
            let start = *pos;
            *pos += entry.length();
            Some((start, entry))
        })
    }

    /// Entry index of the clip starting at `start`.
    fn clip_index(&self, start: i64) -> Option<usize> {
        self.positions()
            .position(|(s, e)| s == start && matches!(e, Entry::Clip(_)))
    }

    fn clip_mut(&mut self, start: i64) -> Option<&mut PlaylistClip> {
        let ix = self.clip_index(start)?;
        match &mut self.entries[ix] {
            Entry::Clip(clip) => Some(clip),
            Entry::Blank(_) => None,
        }
    }

    /// Replace the clip starting at `start` by a blank and return it.
    fn take_clip(&mut self, start: i64) -> Option<PlaylistClip> {
        let ix = self.clip_index(start)?;
        let length = self.entries[ix].length();
        let Entry::Clip(clip) = std::mem::replace(&mut self.entries[ix], Entry::Blank(length)) else {
            return None;
        };
        self.normalize();
        Some(clip)
    }

    /// Put `clip` at `start` if the whole span is blank or past the end.
    fn place_clip(&mut self, start: i64, clip: PlaylistClip) -> std::result::Result<(), PlaylistClip> {
        let end_of_track = self.length();
        if start >= end_of_track {
            if start > end_of_track {
                self.entries.push(Entry::Blank(start - end_of_track));
            }
            self.entries.push(Entry::Clip(clip));
            return Ok(());
        }
        let found = self
            .positions()
            .enumerate()
            .find(|(_, (s, e))| *s <= start && start < s + e.length())
            .map(|(ix, (s, e))| (ix, s, e.clone()));
        let Some((ix, blank_start, Entry::Blank(blank))) = found else {
            return Err(clip);
        };
        let after = blank_start + blank - (start + clip.length);
        // A blank is never the last entry, so the clip has to fit inside it.
        if after < 0 {
            return Err(clip);
        }
        let replacement = [
            Entry::Blank(start - blank_start),
            Entry::Clip(clip),
            Entry::Blank(after),
        ];
        self.entries.splice(ix..=ix, replacement);
        self.normalize();
        Ok(())
    }

    /// Open (`delta > 0`) or close (`delta < 0`) a gap in front of the first
    /// clip starting at or after `frame`.
    fn shift_from(&mut self, frame: i64, delta: i64) -> bool {
        let Some(ix) = self
            .positions()
            .position(|(s, e)| s >= frame && matches!(e, Entry::Clip(_)))
        else {
            return true;
        };
        if delta >= 0 {
            self.entries.insert(ix, Entry::Blank(delta));
        } else {
            match ix.checked_sub(1).map(|prev| &mut self.entries[prev]) {
                Some(Entry::Blank(len)) if *len >= -delta => *len += delta,
                _ => return false,
            }
        }
        self.normalize();
        true
    }

    fn normalize(&mut self) {
        let mut merged: Vec<Entry> = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if let Entry::Blank(len) = entry {
                if len == 0 {
                    continue;
                }
                if let Some(Entry::Blank(prev)) = merged.last_mut() {
                    *prev += len;
                    continue;
                }
            }
            merged.push(entry);
        }
        while matches!(merged.last(), Some(Entry::Blank(_))) {
            merged.pop();
        }
        self.entries = merged;
    }
}

// ---------------------------------------------------------------------------
// PlaylistRenderer
// ---------------------------------------------------------------------------

/// A [`Renderer`] keeping a playlist per track plus the transition records.
///
/// Filters are addressed by their position in the clip's stack, 1-based.
/// Transitions are matched by their whole record.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistRenderer {
    fps: f64,
    tracks: Vec<Playlist>,
    transitions: Vec<TransitionRecord>,
}

impl PlaylistRenderer {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            tracks: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn tracks(&self) -> &[Playlist] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Playlist> {
        self.tracks.get(index)
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn clip_at(&self, track: usize, start: i64) -> Option<&PlaylistClip> {
        self.tracks.get(track)?.clip_at(start)
    }

    /// Frame after the last clip on any track.
    pub fn duration(&self) -> i64 {
        self.tracks.iter().map(Playlist::length).max().unwrap_or(0)
    }

    /// Pretty JSON of the whole engine state.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn frames(&self, time: GenTime) -> i64 {
        time.frames(self.fps)
    }

    fn playlist_mut(&mut self, track: usize) -> Result<&mut Playlist> {
        self.tracks.get_mut(track).ok_or(RenderError::InvalidTrack(track))
    }

    fn clip_mut(&mut self, track: usize, start: GenTime) -> Result<&mut PlaylistClip> {
        let frame = self.frames(start);
        self.playlist_mut(track)?
            .clip_mut(frame)
            .ok_or(RenderError::ClipNotFound { track, frame })
    }

    fn take_clip(&mut self, track: usize, frame: i64) -> Result<PlaylistClip> {
        self.playlist_mut(track)?
            .take_clip(frame)
            .ok_or(RenderError::ClipNotFound { track, frame })
    }

    /// Take the clip at `frame`, let `change` rework it, and put it back at
    /// the start `change` returns. The original is restored on refusal.
    fn rework_clip(
        &mut self,
        track: usize,
        frame: i64,
        change: impl FnOnce(&mut PlaylistClip) -> Result<i64>,
    ) -> Result<i64> {
        let original = self.take_clip(track, frame)?;
        let mut clip = original.clone();
        let placed = change(&mut clip).and_then(|start| {
            self.playlist_mut(track)?
                .place_clip(start, clip)
                .map(|()| start)
                .map_err(|_| RenderError::Overlap { track, frame: start })
        });
        if placed.is_err() {
            self.restore(track, frame, original);
        }
        placed
    }

    fn restore(&mut self, track: usize, frame: i64, clip: PlaylistClip) {
        if let Some(playlist) = self.tracks.get_mut(track) {
            if playlist.place_clip(frame, clip).is_err() {
                tracing::error!("lost clip at frame {} on track {} while restoring", frame, track);
            }
        }
    }

    fn check_transition_tracks(&self, record: &TransitionRecord) -> Result<()> {
        for track in [record.a_track, record.b_track] {
            if track >= self.tracks.len() {
                return Err(RenderError::InvalidTrack(track));
            }
        }
        Ok(())
    }

    fn transition_index(&self, record: &TransitionRecord) -> Result<usize> {
        self.transitions
            .iter()
            .position(|t| t == record)
            .ok_or(RenderError::TransitionNotFound {
                track: record.a_track,
                frame: record.in_frame,
            })
    }

    /// Out points are inclusive.
    fn transition_overlaps(&self, record: &TransitionRecord, exclude: Option<usize>) -> bool {
        self.transitions.iter().enumerate().any(|(ix, t)| {
            Some(ix) != exclude
                && t.a_track == record.a_track
                && t.in_frame <= record.out_frame
                && record.in_frame <= t.out_frame
        })
    }

    fn check_transition_window(&self, record: &TransitionRecord, exclude: Option<usize>) -> Result<()> {
        self.check_transition_tracks(record)?;
        if record.out_frame < record.in_frame {
            return Err(RenderError::InvalidLength(record.out_frame - record.in_frame + 1));
        }
        if self.transition_overlaps(record, exclude) {
            return Err(RenderError::TransitionOverlap {
                track: record.a_track,
                frame: record.in_frame,
            });
        }
        Ok(())
    }

    fn filter_position(clip: &PlaylistClip, index: usize) -> Result<usize> {
        if index == 0 || index > clip.filters.len() {
            return Err(RenderError::EffectNotFound(index));
        }
        Ok(index - 1)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    fn do_insert_clip(&mut self, info: &ItemInfo, producer: &str, filters: &[EffectsParameterList]) -> Result<()> {
        let (track, start) = (info.track, self.frames(info.start_pos));
        let length = self.frames(info.end_pos) - start;
        if length <= 0 {
            return Err(RenderError::InvalidLength(length));
        }
        let clip = PlaylistClip {
            producer: producer.to_string(),
            in_frame: self.frames(info.crop_start),
            length,
            filters: filters.to_vec(),
        };
        self.playlist_mut(track)?
            .place_clip(start, clip)
            .map_err(|_| RenderError::Overlap { track, frame: start })
    }

    fn do_move_clip(
        &mut self,
        old_track: usize,
        new_track: usize,
        old_start: i64,
        new_start: i64,
        producer: &str,
    ) -> Result<()> {
        self.playlist_mut(new_track)?;
        let mut clip = self.take_clip(old_track, old_start)?;
        let original = clip.clone();
        clip.producer = producer.to_string();
        let placed = self
            .playlist_mut(new_track)?
            .place_clip(new_start, clip)
            .map_err(|_| RenderError::Overlap {
                track: new_track,
                frame: new_start,
            });
        if placed.is_err() {
            self.restore(old_track, old_start, original);
        }
        placed
    }

    fn do_resize(&mut self, info: &ItemInfo, delta: GenTime, at_start: bool) -> Result<()> {
        let start = self.frames(info.start_pos);
        let delta = self.frames(delta);
        self.rework_clip(info.track, start, |clip| {
            if at_start {
                clip.in_frame += delta;
                clip.length -= delta;
            } else {
                clip.length += delta;
            }
            if clip.length <= 0 || clip.in_frame < 0 {
                return Err(RenderError::InvalidLength(clip.length));
            }
            Ok(if at_start { start + delta } else { start })
        })
        .map(|_| ())
    }

    fn do_cut_clip(&mut self, track: usize, time: GenTime) -> Result<()> {
        let frame = self.frames(time);
        let playlist = self.playlist_mut(track)?;
        let found = playlist
            .positions()
            .enumerate()
            .find(|(_, (s, e))| *s < frame && frame < s + e.length() && matches!(e, Entry::Clip(_)))
            .map(|(ix, (s, _))| (ix, s));
        let Some((ix, start)) = found else {
            return Err(RenderError::ClipNotFound { track, frame });
        };
        let Entry::Clip(first) = &mut playlist.entries[ix] else {
            return Err(RenderError::ClipNotFound { track, frame });
        };
        let head = frame - start;
        let second = PlaylistClip {
            in_frame: first.in_frame + head,
            length: first.length - head,
            ..first.clone()
        };
        first.length = head;
        playlist.entries.insert(ix + 1, Entry::Clip(second));
        Ok(())
    }

    /// The new length is the played source span at the new speed, rounded
    /// to whole frames.
    fn do_change_speed(&mut self, info: &ItemInfo, new_speed: f64, old_speed: f64, producer: &str) -> Result<i64> {
        if new_speed == 0.0 || old_speed == 0.0 {
            return Err(RenderError::InvalidSpeed(if new_speed == 0.0 { new_speed } else { old_speed }));
        }
        let start = self.frames(info.start_pos);
        let ratio = old_speed.abs() / new_speed.abs();
        let placed = self.rework_clip(info.track, start, |clip| {
            clip.in_frame = (clip.in_frame as f64 * ratio).round() as i64;
            clip.length = ((clip.length as f64 * ratio).round() as i64).max(1);
            clip.producer = producer.to_string();
            Ok(start)
        })?;
        let length = self.clip_at(info.track, placed).map_or(0, |c| c.length);
        Ok(placed + length)
    }

    fn do_insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> Result<()> {
        let (frame, delta) = (self.frames(time), self.frames(duration));
        let targets: Vec<usize> = match track {
            Some(track) => {
                self.playlist_mut(track)?;
                vec![track]
            }
            None => (0..self.tracks.len()).collect(),
        };
        let mut shifted = self.tracks.clone();
        for &ix in &targets {
            if !shifted[ix].shift_from(frame, delta) {
                return Err(RenderError::NotBlank { track: ix, frame });
            }
        }
        self.tracks = shifted;
        for t in self
            .transitions
            .iter_mut()
            .filter(|t| targets.contains(&t.a_track) && t.in_frame >= frame)
        {
            t.in_frame += delta;
            t.out_frame += delta;
        }
        Ok(())
    }
}

impl Renderer for PlaylistRenderer {
    fn insert_clip(&mut self, info: &ItemInfo, producer: &str, effects: &[EffectsParameterList]) -> MirrorResult<()> {
        self.do_insert_clip(info, producer, effects)?;
        tracing::debug!("playlist: inserted {} on track {} at {}", producer, info.track, info.start_pos);
        Ok(())
    }

    fn remove_clip(&mut self, track: usize, start: GenTime) -> MirrorResult<()> {
        let frame = self.frames(start);
        self.take_clip(track, frame)?;
        tracing::debug!("playlist: removed clip on track {} at frame {}", track, frame);
        Ok(())
    }

    fn move_clip(
        &mut self,
        old_track: usize,
        new_track: usize,
        old_start_frame: i64,
        new_start_frame: i64,
        producer: &str,
    ) -> MirrorResult<()> {
        Ok(self.do_move_clip(old_track, new_track, old_start_frame, new_start_frame, producer)?)
    }

    fn resize_clip_start(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        Ok(self.do_resize(info, delta, true)?)
    }

    fn resize_clip_end(&mut self, info: &ItemInfo, delta: GenTime) -> MirrorResult<()> {
        Ok(self.do_resize(info, delta, false)?)
    }

    fn cut_clip(&mut self, track: usize, time: GenTime) -> MirrorResult<()> {
        Ok(self.do_cut_clip(track, time)?)
    }

    fn change_clip_speed(
        &mut self,
        info: &ItemInfo,
        new_speed: f64,
        old_speed: f64,
        _strobe: u32,
        producer: &str,
    ) -> MirrorResult<i64> {
        Ok(self.do_change_speed(info, new_speed, old_speed, producer)?)
    }

    fn add_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        self.check_transition_window(transition, None)?;
        self.transitions.push(transition.clone());
        Ok(())
    }

    fn delete_transition(&mut self, transition: &TransitionRecord) -> MirrorResult<()> {
        let ix = self.transition_index(transition)?;
        self.transitions.remove(ix);
        Ok(())
    }

    fn move_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()> {
        let ix = self.transition_index(old)?;
        self.check_transition_window(new, Some(ix))?;
        self.transitions[ix] = new.clone();
        Ok(())
    }

    fn update_transition(&mut self, old: &TransitionRecord, new: &TransitionRecord) -> MirrorResult<()> {
        let ix = self.transition_index(old)?;
        self.check_transition_tracks(new)?;
        self.transitions[ix] = new.clone();
        Ok(())
    }

    fn add_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        let clip = self.clip_mut(track, start)?;
        let len = clip.filters.len();
        let pos = params.index().map_or(len, |ix| ix.saturating_sub(1)).min(len);
        clip.filters.insert(pos, params.clone());
        Ok(())
    }

    fn edit_effect(&mut self, track: usize, start: GenTime, params: &EffectsParameterList) -> MirrorResult<()> {
        let clip = self.clip_mut(track, start)?;
        let pos = Self::filter_position(clip, params.index().unwrap_or(0))?;
        clip.filters[pos] = params.clone();
        Ok(())
    }

    fn remove_effect(&mut self, track: usize, start: GenTime, index: usize) -> MirrorResult<()> {
        let clip = self.clip_mut(track, start)?;
        let pos = Self::filter_position(clip, index)?;
        clip.filters.remove(pos);
        Ok(())
    }

    fn move_effect(&mut self, track: usize, start: GenTime, old_index: usize, new_index: usize) -> MirrorResult<()> {
        let clip = self.clip_mut(track, start)?;
        let from = Self::filter_position(clip, old_index)?;
        let to = Self::filter_position(clip, new_index)?;
        let filter = clip.filters.remove(from);
        clip.filters.insert(to, filter);
        Ok(())
    }

    fn insert_space(&mut self, time: GenTime, track: Option<usize>, duration: GenTime) -> MirrorResult<()> {
        self.do_insert_space(time, track, duration)?;
        tracing::debug!("playlist: space of {} at {}", duration, time);
        Ok(())
    }

    fn insert_track(&mut self, index: usize, kind: TrackKind) -> MirrorResult<()> {
        if index > self.tracks.len() {
            return Err(RenderError::InvalidTrack(index).into());
        }
        self.tracks.insert(index, Playlist::new(kind));
        Ok(())
    }

    fn remove_track(&mut self, index: usize) -> MirrorResult<()> {
        let playlist = self.tracks.get(index).ok_or(RenderError::InvalidTrack(index))?;
        if playlist.clips().next().is_some() {
            return Err(RenderError::TrackNotEmpty(index).into());
        }
        self.tracks.remove(index);
        Ok(())
    }
}
