use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display values below this delete a dragged keyframe.
pub const DELETE_BELOW: f64 = -50.0;
/// Display values above this delete a dragged keyframe.
pub const DELETE_ABOVE: f64 = 150.0;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed keyframe entry: {0:?}")]
pub struct KeyframeParseError(pub String);

// ---------------------------------------------------------------------------
// Keyframes
// ---------------------------------------------------------------------------

/// An animated parameter: frame position to value, ordered by frame.
///
/// The text form is `"pos:value;pos:value"`, which is also what gets
/// serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Keyframes(BTreeMap<i64, f64>);

impl Keyframes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn from_points(points: impl IntoIterator<Item = (i64, f64)>) -> Self {
        Self(points.into_iter().collect())
    }

    pub fn insert(&mut self, pos: i64, value: f64) {
        self.0.insert(pos, value);
    }

    pub fn remove(&mut self, pos: i64) -> Option<f64> {
        self.0.remove(&pos)
    }

    pub fn get(&self, pos: i64) -> Option<f64> {
        self.0.get(&pos).copied()
    }

    pub fn contains(&self, pos: i64) -> bool {
        self.0.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn first(&self) -> Option<(i64, f64)> {
        self.0.iter().next().map(|(k, v)| (*k, *v))
    }

    pub fn last(&self) -> Option<(i64, f64)> {
        self.0.iter().next_back().map(|(k, v)| (*k, *v))
    }

    fn before(&self, pos: i64) -> Option<(i64, f64)> {
        self.0.range(..pos).next_back().map(|(k, v)| (*k, *v))
    }

    fn at_or_after(&self, pos: i64) -> Option<(i64, f64)> {
        self.0.range(pos..).next().map(|(k, v)| (*k, *v))
    }

    /// Value at `pos`, interpolating linearly between neighbours and holding
    /// the first/last value outside the keyed range.
    pub fn value_at(&self, pos: i64) -> Option<f64> {
        if let Some(v) = self.get(pos) {
            return Some(v);
        }
        match (self.before(pos), self.at_or_after(pos)) {
            (Some(a), Some(b)) => Some(interpolate(a, b, pos)),
            (Some((_, v)), None) | (None, Some((_, v))) => Some(v),
            (None, None) => None,
        }
    }

    /// Move every keyframe by `delta` frames.
    pub fn shift(&mut self, delta: i64) {
        if delta == 0 {
            return;
        }
        self.0 = self.0.iter().map(|(k, v)| (k + delta, *v)).collect();
    }

    /// Restrict keyframes to `[start, end]` inclusive.
    ///
    /// Points outside the range are dropped and replaced by a keyframe on the
    /// boundary, interpolated from the two keyframes straddling it (or holding
    /// the nearest value when nothing lies on the other side). Returns true if
    /// anything changed.
    pub fn clamp_to_range(&mut self, start: i64, end: i64) -> bool {
        if self.0.is_empty() || start > end {
            return false;
        }
        let mut modified = false;

        if let Some(outside) = self.before(start) {
            let boundary = match self.at_or_after(start) {
                Some((pos, _)) if pos == start => None,
                Some(inside) => Some(interpolate(outside, inside, start)),
                None => Some(outside.1),
            };
            self.0 = self.0.split_off(&start);
            if let Some(value) = boundary {
                self.0.insert(start, value);
            }
            modified = true;
        }

        if let Some(outside) = self.at_or_after(end + 1) {
            let boundary = match self.0.range(..=end).next_back().map(|(k, v)| (*k, *v)) {
                Some((pos, _)) if pos == end => None,
                Some(inside) => Some(interpolate(inside, outside, end)),
                None => Some(outside.1),
            };
            self.0.retain(|pos, _| *pos <= end);
            if let Some(value) = boundary {
                self.0.insert(end, value);
            }
            modified = true;
        }

        modified
    }

    /// Join the two halves of a curve split at `at`: keys before `at` come
    /// from `before`, keys after it from `after`. A key on `at` survives only
    /// where the joined curve would not pass through it anyway, so boundary
    /// keys added by [`clamp_to_range`](Self::clamp_to_range) disappear.
    pub fn join(before: &Keyframes, after: &Keyframes, at: i64) -> Keyframes {
        let mut joined = Keyframes(before.0.range(..at).map(|(k, v)| (*k, *v)).collect());
        joined.0.extend(after.0.range(at + 1..).map(|(k, v)| (*k, *v)));
        if let Some(value) = before.get(at).or_else(|| after.get(at)) {
            if joined.value_at(at) != Some(value) {
                joined.insert(at, value);
            }
        }
        joined
    }
}

fn interpolate(a: (i64, f64), b: (i64, f64), pos: i64) -> f64 {
    if b.0 == a.0 {
        return a.1;
    }
    let ratio = (pos - a.0) as f64 / (b.0 - a.0) as f64;
    a.1 + (b.1 - a.1) * ratio
}

impl fmt::Display for Keyframes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (pos, value) in &self.0 {
            if !first {
                f.write_str(";")?;
            }
            first = false;
            write!(f, "{}:{}", pos, value)?;
        }
        Ok(())
    }
}

impl FromStr for Keyframes {
    type Err = KeyframeParseError;

    /// Accepts `:` or `=` between position and value and ignores empty
    /// entries, so trailing separators are fine.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut points = BTreeMap::new();
        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (pos, value) = entry
                .split_once([':', '='])
                .ok_or_else(|| KeyframeParseError(entry.to_string()))?;
            let pos: i64 = pos
                .trim()
                .parse()
                .map_err(|_| KeyframeParseError(entry.to_string()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| KeyframeParseError(entry.to_string()))?;
            points.insert(pos, value);
        }
        Ok(Self(points))
    }
}

impl From<Keyframes> for String {
    fn from(k: Keyframes) -> Self {
        k.to_string()
    }
}

impl TryFrom<String> for Keyframes {
    type Error = KeyframeParseError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ---------------------------------------------------------------------------
// KeyframeEditor
// ---------------------------------------------------------------------------

/// Outcome of dragging the edited keyframe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyframeDrag {
    /// No keyframe was being edited.
    Ignored,
    Moved { pos: i64, value: f64 },
    Deleted(i64),
}

/// The keyframes shown on an item, with the on-screen editing state.
///
/// `selected` is the keyframe drawn as active, `edited` the one under the
/// pointer. Display values use a 0 to 100 range mapped onto the parameter's
/// real range through `factor` and `offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeEditor {
    keys: Keyframes,
    selected: Option<i64>,
    edited: Option<i64>,
    factor: f64,
    offset: f64,
}

impl Default for KeyframeEditor {
    fn default() -> Self {
        Self {
            keys: Keyframes::new(),
            selected: None,
            edited: None,
            factor: 1.0,
            offset: 0.0,
        }
    }
}

impl KeyframeEditor {
    /// Editor for a parameter ranging over `[min, max]`.
    pub fn with_range(keys: Keyframes, min: f64, max: f64) -> Self {
        let factor = if max > min { 100.0 / (max - min) } else { 1.0 };
        Self {
            keys,
            selected: None,
            edited: None,
            factor,
            offset: min,
        }
    }

    pub fn keys(&self) -> &Keyframes {
        &self.keys
    }

    pub fn set_keys(&mut self, keys: Keyframes) {
        self.keys = keys;
        self.selected = self.selected.filter(|p| self.keys.contains(*p));
        self.edited = self.edited.filter(|p| self.keys.contains(*p));
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn has_key_frames(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn selected_key_frame(&self) -> Option<i64> {
        self.selected
    }

    pub fn edited_key_frame(&self) -> Option<i64> {
        self.edited
    }

    pub fn to_display(&self, value: f64) -> f64 {
        (value - self.offset) * self.factor
    }

    pub fn from_display(&self, display: f64) -> f64 {
        display / self.factor + self.offset
    }

    /// Make the keyframe at `pos` both selected and edited.
    pub fn set_edited_key_frame(&mut self, pos: i64) -> bool {
        if self.keys.contains(pos) {
            self.edited = Some(pos);
            self.selected = Some(pos);
            true
        } else {
            false
        }
    }

    /// Keyframe closest to `pos` within `tolerance` frames.
    pub fn key_frame_near(&self, pos: i64, tolerance: i64) -> Option<i64> {
        self.keys
            .iter()
            .map(|(k, _)| k)
            .filter(|k| (k - pos).abs() <= tolerance)
            .min_by_key(|k| (k - pos).abs())
    }

    /// Insert a keyframe from a display value and start editing it.
    pub fn add_key_frame(&mut self, pos: i64, display_value: f64) {
        let value = self.from_display(display_value.clamp(0.0, 100.0));
        self.keys.insert(pos, value);
        self.selected = Some(pos);
        self.edited = Some(pos);
    }

    pub fn remove_key_frame(&mut self, pos: i64) -> bool {
        if self.keys.remove(pos).is_none() {
            return false;
        }
        if self.edited == Some(pos) {
            self.edited = None;
        }
        if self.selected == Some(pos) {
            self.selected = self.keys.before(pos).map(|(k, _)| k);
        }
        true
    }

    /// Drag the edited keyframe to `pos` with a display value.
    ///
    /// The keyframe stays strictly between its neighbours and inside
    /// `[crop_start, crop_end)`. Dragging an inner keyframe far outside the
    /// display range deletes it; the first and last keyframes are kept.
    pub fn update_key_frame_pos(
        &mut self,
        pos: i64,
        display_value: f64,
        crop_start: i64,
        crop_end: i64,
    ) -> KeyframeDrag {
        let Some(edited) = self.edited.filter(|p| self.keys.contains(*p)) else {
            return KeyframeDrag::Ignored;
        };
        let is_outer = self.keys.first().map(|(k, _)| k) == Some(edited)
            || self.keys.last().map(|(k, _)| k) == Some(edited);

        if !is_outer && !(DELETE_BELOW..=DELETE_ABOVE).contains(&display_value) {
            self.remove_key_frame(edited);
            return KeyframeDrag::Deleted(edited);
        }

        let mut min = crop_start - 1;
        let mut max = crop_end;
        if let Some((prev, _)) = self.keys.before(edited) {
            min = min.max(prev);
        }
        if let Some((next, _)) = self.keys.at_or_after(edited + 1) {
            max = max.min(next);
        }
        let mut new_pos = pos;
        if new_pos <= min {
            new_pos = min + 1;
        }
        if new_pos >= max {
            new_pos = max - 1;
        }

        let value = self.from_display(display_value.clamp(0.0, 100.0));
        self.keys.remove(edited);
        self.keys.insert(new_pos, value);
        self.edited = Some(new_pos);
        self.selected = Some(new_pos);
        KeyframeDrag::Moved {
            pos: new_pos,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        let k: Keyframes = "0:50;100=75.5;".parse().unwrap();
        assert_eq!(k.len(), 2);
        assert_eq!(k.get(100), Some(75.5));
        assert_eq!(k.to_string(), "0:50;100:75.5");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("0:50;abc".parse::<Keyframes>().is_err());
        assert!("12".parse::<Keyframes>().is_err());
    }

    #[test]
    fn serializes_as_string() {
        let k = Keyframes::from_points([(0, 1.0), (10, 2.0)]);
        let json = serde_json::to_string(&k).unwrap();
        assert_eq!(json, "\"0:1;10:2\"");
        let back: Keyframes = serde_json::from_str(&json).unwrap();
        assert_eq!(back, k);
    }

    #[test]
    fn value_at_interpolates_and_holds() {
        let k = Keyframes::from_points([(0, 0.0), (10, 100.0)]);
        assert_eq!(k.value_at(5), Some(50.0));
        assert_eq!(k.value_at(-3), Some(0.0));
        assert_eq!(k.value_at(20), Some(100.0));
        assert_eq!(Keyframes::new().value_at(0), None);
    }

    #[test]
    fn clamp_interpolates_at_start() {
        let mut k = Keyframes::from_points([(0, 0.0), (40, 100.0)]);
        assert!(k.clamp_to_range(20, 100));
        assert_eq!(k.first(), Some((20, 50.0)));
        assert_eq!(k.len(), 2);
    }

    #[test]
    fn clamp_interpolates_at_end() {
        let mut k = Keyframes::from_points([(0, 0.0), (10, 10.0), (110, 110.0)]);
        assert!(k.clamp_to_range(0, 60));
        assert_eq!(k.last(), Some((60, 60.0)));
        assert!(!k.contains(110));
    }

    #[test]
    fn clamp_holds_single_outside_point() {
        let mut k = Keyframes::from_points([(10, 50.0)]);
        assert!(k.clamp_to_range(20, 100));
        assert_eq!(k.iter().collect::<Vec<_>>(), vec![(20, 50.0)]);
    }

    #[test]
    fn clamp_inside_range_is_noop() {
        let mut k = Keyframes::from_points([(20, 1.0), (100, 2.0)]);
        assert!(!k.clamp_to_range(20, 100));
        assert_eq!(k.len(), 2);
    }

    #[test]
    fn join_undoes_a_split_clamp() {
        let whole = Keyframes::from_points([(0, 0.0), (99, 100.0)]);
        let mut head = whole.clone();
        let mut tail = whole.clone();
        head.clamp_to_range(0, 50);
        tail.clamp_to_range(50, 100);
        assert!(head.contains(50) && tail.contains(50));
        assert_eq!(Keyframes::join(&head, &tail, 50), whole);
    }

    #[test]
    fn join_keeps_a_real_key_on_the_boundary() {
        let whole = Keyframes::from_points([(0, 0.0), (50, 80.0), (99, 100.0)]);
        let mut head = whole.clone();
        let mut tail = whole.clone();
        head.clamp_to_range(0, 50);
        tail.clamp_to_range(50, 100);
        assert_eq!(Keyframes::join(&head, &tail, 50), whole);
    }

    #[test]
    fn shift_moves_all_points() {
        let mut k = Keyframes::from_points([(0, 1.0), (5, 2.0)]);
        k.shift(10);
        assert_eq!(k.first(), Some((10, 1.0)));
        assert_eq!(k.last(), Some((15, 2.0)));
    }

    #[test]
    fn display_scaling() {
        let editor = KeyframeEditor::with_range(Keyframes::new(), -1.0, 1.0);
        assert_eq!(editor.to_display(0.0), 50.0);
        assert_eq!(editor.from_display(100.0), 1.0);
    }

    #[test]
    fn drag_stays_between_neighbours() {
        let keys = Keyframes::from_points([(0, 0.0), (50, 50.0), (100, 100.0)]);
        let mut editor = KeyframeEditor::with_range(keys, 0.0, 100.0);
        assert!(editor.set_edited_key_frame(50));
        let drag = editor.update_key_frame_pos(150, 30.0, 0, 101);
        assert_eq!(drag, KeyframeDrag::Moved { pos: 99, value: 30.0 });
        assert_eq!(editor.selected_key_frame(), Some(99));
        assert!(!editor.keys().contains(50));
    }

    #[test]
    fn drag_far_out_deletes_inner_keyframe() {
        let keys = Keyframes::from_points([(0, 0.0), (50, 50.0), (100, 100.0)]);
        let mut editor = KeyframeEditor::with_range(keys, 0.0, 100.0);
        editor.set_edited_key_frame(50);
        assert_eq!(editor.update_key_frame_pos(50, 200.0, 0, 101), KeyframeDrag::Deleted(50));
        assert_eq!(editor.keys().len(), 2);
        assert_eq!(editor.edited_key_frame(), None);
    }

    #[test]
    fn outer_keyframes_are_never_deleted_by_drag() {
        let keys = Keyframes::from_points([(0, 0.0), (100, 100.0)]);
        let mut editor = KeyframeEditor::with_range(keys, 0.0, 100.0);
        editor.set_edited_key_frame(0);
        let drag = editor.update_key_frame_pos(0, -80.0, 0, 101);
        assert_eq!(drag, KeyframeDrag::Moved { pos: 0, value: 0.0 });
        assert_eq!(editor.keys().len(), 2);
    }

    #[test]
    fn drag_without_edited_keyframe_is_ignored() {
        let mut editor = KeyframeEditor::default();
        assert_eq!(editor.update_key_frame_pos(3, 10.0, 0, 10), KeyframeDrag::Ignored);
    }

    #[test]
    fn key_frame_near_picks_closest() {
        let keys = Keyframes::from_points([(0, 0.0), (10, 0.0), (14, 0.0)]);
        let editor = KeyframeEditor::with_range(keys, 0.0, 1.0);
        assert_eq!(editor.key_frame_near(12, 3), Some(10));
        assert_eq!(editor.key_frame_near(13, 3), Some(14));
        assert_eq!(editor.key_frame_near(30, 3), None);
    }
}
