use crate::keyframes::Keyframes;
use serde::{Deserialize, Serialize};

pub const FADE_IN: &str = "fadein";
pub const FADE_FROM_BLACK: &str = "fade_from_black";
pub const FADE_OUT: &str = "fadeout";
pub const FADE_TO_BLACK: &str = "fade_to_black";
pub const FREEZE: &str = "freeze";

// ---------------------------------------------------------------------------
// ParamValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Scalar(f64),
    Bool(bool),
    /// Chosen entry of an enumerated list.
    List(String),
    Keyframes(Keyframes),
    /// Renderer geometry string, animated per frame.
    Geometry(String),
    Color(String),
}

impl ParamValue {
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Scalar(_) => "scalar",
            ParamValue::Bool(_) => "bool",
            ParamValue::List(_) => "list",
            ParamValue::Keyframes(_) => "keyframes",
            ParamValue::Geometry(_) => "geometry",
            ParamValue::Color(_) => "color",
        }
    }
}

// ---------------------------------------------------------------------------
// EffectParameter
// ---------------------------------------------------------------------------

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectParameter {
    pub name: String,
    pub value: ParamValue,
    /// Renderer value = (value - offset) / factor.
    #[serde(default = "one")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub default: Option<f64>,
    /// Geometry with explicit bounds that must not follow the clip.
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub sync_in_out: Option<bool>,
}

impl EffectParameter {
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            value,
            factor: 1.0,
            offset: 0.0,
            min: None,
            max: None,
            default: None,
            fixed: false,
            sync_in_out: None,
        }
    }

    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, ParamValue::Scalar(value))
    }

    pub fn keyframes(name: impl Into<String>, keys: Keyframes) -> Self {
        Self::new(name, ParamValue::Keyframes(keys))
    }

    pub fn geometry(name: impl Into<String>, geometry: impl Into<String>) -> Self {
        Self::new(name, ParamValue::Geometry(geometry.into()))
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_in_out = Some(sync);
        self
    }

    /// Whether the renderer needs this effect's in/out bound to the clip's
    /// crop window.
    pub fn needs_in_out_sync(&self) -> bool {
        match self.value {
            ParamValue::Geometry(_) => !self.fixed && self.sync_in_out != Some(false),
            ParamValue::Keyframes(_) => self.sync_in_out == Some(true),
            _ => false,
        }
    }

    fn renderer_value(&self, value: f64) -> f64 {
        if self.factor == 0.0 {
            return value - self.offset;
        }
        (value - self.offset) / self.factor
    }

    fn is_scaled(&self) -> bool {
        self.factor != 1.0 || self.offset != 0.0
    }
}

// ---------------------------------------------------------------------------
// EffectRecord
// ---------------------------------------------------------------------------

/// One effect in a clip's stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    /// Renderer-level filter identifier.
    pub tag: String,
    /// Effect type identifier; several ids may share a tag.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// 1-based position in the stack; 0 until stamped by an [`EffectsList`].
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub in_point: Option<i64>,
    #[serde(default)]
    pub out_point: Option<i64>,
    #[serde(default)]
    pub params: Vec<EffectParameter>,
}

impl EffectRecord {
    pub fn new(tag: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tag: tag.into(),
            name: id.clone(),
            id,
            index: 0,
            disabled: false,
            in_point: None,
            out_point: None,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: EffectParameter) -> Self {
        self.set_param(param);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Volume fade-in over `[start, start + length]`.
    pub fn fade_in(start: i64, length: i64) -> Self {
        Self::new("volume", FADE_IN)
            .with_param(EffectParameter::scalar("in", start as f64))
            .with_param(EffectParameter::scalar("out", (start + length) as f64))
            .with_param(EffectParameter::scalar("gain", 0.0))
            .with_param(EffectParameter::scalar("end", 1.0))
    }

    /// Volume fade-out of `length` frames ending at `end`.
    pub fn fade_out(end: i64, length: i64) -> Self {
        Self::new("volume", FADE_OUT)
            .with_param(EffectParameter::scalar("in", (end - length) as f64))
            .with_param(EffectParameter::scalar("out", end as f64))
            .with_param(EffectParameter::scalar("gain", 1.0))
            .with_param(EffectParameter::scalar("end", 0.0))
    }

    pub fn param(&self, name: &str) -> Option<&EffectParameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_mut(&mut self, name: &str) -> Option<&mut EffectParameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    /// Replace the parameter of the same name, or add it.
    pub fn set_param(&mut self, param: EffectParameter) {
        match self.param_mut(&param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.param(name)?.value {
            ParamValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn set_scalar(&mut self, name: &str, value: f64) {
        match self.param_mut(name) {
            Some(p) => p.value = ParamValue::Scalar(value),
            None => self.params.push(EffectParameter::scalar(name, value)),
        }
    }

    pub fn keyframes(&self, name: &str) -> Option<&Keyframes> {
        match &self.param(name)?.value {
            ParamValue::Keyframes(k) => Some(k),
            _ => None,
        }
    }

    pub fn has_key_frames(&self) -> bool {
        self.params
            .iter()
            .any(|p| matches!(p.value, ParamValue::Keyframes(_)))
    }

    pub fn is_fade_in(&self) -> bool {
        self.id == FADE_IN || self.id == FADE_FROM_BLACK
    }

    pub fn is_fade_out(&self) -> bool {
        self.id == FADE_OUT || self.id == FADE_TO_BLACK
    }

    /// `out - in` of a fade effect, in frames.
    pub fn fade_length(&self) -> Option<i64> {
        let start = self.scalar("in")?;
        let end = self.scalar("out")?;
        Some((end - start).round() as i64)
    }

    pub fn needs_in_out_sync(&self) -> bool {
        self.params.iter().any(EffectParameter::needs_in_out_sync)
    }
}

// ---------------------------------------------------------------------------
// EffectsParameterList
// ---------------------------------------------------------------------------

/// Flattened name/value pairs handed to the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectsParameterList(Vec<(String, String)>);

impl EffectsParameterList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn param_value(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stack index the list addresses, if stamped.
    pub fn index(&self) -> Option<usize> {
        self.param_value("kdenlive_ix")?.parse().ok()
    }

    /// Renderer view of one effect. Scaled parameters have factor and offset
    /// applied; synced effects carry their in/out points. The range of the
    /// first ranged keyframe parameter goes out once as `min`/`max`.
    pub fn from_effect(effect: &EffectRecord) -> Self {
        let mut list = Self::new();
        let mut ranged = false;
        list.add_param("tag", effect.tag.as_str());
        list.add_param("id", effect.id.as_str());
        list.add_param("kdenlive_ix", effect.index.to_string());
        if effect.disabled {
            list.add_param("disable", "1");
        }
        for param in &effect.params {
            match &param.value {
                ParamValue::Scalar(v) => {
                    list.add_param(param.name.as_str(), param.renderer_value(*v).to_string())
                }
                ParamValue::Bool(b) => list.add_param(param.name.as_str(), if *b { "1" } else { "0" }),
                ParamValue::List(s) | ParamValue::Geometry(s) | ParamValue::Color(s) => {
                    list.add_param(param.name.as_str(), s.as_str())
                }
                ParamValue::Keyframes(keys) => {
                    let keys = if param.is_scaled() {
                        Keyframes::from_points(keys.iter().map(|(p, v)| (p, param.renderer_value(v))))
                    } else {
                        keys.clone()
                    };
                    list.add_param(param.name.as_str(), keys.to_string());
                    if let (false, Some(min), Some(max)) = (ranged, param.min, param.max) {
                        list.add_param("min", min.to_string());
                        list.add_param("max", max.to_string());
                        ranged = true;
                    }
                }
            }
        }
        if let (Some(start), Some(end)) = (effect.in_point, effect.out_point) {
            list.add_param("in", start.to_string());
            list.add_param("out", end.to_string());
            list.add_param("kdenlive:sync_in_out", "1");
        }
        list
    }
}

// ---------------------------------------------------------------------------
// EffectsList
// ---------------------------------------------------------------------------

/// An ordered effect stack addressed by 1-based index.
///
/// Every mutating call leaves the stamped indices as exactly `1..=len`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectsList {
    effects: Vec<EffectRecord>,
}

impl EffectsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EffectRecord> {
        self.effects.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut EffectRecord> {
        self.effects.iter_mut()
    }

    /// Record at the 1-based `index`.
    pub fn at(&self, index: usize) -> Option<&EffectRecord> {
        index.checked_sub(1).and_then(|i| self.effects.get(i))
    }

    pub(crate) fn at_mut(&mut self, index: usize) -> Option<&mut EffectRecord> {
        index.checked_sub(1).and_then(|i| self.effects.get_mut(i))
    }

    /// Add at the end. Returns the stamped index.
    pub fn append(&mut self, mut record: EffectRecord) -> usize {
        record.index = self.effects.len() + 1;
        self.effects.push(record);
        self.effects.len()
    }

    /// Insert before the record's requested index when it is within
    /// `1..=len`, shifting the following records; append otherwise.
    pub fn insert(&mut self, record: EffectRecord) -> usize {
        let ix = record.index;
        if ix == 0 || ix > self.effects.len() {
            return self.append(record);
        }
        self.effects.insert(ix - 1, record);
        self.renumber();
        ix
    }

    /// Remove the record at the 1-based `index`, shifting the following ones.
    pub fn remove_at(&mut self, index: usize) -> Option<EffectRecord> {
        if index == 0 || index > self.effects.len() {
            return None;
        }
        let removed = self.effects.remove(index - 1);
        self.renumber();
        Some(removed)
    }

    /// Replace the record at its own stamped index. Returns the previous one.
    pub fn update_effect(&mut self, mut record: EffectRecord) -> Option<EffectRecord> {
        let slot = self.at_mut(record.index)?;
        record.index = slot.index;
        Some(std::mem::replace(slot, record))
    }

    /// Move the record at `from` so that it ends up at `to`.
    pub fn move_effect(&mut self, from: usize, to: usize) -> bool {
        if from == to || to == 0 || to > self.effects.len() {
            return false;
        }
        let Some(record) = self.remove_at(from) else {
            return false;
        };
        self.insert(record.with_index(to));
        true
    }

    /// Index of the first effect matching `id` or, when `id` is empty, `tag`.
    pub fn has_effect(&self, tag: &str, id: &str) -> Option<usize> {
        self.get_effect_by_tag(tag, id).map(|e| e.index)
    }

    pub fn get_effect_by_tag(&self, tag: &str, id: &str) -> Option<&EffectRecord> {
        if !id.is_empty() {
            return self.effects.iter().find(|e| e.id == id);
        }
        if tag.is_empty() {
            return None;
        }
        self.effects.iter().find(|e| e.tag == tag)
    }

    pub fn enable_effects(&mut self, indexes: &[usize], disable: bool) {
        for &ix in indexes {
            if let Some(effect) = self.at_mut(ix) {
                effect.disabled = disable;
            }
        }
    }

    /// Names of the enabled effects, in stack order.
    pub fn effect_names(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter(|e| !e.disabled)
            .map(|e| e.name.clone())
            .collect()
    }

    fn renumber(&mut self) {
        for (i, effect) in self.effects.iter_mut().enumerate() {
            effect.index = i + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(list: &EffectsList) -> Vec<usize> {
        list.iter().map(|e| e.index).collect()
    }

    fn ids(list: &EffectsList) -> Vec<String> {
        list.iter().map(|e| e.id.clone()).collect()
    }

    fn sample() -> EffectsList {
        let mut list = EffectsList::new();
        list.append(EffectRecord::new("volume", FADE_IN));
        list.append(EffectRecord::new("brightness", FADE_FROM_BLACK));
        list.append(EffectRecord::new("frei0r.blur", "blur"));
        list
    }

    #[test]
    fn append_stamps_next_index() {
        let list = sample();
        assert_eq!(indices(&list), vec![1, 2, 3]);
    }

    #[test]
    fn insert_inside_range_renumbers() {
        let mut list = sample();
        let ix = list.insert(EffectRecord::new("sepia", "sepia").with_index(2));
        assert_eq!(ix, 2);
        assert_eq!(ids(&list), vec![FADE_IN, "sepia", FADE_FROM_BLACK, "blur"]);
        assert_eq!(indices(&list), vec![1, 2, 3, 4]);
    }

    #[test]
    fn insert_out_of_range_appends() {
        let mut list = sample();
        assert_eq!(list.insert(EffectRecord::new("sepia", "sepia").with_index(9)), 4);
        assert_eq!(indices(&list), vec![1, 2, 3, 4]);
    }

    #[test]
    fn remove_at_renumbers() {
        let mut list = sample();
        let removed = list.remove_at(1).unwrap();
        assert_eq!(removed.id, FADE_IN);
        assert_eq!(indices(&list), vec![1, 2]);
        assert!(list.remove_at(0).is_none());
        assert!(list.remove_at(3).is_none());
    }

    #[test]
    fn update_effect_keeps_position() {
        let mut list = sample();
        let mut edited = list.at(2).unwrap().clone();
        edited.set_scalar("level", 0.5);
        let old = list.update_effect(edited).unwrap();
        assert!(old.scalar("level").is_none());
        assert_eq!(list.at(2).unwrap().scalar("level"), Some(0.5));
        assert_eq!(indices(&list), vec![1, 2, 3]);
    }

    #[test]
    fn move_effect_reorders() {
        let mut list = sample();
        assert!(list.move_effect(3, 1));
        assert_eq!(ids(&list), vec!["blur", FADE_IN, FADE_FROM_BLACK]);
        assert_eq!(indices(&list), vec![1, 2, 3]);
        assert!(!list.move_effect(1, 7));
    }

    #[test]
    fn id_takes_precedence_over_tag() {
        let mut list = EffectsList::new();
        list.append(EffectRecord::new("volume", "gain"));
        list.append(EffectRecord::new("volume", FADE_IN));
        assert_eq!(list.has_effect("volume", FADE_IN), Some(2));
        assert_eq!(list.has_effect("volume", ""), Some(1));
        assert_eq!(list.has_effect("volume", FADE_OUT), None);
        assert_eq!(list.has_effect("", ""), None);
    }

    #[test]
    fn enable_effects_sets_flag_and_hides_names() {
        let mut list = sample();
        list.enable_effects(&[1, 3], true);
        assert!(list.at(1).unwrap().disabled);
        assert!(!list.at(2).unwrap().disabled);
        assert_eq!(list.effect_names(), vec![FADE_FROM_BLACK.to_string()]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn fade_length_reads_in_out() {
        let fade = EffectRecord::fade_in(10, 25);
        assert_eq!(fade.fade_length(), Some(25));
        assert!(fade.is_fade_in());
        let out = EffectRecord::fade_out(99, 20);
        assert_eq!(out.scalar("in"), Some(79.0));
        assert!(out.is_fade_out());
    }

    #[test]
    fn parameter_list_applies_scaling() {
        let effect = EffectRecord::new("brightness", "bright")
            .with_param(EffectParameter::scalar("level", 150.0).with_scaling(100.0, 50.0))
            .with_param(EffectParameter::keyframes(
                "opacity",
                Keyframes::from_points([(0, 100.0)]),
            ).with_scaling(100.0, 0.0))
            .with_index(2);
        let list = EffectsParameterList::from_effect(&effect);
        assert_eq!(list.param_value("tag"), Some("brightness"));
        assert_eq!(list.index(), Some(2));
        assert_eq!(list.param_value("level"), Some("1"));
        assert_eq!(list.param_value("opacity"), Some("0:1"));
        assert!(list.param_value("disable").is_none());
    }

    #[test]
    fn keyframe_range_is_sent_once() {
        let effect = EffectRecord::new("affine", "pan_zoom")
            .with_param(EffectParameter::keyframes("x", Keyframes::from_points([(0, 0.0)])).with_range(-100.0, 100.0))
            .with_param(EffectParameter::keyframes("y", Keyframes::from_points([(0, 0.0)])).with_range(0.0, 50.0));
        let list = EffectsParameterList::from_effect(&effect);
        assert_eq!(list.iter().filter(|(name, _)| *name == "min").count(), 1);
        assert_eq!(list.iter().filter(|(name, _)| *name == "max").count(), 1);
        assert_eq!(list.param_value("min"), Some("-100"));
        assert_eq!(list.param_value("y"), Some("0:0"));
    }

    #[test]
    fn geometry_requests_sync_unless_fixed() {
        let synced = EffectParameter::geometry("transition.geometry", "0=0,0:100%x100%");
        assert!(synced.needs_in_out_sync());
        assert!(!synced.clone().fixed().needs_in_out_sync());
        assert!(!synced.with_sync(false).needs_in_out_sync());
        let animated = EffectParameter::keyframes("level", Keyframes::new());
        assert!(!animated.needs_in_out_sync());
        assert!(animated.with_sync(true).needs_in_out_sync());
    }

    #[test]
    fn param_value_serializes_tagged() {
        let v = ParamValue::Scalar(2.5);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"type":"scalar","value":2.5}"#);
    }
}
