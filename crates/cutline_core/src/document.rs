use crate::clip::{ClipItem, ClipSource};
use crate::effects::{EffectParameter, EffectRecord, EffectsList, ParamValue};
use crate::error::{CoreError, Result};
use crate::time::GenTime;
use crate::timeline::{Timeline, TimelineItem};
use crate::transition::Transition;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

fn one() -> f64 {
    1.0
}

fn one_u32() -> u32 {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Everything needed to rebuild a timeline, in the renderer's terms: frame
/// positions, inclusive in/out points and flat parameter lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub fps: f64,
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionRecord>,
    #[serde(default)]
    pub guides: Vec<Guide>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub info: TrackInfo,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
}

/// One clip occurrence on a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub producer: String,
    #[serde(default)]
    pub name: String,
    pub clip_type: ClipType,
    /// Full source length in frames; 0 for generated sources.
    #[serde(default)]
    pub source_length: i64,
    pub position: i64,
    pub in_frame: i64,
    /// Inclusive.
    pub out_frame: i64,
    #[serde(default = "one")]
    pub speed: f64,
    #[serde(default = "one_u32")]
    pub strobe: u32,
    #[serde(default)]
    pub state: ClipState,
    #[serde(default)]
    pub filters: Vec<FilterRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    pub tag: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kdenlive_ix: usize,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_point: Option<i64>,
    #[serde(default)]
    pub params: Vec<ParamRecord>,
}

/// A named parameter as text. Keyframe values use `"pos:val;pos:val"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default = "one")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_in_out: Option<bool>,
}

/// A transition between the item track (`a_track`) and its end track
/// (`b_track`). `in_frame`/`out_frame` are absolute and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub mlt_service: String,
    #[serde(default)]
    pub name: String,
    pub a_track: usize,
    pub b_track: usize,
    pub in_frame: i64,
    pub out_frame: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(default)]
    pub automatic: bool,
    #[serde(default)]
    pub force_track: bool,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<&EffectParameter> for ParamRecord {
    fn from(param: &EffectParameter) -> Self {
        let value = match &param.value {
            ParamValue::Scalar(v) => v.to_string(),
            ParamValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            ParamValue::Keyframes(k) => k.to_string(),
            ParamValue::List(s) | ParamValue::Geometry(s) | ParamValue::Color(s) => s.clone(),
        };
        Self {
            name: param.name.clone(),
            kind: param.value.kind().to_string(),
            value,
            factor: param.factor,
            offset: param.offset,
            min: param.min,
            max: param.max,
            default: param.default,
            fixed: param.fixed,
            sync_in_out: param.sync_in_out,
        }
    }
}

impl TryFrom<&ParamRecord> for EffectParameter {
    type Error = CoreError;

    fn try_from(record: &ParamRecord) -> Result<Self> {
        let bad = || CoreError::InvalidOperation(format!("bad value for parameter {}", record.name));
        let value = match record.kind.as_str() {
            "scalar" => ParamValue::Scalar(record.value.trim().parse().map_err(|_| bad())?),
            "bool" => ParamValue::Bool(record.value.trim() == "1"),
            "keyframes" => ParamValue::Keyframes(record.value.parse()?),
            "list" => ParamValue::List(record.value.clone()),
            "geometry" => ParamValue::Geometry(record.value.clone()),
            "color" => ParamValue::Color(record.value.clone()),
            other => {
                return Err(CoreError::InvalidOperation(format!(
                    "unknown parameter type {}",
                    other
                )))
            }
        };
        let mut param = EffectParameter::new(record.name.as_str(), value);
        param.factor = record.factor;
        param.offset = record.offset;
        param.min = record.min;
        param.max = record.max;
        param.default = record.default;
        param.fixed = record.fixed;
        param.sync_in_out = record.sync_in_out;
        Ok(param)
    }
}

impl From<&EffectRecord> for FilterRecord {
    fn from(effect: &EffectRecord) -> Self {
        Self {
            tag: effect.tag.clone(),
            id: effect.id.clone(),
            name: effect.name.clone(),
            kdenlive_ix: effect.index,
            disabled: effect.disabled,
            in_point: effect.in_point,
            out_point: effect.out_point,
            params: effect.params.iter().map(ParamRecord::from).collect(),
        }
    }
}

impl TryFrom<&FilterRecord> for EffectRecord {
    type Error = CoreError;

    fn try_from(filter: &FilterRecord) -> Result<Self> {
        let mut effect = EffectRecord::new(filter.tag.as_str(), filter.id.as_str()).with_index(filter.kdenlive_ix);
        if !filter.name.is_empty() {
            effect.name = filter.name.clone();
        }
        effect.disabled = filter.disabled;
        effect.in_point = filter.in_point;
        effect.out_point = filter.out_point;
        effect.params = filter
            .params
            .iter()
            .map(EffectParameter::try_from)
            .collect::<Result<_>>()?;
        Ok(effect)
    }
}

impl EntryRecord {
    pub fn from_clip(clip: &ClipItem) -> Self {
        let fps = clip.geometry().fps();
        let info = clip.info();
        let in_frame = info.crop_start.frames(fps);
        let source = clip.source();
        Self {
            producer: source.id.clone(),
            name: source.name.clone(),
            clip_type: source.clip_type,
            source_length: source.duration.frames(fps),
            position: info.start_pos.frames(fps),
            in_frame,
            out_frame: in_frame + info.duration().frames(fps) - 1,
            speed: clip.speed(),
            strobe: clip.strobe(),
            state: clip.state(),
            filters: clip.effects().iter().map(FilterRecord::from).collect(),
        }
    }

    /// Rebuild the clip on `track`. Filters are re-stacked in `kdenlive_ix`
    /// order.
    pub fn to_clip(&self, track: usize, fps: f64) -> Result<ClipItem> {
        if self.out_frame < self.in_frame {
            return Err(CoreError::InvalidOperation(format!(
                "entry {} has out point before in point",
                self.producer
            )));
        }
        let mut source = ClipSource::new(
            self.producer.as_str(),
            self.clip_type,
            GenTime::from_frames(self.source_length, fps),
        );
        if !self.name.is_empty() {
            source.name = self.name.clone();
        }
        let start = GenTime::from_frames(self.position, fps);
        let info = ItemInfo::new(
            start,
            GenTime::from_frames(self.position + self.out_frame - self.in_frame + 1, fps),
            GenTime::from_frames(self.in_frame, fps),
            track,
        );
        let mut filters: Vec<&FilterRecord> = self.filters.iter().collect();
        filters.sort_by_key(|f| f.kdenlive_ix);
        let mut effects = EffectsList::new();
        for filter in filters {
            effects.append(EffectRecord::try_from(filter)?);
        }
        Ok(ClipItem::restore(
            Uuid::new_v4(),
            source,
            &info,
            fps,
            self.speed,
            self.strobe,
            self.state,
            effects,
        ))
    }
}

impl Timeline {
    /// Snapshot as a persisted record set.
    pub fn to_document(&self) -> ProjectDocument {
        let tracks = self
            .tracks
            .iter()
            .enumerate()
            .map(|(ix, info)| {
                let mut clips: Vec<&ClipItem> = self.clips().filter(|c| c.info().track == ix).collect();
                clips.sort_by_key(|c| c.info().start_pos.frames(self.fps()));
                TrackRecord {
                    info: info.clone(),
                    entries: clips.into_iter().map(EntryRecord::from_clip).collect(),
                }
            })
            .collect();
        let mut transitions: Vec<TransitionRecord> = self.transitions().map(Transition::to_record).collect();
        transitions.sort_by_key(|t| (t.a_track, t.in_frame));
        ProjectDocument {
            fps: self.fps(),
            tracks,
            transitions,
            guides: self.guides.clone(),
        }
    }

    /// Rebuild a timeline from persisted records. Each transition is anchored
    /// to the clip on its item track covering its start, when there is one,
    /// and spans a second clip on its end track when its window is exactly
    /// the overlap of the two.
    pub fn from_document(doc: &ProjectDocument) -> Result<Self> {
        if doc.fps <= 0.0 {
            return Err(CoreError::InvalidOperation(format!("invalid frame rate {}", doc.fps)));
        }
        let mut timeline = Timeline::with_tracks(doc.fps, doc.tracks.iter().map(|t| t.info.clone()).collect());
        timeline.guides = doc.guides.clone();

        for (ix, track) in doc.tracks.iter().enumerate() {
            for entry in &track.entries {
                let clip = entry.to_clip(ix, doc.fps)?;
                let info = clip.info();
                if timeline.collides(ItemCategory::Clip, ix, info.start_pos, info.end_pos, &[]) {
                    return Err(CoreError::Collision(format!(
                        "Overlapping clips on track {} at frame {}",
                        ix, entry.position
                    )));
                }
                timeline.insert_item(TimelineItem::Clip(clip));
            }
        }

        for record in &doc.transitions {
            if record.a_track >= timeline.track_count() {
                return Err(CoreError::InvalidTrack(record.a_track));
            }
            let mut transition = Transition::from_record(record, doc.fps);
            let info = transition.info();
            if timeline.collides(ItemCategory::Transition, info.track, info.start_pos, info.end_pos, &[]) {
                return Err(CoreError::Collision(format!(
                    "Overlapping transitions on track {} at frame {}",
                    record.a_track, record.in_frame
                )));
            }
            let anchor = timeline.clip_at(info.track, info.start_pos).map(|c| (c.id(), c.info()));
            let second = anchor.and_then(|(_, reference)| {
                timeline
                    .clips()
                    .filter(|c| c.info().track == record.b_track && record.b_track != info.track)
                    .find(|c| {
                        let other = c.info();
                        spans_overlap(info.start_pos, info.end_pos, other.start_pos, other.end_pos)
                            && Transition::derived_window(&reference, &other) == (info.start_pos, info.end_pos)
                    })
                    .map(ClipItem::id)
            });
            transition.set_reference_clip(anchor.map(|(id, _)| id));
            transition.set_second_clip(second);
            timeline.insert_item(TimelineItem::Transition(transition));
        }
        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::FADE_IN;
    use crate::keyframes::Keyframes;

    const FPS: f64 = 25.0;

    fn secs(s: f64) -> GenTime {
        GenTime::from_seconds(s)
    }

    fn sample_timeline() -> Timeline {
        let mut tl = Timeline::with_tracks(FPS, vec![TrackInfo::video("V1"), TrackInfo::video("V2")]);
        let mut clip = ClipItem::new(
            ClipSource::new("beach.mp4", ClipType::AV, secs(30.0)),
            &ItemInfo::new(secs(2.0), secs(6.0), secs(1.0), 1),
            FPS,
        );
        clip.add_effect(EffectRecord::fade_in(25, 10));
        clip.add_effect(
            EffectRecord::new("brightness", "brightness").with_param(
                EffectParameter::keyframes("level", Keyframes::from_points([(25, 0.5), (100, 1.0)]))
                    .with_range(0.0, 2.0),
            ),
        );
        let anchor = Transition::anchored("composite", &clip, secs(2.0), secs(3.0), 0, true);
        tl.insert_item(TimelineItem::Clip(clip));
        tl.insert_item(TimelineItem::Transition(anchor));
        tl.guides.push(Guide {
            time: secs(4.0),
            comment: "drop".to_string(),
        });
        tl
    }

    #[test]
    fn entry_uses_inclusive_out_point() {
        let doc = sample_timeline().to_document();
        let entry = &doc.tracks[1].entries[0];
        assert_eq!(entry.position, 50);
        assert_eq!(entry.in_frame, 25);
        assert_eq!(entry.out_frame, 124);
        assert_eq!(entry.filters.len(), 2);
        assert_eq!(entry.filters[0].id, FADE_IN);
        assert_eq!(entry.filters[1].kdenlive_ix, 2);
        let level = &entry.filters[1].params[0];
        assert_eq!(level.kind, "keyframes");
        assert_eq!(level.value, "25:0.5;100:1");
    }

    #[test]
    fn document_round_trip() {
        let tl = sample_timeline();
        let doc = tl.to_document();
        let back = Timeline::from_document(&doc).unwrap();
        assert_eq!(back.to_document(), doc);

        let clip = back.clips().next().unwrap();
        assert_eq!(clip.fade_in(), 10);
        let transition = back.transitions().next().unwrap();
        assert_eq!(transition.reference_clip(), Some(clip.id()));
        assert!(transition.is_automatic());
    }

    #[test]
    fn two_clip_transition_is_relinked() {
        let mut tl = Timeline::with_tracks(FPS, vec![TrackInfo::video("V1"), TrackInfo::video("V2")]);
        let source = ClipSource::new("beach.mp4", ClipType::AV, secs(30.0));
        let upper = ClipItem::new(source.clone(), &ItemInfo::new(secs(0.0), secs(5.0), GenTime::ZERO, 1), FPS);
        let lower = ClipItem::new(source, &ItemInfo::new(secs(3.0), secs(8.0), GenTime::ZERO, 0), FPS);
        let dissolve = Transition::between("luma", &upper, &lower, 0);
        tl.insert_item(TimelineItem::Clip(upper));
        tl.insert_item(TimelineItem::Clip(lower));
        tl.insert_item(TimelineItem::Transition(dissolve));

        let doc = tl.to_document();
        let back = Timeline::from_document(&doc).unwrap();
        assert_eq!(back.to_document(), doc);
        let upper = back.clip_at(1, secs(1.0)).unwrap().id();
        let lower = back.clip_at(0, secs(4.0)).unwrap().id();
        let transition = back.transitions().next().unwrap();
        assert_eq!(transition.reference_clip(), Some(upper));
        assert_eq!(transition.second_clip(), Some(lower));
        assert_eq!(back.dependent_transitions(lower), vec![transition.id()]);
    }

    #[test]
    fn overlapping_entries_are_rejected() {
        let mut doc = sample_timeline().to_document();
        let mut copy = doc.tracks[1].entries[0].clone();
        copy.position += 10;
        doc.tracks[1].entries.push(copy);
        assert!(matches!(Timeline::from_document(&doc), Err(CoreError::Collision(_))));
    }

    #[test]
    fn unknown_parameter_type_is_an_error() {
        let mut doc = sample_timeline().to_document();
        doc.tracks[1].entries[0].filters[1].params[0].kind = "matrix".to_string();
        assert!(Timeline::from_document(&doc).is_err());
    }
}
