//! Fixtures shared by the controller tests.

use super::TimelineEditor;
use crate::clip::ClipSource;
use crate::project::{preset_pal, TimelineSettings};
use crate::renderer::RecordingRenderer;
use crate::time::GenTime;
use crate::types::*;
use std::cell::RefCell;
use std::rc::Rc;

pub(crate) const FPS: f64 = 25.0;

pub(crate) fn secs(s: f64) -> GenTime {
    GenTime::from_seconds(s)
}

/// Three video tracks at PAL rate, with the setup calls already cleared from
/// the recorder.
pub(crate) fn editor() -> (TimelineEditor, Rc<RefCell<RecordingRenderer>>) {
    editor_with(preset_pal())
}

/// Same three tracks under custom settings.
pub(crate) fn editor_with(settings: TimelineSettings) -> (TimelineEditor, Rc<RefCell<RecordingRenderer>>) {
    let recorder = Rc::new(RefCell::new(RecordingRenderer::new(FPS)));
    let tracks = vec![TrackInfo::video("V1"), TrackInfo::video("V2"), TrackInfo::video("V3")];
    let editor = TimelineEditor::with_tracks(settings, tracks, Box::new(recorder.clone()))
        .expect("recording renderer accepts tracks");
    recorder.borrow_mut().clear();
    (editor, recorder)
}

pub(crate) fn source() -> ClipSource {
    ClipSource::new("interview", ClipType::AV, secs(100.0))
}

/// Add an uncropped clip over `[start, end)` seconds.
pub(crate) fn add_clip(editor: &mut TimelineEditor, start: f64, end: f64, track: usize) -> ItemId {
    editor
        .add_clip(source(), ItemInfo::new(secs(start), secs(end), GenTime::ZERO, track), &[])
        .expect("clip fits")
}
