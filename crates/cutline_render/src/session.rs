//! Saved projects opened against a playlist renderer.

use crate::playlist::PlaylistRenderer;
use anyhow::{Context, Result};
use cutline_core::document::ProjectDocument;
use cutline_core::editor::TimelineEditor;
use cutline_core::project::TimelineSettings;
use cutline_core::types::TrackInfo;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// The playlist handle kept by the caller while the editor owns the other.
pub type SharedPlaylist = Rc<RefCell<PlaylistRenderer>>;

/// An editor over `tracks`, backed by a fresh playlist.
pub fn new_session(settings: TimelineSettings, tracks: Vec<TrackInfo>) -> Result<(TimelineEditor, SharedPlaylist)> {
    let playlist = Rc::new(RefCell::new(PlaylistRenderer::new(settings.fps)));
    let editor = TimelineEditor::with_tracks(settings, tracks, Box::new(playlist.clone()))
        .context("Failed to create the playlist tracks")?;
    Ok((editor, playlist))
}

/// Open a saved project and load all of it into a fresh playlist.
pub fn open_project(path: impl AsRef<Path>, settings: TimelineSettings) -> Result<(TimelineEditor, SharedPlaylist)> {
    let path = path.as_ref();
    let doc = ProjectDocument::load_from_file(path)
        .with_context(|| format!("Failed to read project {}", path.display()))?;
    let playlist = Rc::new(RefCell::new(PlaylistRenderer::new(doc.fps)));
    let editor = TimelineEditor::open(&doc, settings, Box::new(playlist.clone()))
        .with_context(|| format!("Failed to load {} into the playlist", path.display()))?;
    check_in_sync(&editor, &playlist.borrow())?;
    tracing::debug!("opened {} with {} tracks", path.display(), doc.tracks.len());
    Ok((editor, playlist))
}

/// Save the editor's timeline once the playlist is known to agree with it.
pub fn save_project(editor: &TimelineEditor, playlist: &PlaylistRenderer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    check_in_sync(editor, playlist)?;
    editor
        .to_document()
        .save_to_file(path)
        .with_context(|| format!("Failed to save project {}", path.display()))
}

/// Every clip and transition of the model sits where the playlist has it.
pub fn check_in_sync(editor: &TimelineEditor, playlist: &PlaylistRenderer) -> Result<()> {
    let fps = editor.fps();
    let timeline = editor.timeline();
    if timeline.track_count() != playlist.tracks().len() {
        anyhow::bail!(
            "Model has {} tracks, playlist has {}",
            timeline.track_count(),
            playlist.tracks().len()
        );
    }
    for clip in timeline.clips() {
        let info = clip.info();
        let start = info.start_pos.frames(fps);
        let Some(entry) = playlist.clip_at(info.track, start) else {
            anyhow::bail!("Clip {} is missing from track {} at frame {}", clip.id(), info.track, start);
        };
        let length = info.end_pos.frames(fps) - start;
        if entry.length != length || entry.filters.len() != clip.effects().len() {
            anyhow::bail!(
                "Clip {} plays {} frames with {} filters, playlist has {} frames with {} filters",
                clip.id(),
                length,
                clip.effects().len(),
                entry.length,
                entry.filters.len()
            );
        }
    }
    let played: usize = playlist.tracks().iter().map(|t| t.clips().count()).sum();
    if played != timeline.clips().count() {
        anyhow::bail!("Playlist holds {} clips the model does not know", played - timeline.clips().count().min(played));
    }
    for transition in timeline.transitions() {
        let record = transition.to_record();
        if !playlist.transitions().contains(&record) {
            anyhow::bail!("Transition at frame {} on track {} is missing", record.in_frame, record.a_track);
        }
    }
    if playlist.transitions().len() != timeline.transitions().count() {
        anyhow::bail!("Playlist holds transitions the model does not know");
    }
    Ok(())
}
