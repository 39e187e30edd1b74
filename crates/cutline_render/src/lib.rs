//! A playlist engine for the timeline editor, kept in memory.

pub mod error;
pub mod playlist;
pub mod session;

pub use playlist::{Entry, Playlist, PlaylistClip, PlaylistRenderer};
pub use session::{check_in_sync, new_session, open_project, save_project, SharedPlaylist};
