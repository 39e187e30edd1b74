//! Timeline editing core: the item model, the edit controller and its undo
//! log, independent of any render engine.

pub mod clip;
pub mod document;
pub mod editor;
pub mod effects;
pub mod error;
pub mod geometry;
pub mod group;
pub mod history;
pub mod keyframes;
pub mod project;
pub mod renderer;
pub mod snapping;
pub mod time;
pub mod timeline;
pub mod transition;
pub mod types;

pub use editor::{GesturePreview, TimelineEditor};
pub use error::{CoreError, Result};
pub use time::GenTime;
