//! Raster sketchpad core: a fixed-size RGBA canvas driven by pointer
//! gestures, with freehand brushes, parametric shapes, flood fill, a bounded
//! snapshot undo/redo history and PNG/JPEG export.
//!
//! [`session::Session`] is the entry point. Everything it needs (canvas,
//! history, tool dispatch) lives in the modules below and can be used on its
//! own.

#[macro_use]
pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod keybindings;
pub mod ops;
pub mod session;
pub mod settings;

pub use canvas::{Layout, LayoutKind, PixelBuffer};
pub use components::tools::Tool;
pub use session::{Session, SessionError, SessionEvent};
