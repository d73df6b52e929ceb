use std::fmt;

use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{CanvasState, Layout, LayoutKind, PixelBuffer};
use crate::components::colors::parse_hex;
use crate::components::history::{CanvasSnapshot, HistoryManager};
use crate::components::tools::{
    BeginOutcome, BrushTuning, EndOutcome, StrokeController, Tool, ToolProperties,
};
use crate::io::{self, ExportError, ExportFormat};
use crate::keybindings::{KeyCombo, ShortcutAction};
use crate::settings::SketchSettings;

/// Description attached to the floor snapshot.
const BLANK_DESCRIPTION: &str = "Blank";

/// Precondition violations reported by [`Session`] calls. State is left
/// untouched whenever one of these is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Pointer move/up with no gesture in progress.
    NoActiveGesture,
    /// Pixel data does not fit the layout it was paired with.
    DimensionMismatch { expected: (u32, u32), actual: (u32, u32) },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoActiveGesture => write!(f, "No drawing gesture is in progress"),
            SessionError::DimensionMismatch { expected, actual } => write!(
                f,
                "Pixel data is {}x{} but the layout needs {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for SessionError {}

/// Notifications queued for the embedding UI, collected with
/// [`Session::drain_events`].
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    HistoryChanged { can_undo: bool, can_redo: bool },
    /// The composite returned by [`Session::compose`] changed.
    BufferChanged,
    ToolChanged(Tool),
    LayoutChanged(LayoutKind),
}

/// One editing session: the canvas, its history, the active tool and the
/// outgoing event queue.
pub struct Session {
    pub id: Uuid,
    canvas: CanvasState,
    history: HistoryManager,
    controller: StrokeController,
    settings: SketchSettings,
    events: Vec<SessionEvent>,
    is_dirty: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SketchSettings::default())
    }
}

impl Session {
    pub fn new(settings: SketchSettings) -> Self {
        let layout = Layout::new(settings.default_layout, false);
        let canvas = CanvasState::new(layout);
        let mut history = HistoryManager::new(settings.max_undo_steps);
        history.initialize(CanvasSnapshot::capture(&canvas, BLANK_DESCRIPTION));

        let properties = ToolProperties {
            color: settings.default_color,
            opacity: 1.0,
            thickness: settings.default_thickness.max(1),
        };
        let controller = StrokeController::new(properties, BrushTuning::from_settings(&settings));

        Self {
            id: Uuid::new_v4(),
            canvas,
            history,
            controller,
            settings,
            events: Vec::new(),
            is_dirty: false,
        }
    }

    // -- Accessors ---------------------------------------------------

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn settings(&self) -> &SketchSettings {
        &self.settings
    }

    pub fn layout(&self) -> &Layout {
        &self.canvas.layout
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn tool(&self) -> Tool {
        self.controller.active_tool()
    }

    pub fn properties(&self) -> &ToolProperties {
        &self.controller.properties
    }

    pub fn is_drawing(&self) -> bool {
        self.controller.is_active()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// True when there are edits not yet written to a session file.
    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Called once the session has been written to disk.
    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    // -- Events ------------------------------------------------------

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push(event);
    }

    fn emit_history(&mut self) {
        let status = self.history.status();
        self.emit(SessionEvent::HistoryChanged {
            can_undo: status.can_undo,
            can_redo: status.can_redo,
        });
    }

    // -- Layout and reset --------------------------------------------

    /// Switch layouts. Content and history are discarded.
    pub fn set_layout(&mut self, kind: LayoutKind) {
        let layout = Layout::new(kind, self.canvas.layout.grid_visible);
        self.controller.reset();
        self.canvas.reset_to_layout(layout);
        self.reinitialize_history();
        log_info!(
            "Layout set to {} ({}x{}, cell {})",
            kind.config_name(),
            layout.width,
            layout.height,
            layout.cell_size
        );

        self.emit(SessionEvent::LayoutChanged(kind));
        if layout.is_pixel_art() && !self.tool().available_in_pixel_mode() {
            self.controller.set_tool(Tool::Pen);
            self.emit(SessionEvent::ToolChanged(Tool::Pen));
        }
        self.emit(SessionEvent::BufferChanged);
        self.emit_history();
    }

    /// Erase everything and restart history from a blank floor.
    pub fn clear(&mut self) {
        self.controller.reset();
        self.canvas.clear();
        self.reinitialize_history();
        log_info!("Canvas cleared");
        self.emit(SessionEvent::BufferChanged);
        self.emit_history();
    }

    fn reinitialize_history(&mut self) {
        self.history
            .initialize(CanvasSnapshot::capture(&self.canvas, BLANK_DESCRIPTION));
        self.is_dirty = false;
    }

    /// Replace the canvas with stored pixels (session file load). History
    /// restarts with the loaded pixels as its floor.
    pub fn load_pixels(&mut self, kind: LayoutKind, grid_visible: bool, pixels: PixelBuffer) -> Result<(), SessionError> {
        let layout = Layout::new(kind, grid_visible);
        let expected = (layout.width, layout.height);
        if pixels.dimensions() != expected {
            log_warn!(
                "Rejected {}x{} pixels for layout {}",
                pixels.width(),
                pixels.height(),
                kind.config_name()
            );
            return Err(SessionError::DimensionMismatch {
                expected,
                actual: pixels.dimensions(),
            });
        }
        self.controller.reset();
        self.canvas.reset_to_layout(layout);
        self.canvas.committed = pixels;
        self.history
            .initialize(CanvasSnapshot::capture(&self.canvas, "Loaded"));
        self.is_dirty = false;

        self.emit(SessionEvent::LayoutChanged(kind));
        if layout.is_pixel_art() && !self.tool().available_in_pixel_mode() {
            self.controller.set_tool(Tool::Pen);
            self.emit(SessionEvent::ToolChanged(Tool::Pen));
        }
        self.emit(SessionEvent::BufferChanged);
        self.emit_history();
        Ok(())
    }

    // -- Tool state --------------------------------------------------

    /// Returns false (and keeps the current tool) when a shape tool is
    /// requested on a pixel-art layout.
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if self.canvas.layout.is_pixel_art() && !tool.available_in_pixel_mode() {
            log_warn!("{} is unavailable on pixel-art layouts", tool.label());
            return false;
        }
        if tool != self.tool() {
            self.controller.set_tool(tool);
            self.emit(SessionEvent::ToolChanged(tool));
        }
        true
    }

    /// Accepts `#RRGGBB`; anything else is ignored and returns false.
    pub fn set_color_hex(&mut self, hex: &str) -> bool {
        match parse_hex(hex) {
            Some(rgb) => {
                self.set_color(rgb);
                true
            }
            None => false,
        }
    }

    pub fn set_color(&mut self, rgb: [u8; 3]) {
        self.controller.properties.color = rgb;
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        if opacity.is_finite() {
            self.controller.properties.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    pub fn set_thickness(&mut self, thickness: u32) {
        self.controller.properties.thickness = thickness.max(1);
    }

    pub fn set_grid_visible(&mut self, visible: bool) {
        if self.canvas.layout.grid_visible != visible {
            self.canvas.layout.grid_visible = visible;
            self.canvas.mark_dirty();
            self.emit(SessionEvent::BufferChanged);
        }
    }

    /// Make spray scatter reproducible.
    pub fn seed_rng(&mut self, seed: u64) {
        self.controller.seed_rng(seed);
    }

    // -- Pointer input -----------------------------------------------

    fn snap(&self, x: f32, y: f32) -> (f32, f32) {
        self.canvas.layout.snap(x, y)
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        let p = self.snap(x, y);
        match self.controller.begin(&mut self.canvas, p) {
            BeginOutcome::Ignored => {
                log_warn!("Pointer down at ({x}, {y}) ignored: gesture already active");
            }
            BeginOutcome::Started => {}
            BeginOutcome::Completed { description, changed } => {
                self.record(description);
                if changed {
                    self.emit(SessionEvent::BufferChanged);
                }
            }
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) -> Result<(), SessionError> {
        let p = self.snap(x, y);
        self.controller.update(&mut self.canvas, p).inspect_err(|e| {
            log_warn!("Pointer move rejected: {e}");
        })?;
        self.emit(SessionEvent::BufferChanged);
        Ok(())
    }

    pub fn pointer_up(&mut self) -> Result<(), SessionError> {
        let outcome = self.controller.end(&mut self.canvas).inspect_err(|e| {
            log_warn!("Pointer up rejected: {e}");
        })?;
        if let EndOutcome::Committed { description } = outcome {
            self.record(description);
        }
        self.emit(SessionEvent::BufferChanged);
        Ok(())
    }

    /// Leaving the canvas ends an active gesture exactly like pointer-up.
    pub fn pointer_leave(&mut self) {
        if self.controller.is_active() {
            // Cannot fail: a gesture is active
            let _ = self.pointer_up();
        }
    }

    fn record(&mut self, description: String) {
        let snapshot = CanvasSnapshot::capture(&self.canvas, description);
        if self.history.push(snapshot) {
            log_info!(
                "History full ({} steps): oldest snapshot dropped",
                self.history.max_depth()
            );
        }
        self.is_dirty = true;
        self.emit_history();
    }

    // -- Undo / redo -------------------------------------------------

    /// A gesture in progress is abandoned only when there is a snapshot to
    /// restore; at the floor it carries on untouched.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        self.controller.reset();
        let restored = match self.history.undo() {
            Some(snapshot) => snapshot.restore_into(&mut self.canvas),
            None => return false,
        };
        if let Some(desc) = self.history.redo_description() {
            log_info!("Undo: {desc}");
        }
        self.after_restore(restored)
    }

    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        self.controller.reset();
        let restored = match self.history.redo() {
            Some(snapshot) => snapshot.restore_into(&mut self.canvas),
            None => return false,
        };
        if let Some(desc) = self.history.undo_description() {
            log_info!("Redo: {desc}");
        }
        self.after_restore(restored)
    }

    fn after_restore(&mut self, restored: bool) -> bool {
        if !restored {
            log_err!("History snapshot does not match the canvas size");
        }
        self.is_dirty = true;
        self.emit(SessionEvent::BufferChanged);
        self.emit_history();
        true
    }

    /// Resolve a key press through the configured bindings. Returns true when
    /// the combination is bound, even if the stack had nothing to apply.
    pub fn handle_shortcut(&mut self, pressed: &KeyCombo) -> bool {
        match self.settings.keybindings.resolve(pressed) {
            Some(ShortcutAction::Undo) => {
                self.undo();
                true
            }
            Some(ShortcutAction::Redo) => {
                self.redo();
                true
            }
            None => false,
        }
    }

    // -- Output ------------------------------------------------------

    /// The image the user currently sees.
    pub fn compose(&self) -> RgbaImage {
        self.canvas.compose()
    }

    /// Encode the committed canvas (with overlay) for download.
    pub fn export_image(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        io::encode_image(&self.canvas.compose_for_export(), format, self.settings.jpeg_quality)
    }
}
