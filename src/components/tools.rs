use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::canvas::{CanvasState, PixelBuffer};
use crate::ops::brush::{self, LineCap};
use crate::ops::fill::{FillThresholds, flood_fill};
use crate::ops::raster::line_points;
use crate::ops::shapes::{self, ShapeKind, ShapeStyle};
use crate::session::SessionError;
use crate::settings::SketchSettings;

/// Toolbar groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolCategory {
    /// Freehand brushes.
    Draw,
    /// Parametric shapes previewed on the draft surface.
    Object,
    /// Eraser, fill bucket, selection.
    Utility,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    Pencil,
    #[default]
    Pen,
    Marker,
    SprayPaint,
    PaintBrush,
    /// Wet brush: strokes fade along each segment.
    WaterBrush,
    Line,
    Arrow,
    Circle,
    Rect,
    Triangle,
    Oval,
    Pentagon,
    Hexagon,
    Eraser,
    FillBucket,
    Marquee,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Pencil,
            Tool::Pen,
            Tool::Marker,
            Tool::SprayPaint,
            Tool::PaintBrush,
            Tool::WaterBrush,
            Tool::Line,
            Tool::Arrow,
            Tool::Circle,
            Tool::Rect,
            Tool::Triangle,
            Tool::Oval,
            Tool::Pentagon,
            Tool::Hexagon,
            Tool::Eraser,
            Tool::FillBucket,
            Tool::Marquee,
        ]
    }

    /// Stable identifier used by scripts and the event stream.
    pub fn id(&self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Pen => "pen",
            Tool::Marker => "marker",
            Tool::SprayPaint => "sprayPaint",
            Tool::PaintBrush => "paintBrush",
            Tool::WaterBrush => "waterBrush",
            Tool::Line => "line",
            Tool::Arrow => "arrow",
            Tool::Circle => "circle",
            Tool::Rect => "rect",
            Tool::Triangle => "triangle",
            Tool::Oval => "oval",
            Tool::Pentagon => "pentagon",
            Tool::Hexagon => "hexagon",
            Tool::Eraser => "eraser",
            Tool::FillBucket => "fillBucket",
            Tool::Marquee => "marquee",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tool::Pencil => "Pencil",
            Tool::Pen => "Pen",
            Tool::Marker => "Marker",
            Tool::SprayPaint => "Spray Paint",
            Tool::PaintBrush => "Paint Brush",
            Tool::WaterBrush => "Wet Brush",
            Tool::Line => "Line",
            Tool::Arrow => "Arrow",
            Tool::Circle => "Circle",
            Tool::Rect => "Rectangle",
            Tool::Triangle => "Triangle",
            Tool::Oval => "Oval",
            Tool::Pentagon => "Pentagon",
            Tool::Hexagon => "Hexagon",
            Tool::Eraser => "Eraser",
            Tool::FillBucket => "Fill",
            Tool::Marquee => "Select",
        }
    }

    /// Case-insensitive lookup by id, with a few friendly aliases.
    pub fn from_name(name: &str) -> Option<Tool> {
        let lower = name.trim().to_ascii_lowercase();
        let alias = match lower.as_str() {
            "spray" => Some(Tool::SprayPaint),
            "brush" => Some(Tool::PaintBrush),
            "wetbrush" => Some(Tool::WaterBrush),
            "fill" => Some(Tool::FillBucket),
            "rectangle" => Some(Tool::Rect),
            "select" => Some(Tool::Marquee),
            _ => None,
        };
        alias.or_else(|| Tool::all().iter().copied().find(|t| t.id().eq_ignore_ascii_case(&lower)))
    }

    pub fn category(&self) -> ToolCategory {
        match self {
            Tool::Pencil
            | Tool::Pen
            | Tool::Marker
            | Tool::SprayPaint
            | Tool::PaintBrush
            | Tool::WaterBrush => ToolCategory::Draw,
            Tool::Line
            | Tool::Arrow
            | Tool::Circle
            | Tool::Rect
            | Tool::Triangle
            | Tool::Oval
            | Tool::Pentagon
            | Tool::Hexagon => ToolCategory::Object,
            Tool::Eraser | Tool::FillBucket | Tool::Marquee => ToolCategory::Utility,
        }
    }

    pub fn shape_kind(&self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Arrow => Some(ShapeKind::Arrow),
            Tool::Circle => Some(ShapeKind::Circle),
            Tool::Rect => Some(ShapeKind::Rect),
            Tool::Triangle => Some(ShapeKind::Triangle),
            Tool::Oval => Some(ShapeKind::Oval),
            Tool::Pentagon => Some(ShapeKind::Pentagon),
            Tool::Hexagon => Some(ShapeKind::Hexagon),
            _ => None,
        }
    }

    /// Shape tools are withdrawn on pixel-art canvases.
    pub fn available_in_pixel_mode(&self) -> bool {
        self.category() != ToolCategory::Object
    }
}

/// User-adjustable stroke properties.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolProperties {
    pub color: [u8; 3],
    /// 0.0 – 1.0
    pub opacity: f32,
    /// Stroke width in pixels, at least 1.
    pub thickness: u32,
}

impl Default for ToolProperties {
    fn default() -> Self {
        Self { color: [0, 0, 0], opacity: 1.0, thickness: 5 }
    }
}

/// Per-tool constants applied on top of [`ToolProperties`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushTuning {
    pub pencil_opacity: f32,
    pub marker_opacity: f32,
    pub spray_opacity: f32,
    pub wet_brush_opacity: f32,
    pub wet_brush_tail_alpha: f32,
    pub fill: FillThresholds,
}

impl Default for BrushTuning {
    fn default() -> Self {
        Self::from_settings(&SketchSettings::default())
    }
}

impl BrushTuning {
    pub fn from_settings(s: &SketchSettings) -> Self {
        Self {
            pencil_opacity: s.pencil_opacity,
            marker_opacity: s.marker_opacity,
            spray_opacity: s.spray_opacity,
            wet_brush_opacity: s.wet_brush_opacity,
            wet_brush_tail_alpha: s.wet_brush_tail_alpha,
            fill: FillThresholds {
                color: s.fill_color_threshold,
                alpha: s.fill_alpha_threshold,
            },
        }
    }
}

/// Where the current pointer gesture stands.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Brush stroke painting straight onto the committed buffer.
    Freehand { tool: Tool, last: (f32, f32) },
    Erasing { last: (f32, f32) },
    /// Shape being previewed on the draft surface. `current` stays `None`
    /// until the pointer moves.
    Shape {
        tool: Tool,
        kind: ShapeKind,
        anchor: (f32, f32),
        current: Option<(f32, f32)>,
    },
    Selecting { anchor: (f32, f32), current: (f32, f32) },
}

impl GestureState {
    pub fn is_active(&self) -> bool {
        !matches!(self, GestureState::Idle)
    }
}

/// Result of a pointer-down.
#[derive(Clone, Debug, PartialEq)]
pub enum BeginOutcome {
    /// A gesture was already running; the press was dropped.
    Ignored,
    Started,
    /// Instant tool ran to completion (fill). Always recorded in history.
    Completed { description: String, changed: bool },
}

/// Result of a pointer-up.
#[derive(Clone, Debug, PartialEq)]
pub enum EndOutcome {
    /// An edit finished and must be recorded in history.
    Committed { description: String },
    /// A selection ended; nothing to record.
    SelectionCleared,
}

/// Drives one pointer gesture at a time against a [`CanvasState`].
///
/// Coordinates reaching the controller are already snapped to the cell grid
/// on pixel-art layouts.
pub struct StrokeController {
    pub properties: ToolProperties,
    pub tuning: BrushTuning,
    active_tool: Tool,
    state: GestureState,
    rng: StdRng,
}

impl Default for StrokeController {
    fn default() -> Self {
        Self::new(ToolProperties::default(), BrushTuning::default())
    }
}

impl StrokeController {
    pub fn new(properties: ToolProperties, tuning: BrushTuning) -> Self {
        Self {
            properties,
            tuning,
            active_tool: Tool::default(),
            state: GestureState::Idle,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn active_tool(&self) -> Tool {
        self.active_tool
    }

    /// Change the tool. A gesture already in progress keeps the tool it
    /// started with.
    pub fn set_tool(&mut self, tool: Tool) {
        self.active_tool = tool;
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Make spray scatter reproducible.
    pub fn seed_rng(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn shape_style(&self) -> ShapeStyle {
        ShapeStyle {
            rgb: self.properties.color,
            alpha: self.properties.opacity,
            width: self.properties.thickness as f32,
        }
    }

    /// Pointer-down.
    pub fn begin(&mut self, canvas: &mut CanvasState, p: (f32, f32)) -> BeginOutcome {
        if self.state.is_active() {
            return BeginOutcome::Ignored;
        }
        let tool = self.active_tool;
        self.state = match tool {
            Tool::FillBucket => {
                let n = flood_fill(
                    &mut canvas.committed,
                    p.0.floor() as i32,
                    p.1.floor() as i32,
                    self.properties.color,
                    self.tuning.fill,
                );
                if n > 0 {
                    canvas.mark_dirty();
                }
                return BeginOutcome::Completed {
                    description: tool.label().to_string(),
                    changed: n > 0,
                };
            }
            Tool::Marquee => GestureState::Selecting { anchor: p, current: p },
            Tool::Eraser => GestureState::Erasing { last: p },
            _ => match tool.shape_kind() {
                Some(kind) => GestureState::Shape { tool, kind, anchor: p, current: None },
                None => GestureState::Freehand { tool, last: p },
            },
        };
        BeginOutcome::Started
    }

    /// Pointer-move while a gesture is active.
    pub fn update(&mut self, canvas: &mut CanvasState, p: (f32, f32)) -> Result<(), SessionError> {
        match self.state {
            GestureState::Idle => return Err(SessionError::NoActiveGesture),
            GestureState::Freehand { tool, last } => {
                if canvas.layout.is_pixel_art() {
                    self.paint_cells(canvas, last, p);
                } else {
                    self.paint_freehand(canvas, tool, last, p);
                }
                self.state = GestureState::Freehand { tool, last: p };
            }
            GestureState::Erasing { last } => {
                let cell = canvas.layout.cell_size;
                if cell > 1 {
                    brush::clear_cell(&mut canvas.committed, p.0 as i32, p.1 as i32, cell);
                } else {
                    let width = self.properties.thickness as f32;
                    brush::erase_segment(&mut canvas.committed, last, p, width, self.properties.opacity);
                }
                self.state = GestureState::Erasing { last: p };
            }
            GestureState::Shape { tool, kind, anchor, .. } => {
                let style = self.shape_style();
                let cell = canvas.layout.cell_size;
                let draft = canvas.begin_draft();
                draw_shape(draft, kind, anchor, p, cell, &style);
                self.state = GestureState::Shape { tool, kind, anchor, current: Some(p) };
            }
            GestureState::Selecting { anchor, .. } => {
                let style = self.shape_style();
                let draft = canvas.begin_draft();
                shapes::render_marquee(draft, anchor, p, &style);
                self.state = GestureState::Selecting { anchor, current: p };
            }
        }
        canvas.mark_dirty();
        Ok(())
    }

    /// Pointer-up (or pointer-leave while active).
    pub fn end(&mut self, canvas: &mut CanvasState) -> Result<EndOutcome, SessionError> {
        let state = std::mem::take(&mut self.state);
        let outcome = match state {
            GestureState::Idle => return Err(SessionError::NoActiveGesture),
            GestureState::Freehand { tool, .. } => EndOutcome::Committed {
                description: tool.label().to_string(),
            },
            GestureState::Erasing { .. } => EndOutcome::Committed {
                description: Tool::Eraser.label().to_string(),
            },
            GestureState::Shape { tool, kind, anchor, current } => {
                canvas.clear_draft();
                // A press without movement has no extent and paints nothing
                if let Some(end) = current.filter(|&c| c != anchor) {
                    let style = self.shape_style();
                    let cell = canvas.layout.cell_size;
                    draw_shape(&mut canvas.committed, kind, anchor, end, cell, &style);
                }
                EndOutcome::Committed { description: tool.label().to_string() }
            }
            GestureState::Selecting { .. } => {
                canvas.clear_draft();
                EndOutcome::SelectionCleared
            }
        };
        canvas.mark_dirty();
        Ok(outcome)
    }

    /// Drop any gesture without committing (layout change, clear, load).
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
    }

    fn paint_freehand(&mut self, canvas: &mut CanvasState, tool: Tool, a: (f32, f32), b: (f32, f32)) {
        let ToolProperties { color, opacity, thickness } = self.properties;
        let w = thickness as f32;
        let buf = &mut canvas.committed;
        match tool {
            Tool::Pen => brush::stroke_segment(buf, a, b, w, color, opacity, LineCap::Round),
            Tool::Pencil => {
                let alpha = opacity * self.tuning.pencil_opacity;
                brush::stroke_segment(buf, a, b, w, color, alpha, LineCap::Round);
            }
            Tool::PaintBrush => brush::stroke_segment(buf, a, b, w * 2.0, color, opacity, LineCap::Round),
            Tool::Marker => {
                brush::stroke_segment(buf, a, b, w, color, self.tuning.marker_opacity, LineCap::Square);
            }
            Tool::SprayPaint => {
                let radius = (thickness * 2) as i32;
                let density = thickness * 2;
                let alpha = opacity * self.tuning.spray_opacity;
                for _ in 0..density {
                    let ox = self.rng.gen_range(-radius..=radius);
                    let oy = self.rng.gen_range(-radius..=radius);
                    if ox * ox + oy * oy <= radius * radius {
                        brush::dot(buf, (b.0 + ox as f32, b.1 + oy as f32), 1.0, color, alpha);
                    }
                }
            }
            Tool::WaterBrush => {
                let alpha = opacity * self.tuning.wet_brush_opacity;
                brush::gradient_segment(buf, a, b, w, color, alpha, self.tuning.wet_brush_tail_alpha);
            }
            _ => {}
        }
    }

    /// Pixel-art freehand: one cell per lattice point between the two samples.
    fn paint_cells(&mut self, canvas: &mut CanvasState, a: (f32, f32), b: (f32, f32)) {
        let cell = canvas.layout.cell_size;
        let step = cell as i32;
        let ToolProperties { color, opacity, .. } = self.properties;
        for (x, y) in line_points(a.0 as i32, a.1 as i32, b.0 as i32, b.1 as i32, step) {
            let px = x.div_euclid(step) * step;
            let py = y.div_euclid(step) * step;
            brush::fill_cell(&mut canvas.committed, px, py, cell, color, opacity);
        }
    }
}

fn draw_shape(
    buf: &mut PixelBuffer,
    kind: ShapeKind,
    anchor: (f32, f32),
    end: (f32, f32),
    cell: u32,
    style: &ShapeStyle,
) {
    if cell > 1 && kind.has_pixel_variant() {
        let a = (anchor.0 as i32, anchor.1 as i32);
        let b = (end.0 as i32, end.1 as i32);
        shapes::render_pixel_shape(buf, kind, a, b, cell, style);
    } else {
        shapes::render_shape(buf, kind, anchor, end, style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Layout, LayoutKind, TRANSPARENT};
    use image::Rgba;

    fn canvas() -> CanvasState {
        CanvasState::new(Layout::default())
    }

    #[test]
    fn tool_names_round_trip() {
        for t in Tool::all() {
            assert_eq!(Tool::from_name(t.id()), Some(*t));
        }
        assert_eq!(Tool::from_name("SPRAYPAINT"), Some(Tool::SprayPaint));
        assert_eq!(Tool::from_name("fill"), Some(Tool::FillBucket));
        assert_eq!(Tool::from_name("lasso"), None);
    }

    #[test]
    fn categories() {
        assert_eq!(Tool::Marker.category(), ToolCategory::Draw);
        assert_eq!(Tool::Hexagon.category(), ToolCategory::Object);
        assert_eq!(Tool::Marquee.category(), ToolCategory::Utility);
        assert!(!Tool::Line.available_in_pixel_mode());
        assert!(Tool::Eraser.available_in_pixel_mode());
    }

    #[test]
    fn freehand_paints_only_on_move() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        assert_eq!(ctl.begin(&mut c, (10.0, 10.0)), BeginOutcome::Started);
        assert!(c.committed.is_blank());
        ctl.update(&mut c, (30.0, 10.0)).unwrap();
        assert_eq!(c.committed.get_pixel(20, 10), Rgba([0, 0, 0, 255]));
        assert_eq!(
            ctl.end(&mut c).unwrap(),
            EndOutcome::Committed { description: "Pen".into() }
        );
        assert!(!ctl.is_active());
    }

    #[test]
    fn update_without_gesture_is_an_error() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        assert_eq!(ctl.update(&mut c, (1.0, 1.0)), Err(SessionError::NoActiveGesture));
        assert_eq!(ctl.end(&mut c), Err(SessionError::NoActiveGesture));
    }

    #[test]
    fn second_press_is_ignored() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.begin(&mut c, (1.0, 1.0));
        assert_eq!(ctl.begin(&mut c, (5.0, 5.0)), BeginOutcome::Ignored);
        assert_eq!(ctl.state(), &GestureState::Freehand { tool: Tool::Pen, last: (1.0, 1.0) });
    }

    #[test]
    fn shape_previews_on_draft_then_commits() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Line);
        ctl.begin(&mut c, (10.0, 10.0));
        ctl.update(&mut c, (50.0, 10.0)).unwrap();
        assert!(c.committed.is_blank());
        assert!(c.draft.as_ref().is_some_and(|d| d.get_pixel(30, 10).0[3] > 0));
        ctl.end(&mut c).unwrap();
        assert!(!c.has_draft());
        assert!(c.committed.get_pixel(30, 10).0[3] > 0);
    }

    #[test]
    fn shape_without_movement_paints_nothing() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Circle);
        ctl.begin(&mut c, (10.0, 10.0));
        let out = ctl.end(&mut c).unwrap();
        assert_eq!(out, EndOutcome::Committed { description: "Circle".into() });
        assert!(c.committed.is_blank());
    }

    #[test]
    fn marquee_never_touches_committed() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Marquee);
        ctl.begin(&mut c, (10.0, 10.0));
        ctl.update(&mut c, (60.0, 40.0)).unwrap();
        assert!(c.has_draft());
        assert_eq!(ctl.end(&mut c).unwrap(), EndOutcome::SelectionCleared);
        assert!(!c.has_draft());
        assert!(c.committed.is_blank());
    }

    #[test]
    fn fill_is_instant() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::FillBucket);
        ctl.properties.color = [0, 128, 0];
        let out = ctl.begin(&mut c, (3.0, 3.0));
        assert_eq!(out, BeginOutcome::Completed { description: "Fill".into(), changed: true });
        assert!(!ctl.is_active());
        assert_eq!(c.committed.get_pixel(500, 800), Rgba([0, 128, 0, 255]));
    }

    #[test]
    fn eraser_removes_paint() {
        let mut c = canvas();
        c.committed.fill_rect(0, 0, 50, 50, [9, 9, 9], 1.0);
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Eraser);
        ctl.begin(&mut c, (10.0, 25.0));
        ctl.update(&mut c, (40.0, 25.0)).unwrap();
        assert_eq!(c.committed.get_pixel(25, 25), TRANSPARENT);
        assert_eq!(c.committed.get_pixel(25, 2), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn marker_uses_fixed_alpha() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Marker);
        ctl.properties.opacity = 0.9;
        ctl.begin(&mut c, (10.0, 10.0));
        ctl.update(&mut c, (40.0, 10.0)).unwrap();
        assert_eq!(c.committed.get_pixel(25, 10).0[3], 128);
    }

    #[test]
    fn pencil_halves_opacity() {
        let mut c = canvas();
        let mut ctl = StrokeController::default();
        ctl.set_tool(Tool::Pencil);
        ctl.begin(&mut c, (10.0, 10.0));
        ctl.update(&mut c, (40.0, 10.0)).unwrap();
        assert_eq!(c.committed.get_pixel(25, 10).0[3], 128);
    }

    #[test]
    fn spray_is_deterministic_with_seed() {
        let run = || {
            let mut c = canvas();
            let mut ctl = StrokeController::default();
            ctl.set_tool(Tool::SprayPaint);
            ctl.seed_rng(7);
            ctl.begin(&mut c, (100.0, 100.0));
            ctl.update(&mut c, (100.0, 100.0)).unwrap();
            c.committed
        };
        let a = run();
        assert_eq!(a, run());
        assert!(!a.is_blank());
        // Dots land within the spray radius (2 × thickness) plus the dot size
        for y in 0..a.height() {
            for x in 0..a.width() {
                if a.get_pixel(x, y).0[3] > 0 {
                    let d = ((x as f32 + 0.5 - 100.0).powi(2) + (y as f32 + 0.5 - 100.0).powi(2)).sqrt();
                    assert!(d <= 13.0, "dot at distance {d}");
                }
            }
        }
    }

    #[test]
    fn pixel_mode_paints_cells_and_erases_cells() {
        let mut c = CanvasState::new(Layout::new(LayoutKind::EightBit, false));
        let mut ctl = StrokeController::default();
        ctl.begin(&mut c, (0.0, 0.0));
        ctl.update(&mut c, (16.0, 0.0)).unwrap();
        ctl.end(&mut c).unwrap();
        assert_eq!(c.committed.get_pixel(23, 7), Rgba([0, 0, 0, 255]));
        assert_eq!(c.committed.get_pixel(24, 0), TRANSPARENT);

        ctl.set_tool(Tool::Eraser);
        ctl.begin(&mut c, (8.0, 0.0));
        ctl.update(&mut c, (8.0, 0.0)).unwrap();
        assert_eq!(c.committed.get_pixel(12, 4), TRANSPARENT);
        assert_eq!(c.committed.get_pixel(4, 4), Rgba([0, 0, 0, 255]));
    }
}
