use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A4 portrait at 72 dpi.
pub const DEFAULT_PORTRAIT_WIDTH: u32 = 595;
pub const DEFAULT_PORTRAIT_HEIGHT: u32 = 842;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Spacing of the decorative grid on non-pixel-art layouts.
const STANDARD_GRID_SPACING: u32 = 20;
/// Width of the two-column guide band centred on the midline.
const GUIDE_BAND_WIDTH: u32 = 4;
const GUIDE_BAND_COLOR: [u8; 3] = [0xf0, 0xf0, 0xf0];
const STANDARD_GRID_COLOR: [u8; 3] = [0xdd, 0xdd, 0xdd];
const PIXEL_GRID_COLOR: [u8; 3] = [200, 200, 200];

// ============================================================================
// LAYOUTS
// ============================================================================

/// Canvas layouts selectable by the user. Each fixes the buffer dimensions
/// and the pixel-cell quantization factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutKind {
    #[default]
    Portrait,
    Landscape,
    /// 8×8 pixel cells.
    EightBit,
    /// 4×4 pixel cells.
    SixteenBit,
    /// Portrait with a vertical guide band at the midline.
    TwoColumn,
}

impl LayoutKind {
    pub fn label(&self) -> &'static str {
        match self {
            LayoutKind::Portrait => "Portrait",
            LayoutKind::Landscape => "Landscape",
            LayoutKind::EightBit => "8-Bit",
            LayoutKind::SixteenBit => "16-Bit",
            LayoutKind::TwoColumn => "Two-Column",
        }
    }

    /// Stable identifier used in config files, scripts and the CLI.
    pub fn config_name(&self) -> &'static str {
        match self {
            LayoutKind::Portrait => "portrait",
            LayoutKind::Landscape => "landscape",
            LayoutKind::EightBit => "8-bit",
            LayoutKind::SixteenBit => "16-bit",
            LayoutKind::TwoColumn => "two-column",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            // "blank" was the historical name of the default layout
            "portrait" | "blank" => Some(LayoutKind::Portrait),
            "landscape" => Some(LayoutKind::Landscape),
            "8-bit" | "8bit" => Some(LayoutKind::EightBit),
            "16-bit" | "16bit" => Some(LayoutKind::SixteenBit),
            "two-column" | "twocolumn" => Some(LayoutKind::TwoColumn),
            _ => None,
        }
    }

    pub fn all() -> &'static [LayoutKind] {
        &[
            LayoutKind::Portrait,
            LayoutKind::Landscape,
            LayoutKind::EightBit,
            LayoutKind::SixteenBit,
            LayoutKind::TwoColumn,
        ]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            LayoutKind::Landscape => (DEFAULT_PORTRAIT_HEIGHT, DEFAULT_PORTRAIT_WIDTH),
            _ => (DEFAULT_PORTRAIT_WIDTH, DEFAULT_PORTRAIT_HEIGHT),
        }
    }

    pub fn cell_size(&self) -> u32 {
        match self {
            LayoutKind::EightBit => 8,
            LayoutKind::SixteenBit => 4,
            _ => 1,
        }
    }

    pub fn is_pixel_art(&self) -> bool {
        self.cell_size() > 1
    }
}

/// Resolved layout configuration: dimensions, quantization and decoration flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub kind: LayoutKind,
    pub width: u32,
    pub height: u32,
    pub cell_size: u32,
    pub grid_visible: bool,
    pub two_column: bool,
}

impl Layout {
    /// Pixel-art layouts switch the grid on when entered; the others keep
    /// whatever grid setting the caller passes in.
    pub fn new(kind: LayoutKind, grid_visible: bool) -> Self {
        let (width, height) = kind.dimensions();
        Self {
            kind,
            width,
            height,
            cell_size: kind.cell_size(),
            grid_visible: grid_visible || kind.is_pixel_art(),
            two_column: kind == LayoutKind::TwoColumn,
        }
    }

    pub fn is_pixel_art(&self) -> bool {
        self.cell_size > 1
    }

    /// Floor a canvas coordinate onto the cell grid (identity for cell size 1).
    pub fn snap(&self, x: f32, y: f32) -> (f32, f32) {
        if self.cell_size <= 1 {
            return (x, y);
        }
        let s = self.cell_size as f32;
        ((x / s).floor() * s, (y / s).floor() * s)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(LayoutKind::Portrait, false)
    }
}

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// Source-over blend of an unpremultiplied colour with `alpha` onto `base`.
pub fn blend_over(base: Rgba<u8>, rgb: [u8; 3], alpha: f32) -> Rgba<u8> {
    let sa = alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return base;
    }
    let da = base.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= f32::EPSILON {
        return TRANSPARENT;
    }
    let mut out = [0u8; 4];
    for c in 0..3 {
        let sc = rgb[c] as f32;
        let dc = base.0[c] as f32;
        let v = (sc * sa + dc * da * (1.0 - sa)) / out_a;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}

/// Destination-out: removes `strength` of the existing coverage, colour kept.
pub fn erase_over(base: Rgba<u8>, strength: f32) -> Rgba<u8> {
    let s = strength.clamp(0.0, 1.0);
    let a = base.0[3] as f32 * (1.0 - s);
    let a = a.round() as u8;
    if a == 0 {
        TRANSPARENT
    } else {
        Rgba([base.0[0], base.0[1], base.0[2], a])
    }
}

/// A 2D grid of RGBA pixels. Coordinates outside the buffer are ignored by
/// every writer, so callers may paint partially off-canvas geometry freely.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, TRANSPARENT),
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, color),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    pub fn pixel_at(&self, x: i32, y: i32) -> Option<Rgba<u8>> {
        if self.in_bounds(x, y) {
            Some(*self.image.get_pixel(x as u32, y as u32))
        } else {
            None
        }
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if self.in_bounds(x, y) {
            self.image.put_pixel(x as u32, y as u32, color);
        }
    }

    pub fn blend_pixel(&mut self, x: i32, y: i32, rgb: [u8; 3], alpha: f32) {
        if alpha <= 0.0 || !self.in_bounds(x, y) {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        *px = blend_over(*px, rgb, alpha);
    }

    pub fn erase_pixel(&mut self, x: i32, y: i32, strength: f32) {
        if strength <= 0.0 || !self.in_bounds(x, y) {
            return;
        }
        let px = self.image.get_pixel_mut(x as u32, y as u32);
        *px = erase_over(*px, strength);
    }

    /// Blend a solid rectangle, clipped to the buffer.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, rgb: [u8; 3], alpha: f32) {
        let Some((x0, y0, x1, y1)) = self.clip_rect(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let p = self.image.get_pixel_mut(px, py);
                *p = blend_over(*p, rgb, alpha);
            }
        }
    }

    /// Reset a rectangle to transparent, clipped to the buffer.
    pub fn clear_rect(&mut self, x: i32, y: i32, w: u32, h: u32) {
        let Some((x0, y0, x1, y1)) = self.clip_rect(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px, py, TRANSPARENT);
            }
        }
    }

    fn clip_rect(&self, x: i32, y: i32, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = x.max(0) as i64;
        let y0 = y.max(0) as i64;
        let x1 = (x as i64 + w as i64).min(self.width() as i64);
        let y1 = (y as i64 + h as i64).min(self.height() as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    pub fn clear(&mut self) {
        for p in self.image.pixels_mut() {
            *p = TRANSPARENT;
        }
    }

    /// Overwrite this buffer with `other`'s pixels. Returns false (and leaves
    /// this buffer untouched) when the dimensions differ.
    pub fn copy_from(&mut self, other: &PixelBuffer) -> bool {
        if self.dimensions() != other.dimensions() {
            return false;
        }
        self.image.copy_from_slice(other.image.as_raw());
        true
    }

    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn memory_bytes(&self) -> usize {
        self.image.as_raw().len()
    }
}

// ============================================================================
// CANVAS STATE: committed buffer, draft surface, compositor
// ============================================================================

/// The committed raster plus the transient draft surface used for shape and
/// selection previews.
pub struct CanvasState {
    pub layout: Layout,
    pub committed: PixelBuffer,
    /// Present only while a preview-based gesture is in progress.
    pub draft: Option<PixelBuffer>,
    /// Bumped whenever the visible composite changes.
    pub dirty_generation: u64,
}

impl CanvasState {
    pub fn new(layout: Layout) -> Self {
        Self {
            committed: PixelBuffer::new(layout.width, layout.height),
            draft: None,
            layout,
            dirty_generation: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.committed.width()
    }

    pub fn height(&self) -> u32 {
        self.committed.height()
    }

    /// Switch layouts. Prior content is discarded, never resampled.
    pub fn reset_to_layout(&mut self, layout: Layout) {
        self.layout = layout;
        self.committed = PixelBuffer::new(layout.width, layout.height);
        self.draft = None;
        self.mark_dirty();
    }

    pub fn clear(&mut self) {
        self.committed.clear();
        self.draft = None;
        self.mark_dirty();
    }

    pub fn mark_dirty(&mut self) {
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    /// True when a `width` x `height` buffer fits the current layout.
    pub fn matches_layout(&self, width: u32, height: u32) -> bool {
        width == self.layout.width && height == self.layout.height
    }

    /// Reset the draft surface to a copy of the committed buffer and hand it
    /// out for preview rendering. The allocation is reused across moves.
    pub fn begin_draft(&mut self) -> &mut PixelBuffer {
        let committed = &self.committed;
        let reuse = self
            .draft
            .as_ref()
            .is_some_and(|d| d.dimensions() == committed.dimensions());
        if !reuse {
            self.draft = Some(committed.clone());
        } else if let Some(draft) = self.draft.as_mut() {
            draft.copy_from(committed);
        }
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
        self.draft.get_or_insert_with(|| committed.clone())
    }

    pub fn clear_draft(&mut self) {
        if self.draft.take().is_some() {
            self.mark_dirty();
        }
    }

    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
    }

    /// What the user sees: the draft while a preview is active, otherwise the
    /// committed buffer; decorative overlay on top in both cases.
    pub fn compose(&self) -> RgbaImage {
        let source = self.draft.as_ref().unwrap_or(&self.committed);
        let mut out = source.as_image().clone();
        apply_overlay(&mut out, &self.layout);
        out
    }

    /// Committed buffer with the overlay baked in. Never includes the draft.
    pub fn compose_for_export(&self) -> RgbaImage {
        let mut out = self.committed.as_image().clone();
        apply_overlay(&mut out, &self.layout);
        out
    }
}

/// Paint the decorative layout overlay (guide band, grid) onto `image`.
/// Rows are independent, so they are painted in parallel.
pub fn apply_overlay(image: &mut RgbaImage, layout: &Layout) {
    let width = image.width();
    if width == 0 || image.height() == 0 {
        return;
    }
    if !layout.two_column && !layout.grid_visible {
        return;
    }

    let band = if layout.two_column {
        let start = (width / 2).saturating_sub(GUIDE_BAND_WIDTH / 2);
        Some((start, (start + GUIDE_BAND_WIDTH).min(width)))
    } else {
        None
    };

    let (grid_spacing, grid_color, grid_alpha) = match layout.kind {
        LayoutKind::EightBit => (layout.cell_size, PIXEL_GRID_COLOR, 0.3),
        LayoutKind::SixteenBit => (layout.cell_size, PIXEL_GRID_COLOR, 0.2),
        _ => (STANDARD_GRID_SPACING, STANDARD_GRID_COLOR, 1.0),
    };
    let grid = layout.grid_visible && grid_spacing > 0;

    let row_bytes = width as usize * 4;
    let raw: &mut [u8] = image;
    raw.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let row_on_grid = grid && y % grid_spacing == 0;
            for x in 0..width {
                let o = x as usize * 4;
                let mut px = Rgba([row[o], row[o + 1], row[o + 2], row[o + 3]]);
                if let Some((b0, b1)) = band
                    && x >= b0
                    && x < b1
                {
                    px = blend_over(px, GUIDE_BAND_COLOR, 1.0);
                }
                if grid && (row_on_grid || x % grid_spacing == 0) {
                    px = blend_over(px, grid_color, grid_alpha);
                }
                row[o..o + 4].copy_from_slice(&px.0);
            }
        });
}
