use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_6, TAU};

use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::ops::brush;
use crate::ops::raster::{circle_points, line_points};

/// Parametric shapes drawn from an anchor point to the current pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Line,
    Arrow,
    Circle,
    Rect,
    Triangle,
    Oval,
    Pentagon,
    Hexagon,
}

impl ShapeKind {
    pub fn all() -> &'static [ShapeKind] {
        &[
            ShapeKind::Line,
            ShapeKind::Arrow,
            ShapeKind::Circle,
            ShapeKind::Rect,
            ShapeKind::Triangle,
            ShapeKind::Oval,
            ShapeKind::Pentagon,
            ShapeKind::Hexagon,
        ]
    }

    /// Shapes with a dedicated cell-lattice renderer.
    pub fn has_pixel_variant(&self) -> bool {
        matches!(self, ShapeKind::Line | ShapeKind::Rect | ShapeKind::Circle)
    }
}

/// Colour, opacity and stroke width applied to a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeStyle {
    pub rgb: [u8; 3],
    pub alpha: f32,
    pub width: f32,
}

// ============================================================================
// SDF functions: return signed distance (negative = inside)
// ============================================================================

/// SDF for a box centred at origin with half-extents (hx, hy).
#[inline]
fn sdf_box(px: f32, py: f32, hx: f32, hy: f32) -> f32 {
    let dx = px.abs() - hx;
    let dy = py.abs() - hy;
    let outside = (dx.max(0.0) * dx.max(0.0) + dy.max(0.0) * dy.max(0.0)).sqrt();
    let inside = dx.max(dy).min(0.0);
    outside + inside
}

/// SDF for an ellipse (approximation). Callers guarantee non-degenerate radii.
#[inline]
fn sdf_ellipse(px: f32, py: f32, rx: f32, ry: f32) -> f32 {
    let nx = px / rx;
    let ny = py / ry;
    let len = (nx * nx + ny * ny).sqrt();
    if len < 1e-8 {
        return -rx.min(ry);
    }
    let scale = (rx * rx * ny * ny + ry * ry * nx * nx).sqrt() / (rx * ry * len);
    (len - 1.0) / scale
}

/// Signed distance to a simple polygon (either winding).
fn sdf_polygon(verts: &[(f32, f32)], px: f32, py: f32) -> f32 {
    let n = verts.len();
    if n == 0 {
        return f32::MAX;
    }
    let mut d = (px - verts[0].0).powi(2) + (py - verts[0].1).powi(2);
    let mut s: f32 = 1.0;
    let mut j = n - 1;
    for i in 0..n {
        let ex = verts[j].0 - verts[i].0;
        let ey = verts[j].1 - verts[i].1;
        let wx = px - verts[i].0;
        let wy = py - verts[i].1;
        let len2 = ex * ex + ey * ey;
        let t = if len2 > f32::EPSILON {
            ((wx * ex + wy * ey) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let bx = wx - ex * t;
        let by = wy - ey * t;
        d = d.min(bx * bx + by * by);
        // crossing test
        let c1 = py >= verts[i].1;
        let c2 = py < verts[j].1;
        let c3 = ex * wy > ey * wx;
        if (c1 && c2 && c3) || (!c1 && !c2 && !c3) {
            s = -s;
        }
        j = i;
    }
    s * d.sqrt()
}

/// Distance to a line segment, plus the projection parameter.
#[inline]
fn sdf_line_segment(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > f32::EPSILON {
        (((px - a.0) * dx + (py - a.1) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    (((px - cx).powi(2) + (py - cy).powi(2)).sqrt(), t)
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Coverage of a distance band of half-width `half` around a curve.
#[inline]
fn band(d: f32, half: f32) -> f32 {
    smoothstep(0.5, -0.5, d.abs() - half)
}

// ============================================================================
// Geometry
// ============================================================================

/// Arrow head triangle: tip at `to`, wings at ±30° behind it.
pub fn arrow_head(from: (f32, f32), to: (f32, f32), width: f32) -> [(f32, f32); 3] {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let angle = dy.atan2(dx);
    let head = (width * 3.0).min((dx * dx + dy * dy).sqrt() / 3.0);
    [
        to,
        (
            to.0 - head * (angle - FRAC_PI_6).cos(),
            to.1 - head * (angle - FRAC_PI_6).sin(),
        ),
        (
            to.0 - head * (angle + FRAC_PI_6).cos(),
            to.1 - head * (angle + FRAC_PI_6).sin(),
        ),
    ]
}

/// Apex at the top-centre of the box, base along the current row.
pub fn triangle_vertices(start: (f32, f32), end: (f32, f32)) -> [(f32, f32); 3] {
    let w = end.0 - start.0;
    [(start.0 + w / 2.0, start.1), (start.0, end.1), (end.0, end.1)]
}

/// Regular polygon inscribed in the anchor→current box, first vertex at top.
pub fn polygon_vertices(start: (f32, f32), end: (f32, f32), sides: u32) -> Vec<(f32, f32)> {
    let cx = (start.0 + end.0) / 2.0;
    let cy = (start.1 + end.1) / 2.0;
    let r = ((end.0 - start.0).abs() / 2.0).min((end.1 - start.1).abs() / 2.0);
    (0..sides)
        .map(|i| {
            let angle = i as f32 * TAU / sides as f32 - FRAC_PI_2;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect()
}

// ============================================================================
// Rasterization
// ============================================================================

/// Evaluate `coverage` at every pixel centre inside `bounds` (rows in
/// parallel), then blend the result onto `buf` once per pixel.
fn paint_coverage<F>(buf: &mut PixelBuffer, bounds: (f32, f32, f32, f32), pad: f32, style: &ShapeStyle, coverage: F)
where
    F: Fn(f32, f32) -> f32 + Sync,
{
    let (min_x, min_y, max_x, max_y) = bounds;
    let x0 = ((min_x - pad).floor() as i32).max(0);
    let y0 = ((min_y - pad).floor() as i32).max(0);
    let x1 = ((max_x + pad).ceil() as i32).min(buf.width() as i32);
    let y1 = ((max_y + pad).ceil() as i32).min(buf.height() as i32);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    let w = (x1 - x0) as usize;
    let mut mask = vec![0f32; w * (y1 - y0) as usize];

    mask.par_chunks_mut(w).enumerate().for_each(|(row, out)| {
        let py = (y0 + row as i32) as f32 + 0.5;
        for (col, cov) in out.iter_mut().enumerate() {
            let px = (x0 + col as i32) as f32 + 0.5;
            *cov = coverage(px, py);
        }
    });

    for (row, covs) in mask.chunks(w).enumerate() {
        for (col, &cov) in covs.iter().enumerate() {
            if cov > 0.001 {
                buf.blend_pixel(x0 + col as i32, y0 + row as i32, style.rgb, style.alpha * cov);
            }
        }
    }
}

fn bounds_of(points: &[(f32, f32)]) -> (f32, f32, f32, f32) {
    points.iter().fold(
        (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
        |(a, b, c, d), &(x, y)| (a.min(x), b.min(y), c.max(x), d.max(y)),
    )
}

/// Stroke the closed outline through `verts`.
fn paint_outline(buf: &mut PixelBuffer, verts: &[(f32, f32)], style: &ShapeStyle) {
    let half = style.width * 0.5;
    paint_coverage(buf, bounds_of(verts), half + 2.0, style, |px, py| band(sdf_polygon(verts, px, py), half));
}

/// Render a shape with anti-aliased strokes from `start` to `end`.
pub fn render_shape(buf: &mut PixelBuffer, kind: ShapeKind, start: (f32, f32), end: (f32, f32), style: &ShapeStyle) {
    let half = style.width * 0.5;
    let pad = half + 2.0;
    match kind {
        ShapeKind::Line => {
            paint_coverage(buf, bounds_of(&[start, end]), pad, style, |px, py| {
                band(sdf_line_segment(px, py, start, end).0, half)
            });
        }
        ShapeKind::Arrow => {
            let head = arrow_head(start, end, style.width);
            let mut pts = vec![start];
            pts.extend_from_slice(&head);
            paint_coverage(buf, bounds_of(&pts), pad, style, |px, py| {
                let shaft = band(sdf_line_segment(px, py, start, end).0, half);
                let tip = smoothstep(0.5, -0.5, sdf_polygon(&head, px, py));
                shaft.max(tip)
            });
        }
        ShapeKind::Circle => {
            let r = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
            let b = (start.0 - r, start.1 - r, start.0 + r, start.1 + r);
            paint_coverage(buf, b, pad, style, |px, py| {
                let d = ((px - start.0).powi(2) + (py - start.1).powi(2)).sqrt() - r;
                band(d, half)
            });
        }
        ShapeKind::Rect => {
            let cx = (start.0 + end.0) / 2.0;
            let cy = (start.1 + end.1) / 2.0;
            let hx = (end.0 - start.0).abs() / 2.0;
            let hy = (end.1 - start.1).abs() / 2.0;
            paint_coverage(buf, bounds_of(&[start, end]), pad, style, |px, py| {
                band(sdf_box(px - cx, py - cy, hx, hy), half)
            });
        }
        ShapeKind::Triangle => {
            paint_outline(buf, &triangle_vertices(start, end), style);
        }
        ShapeKind::Oval => {
            let cx = (start.0 + end.0) / 2.0;
            let cy = (start.1 + end.1) / 2.0;
            let rx = (end.0 - start.0).abs() / 2.0;
            let ry = (end.1 - start.1).abs() / 2.0;
            if rx < 0.5 || ry < 0.5 {
                // Flattened ellipse: a line across the box
                let (a, b) = ((cx - rx, cy - ry), (cx + rx, cy + ry));
                paint_coverage(buf, bounds_of(&[a, b]), pad, style, |px, py| {
                    band(sdf_line_segment(px, py, a, b).0, half)
                });
            } else {
                paint_coverage(buf, bounds_of(&[start, end]), pad, style, |px, py| {
                    band(sdf_ellipse(px - cx, py - cy, rx, ry), half)
                });
            }
        }
        ShapeKind::Pentagon => paint_outline(buf, &polygon_vertices(start, end, 5), style),
        ShapeKind::Hexagon => paint_outline(buf, &polygon_vertices(start, end, 6), style),
    }
}

/// Dashed (5 on, 5 off) rectangle outline used for the selection preview.
pub fn render_marquee(buf: &mut PixelBuffer, start: (f32, f32), end: (f32, f32), style: &ShapeStyle) {
    const DASH: f32 = 5.0;
    let corners = [start, (end.0, start.1), end, (start.0, end.1)];
    let mut edges = [((0.0, 0.0), (0.0, 0.0), 0.0f32, 0.0f32); 4];
    let mut offset = 0.0;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        edges[i] = (a, b, offset, len);
        offset += len;
    }
    let half = style.width * 0.5;
    paint_coverage(buf, bounds_of(&corners), half + 2.0, style, |px, py| {
        let mut best = (f32::MAX, 0.0);
        for &(a, b, off, len) in &edges {
            let (d, t) = sdf_line_segment(px, py, a, b);
            if d < best.0 {
                best = (d, off + t * len);
            }
        }
        if best.1 % (DASH * 2.0) < DASH { band(best.0, half) } else { 0.0 }
    });
}

// ============================================================================
// Pixel-art renderers
// ============================================================================

#[inline]
fn snap_down(v: i32, cell: i32) -> i32 {
    v.div_euclid(cell) * cell
}

/// Fill each distinct cell once.
fn fill_cells(buf: &mut PixelBuffer, points: impl IntoIterator<Item = (i32, i32)>, cell: u32, rgb: [u8; 3], alpha: f32) {
    let c = cell as i32;
    let mut seen = HashSet::new();
    for (x, y) in points {
        let key = (snap_down(x, c), snap_down(y, c));
        if seen.insert(key) {
            brush::fill_cell(buf, key.0, key.1, cell, rgb, alpha);
        }
    }
}

/// Lattice points of a pixel-art rectangle outline.
pub fn pixel_rect_points(start: (i32, i32), end: (i32, i32), cell: i32) -> Vec<(i32, i32)> {
    let (sx, sy) = start;
    let w = end.0 - sx;
    let h = end.1 - sy;
    let step_x = |v: i32| if w >= 0 { v } else { -v };
    let step_y = |v: i32| if h >= 0 { v } else { -v };
    let mut pts = Vec::new();

    let mut x = 0;
    while x <= w.abs() {
        pts.push((sx + step_x(x), sy));
        pts.push((sx + step_x(x), sy + h - if h >= 0 { 0 } else { cell }));
        x += cell;
    }
    let mut y = cell;
    while y < h.abs() {
        pts.push((sx, sy + step_y(y)));
        pts.push((sx + w - if w >= 0 { 0 } else { cell }, sy + step_y(y)));
        y += cell;
    }
    pts
}

/// Pixel-art circle radius: anchor→current distance rounded to whole cells.
pub fn pixel_circle_radius(start: (i32, i32), end: (i32, i32), cell: i32) -> i32 {
    let dx = (end.0 - start.0) as f32;
    let dy = (end.1 - start.1) as f32;
    let cell = cell.max(1);
    ((dx * dx + dy * dy).sqrt() / cell as f32).round() as i32 * cell
}

/// Render a shape on the cell lattice. Coordinates must already be snapped.
/// Shapes without a lattice variant use [`render_shape`].
pub fn render_pixel_shape(
    buf: &mut PixelBuffer,
    kind: ShapeKind,
    start: (i32, i32),
    end: (i32, i32),
    cell: u32,
    style: &ShapeStyle,
) {
    let c = cell.max(1) as i32;
    match kind {
        ShapeKind::Line => {
            fill_cells(buf, line_points(start.0, start.1, end.0, end.1, c), cell, style.rgb, style.alpha);
        }
        ShapeKind::Rect => {
            fill_cells(buf, pixel_rect_points(start, end, c), cell, style.rgb, style.alpha);
        }
        ShapeKind::Circle => {
            let r = pixel_circle_radius(start, end, c);
            fill_cells(buf, circle_points(start.0, start.1, r), cell, style.rgb, style.alpha);
        }
        _ => {
            let f = |p: (i32, i32)| (p.0 as f32, p.1 as f32);
            render_shape(buf, kind, f(start), f(end), style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;
    use image::Rgba;

    fn style(width: f32) -> ShapeStyle {
        ShapeStyle { rgb: [0, 0, 0], alpha: 1.0, width }
    }

    fn painted(buf: &PixelBuffer, x: u32, y: u32) -> bool {
        buf.get_pixel(x, y).0[3] > 0
    }

    #[test]
    fn rect_outline_leaves_interior_empty() {
        let mut buf = PixelBuffer::new(50, 50);
        render_shape(&mut buf, ShapeKind::Rect, (10.0, 10.0), (40.0, 30.0), &style(2.0));
        assert!(painted(&buf, 25, 10));
        assert!(painted(&buf, 10, 20));
        assert!(painted(&buf, 39, 29));
        assert_eq!(buf.get_pixel(25, 20), TRANSPARENT);
        assert_eq!(buf.get_pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn circle_is_centred_on_anchor() {
        let mut buf = PixelBuffer::new(60, 60);
        render_shape(&mut buf, ShapeKind::Circle, (30.0, 30.0), (45.0, 30.0), &style(2.0));
        assert!(painted(&buf, 44, 29));
        assert!(painted(&buf, 15, 29));
        assert!(painted(&buf, 29, 15));
        assert_eq!(buf.get_pixel(30, 30), TRANSPARENT);
    }

    #[test]
    fn arrow_head_is_filled() {
        let mut buf = PixelBuffer::new(100, 40);
        render_shape(&mut buf, ShapeKind::Arrow, (10.0, 20.0), (90.0, 20.0), &style(2.0));
        // head length min(6, 80/3) = 6, half-width 6 * sin 30° = 3
        assert!(painted(&buf, 86, 18));
        assert!(painted(&buf, 86, 21));
        assert_eq!(buf.get_pixel(50, 15), TRANSPARENT);
    }

    #[test]
    fn arrow_head_length_is_capped() {
        let head = arrow_head((0.0, 0.0), (9.0, 0.0), 10.0);
        let back = head[1].0;
        assert!((back - 9.0 + 3.0 * FRAC_PI_6.cos()).abs() < 1e-4);
    }

    #[test]
    fn triangle_geometry() {
        let v = triangle_vertices((10.0, 10.0), (30.0, 40.0));
        assert_eq!(v, [(20.0, 10.0), (10.0, 40.0), (30.0, 40.0)]);
    }

    #[test]
    fn polygon_starts_at_top() {
        let v = polygon_vertices((0.0, 0.0), (20.0, 40.0), 6);
        assert_eq!(v.len(), 6);
        // radius limited by the narrow side
        assert!((v[0].0 - 10.0).abs() < 1e-4);
        assert!((v[0].1 - 10.0).abs() < 1e-4);
    }

    #[test]
    fn degenerate_shapes_do_not_panic() {
        let mut buf = PixelBuffer::new(20, 20);
        for kind in ShapeKind::all() {
            render_shape(&mut buf, *kind, (5.0, 5.0), (5.0, 5.0), &style(2.0));
            render_shape(&mut buf, *kind, (5.0, 5.0), (15.0, 5.0), &style(2.0));
        }
    }

    #[test]
    fn oval_is_inscribed() {
        let mut buf = PixelBuffer::new(60, 40);
        render_shape(&mut buf, ShapeKind::Oval, (10.0, 10.0), (50.0, 30.0), &style(2.0));
        assert!(painted(&buf, 10, 19));
        assert!(painted(&buf, 30, 10));
        assert_eq!(buf.get_pixel(30, 20), TRANSPARENT);
        assert_eq!(buf.get_pixel(11, 11), TRANSPARENT);
    }

    #[test]
    fn marquee_is_dashed() {
        let mut buf = PixelBuffer::new(60, 20);
        render_marquee(&mut buf, (0.0, 5.0), (50.0, 15.0), &style(1.0));
        assert!(painted(&buf, 2, 5));
        assert_eq!(buf.get_pixel(7, 5), TRANSPARENT);
        assert!(painted(&buf, 12, 5));
    }

    #[test]
    fn pixel_line_fills_whole_cells() {
        let mut buf = PixelBuffer::new(32, 32);
        render_pixel_shape(&mut buf, ShapeKind::Line, (0, 0), (16, 0), 8, &style(1.0));
        for x in 0..24 {
            assert_eq!(buf.get_pixel(x, 7), Rgba([0, 0, 0, 255]));
        }
        assert_eq!(buf.get_pixel(24, 0), TRANSPARENT);
        assert_eq!(buf.get_pixel(0, 8), TRANSPARENT);
    }

    #[test]
    fn pixel_rect_outline() {
        let pts = pixel_rect_points((0, 0), (16, 16), 8);
        let cells: HashSet<_> = pts.into_iter().collect();
        for c in [(0, 0), (8, 0), (16, 0), (0, 8), (16, 8), (0, 16), (8, 16), (16, 16)] {
            assert!(cells.contains(&c), "missing {c:?}");
        }
        assert!(!cells.contains(&(8, 8)));
    }

    #[test]
    fn pixel_rect_handles_negative_extent() {
        let pts = pixel_rect_points((16, 16), (0, 0), 8);
        assert!(pts.contains(&(16, 16)));
        assert!(pts.contains(&(0, 16)));
        // bottom edge sits one cell above the far corner when dragging upward
        assert!(pts.contains(&(16, -8)));
    }

    #[test]
    fn pixel_circle_radius_rounds_to_cells() {
        assert_eq!(pixel_circle_radius((0, 0), (12, 0), 8), 16);
        assert_eq!(pixel_circle_radius((0, 0), (11, 0), 8), 8);
        assert_eq!(pixel_circle_radius((0, 0), (0, 0), 4), 0);
    }

    #[test]
    fn only_line_rect_and_circle_have_lattice_renderers() {
        let lattice: Vec<_> = ShapeKind::all().iter().filter(|k| k.has_pixel_variant()).collect();
        assert_eq!(lattice, vec![&ShapeKind::Line, &ShapeKind::Circle, &ShapeKind::Rect]);
    }

    #[test]
    fn pixel_cells_blend_once() {
        let mut buf = PixelBuffer::new(64, 64);
        let s = ShapeStyle { rgb: [0, 0, 0], alpha: 0.5, width: 1.0 };
        render_pixel_shape(&mut buf, ShapeKind::Circle, (32, 32), (48, 32), 8, &s);
        assert_eq!(buf.get_pixel(48, 32).0[3], 128);
    }
}
