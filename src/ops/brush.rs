//! Stroke primitives painted straight onto a [`PixelBuffer`].
//!
//! Every primitive rasterizes one segment in a single pass: each pixel inside
//! the segment's bounding box is blended once with its coverage, so a segment
//! never darkens itself where its own samples overlap.

use crate::canvas::PixelBuffer;

/// Shape of the segment ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineCap {
    /// Half-disc caps; also makes consecutive segments join smoothly.
    Round,
    /// Caps extend half the width past each end point.
    Square,
}

/// Edge coverage: 1.0 inside, 0.0 outside, smoothstep across a 1 px band.
#[inline]
fn edge_coverage(inside_distance: f32) -> f32 {
    let t = (inside_distance + 0.5).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Projection of `p` onto segment `a→b`, returned as (t in [0,1], distance).
#[inline]
fn segment_distance(p: (f32, f32), a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len2).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
    (t, ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
}

/// Pixel bounds touched by a segment of half-width `r`, clipped to the buffer.
fn segment_bounds(buf: &PixelBuffer, a: (f32, f32), b: (f32, f32), r: f32) -> Option<(i32, i32, i32, i32)> {
    let pad = r + 2.0;
    let x0 = (a.0.min(b.0) - pad).floor().max(0.0) as i32;
    let y0 = (a.1.min(b.1) - pad).floor().max(0.0) as i32;
    let x1 = ((a.0.max(b.0) + pad).ceil() as i32).min(buf.width() as i32 - 1);
    let y1 = ((a.1.max(b.1) + pad).ceil() as i32).min(buf.height() as i32 - 1);
    if x0 > x1 || y0 > y1 {
        None
    } else {
        Some((x0, y0, x1, y1))
    }
}

/// Coverage of pixel centre `p` by a square-capped segment `a→b`.
fn square_coverage(p: (f32, f32), a: (f32, f32), b: (f32, f32), r: f32) -> f32 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = if len <= f32::EPSILON { (1.0, 0.0) } else { (dx / len, dy / len) };
    let (mx, my) = ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
    let (rx, ry) = (p.0 - mx, p.1 - my);
    let along = (rx * ux + ry * uy).abs();
    let across = (rx * -uy + ry * ux).abs();
    edge_coverage(len * 0.5 + r - along) * edge_coverage(r - across)
}

/// Paint a solid segment of `width` with the given cap.
pub fn stroke_segment(
    buf: &mut PixelBuffer,
    a: (f32, f32),
    b: (f32, f32),
    width: f32,
    rgb: [u8; 3],
    alpha: f32,
    cap: LineCap,
) {
    if alpha <= 0.0 {
        return;
    }
    let r = (width * 0.5).max(0.5);
    let Some((x0, y0, x1, y1)) = segment_bounds(buf, a, b, r) else { return };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let cov = match cap {
                LineCap::Round => edge_coverage(r - segment_distance(p, a, b).1),
                LineCap::Square => square_coverage(p, a, b, r),
            };
            if cov > 0.0 {
                buf.blend_pixel(x, y, rgb, alpha * cov);
            }
        }
    }
}

/// Round-capped segment whose alpha falls linearly from `alpha` at `a` to
/// `alpha * tail` at `b`.
pub fn gradient_segment(
    buf: &mut PixelBuffer,
    a: (f32, f32),
    b: (f32, f32),
    width: f32,
    rgb: [u8; 3],
    alpha: f32,
    tail: f32,
) {
    if alpha <= 0.0 {
        return;
    }
    let r = (width * 0.5).max(0.5);
    let Some((x0, y0, x1, y1)) = segment_bounds(buf, a, b, r) else { return };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let (t, d) = segment_distance(p, a, b);
            let cov = edge_coverage(r - d);
            if cov > 0.0 {
                let ramp = 1.0 + (tail - 1.0) * t;
                buf.blend_pixel(x, y, rgb, alpha * ramp * cov);
            }
        }
    }
}

/// Destination-out along a round-capped segment.
pub fn erase_segment(buf: &mut PixelBuffer, a: (f32, f32), b: (f32, f32), width: f32, strength: f32) {
    if strength <= 0.0 {
        return;
    }
    let r = (width * 0.5).max(0.5);
    let Some((x0, y0, x1, y1)) = segment_bounds(buf, a, b, r) else { return };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let cov = edge_coverage(r - segment_distance(p, a, b).1);
            if cov > 0.0 {
                buf.erase_pixel(x, y, strength * cov);
            }
        }
    }
}

/// Filled anti-aliased disc.
pub fn dot(buf: &mut PixelBuffer, center: (f32, f32), radius: f32, rgb: [u8; 3], alpha: f32) {
    stroke_segment(buf, center, center, radius * 2.0, rgb, alpha, LineCap::Round);
}

/// One grid cell of a pixel-art canvas.
pub fn fill_cell(buf: &mut PixelBuffer, x: i32, y: i32, size: u32, rgb: [u8; 3], alpha: f32) {
    buf.fill_rect(x, y, size, size, rgb, alpha);
}

pub fn clear_cell(buf: &mut PixelBuffer, x: i32, y: i32, size: u32) {
    buf.clear_rect(x, y, size, size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::TRANSPARENT;
    use image::Rgba;

    #[test]
    fn round_segment_covers_its_centre_line() {
        let mut buf = PixelBuffer::new(40, 20);
        stroke_segment(&mut buf, (5.0, 10.0), (35.0, 10.0), 4.0, [255, 0, 0], 1.0, LineCap::Round);
        assert_eq!(buf.get_pixel(20, 9), Rgba([255, 0, 0, 255]));
        assert_eq!(buf.get_pixel(20, 2), TRANSPARENT);
        // round cap reaches past the end point by the radius
        assert!(buf.get_pixel(36, 9).0[3] > 0);
        assert_eq!(buf.get_pixel(39, 9), TRANSPARENT);
    }

    #[test]
    fn square_cap_fills_the_corner() {
        let mut round = PixelBuffer::new(30, 30);
        let mut square = PixelBuffer::new(30, 30);
        let (a, b) = ((10.0, 15.0), (20.0, 15.0));
        stroke_segment(&mut round, a, b, 10.0, [0, 0, 0], 1.0, LineCap::Round);
        stroke_segment(&mut square, a, b, 10.0, [0, 0, 0], 1.0, LineCap::Square);
        // corner of the square cap lies outside the round cap
        assert_eq!(square.get_pixel(24, 11).0[3], 255);
        assert!(round.get_pixel(24, 11).0[3] < 255);
    }

    #[test]
    fn segment_alpha_is_applied_once() {
        let mut buf = PixelBuffer::new(20, 20);
        stroke_segment(&mut buf, (2.0, 10.0), (18.0, 10.0), 6.0, [0, 0, 255], 0.5, LineCap::Round);
        assert_eq!(buf.get_pixel(10, 9).0[3], 128);
    }

    #[test]
    fn gradient_fades_towards_the_end() {
        let mut buf = PixelBuffer::new(60, 20);
        gradient_segment(&mut buf, (5.0, 10.0), (55.0, 10.0), 6.0, [0, 0, 0], 1.0, 0.5);
        let head = buf.get_pixel(6, 9).0[3];
        let tail = buf.get_pixel(54, 9).0[3];
        assert!(head > tail, "head {head} tail {tail}");
        assert!((tail as i32 - 128).abs() <= 4);
    }

    #[test]
    fn erase_clears_coverage() {
        let mut buf = PixelBuffer::new_filled(20, 20, Rgba([9, 9, 9, 255]));
        erase_segment(&mut buf, (10.0, 10.0), (10.0, 10.0), 6.0, 1.0);
        assert_eq!(buf.get_pixel(10, 10), TRANSPARENT);
        assert_eq!(buf.get_pixel(0, 0), Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn partial_erase_keeps_some_alpha() {
        let mut buf = PixelBuffer::new_filled(20, 20, Rgba([9, 9, 9, 255]));
        erase_segment(&mut buf, (10.0, 10.0), (10.0, 10.0), 6.0, 0.5);
        let a = buf.get_pixel(10, 10).0[3];
        assert!((a as i32 - 128).abs() <= 1);
    }

    #[test]
    fn off_canvas_segment_is_clipped() {
        let mut buf = PixelBuffer::new(10, 10);
        stroke_segment(&mut buf, (-50.0, -50.0), (-40.0, -40.0), 4.0, [1, 1, 1], 1.0, LineCap::Round);
        assert!(buf.is_blank());
        stroke_segment(&mut buf, (-5.0, 5.0), (15.0, 5.0), 2.0, [1, 1, 1], 1.0, LineCap::Round);
        assert!(!buf.is_blank());
    }

    #[test]
    fn cells_fill_and_clear() {
        let mut buf = PixelBuffer::new(16, 16);
        fill_cell(&mut buf, 8, 8, 8, [5, 5, 5], 1.0);
        assert_eq!(buf.get_pixel(15, 15), Rgba([5, 5, 5, 255]));
        assert_eq!(buf.get_pixel(7, 7), TRANSPARENT);
        clear_cell(&mut buf, 8, 8, 8);
        assert!(buf.is_blank());
    }
}
