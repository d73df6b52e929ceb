use image::Rgba;

use crate::canvas::PixelBuffer;

/// Tolerances for the flood fill boundary test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillThresholds {
    /// Max per-channel RGB difference still treated as "same colour".
    pub color: u8,
    /// Alpha below this counts as transparent, above it as painted.
    pub alpha: u8,
}

impl Default for FillThresholds {
    fn default() -> Self {
        Self { color: 10, alpha: 10 }
    }
}

/// True when `p` stops the fill started on `target`.
#[inline(always)]
fn is_boundary(p: [u8; 4], target: [u8; 4], t: FillThresholds) -> bool {
    let (ta, a) = (target[3], p[3]);
    if ta < t.alpha && a > t.alpha {
        return true;
    }
    if a < t.alpha && ta > t.alpha {
        return true;
    }
    let tol = t.color as i16;
    (p[0] as i16 - target[0] as i16).abs() > tol
        || (p[1] as i16 - target[1] as i16).abs() > tol
        || (p[2] as i16 - target[2] as i16).abs() > tol
}

/// 4-connected flood fill from `(seed_x, seed_y)` with an opaque `rgb`.
///
/// Filled pixels are written at alpha 255. Returns the number of pixels
/// written; 0 when the seed is off-canvas or already exactly the fill colour.
pub fn flood_fill(
    buffer: &mut PixelBuffer,
    seed_x: i32,
    seed_y: i32,
    rgb: [u8; 3],
    thresholds: FillThresholds,
) -> usize {
    let Some(target) = buffer.pixel_at(seed_x, seed_y) else {
        return 0;
    };
    let fill = Rgba([rgb[0], rgb[1], rgb[2], 255]);
    if target == fill {
        return 0;
    }
    let target = target.0;

    let w = buffer.width() as usize;
    let h = buffer.height() as usize;
    let mut visited = vec![false; w * h];

    // Stack holds packed flat indices (y * w + x)
    let mut stack: Vec<u32> = Vec::with_capacity(4096);
    let seed_idx = seed_y as usize * w + seed_x as usize;
    visited[seed_idx] = true;
    stack.push(seed_idx as u32);

    let mut written = 0usize;
    while let Some(idx) = stack.pop() {
        let idx = idx as usize;
        let x = (idx % w) as i32;
        let y = (idx / w) as i32;
        let p = buffer.get_pixel(x as u32, y as u32).0;
        if is_boundary(p, target, thresholds) {
            continue;
        }
        buffer.put_pixel(x, y, fill);
        written += 1;

        // down, right, up, left
        for (dx, dy) in [(0, 1), (1, 0), (0, -1), (-1, 0)] {
            let nx = x + dx;
            let ny = y + dy;
            if nx < 0 || ny < 0 || nx as usize >= w || ny as usize >= h {
                continue;
            }
            let n = ny as usize * w + nx as usize;
            if !visited[n] {
                visited[n] = true;
                stack.push(n as u32);
            }
        }
    }
    written
}
