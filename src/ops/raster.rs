//! Integer lattice walks used by the pixel-art renderers.

/// Bresenham line from `(x0, y0)` to `(x1, y1)` advancing `step` units per
/// move. Endpoints are expected to sit on the `step` lattice; the walk stops
/// once the current point is within one step of the end on both axes, so the
/// first point is always `(x0, y0)` and the last is the end point when aligned.
pub fn line_points(x0: i32, y0: i32, x1: i32, y1: i32, step: i32) -> Vec<(i32, i32)> {
    let step = step.max(1);
    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { step } else { -step };
    let sy = if y0 < y1 { step } else { -step };
    let mut err = dx - dy;

    // An unaligned end point could otherwise be stepped over forever
    let max_points = ((dx + dy) / step + 2) as usize;
    let mut points = Vec::with_capacity(max_points.min(4096));

    let (mut x, mut y) = (x0, y0);
    loop {
        points.push((x, y));
        if ((x - x1).abs() < step && (y - y1).abs() < step) || points.len() >= max_points {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += sx;
        }
        if e2 < dx {
            err += dx;
            y += sy;
        }
    }
    points
}

/// Midpoint circle: eight-way symmetric points of radius `radius` around
/// `(cx, cy)`. Points may repeat at the octant seams. Radius 0 yields the
/// centre only.
pub fn circle_points(cx: i32, cy: i32, radius: i32) -> Vec<(i32, i32)> {
    let radius = radius.max(0);
    if radius == 0 {
        return vec![(cx, cy)];
    }
    let mut points = Vec::with_capacity(8 * (radius as usize + 2));
    let mut push_octants = |x: i32, y: i32| {
        points.push((cx + x, cy + y));
        points.push((cx - x, cy + y));
        points.push((cx + x, cy - y));
        points.push((cx - x, cy - y));
        points.push((cx + y, cy + x));
        points.push((cx - y, cy + x));
        points.push((cx + y, cy - x));
        points.push((cx - y, cy - x));
    };

    let mut x = 0;
    let mut y = radius;
    let mut d = 3 - 2 * radius;
    push_octants(x, y);
    while y >= x {
        x += 1;
        if d > 0 {
            y -= 1;
            d += 4 * (x - y) + 10;
        } else {
            d += 4 * x + 6;
        }
        push_octants(x, y);
    }
    points
}
