//! Post-processing applied to raw search output before it is sent.

use shared::Point;

const EPSILON: f64 = 1e-9;

fn distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    dx.hypot(dy)
}

/// True when `b` lies on the segment from `a` to `c` and the path keeps going
/// the same way through it.
fn same_heading(a: Point, b: Point, c: Point) -> bool {
    let (ux, uy) = (i64::from(b.x) - i64::from(a.x), i64::from(b.y) - i64::from(a.y));
    let (vx, vy) = (i64::from(c.x) - i64::from(b.x), i64::from(c.y) - i64::from(b.y));
    ux * vy - uy * vx == 0 && ux * vx + uy * vy > 0
}

/// Drops repeated points and interior points that sit on a straight run.
pub fn compress(path: &mut Vec<Point>) {
    path.dedup();
    if path.len() < 3 {
        return;
    }

    let mut kept = Vec::with_capacity(path.len());
    kept.push(path[0]);
    for window in path.windows(3) {
        if !same_heading(window[0], window[1], window[2]) {
            kept.push(window[1]);
        }
    }
    kept.push(path[path.len() - 1]);
    *path = kept;
}

/// Greedy simplification. Starting from an anchor, later points are skipped
/// while the straight distance to them stays at least `allowed_ratio` times
/// the length travelled along the path; the first point that breaks the
/// bound makes its predecessor the next anchor. Endpoints are always kept.
pub fn smooth(path: &mut Vec<Point>, allowed_ratio: f32) {
    if path.len() < 3 {
        return;
    }
    let ratio = f64::from(allowed_ratio);

    let mut kept = vec![path[0]];
    let mut anchor = 0;
    let mut travelled = 0.0;
    for i in 1..path.len() {
        travelled += distance(path[i - 1], path[i]);
        let direct = distance(path[anchor], path[i]);
        if direct + EPSILON < ratio * travelled {
            anchor = i - 1;
            kept.push(path[anchor]);
            travelled = distance(path[anchor], path[i]);
        }
    }
    kept.push(path[path.len() - 1]);
    *path = kept;
}
