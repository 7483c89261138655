//! Polygon algorithms: hull, minimum-area rotated rectangle, offsetting.
//!
//! All arithmetic in double precision; callers round to pixels only when
//! sampling.

use speedreader_core::{normalize_angle, Point, RotatedRectangle};
use std::f64::consts::FRAC_PI_2;

/// Signed shoelace area. Positive for counter-clockwise winding in a y-up
/// frame; the sign flips in image coordinates. A closing duplicate point is
/// harmless.
#[must_use]
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    acc / 2.0
}

#[must_use]
pub fn polygon_perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += (b.x - a.x).hypot(b.y - a.y);
    }
    acc
}

/// Monotone-chain convex hull. Input order is irrelevant; coordinate ties
/// break lexicographically. The hull is returned in counter-clockwise order
/// (positive shoelace area) without a closing duplicate.
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted: Vec<Point> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup_by(|a, b| a.x == b.x && a.y == b.y);

    let n = sorted.len();
    if n < 3 {
        return sorted;
    }

    let cross = |o: Point, a: Point, b: Point| -> f64 {
        (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
    };

    let mut hull: Vec<Point> = Vec::with_capacity(2 * n);
    for &p in &sorted {
        while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev() {
        while hull.len() >= lower_len && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Minimum-area enclosing rotated rectangle via rotating calipers over the
/// convex hull.
///
/// Among equal-area candidates the orientation whose longer side aligns with
/// the +x axis (smaller `|angle|`) wins. Returns `None` for empty input;
/// collinear input produces a degenerate (zero-extent) rectangle.
#[must_use]
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRectangle> {
    let hull = convex_hull(points);
    match hull.len() {
        0 => None,
        1 => Some(RotatedRectangle::new(hull[0].x, hull[0].y, 0.0, 0.0, 0.0)),
        2 => {
            let (a, b) = (hull[0], hull[1]);
            let angle = (b.y - a.y).atan2(b.x - a.x);
            let length = (b.x - a.x).hypot(b.y - a.y);
            Some(canonical_rect(
                (a.x + b.x) / 2.0,
                (a.y + b.y) / 2.0,
                length,
                0.0,
                angle,
            ))
        }
        _ => Some(calipers(&hull)),
    }
}

fn calipers(hull: &[Point]) -> RotatedRectangle {
    let mut best: Option<(f64, RotatedRectangle)> = None;

    for i in 0..hull.len() {
        let a = hull[i];
        let b = hull[(i + 1) % hull.len()];
        let angle = (b.y - a.y).atan2(b.x - a.x);
        let (sin, cos) = angle.sin_cos();

        // Project every hull point onto the edge direction and its normal.
        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in hull {
            let u = p.x * cos + p.y * sin;
            let v = -p.x * sin + p.y * cos;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;

        let cu = (min_u + max_u) / 2.0;
        let cv = (min_v + max_v) / 2.0;
        let cx = cu * cos - cv * sin;
        let cy = cu * sin + cv * cos;

        let candidate = canonical_rect(cx, cy, width, height, angle);
        let better = match &best {
            None => true,
            Some((best_area, best_rect)) => {
                area < best_area - 1e-9
                    || ((area - best_area).abs() <= 1e-9
                        && candidate.angle.abs() < best_rect.angle.abs())
            }
        };
        if better {
            best = Some((area, candidate));
        }
    }

    best.map(|(_, rect)| rect).unwrap_or_else(|| {
        // Unreachable for a hull of >= 3 points; keep a defined fallback.
        RotatedRectangle::new(hull[0].x, hull[0].y, 0.0, 0.0, 0.0)
    })
}

/// A rotated rectangle has two equivalent (extent, angle) representations a
/// quarter turn apart. Pick the one with the smaller `|angle|`; on the exact
/// pi/4 tie keep the longer side on the x axis.
fn canonical_rect(cx: f64, cy: f64, width: f64, height: f64, angle: f64) -> RotatedRectangle {
    let a = normalize_angle(angle);
    let b = if a > 0.0 { a - FRAC_PI_2 } else { a + FRAC_PI_2 };

    let (w, h, theta) = if b.abs() + 1e-12 < a.abs() {
        (height, width, b)
    } else if (b.abs() - a.abs()).abs() <= 1e-12 && height > width {
        (height, width, b)
    } else {
        (width, height, a)
    };
    RotatedRectangle::new(cx, cy, w, h, theta)
}

/// Expand a polygon outward by `area * ratio / perimeter`, the DBNet unclip
/// compensating for shrink-map training.
///
/// Offsetting runs on the convex hull with miter joins; every downstream
/// consumer fits a min-area rect next, which only depends on the hull.
#[must_use]
pub fn unclip(points: &[Point], ratio: f64) -> Vec<Point> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        return hull;
    }
    let area = polygon_area(&hull).abs();
    let perimeter = polygon_perimeter(&hull);
    if perimeter <= f64::EPSILON {
        return hull;
    }
    let delta = area * ratio / perimeter;

    let n = hull.len();
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = hull[(i + n - 1) % n];
        let cur = hull[i];
        let next = hull[(i + 1) % n];

        // Outward unit normals of the two edges meeting at `cur`. The hull
        // is counter-clockwise (positive area), so (dy, -dx) points outward.
        let n1 = edge_normal(prev, cur);
        let n2 = edge_normal(cur, next);
        let dot = n1.0 * n2.0 + n1.1 * n2.1;
        let denom = (1.0 + dot).max(1e-6);
        out.push(Point::new(
            cur.x + (n1.0 + n2.0) * delta / denom,
            cur.y + (n1.1 + n2.1) * delta / denom,
        ));
    }
    out
}

fn edge_normal(a: Point, b: Point) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = dx.hypot(dy).max(f64::EPSILON);
    (dy / len, -dx / len)
}
