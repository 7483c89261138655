//! Geometry primitives.
//!
//! These are plain data types; the algorithms that produce them (convex hull,
//! rotating calipers, polygon offsetting) live in `speedreader-vision`.

use serde::{Deserialize, Serialize};

/// A point in image coordinates, double precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle given by its top-left corner and extents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisAlignedRectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AxisAlignedRectangle {
    /// Smallest axis-aligned rectangle containing all `points`.
    /// Returns a zero-sized rectangle at the origin for an empty slice.
    #[must_use]
    pub fn enclosing(points: &[Point]) -> Self {
        if points.is_empty() {
            return Self {
                x: 0.0,
                y: 0.0,
                width: 0.0,
                height: 0.0,
            };
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        }
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// An oriented rectangle: center, full extents and rotation angle in radians.
///
/// The angle is normalized to `(-pi/2, pi/2]`. [`RotatedRectangle::corners`]
/// returns the four corners in top-left, top-right, bottom-right, bottom-left
/// order after unrotating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatedRectangle {
    pub cx: f64,
    pub cy: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRectangle {
    #[must_use]
    pub fn new(cx: f64, cy: f64, width: f64, height: f64, angle: f64) -> Self {
        Self {
            cx,
            cy,
            width,
            height,
            angle: normalize_angle(angle),
        }
    }

    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corner points in consistent winding order: top-left, top-right,
    /// bottom-right, bottom-left in the rectangle's own frame.
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        let (sin, cos) = self.angle.sin_cos();
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        let local = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)];
        local.map(|(x, y)| Point {
            x: self.cx + x * cos - y * sin,
            y: self.cy + x * sin + y * cos,
        })
    }

    /// The axis-aligned bounding box of the rotated corners.
    #[must_use]
    pub fn axis_aligned(&self) -> AxisAlignedRectangle {
        AxisAlignedRectangle::enclosing(&self.corners())
    }

    /// Uniformly scale the rectangle about the image origin.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            cx: self.cx * factor,
            cy: self.cy * factor,
            width: self.width * factor,
            height: self.height * factor,
            angle: self.angle,
        }
    }
}

/// Normalize an angle to `(-pi/2, pi/2]` (rectangle orientations have period pi).
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    let mut a = angle % PI;
    if a > FRAC_PI_2 {
        a -= PI;
    } else if a <= -FRAC_PI_2 {
        a += PI;
    }
    a
}

/// An ordered sequence of points in image coordinates.
///
/// Contours are closed (first point repeated at the end); the closing
/// duplicate is not counted by [`Polygon::vertex_count`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(pub Vec<Point>);

impl Polygon {
    #[must_use]
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    #[inline]
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Number of distinct vertices, ignoring a closing duplicate.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        match self.0.as_slice() {
            [] => 0,
            [first, .., last] if first == last => self.0.len() - 1,
            _ => self.0.len(),
        }
    }

    /// Uniformly scale all points about the image origin.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|p| Point::new(p.x * factor, p.y * factor))
                .collect(),
        )
    }
}

/// The same detected region described in three projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub axis_aligned_rectangle: AxisAlignedRectangle,
    pub rotated_rectangle: RotatedRectangle,
    pub polygon: Polygon,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn angle_normalization() {
        assert!((normalize_angle(PI) - 0.0).abs() < 1e-12);
        assert!((normalize_angle(FRAC_PI_2) - FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(-FRAC_PI_2) - FRAC_PI_2).abs() < 1e-12);
        assert!((normalize_angle(3.0 * FRAC_PI_4) + FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn corners_of_axis_aligned_rect() {
        let rect = RotatedRectangle::new(5.0, 5.0, 10.0, 4.0, 0.0);
        let corners = rect.corners();
        assert_eq!(corners[0], Point::new(0.0, 3.0));
        assert_eq!(corners[1], Point::new(10.0, 3.0));
        assert_eq!(corners[2], Point::new(10.0, 7.0));
        assert_eq!(corners[3], Point::new(0.0, 7.0));
    }

    #[test]
    fn axis_aligned_projection_of_rotated_square() {
        // A side-2 square rotated 45 degrees spans its diagonal on both axes.
        let rect = RotatedRectangle::new(0.0, 0.0, 2.0, 2.0, FRAC_PI_4);
        let aabb = rect.axis_aligned();
        let diagonal = 2.0 * 2.0_f64.sqrt();
        assert!((aabb.width - diagonal).abs() < 1e-9);
        assert!((aabb.height - diagonal).abs() < 1e-9);
        assert!((aabb.x + diagonal / 2.0).abs() < 1e-9);
    }

    #[test]
    fn polygon_vertex_count_ignores_closing_point() {
        let open = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
        ]);
        assert_eq!(open.vertex_count(), 3);

        let closed = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
        ]);
        assert_eq!(closed.vertex_count(), 3);
    }

    #[test]
    fn camel_case_wire_format() {
        let rect = RotatedRectangle::new(1.0, 2.0, 3.0, 4.0, 0.0);
        let json = serde_json::to_value(rect).unwrap();
        assert!(json.get("cx").is_some());
        assert!(json.get("width").is_some());
        let bbox = AxisAlignedRectangle {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        };
        let json = serde_json::to_value(bbox).unwrap();
        assert!(json.get("height").is_some());
    }
}
