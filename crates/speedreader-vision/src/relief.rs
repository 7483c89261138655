//! Dense float grids and the binary-morphology toolkit that turns a
//! detector probability map into connected text components.

use speedreader_core::{OcrError, Point, Polygon};
use std::collections::{HashSet, VecDeque};

/// A `width x height` grid of 32-bit floats, row-major.
///
/// Values are unconstrained during computation; [`ReliefMap::binarize`]
/// produces `{0.0, 1.0}`. Morphology passes write into an internal scratch
/// buffer and swap, so a pass never reads its own output.
#[derive(Debug, Clone)]
pub struct ReliefMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
    scratch: Vec<f32>,
}

impl ReliefMap {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
            scratch: vec![0.0; width * height],
        }
    }

    /// Wrap an existing row-major buffer.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Result<Self, OcrError> {
        if data.len() != width * height {
            return Err(OcrError::Inference(format!(
                "relief map of {width}x{height} needs {} values, got {}",
                width * height,
                data.len()
            )));
        }
        let scratch = vec![0.0; data.len()];
        Ok(Self {
            width,
            height,
            data,
            scratch,
        })
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        let i = self.idx(x, y);
        self.data[i] = value;
    }

    #[inline]
    fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] > 0.5
    }

    /// `x -> 1.0 if x > threshold else 0.0`, in place. Idempotent for any
    /// threshold in `[0, 1)`.
    pub fn binarize(&mut self, threshold: f32) {
        for v in &mut self.data {
            *v = if *v > threshold { 1.0 } else { 0.0 };
        }
    }

    /// 3x3 erosion: a pixel survives iff itself and all 8 neighbours are set;
    /// any out-of-bounds neighbour clears it, so the 1-pixel border always
    /// becomes 0.
    pub fn erode(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let on_border =
                    x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1;
                let value = if on_border {
                    0.0
                } else {
                    let mut all = true;
                    'scan: for dy in -1i64..=1 {
                        for dx in -1i64..=1 {
                            let nx = (x as i64 + dx) as usize;
                            let ny = (y as i64 + dy) as usize;
                            if !self.is_set(nx, ny) {
                                all = false;
                                break 'scan;
                            }
                        }
                    }
                    if all {
                        1.0
                    } else {
                        0.0
                    }
                };
                self.scratch[y * self.width + x] = value;
            }
        }
        std::mem::swap(&mut self.data, &mut self.scratch);
    }

    /// 3x3 dilation: a pixel is set iff itself or any in-bounds neighbour is
    /// set. Out-of-bounds neighbours count as 0.
    pub fn dilate(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let mut any = false;
                'scan: for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0
                            || ny < 0
                            || nx >= self.width as i64
                            || ny >= self.height as i64
                        {
                            continue;
                        }
                        if self.is_set(nx as usize, ny as usize) {
                            any = true;
                            break 'scan;
                        }
                    }
                }
                self.scratch[y * self.width + x] = if any { 1.0 } else { 0.0 };
            }
        }
        std::mem::swap(&mut self.data, &mut self.scratch);
    }

    /// 4-connected components of the binarized map. Label ids are assigned
    /// in row-major scan order of each component's first pixel.
    #[must_use]
    pub fn connected_components(&self) -> Vec<Component> {
        let mut labels = vec![0u32; self.width * self.height];
        let mut components = Vec::new();
        let mut next_label = 0u32;
        let mut queue = VecDeque::new();

        for y in 0..self.height {
            for x in 0..self.width {
                if !self.is_set(x, y) || labels[y * self.width + x] != 0 {
                    continue;
                }
                next_label += 1;
                let label = next_label;
                let mut component = Component {
                    label,
                    start: (x, y),
                    pixels: Vec::new(),
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                };
                labels[y * self.width + x] = label;
                queue.push_back((x, y));
                while let Some((px, py)) = queue.pop_front() {
                    component.push_pixel(px, py);
                    let neighbours = [
                        (px.wrapping_sub(1), py),
                        (px + 1, py),
                        (px, py.wrapping_sub(1)),
                        (px, py + 1),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= self.width || ny >= self.height {
                            continue;
                        }
                        if self.is_set(nx, ny) && labels[ny * self.width + nx] == 0 {
                            labels[ny * self.width + nx] = label;
                            queue.push_back((nx, ny));
                        }
                    }
                }
                components.push(component);
            }
        }
        components
    }

    /// Mean value over pixels whose centers lie strictly inside `polygon`.
    /// Falls back to the polygon's own vertex pixels when the interior is
    /// empty (hairline contours).
    #[must_use]
    pub fn mean_inside(&self, polygon: &Polygon) -> f32 {
        let points = polygon.points();
        if points.is_empty() {
            return 0.0;
        }
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = points
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max);

        let x0 = min_x.floor().max(0.0) as usize;
        let y0 = min_y.floor().max(0.0) as usize;
        let x1 = (max_x.ceil() as usize).min(self.width.saturating_sub(1));
        let y1 = (max_y.ceil() as usize).min(self.height.saturating_sub(1));

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for y in y0..=y1 {
            for x in x0..=x1 {
                if point_in_polygon(x as f64, y as f64, points) {
                    sum += f64::from(self.get(x, y));
                    count += 1;
                }
            }
        }
        if count == 0 {
            for p in points {
                let (x, y) = (p.x.round(), p.y.round());
                if x >= 0.0 && y >= 0.0 && (x as usize) < self.width && (y as usize) < self.height
                {
                    sum += f64::from(self.get(x as usize, y as usize));
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            (sum / count as f64) as f32
        }
    }
}

/// Even-odd ray-cast test; points exactly on an edge may fall either side.
fn point_in_polygon(px: f64, py: f64, points: &[Point]) -> bool {
    let mut inside = false;
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        if (a.y > py) != (b.y > py) {
            let x_int = a.x + (py - a.y) * (b.x - a.x) / (b.y - a.y);
            if px < x_int {
                inside = !inside;
            }
        }
    }
    inside
}

/// A set of 4-connected foreground pixels.
#[derive(Debug, Clone)]
pub struct Component {
    pub label: u32,
    /// Scan-order first pixel: topmost row, then leftmost. Its west and
    /// north neighbours are guaranteed background, which anchors the
    /// boundary trace.
    start: (usize, usize),
    pixels: Vec<(usize, usize)>,
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl Component {
    fn push_pixel(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.pixels.push((x, y));
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn pixels(&self) -> &[(usize, usize)] {
        &self.pixels
    }

    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`, inclusive.
    #[must_use]
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// Outer boundary via Moore border following, clockwise in image
    /// coordinates. The polygon is closed: first point equals last.
    #[must_use]
    pub fn contour(&self) -> Polygon {
        // Clockwise Moore neighbourhood starting west, y pointing down.
        const CW: [(i64, i64); 8] = [
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
        ];

        let set: HashSet<(i64, i64)> = self
            .pixels
            .iter()
            .map(|&(x, y)| (x as i64, y as i64))
            .collect();
        let s = (self.start.0 as i64, self.start.1 as i64);

        let mut points: Vec<(i64, i64)> = vec![s];
        let mut current = s;
        let mut backtrack = (s.0 - 1, s.1);
        let mut first_move: Option<((i64, i64), (i64, i64))> = None;
        let limit = self.pixels.len() * 8 + 8;

        for _ in 0..limit {
            let db = (backtrack.0 - current.0, backtrack.1 - current.1);
            let start_idx = CW.iter().position(|&d| d == db).unwrap_or(0);
            let mut advance = None;
            let mut prev = backtrack;
            for k in 1..=8 {
                let d = CW[(start_idx + k) % 8];
                let n = (current.0 + d.0, current.1 + d.1);
                if set.contains(&n) {
                    advance = Some((n, prev));
                    break;
                }
                prev = n;
            }
            let Some((next, back)) = advance else {
                break; // isolated pixel
            };
            match first_move {
                Some((from, to)) if current == from && next == to => break,
                None => first_move = Some((current, next)),
                _ => {}
            }
            backtrack = back;
            points.push(next);
            current = next;
        }

        if points.last() != Some(&s) {
            points.push(s);
        }
        Polygon::new(
            points
                .into_iter()
                .map(|(x, y)| Point::new(x as f64, y as f64))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn map_from(rows: &[&[u8]]) -> ReliefMap {
        let height = rows.len();
        let width = rows[0].len();
        let mut map = ReliefMap::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                map.set(x, y, f32::from(v));
            }
        }
        map
    }

    fn as_bits(map: &ReliefMap) -> Vec<u8> {
        (0..map.height())
            .flat_map(|y| (0..map.width()).map(move |x| (y, x)))
            .map(|(y, x)| u8::from(map.get(x, y) > 0.5))
            .collect()
    }

    /// Direct per-pixel reference for the 3x3 erode.
    fn reference_erode(map: &ReliefMap) -> ReliefMap {
        let (w, h) = (map.width(), map.height());
        let mut out = ReliefMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut keep = true;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                            keep = false;
                        } else if map.get(nx as usize, ny as usize) <= 0.5 {
                            keep = false;
                        }
                    }
                }
                out.set(x, y, if keep { 1.0 } else { 0.0 });
            }
        }
        out
    }

    /// Direct per-pixel reference for the 3x3 dilate.
    fn reference_dilate(map: &ReliefMap) -> ReliefMap {
        let (w, h) = (map.width(), map.height());
        let mut out = ReliefMap::new(w, h);
        for y in 0..h {
            for x in 0..w {
                let mut any = false;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx >= 0
                            && ny >= 0
                            && nx < w as i64
                            && ny < h as i64
                            && map.get(nx as usize, ny as usize) > 0.5
                        {
                            any = true;
                        }
                    }
                }
                out.set(x, y, if any { 1.0 } else { 0.0 });
            }
        }
        out
    }

    #[test]
    fn binarize_thresholds_and_is_idempotent() {
        let mut map = ReliefMap::new(2, 2);
        map.set(0, 0, 0.31);
        map.set(1, 0, 0.3);
        map.set(0, 1, 0.9);
        map.binarize(0.3);
        assert_eq!(as_bits(&map), vec![1, 0, 1, 0]);
        map.binarize(0.3);
        assert_eq!(as_bits(&map), vec![1, 0, 1, 0]);
    }

    #[test]
    fn erode_single_center_pixel_clears_grid() {
        let mut map = map_from(&[&[0, 0, 0], &[0, 1, 0], &[0, 0, 0]]);
        map.erode();
        assert!(as_bits(&map).iter().all(|&b| b == 0));
    }

    #[test]
    fn dilate_single_pixel_grows_3x3_block() {
        let mut map = ReliefMap::new(5, 5);
        map.set(2, 2, 1.0);
        map.dilate();
        for y in 0..5 {
            for x in 0..5 {
                let expected = (1..=3).contains(&x) && (1..=3).contains(&y);
                assert_eq!(map.get(x, y) > 0.5, expected, "at ({x},{y})");
            }
        }
    }

    #[test]
    fn erode_3x3_square_leaves_center() {
        let mut map = ReliefMap::new(5, 5);
        for y in 1..=3 {
            for x in 1..=3 {
                map.set(x, y, 1.0);
            }
        }
        map.erode();
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(map.get(x, y) > 0.5, x == 2 && y == 2, "at ({x},{y})");
            }
        }
    }

    #[test]
    fn morphology_on_degenerate_maps() {
        // All-zero: erode and dilate are identity.
        let mut zeros = ReliefMap::new(6, 6);
        zeros.erode();
        assert!(as_bits(&zeros).iter().all(|&b| b == 0));
        zeros.dilate();
        assert!(as_bits(&zeros).iter().all(|&b| b == 0));

        // All-one: dilate is identity; erode zeroes exactly the border.
        let mut ones = ReliefMap::new(6, 6);
        for y in 0..6 {
            for x in 0..6 {
                ones.set(x, y, 1.0);
            }
        }
        let mut dilated = ones.clone();
        dilated.dilate();
        assert!(as_bits(&dilated).iter().all(|&b| b == 1));

        ones.erode();
        for y in 0..6 {
            for x in 0..6 {
                let interior = (1..=4).contains(&x) && (1..=4).contains(&y);
                assert_eq!(ones.get(x, y) > 0.5, interior, "at ({x},{y})");
            }
        }
    }

    #[test]
    fn random_grids_match_reference_morphology() {
        let mut rng = rand::rng();
        for _ in 0..100_000 {
            let mut map = ReliefMap::new(10, 10);
            for y in 0..10 {
                for x in 0..10 {
                    if rng.random_bool(0.5) {
                        map.set(x, y, 1.0);
                    }
                }
            }

            let mut eroded = map.clone();
            eroded.erode();
            assert_eq!(as_bits(&eroded), as_bits(&reference_erode(&map)));

            let mut dilated = map.clone();
            dilated.dilate();
            assert_eq!(as_bits(&dilated), as_bits(&reference_dilate(&map)));

            // Both compositions must match the reference composed the same way.
            let mut opening = map.clone();
            opening.erode();
            opening.dilate();
            assert_eq!(
                as_bits(&opening),
                as_bits(&reference_dilate(&reference_erode(&map)))
            );

            let mut closing = map.clone();
            closing.dilate();
            closing.erode();
            assert_eq!(
                as_bits(&closing),
                as_bits(&reference_erode(&reference_dilate(&map)))
            );
        }
    }

    #[test]
    fn components_are_labeled_in_scan_order() {
        let map = map_from(&[
            &[0, 1, 0, 0, 1],
            &[0, 1, 0, 0, 1],
            &[0, 0, 0, 0, 0],
            &[1, 1, 0, 0, 0],
        ]);
        let components = map.connected_components();
        assert_eq!(components.len(), 3);
        assert_eq!(components[0].label, 1);
        assert_eq!(components[0].start, (1, 0));
        assert_eq!(components[1].start, (4, 0));
        assert_eq!(components[2].start, (0, 3));
        assert_eq!(components[2].pixel_count(), 2);
        assert_eq!(components[2].bounds(), (0, 3, 1, 3));
    }

    #[test]
    fn diagonal_pixels_are_separate_components() {
        let map = map_from(&[&[1, 0], &[0, 1]]);
        assert_eq!(map.connected_components().len(), 2);
    }

    #[test]
    fn contour_of_solid_square_is_closed_boundary() {
        let mut map = ReliefMap::new(5, 5);
        for y in 1..=3 {
            for x in 1..=3 {
                map.set(x, y, 1.0);
            }
        }
        let components = map.connected_components();
        let contour = components[0].contour();
        let points = contour.points();
        assert_eq!(points.first(), points.last());
        assert_eq!(contour.vertex_count(), 8);
        // Center is interior, never on the boundary.
        assert!(!points.contains(&Point::new(2.0, 2.0)));
    }

    #[test]
    fn contour_of_single_pixel() {
        let mut map = ReliefMap::new(3, 3);
        map.set(1, 1, 1.0);
        let components = map.connected_components();
        let contour = components[0].contour();
        assert_eq!(contour.points(), &[Point::new(1.0, 1.0), Point::new(1.0, 1.0)]);
    }

    #[test]
    fn mean_inside_scores_the_interior() {
        let mut map = ReliefMap::new(8, 8);
        for y in 2..=5 {
            for x in 2..=5 {
                map.set(x, y, 0.8);
            }
        }
        let square = Polygon::new(vec![
            Point::new(2.0, 2.0),
            Point::new(5.0, 2.0),
            Point::new(5.0, 5.0),
            Point::new(2.0, 5.0),
            Point::new(2.0, 2.0),
        ]);
        let mean = map.mean_inside(&square);
        assert!((mean - 0.8).abs() < 1e-6, "mean was {mean}");
    }
}
