use std::cmp::Ordering;

use nalgebra::Point2;

/// The four physical corners of the sheet, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerSet {
    pub top_left: Point2<f64>,
    pub top_right: Point2<f64>,
    pub bottom_right: Point2<f64>,
    pub bottom_left: Point2<f64>,
}

impl CornerSet {
    /// Order four arbitrary points as TL, TR, BR, BL.
    ///
    /// TL minimises x+y, BR maximises it; TR minimises y-x, BL maximises it.
    /// Equal keys are resolved by (x, y) so the result never depends on the
    /// order of `points`.
    pub fn from_points(points: [Point2<f64>; 4]) -> Self {
        let sum = |p: &Point2<f64>| p.x + p.y;
        let diff = |p: &Point2<f64>| p.y - p.x;

        Self {
            top_left: pick(&points, sum, Ordering::Less),
            bottom_right: pick(&points, sum, Ordering::Greater),
            top_right: pick(&points, diff, Ordering::Less),
            bottom_left: pick(&points, diff, Ordering::Greater),
        }
    }

    /// Corners of a `width` x `height` frame, used when no border is found.
    pub fn from_frame(width: u32, height: u32) -> Self {
        let right = width.saturating_sub(1) as f64;
        let bottom = height.saturating_sub(1) as f64;
        Self {
            top_left: Point2::new(0.0, 0.0),
            top_right: Point2::new(right, 0.0),
            bottom_right: Point2::new(right, bottom),
            bottom_left: Point2::new(0.0, bottom),
        }
    }

    pub fn to_array(&self) -> [Point2<f64>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn top_width(&self) -> f64 {
        nalgebra::distance(&self.top_left, &self.top_right)
    }

    pub fn bottom_width(&self) -> f64 {
        nalgebra::distance(&self.bottom_left, &self.bottom_right)
    }

    pub fn left_height(&self) -> f64 {
        nalgebra::distance(&self.top_left, &self.bottom_left)
    }

    pub fn right_height(&self) -> f64 {
        nalgebra::distance(&self.top_right, &self.bottom_right)
    }

    /// Shorter/longer ratios of the two width and the two height estimates.
    /// `None` when either pair is degenerate.
    pub fn side_ratios(&self) -> Option<(f64, f64)> {
        let (w1, w2) = (self.top_width(), self.bottom_width());
        let (h1, h2) = (self.left_height(), self.right_height());
        let max_w = w1.max(w2);
        let max_h = h1.max(h2);
        if max_w <= 0.0 || max_h <= 0.0 {
            return None;
        }
        Some((w1.min(w2) / max_w, h1.min(h2) / max_h))
    }

    /// True when every turn along TL -> TR -> BR -> BL has the same,
    /// non-zero orientation.
    pub fn is_convex(&self) -> bool {
        let pts = self.to_array();
        let mut sign = 0.0f64;
        for i in 0..4 {
            let a = pts[i];
            let b = pts[(i + 1) % 4];
            let c = pts[(i + 2) % 4];
            let cross = (b - a).perp(&(c - b));
            if cross == 0.0 {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    pub fn area(&self) -> f64 {
        polygon_area(&self.to_array())
    }
}

fn pick<F>(points: &[Point2<f64>; 4], key: F, want: Ordering) -> Point2<f64>
where
    F: Fn(&Point2<f64>) -> f64,
{
    let mut best = points[0];
    for p in &points[1..] {
        let ord = key(p)
            .partial_cmp(&key(&best))
            .unwrap_or(Ordering::Equal)
            .then_with(|| lexicographic(p, &best));
        if ord == want {
            best = *p;
        }
    }
    best
}

fn lexicographic(a: &Point2<f64>, b: &Point2<f64>) -> Ordering {
    a.x.partial_cmp(&b.x)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
}

/// Unsigned shoelace area of a closed polygon
pub fn polygon_area(points: &[Point2<f64>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.x * b.y - b.x * a.y;
    }
    twice.abs() / 2.0
}

/// Perimeter of a closed polygon
pub fn perimeter(points: &[Point2<f64>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .enumerate()
        .map(|(i, a)| nalgebra::distance(a, &points[(i + 1) % points.len()]))
        .sum()
}

/// Douglas-Peucker simplification of a closed curve.
///
/// The ring is split at two mutually distant points (the point farthest from
/// the first one, and the point farthest from that), so corners of a
/// quadrilateral become split points instead of being cut.
pub fn approximate_closed_polygon(points: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let farthest_from = |origin: Point2<f64>| {
        let mut best = 0;
        let mut best_dist = -1.0;
        for (i, p) in points.iter().enumerate() {
            let d = nalgebra::distance_squared(&origin, p);
            if d > best_dist {
                best = i;
                best_dist = d;
            }
        }
        best
    };

    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    if a == b {
        return vec![points[a]];
    }

    // Walk the ring a -> b and b -> a, each chain inclusive of its ends.
    let chain = |from: usize, to: usize| {
        let len = (to + n - from) % n;
        (0..=len).map(|k| points[(from + k) % n]).collect::<Vec<_>>()
    };

    let mut first = simplify_open(&chain(a, b), epsilon);
    let mut second = simplify_open(&chain(b, a), epsilon);
    first.pop();
    second.pop();
    first.append(&mut second);
    first
}

/// Douglas-Peucker on an open polyline; both end points are always kept.
fn simplify_open(points: &[Point2<f64>], epsilon: f64) -> Vec<Point2<f64>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let mut index = start;
        let mut dmax = 0.0;
        for i in start + 1..end {
            let d = segment_distance(&points[i], &points[start], &points[end]);
            if d > dmax {
                index = i;
                dmax = d;
            }
        }
        if dmax > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Perpendicular distance from `p` to the line through `a` and `b`
fn segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len == 0.0 {
        return nalgebra::distance(p, a);
    }
    ab.perp(&(p - a)).abs() / len
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(x: f64, y: f64) -> Point2<f64> {
        Point2::new(x, y)
    }

    #[test]
    fn test_order_skewed_quad() {
        let corners = CornerSet::from_points([
            p(610.0, 880.0),
            p(40.0, 30.0),
            p(20.0, 900.0),
            p(590.0, 60.0),
        ]);
        assert_eq!(corners.top_left, p(40.0, 30.0));
        assert_eq!(corners.top_right, p(590.0, 60.0));
        assert_eq!(corners.bottom_right, p(610.0, 880.0));
        assert_eq!(corners.bottom_left, p(20.0, 900.0));
    }

    proptest! {
        #[test]
        fn test_ordering_is_permutation_invariant(
            pts in prop::array::uniform4((0.0f64..1000.0, 0.0f64..1000.0)),
            perm in Just(vec![0usize, 1, 2, 3]).prop_shuffle(),
        ) {
            let points = pts.map(|(x, y)| p(x, y));
            let shuffled = [points[perm[0]], points[perm[1]], points[perm[2]], points[perm[3]]];
            prop_assert_eq!(CornerSet::from_points(points), CornerSet::from_points(shuffled));
        }
    }

    #[test]
    fn test_ties_do_not_depend_on_input_order() {
        // Diamond: TR and BL keys tie with TL/BR candidates on one axis.
        let a = [p(50.0, 0.0), p(100.0, 50.0), p(50.0, 100.0), p(0.0, 50.0)];
        let b = [a[2], a[0], a[3], a[1]];
        assert_eq!(CornerSet::from_points(a), CornerSet::from_points(b));
    }

    #[test]
    fn test_side_ratios() {
        let rect = CornerSet::from_frame(101, 51);
        let (w, h) = rect.side_ratios().unwrap();
        assert!((w - 1.0).abs() < 1e-12);
        assert!((h - 1.0).abs() < 1e-12);
        assert!((rect.top_width() - 100.0).abs() < 1e-12);
        assert!((rect.left_height() - 50.0).abs() < 1e-12);

        let collapsed = CornerSet::from_points([p(1.0, 1.0); 4]);
        assert!(collapsed.side_ratios().is_none());
    }

    #[test]
    fn test_convexity() {
        assert!(CornerSet::from_frame(10, 10).is_convex());

        let bow_tie = CornerSet {
            top_left: p(0.0, 0.0),
            top_right: p(10.0, 10.0),
            bottom_right: p(10.0, 0.0),
            bottom_left: p(0.0, 10.0),
        };
        assert!(!bow_tie.is_convex());

        let dart = CornerSet {
            top_left: p(0.0, 0.0),
            top_right: p(10.0, 0.0),
            bottom_right: p(3.0, 3.0),
            bottom_left: p(0.0, 10.0),
        };
        assert!(!dart.is_convex());
    }

    #[test]
    fn test_area_and_perimeter() {
        let square = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        assert_eq!(polygon_area(&square), 16.0);
        assert_eq!(perimeter(&square), 16.0);
    }

    #[test]
    fn test_approximate_dense_rectangle() {
        // Trace a 200x100 rectangle one pixel at a time, starting mid-edge.
        let mut ring = Vec::new();
        for x in 50..200 {
            ring.push(p(x as f64, 0.0));
        }
        for y in 0..100 {
            ring.push(p(200.0, y as f64));
        }
        for x in (1..=200).rev() {
            ring.push(p(x as f64, 100.0));
        }
        for y in (1..=100).rev() {
            ring.push(p(0.0, y as f64));
        }
        for x in 0..50 {
            ring.push(p(x as f64, 0.0));
        }

        let eps = 0.02 * perimeter(&ring);
        let approx = approximate_closed_polygon(&ring, eps);
        assert_eq!(approx.len(), 4, "{:?}", approx);

        let corners = CornerSet::from_points([approx[0], approx[1], approx[2], approx[3]]);
        assert_eq!(corners.top_left, p(0.0, 0.0));
        assert_eq!(corners.bottom_right, p(200.0, 100.0));
    }
}
