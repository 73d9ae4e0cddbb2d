//! Adaptive non-maximum suppression.
//!
//! Each point's suppression radius is the distance to the nearest point that
//! is significantly stronger (`other.value · c_robust > value`). Keeping the
//! largest radii yields strong points that are spread across the image.

use crate::candidate::topk::point_cmp_desc;
use crate::keypoint::Point;
use std::cmp::Ordering;

/// Keeps the `count` points with the largest suppression radius.
///
/// The global maximum has an infinite radius and is always kept first. Ties
/// in radius are broken by value, then `(row, col)`.
pub fn anms(points: &[Point], count: usize, c_robust: f32) -> Vec<Point> {
    if count == 0 || points.is_empty() {
        return Vec::new();
    }

    let mut sorted = points.to_vec();
    sorted.sort_by(point_cmp_desc);

    // Stronger points precede weaker ones, so only the prefix can suppress.
    let mut ranked: Vec<(f32, Point)> = Vec::with_capacity(sorted.len());
    for (i, point) in sorted.iter().enumerate() {
        let mut radius_sq = f32::INFINITY;
        for other in &sorted[..i] {
            if other.value * c_robust <= point.value {
                continue;
            }
            let dr = other.row - point.row;
            let dc = other.col - point.col;
            radius_sq = radius_sq.min(dr * dr + dc * dc);
        }
        ranked.push((radius_sq, *point));
    }

    ranked.sort_by(|a, b| match b.0.total_cmp(&a.0) {
        Ordering::Equal => point_cmp_desc(&a.1, &b.1),
        other => other,
    });
    ranked.into_iter().take(count).map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::anms;
    use crate::keypoint::Point;

    #[test]
    fn prefers_isolated_points_over_clustered_strong_ones() {
        let points = [
            Point::new(0.0, 0.0, 10.0),
            Point::new(0.0, 1.0, 8.0),
            Point::new(50.0, 50.0, 2.0),
        ];
        let kept = anms(&points, 2, 0.9);
        assert_eq!(kept, vec![points[0], points[2]]);
    }

    #[test]
    fn weak_robustness_lets_near_equal_points_survive() {
        let points = [Point::new(0.0, 0.0, 1.0), Point::new(0.0, 3.0, 0.95)];
        // 1.0 * 0.9 < 0.95, so the second point is not suppressed by the first.
        let kept = anms(&points, 2, 0.9);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], points[0]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(anms(&[], 4, 0.9).is_empty());
    }
}
