//! Non-maximum suppression for detector responses.

use crate::candidate::topk::sort_points_desc;
use crate::keypoint::Point;

/// Applies 2D non-maximum suppression using Chebyshev distance.
///
/// Points are sorted by descending value (ties by row, then column) and kept
/// if they are farther than `radius` in Chebyshev distance from all
/// previously kept points.
pub fn nms_points(points: &[Point], radius: f32) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sort_points_desc(&mut sorted);
    if radius <= 0.0 {
        return sorted;
    }

    let mut kept: Vec<Point> = Vec::new();
    'outer: for point in sorted {
        for other in kept.iter() {
            let dist = (point.row - other.row)
                .abs()
                .max((point.col - other.col).abs());
            if dist <= radius {
                continue 'outer;
            }
        }
        kept.push(point);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::nms_points;
    use crate::keypoint::Point;

    #[test]
    fn suppresses_neighbors_of_stronger_points() {
        let points = [
            Point::new(10.0, 10.0, 0.5),
            Point::new(11.0, 12.0, 0.9),
            Point::new(30.0, 30.0, 0.2),
        ];
        let kept = nms_points(&points, 2.0);
        assert_eq!(kept, vec![points[1], points[2]]);
    }

    #[test]
    fn equal_values_prefer_upper_left() {
        let a = Point::new(4.0, 5.0, 1.0);
        let b = Point::new(4.0, 4.0, 1.0);
        assert_eq!(nms_points(&[a, b], 1.0), vec![b]);
        assert_eq!(nms_points(&[b, a], 1.0), vec![b]);
    }
}
