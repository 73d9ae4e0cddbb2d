//! Top-K candidate tracking for detector responses.

use crate::keypoint::Point;
use std::cmp::Ordering;

pub(crate) fn point_cmp_desc(a: &Point, b: &Point) -> Ordering {
    b.value
        .total_cmp(&a.value)
        .then_with(|| a.row.total_cmp(&b.row))
        .then_with(|| a.col.total_cmp(&b.col))
}

/// Sorts points by descending value with deterministic tie-breaking.
pub(crate) fn sort_points_desc(points: &mut [Point]) {
    points.sort_by(point_cmp_desc);
}

/// Top-K container with O(k) insertion cost.
pub struct TopK {
    k: usize,
    items: Vec<Point>,
}

impl TopK {
    /// Creates a new Top-K collector.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            items: Vec::with_capacity(k),
        }
    }

    /// Pushes a point, evicting the weakest if at capacity.
    pub fn push(&mut self, point: Point) {
        if self.k == 0 {
            return;
        }
        if self.items.len() < self.k {
            self.items.push(point);
            return;
        }

        let mut worst_idx = 0usize;
        for (idx, item) in self.items.iter().enumerate().skip(1) {
            if point_cmp_desc(item, &self.items[worst_idx]) == Ordering::Greater {
                worst_idx = idx;
            }
        }

        if point_cmp_desc(&point, &self.items[worst_idx]) == Ordering::Less {
            self.items[worst_idx] = point;
        }
    }

    /// Returns points sorted by descending value.
    pub fn into_sorted_desc(mut self) -> Vec<Point> {
        sort_points_desc(&mut self.items);
        self.items
    }
}

impl Extend<Point> for TopK {
    fn extend<I: IntoIterator<Item = Point>>(&mut self, iter: I) {
        for point in iter {
            self.push(point);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TopK;
    use crate::keypoint::Point;

    #[test]
    fn keeps_best_with_row_tie_break() {
        let mut top = TopK::new(2);
        top.extend([
            Point::new(5.0, 0.0, 1.0),
            Point::new(1.0, 0.0, 3.0),
            Point::new(0.0, 0.0, 1.0),
            Point::new(2.0, 2.0, 0.5),
        ]);
        let kept = top.into_sorted_desc();
        assert_eq!(kept, vec![Point::new(1.0, 0.0, 3.0), Point::new(0.0, 0.0, 1.0)]);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut top = TopK::new(0);
        top.push(Point::new(0.0, 0.0, 1.0));
        assert!(top.into_sorted_desc().is_empty());
    }
}
