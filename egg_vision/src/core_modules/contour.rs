// THEORY:
// A `Contour` is the ordered boundary of one connected foreground region, as
// traced by the segmenter. Like the other data containers in this crate it is
// "dumb": it knows how to summarize itself (enclosed area, bounding box) but has
// no opinion on whether it is the egg. That decision belongs to the segmenter's
// filtering stage.
//
// The enclosed area is the polygon (shoelace) area of the boundary points, so a
// filled w x h rectangle traced through its border pixel centers reports
// (w - 1) * (h - 1). Area filters are written against that measure.

use crate::core_modules::region::Region;
use imageproc::point::Point;

/// The minimum number of boundary points an ellipse fit needs.
pub const MIN_ELLIPSE_POINTS: usize = 5;

/// Where a candidate contour came from. Only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContourSource {
    /// Outermost borders only.
    External,
    /// Every border in the hierarchy, holes included.
    Hierarchy,
    /// Borders of the largest connected component by pixel count.
    LargestComponent,
}

/// An ordered boundary of a connected foreground region.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary points in tracing order.
    pub points: Vec<Point<i32>>,
    /// The extraction strategy that produced this contour.
    pub source: ContourSource,
}

impl Contour {
    pub fn new(points: Vec<Point<i32>>, source: ContourSource) -> Self {
        Self { points, source }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True when enough points exist to fit an ellipse.
    pub fn supports_ellipse_fit(&self) -> bool {
        self.points.len() >= MIN_ELLIPSE_POINTS
    }

    /// Enclosed polygon area (shoelace formula), always non-negative.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// The smallest region containing every boundary point.
    pub fn bounding_box(&self) -> Option<Region> {
        bounding_region(self.points.iter().map(|p| (p.x, p.y)))
    }
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, current) in points.iter().enumerate() {
        let next = &points[(i + 1) % points.len()];
        twice_area += current.x as i64 * next.y as i64 - next.x as i64 * current.y as i64;
    }
    twice_area.abs() as f64 / 2.0
}

/// Inclusive bounding box of integer points, clamped at zero.
pub fn bounding_region(points: impl IntoIterator<Item = (i32, i32)>) -> Option<Region> {
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    let mut any = false;

    for (x, y) in points {
        any = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if !any {
        return None;
    }
    let min_x = min_x.max(0);
    let min_y = min_y.max(0);
    if max_x < min_x || max_y < min_y {
        return None;
    }
    Some(Region::new(
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1) as u32,
        (max_y - min_y + 1) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(0, 0),
            Point::new(side, 0),
            Point::new(side, side),
            Point::new(0, side),
        ]
    }

    #[test]
    fn shoelace_is_orientation_independent() {
        let mut points = square(10);
        assert_eq!(polygon_area(&points), 100.0);
        points.reverse();
        assert_eq!(polygon_area(&points), 100.0);
    }

    #[test]
    fn degenerate_contours_have_no_area() {
        assert_eq!(polygon_area(&[Point::new(3, 3), Point::new(4, 4)]), 0.0);
        let line = Contour::new(
            vec![Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)],
            ContourSource::External,
        );
        assert_eq!(line.area(), 0.0);
        assert!(!line.supports_ellipse_fit());
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let contour = Contour::new(square(10), ContourSource::Hierarchy);
        assert_eq!(contour.bounding_box(), Some(Region::new(0, 0, 11, 11)));
        assert_eq!(bounding_region(Vec::<(i32, i32)>::new()), None);
    }
}
