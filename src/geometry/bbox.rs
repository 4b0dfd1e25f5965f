use serde::{Deserialize, Serialize};

use crate::geometry::vec2::Vec2;

/// Axis-aligned box, `x = [min, max]`, `y = [min, max]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl BBox {
    pub const EMPTY: BBox = BBox {
        x: [f64::INFINITY, f64::NEG_INFINITY],
        y: [f64::INFINITY, f64::NEG_INFINITY],
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut bbox = BBox::EMPTY;
        for point in points {
            bbox.include(point);
        }
        bbox
    }

    pub fn include(&mut self, point: Vec2) {
        self.x[0] = self.x[0].min(point.x);
        self.x[1] = self.x[1].max(point.x);
        self.y[0] = self.y[0].min(point.y);
        self.y[1] = self.y[1].max(point.y);
    }

    /// Edges count as inside.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x[0] && point.x <= self.x[1] && point.y >= self.y[0] && point.y <= self.y[1]
    }

    pub fn is_empty(&self) -> bool {
        !(self.x[0] <= self.x[1] && self.y[0] <= self.y[1])
    }

    pub fn expand(&self, radius: f64) -> Self {
        BBox {
            x: [self.x[0] - radius, self.x[1] + radius],
            y: [self.y[0] - radius, self.y[1] + radius],
        }
    }

    pub fn intersect(&self, other: &BBox) -> Option<BBox> {
        let out = BBox {
            x: [self.x[0].max(other.x[0]), self.x[1].min(other.x[1])],
            y: [self.y[0].max(other.y[0]), self.y[1].min(other.y[1])],
        };
        if out.width() <= 0.0 || out.height() <= 0.0 {
            return None;
        }
        Some(out)
    }

    pub fn width(&self) -> f64 {
        self.x[1] - self.x[0]
    }
    pub fn height(&self) -> f64 {
        self.y[1] - self.y[0]
    }
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.x[0] + self.x[1]) / 2.0,
            (self.y[0] + self.y[1]) / 2.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BBox {
        BBox {
            x: [x0, x1],
            y: [y0, y1],
        }
    }

    #[test]
    fn intersect_of_overlapping_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, -5.0, 20.0, 6.0);
        assert_eq!(a.intersect(&b), Some(bbox(5.0, 0.0, 10.0, 6.0)));
    }

    #[test]
    fn intersect_of_disjoint_boxes_is_none() {
        let a = bbox(0.0, 0.0, 1.0, 1.0);
        let b = bbox(2.0, 2.0, 3.0, 3.0);
        assert!(a.intersect(&b).is_none());
    }

    #[test]
    fn contains_includes_edges() {
        let b = bbox(0.0, 0.0, 10.0, 5.0);
        assert!(b.contains(Vec2::new(10.0, 0.0)));
        assert!(!b.contains(Vec2::new(10.5, 2.0)));
        assert!(!BBox::EMPTY.contains(Vec2::ZERO));
    }

    #[test]
    fn from_points_tracks_extremes() {
        let b = BBox::from_points([Vec2::new(3.0, -1.0), Vec2::new(-2.0, 4.0)]);
        assert_eq!(b, bbox(-2.0, -1.0, 3.0, 4.0));
        assert!(BBox::from_points([]).is_empty());
    }
}
