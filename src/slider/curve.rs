use serde::{Deserialize, Serialize};

use crate::geometry::{vec2::Vec2, vec2_transform::Vec2Transform};

/// One straight piece of an already flattened curve.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Line {
    pub start: Vec2,
    pub end: Vec2,
}

impl Line {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Line { start, end }
    }
    pub fn len(&self) -> f64 {
        (self.end - self.start).len()
    }
    pub fn apply_transform(&self, transform: Vec2Transform) -> Self {
        Line {
            start: self.start * transform,
            end: self.end * transform,
        }
    }
}

/// Ordered list of curves (bezier pieces, arcs, ...) after flattening.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MultiCurve {
    pub curves: Vec<Vec<Line>>,
}

impl MultiCurve {
    pub fn new(curves: Vec<Vec<Line>>) -> Self {
        MultiCurve { curves }
    }

    /// Single curve through `points`, one line per consecutive pair.
    pub fn from_points(points: &[Vec2]) -> Self {
        let lines = points
            .windows(2)
            .map(|pair| Line::new(pair[0], pair[1]))
            .collect();
        MultiCurve {
            curves: vec![lines],
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.curves.iter().flatten()
    }

    pub fn length(&self) -> f64 {
        self.lines().map(Line::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_builds_consecutive_lines() {
        let curve = MultiCurve::from_points(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(3.0, 4.0),
            Vec2::new(3.0, 10.0),
        ]);
        let lines: Vec<_> = curve.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!((curve.length() - 11.0).abs() < 1e-9, "length={}", curve.length());
    }

    #[test]
    fn lines_flatten_curves_in_order() {
        let a = Line::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0));
        let b = Line::new(Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0));
        let curve = MultiCurve::new(vec![vec![a], vec![], vec![b]]);
        let lines: Vec<_> = curve.lines().copied().collect();
        assert_eq!(lines, vec![a, b]);
    }
}
