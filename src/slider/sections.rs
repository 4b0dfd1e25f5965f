use crate::{
    geometry::{
        bbox::BBox,
        vec2::Vec2,
        vec2_transform::{PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH, Vec2Transform},
    },
    slider::curve::MultiCurve,
};

// Shorter lines are treated as degenerate curve samples.
const MIN_SECTION_LENGTH: f64 = 1e-6;

// Distorted sliders are squeezed into view, so they may reach much further out.
const DISTORTION_ALLOWANCE_MULTIPLIER: f64 = 3.0;

/// Area outside of which curve samples are dropped: one playfield beyond every edge,
/// three with distortions on.
pub fn playfield_allowance(distortions: bool) -> BBox {
    let m = if distortions {
        DISTORTION_ALLOWANCE_MULTIPLIER
    } else {
        1.0
    };
    BBox {
        x: [-PLAYFIELD_WIDTH * m, PLAYFIELD_WIDTH * 2.0 * m],
        y: [-PLAYFIELD_HEIGHT * m, PLAYFIELD_HEIGHT * 2.0 * m],
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Section {
    pub point1: Vec2,
    pub point2: Vec2,
    pub length: f64,
    pub cumulative_length_before: f64,
    /// Offset (in index elements) of the joint between this section and the next one.
    pub mesh_range_start: u32,
}

impl Section {
    pub fn direction(&self) -> Vec2 {
        (self.point2 - self.point1) * (1.0 / self.length)
    }

    pub fn end_length(&self) -> f64 {
        self.cumulative_length_before + self.length
    }

    /// Point at absolute path length `length`, clamped to this section.
    pub fn point_at(&self, length: f64) -> Vec2 {
        let local = (length - self.cumulative_length_before).clamp(0.0, self.length);
        self.point1 + self.direction() * local
    }
}

/// The flattened path: straight sections ordered by arc length.
#[derive(Clone, Debug)]
pub struct SectionModel {
    sections: Vec<Section>,
    total_length: f64,
    bbox: BBox,
}

impl SectionModel {
    pub fn new(curve: &MultiCurve, mirror_vertically: bool) -> Self {
        Self::build(curve, mirror_vertically, None)
    }

    /// Like `new`, but samples outside `allowance` are dropped and their neighbours joined.
    pub fn within(curve: &MultiCurve, mirror_vertically: bool, allowance: &BBox) -> Self {
        Self::build(curve, mirror_vertically, Some(allowance))
    }

    fn build(curve: &MultiCurve, mirror_vertically: bool, allowance: Option<&BBox>) -> Self {
        let mirror = mirror_vertically.then(Vec2Transform::mirror_playfield_vertically);

        let mut sections = Vec::new();
        let mut bbox = BBox::EMPTY;
        let mut cumulative = 0.0;
        let mut previous: Option<Vec2> = None;

        for line in curve.lines() {
            let line = match mirror {
                Some(transform) => line.apply_transform(transform),
                None => *line,
            };

            for point in [line.start, line.end] {
                if allowance.is_some_and(|a| !a.contains(point)) {
                    continue;
                }
                let Some(start) = previous else {
                    previous = Some(point);
                    continue;
                };

                let length = (point - start).len();
                if !(length > MIN_SECTION_LENGTH) {
                    continue;
                }

                bbox.include(start);
                bbox.include(point);
                sections.push(Section {
                    point1: start,
                    point2: point,
                    length,
                    cumulative_length_before: cumulative,
                    mesh_range_start: 0,
                });
                cumulative += length;
                previous = Some(point);
            }
        }

        SectionModel {
            sections,
            total_length: cumulative,
            bbox,
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Bounding box of the centre line; the stroke radius is not included.
    pub fn bbox(&self) -> BBox {
        self.bbox
    }

    pub fn start_point(&self) -> Vec2 {
        self.sections.first().map_or(Vec2::ZERO, |s| s.point1)
    }

    pub fn end_point(&self) -> Vec2 {
        self.sections.last().map_or(Vec2::ZERO, |s| s.point2)
    }

    /// Last section index `i` with `cumulative_length_before[i] <= length`.
    pub fn section_index_at(&self, length: f64) -> usize {
        let after = self
            .sections
            .partition_point(|s| s.cumulative_length_before <= length);
        after.saturating_sub(1).min(self.sections.len().saturating_sub(1))
    }

    pub fn point_at_length(&self, length: f64) -> Vec2 {
        if self.sections.is_empty() {
            return Vec2::ZERO;
        }
        let length = length.clamp(0.0, self.total_length);
        self.sections[self.section_index_at(length)].point_at(length)
    }

    pub(crate) fn set_mesh_range_starts(&mut self, starts: &[u32]) {
        for (section, start) in self.sections.iter_mut().zip(starts) {
            section.mesh_range_start = *start;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slider::curve::Line;

    fn three_section_model() -> SectionModel {
        SectionModel::new(
            &MultiCurve::from_points(&[
                Vec2::new(0.0, 0.0),
                Vec2::new(40.0, 0.0),
                Vec2::new(40.0, 30.0),
                Vec2::new(10.0, 30.0),
            ]),
            false,
        )
    }

    #[test]
    fn cumulative_lengths_add_up_to_total() {
        let model = three_section_model();
        let cumulative: Vec<f64> = model
            .sections()
            .iter()
            .map(|s| s.cumulative_length_before)
            .collect();
        assert_eq!(cumulative, vec![0.0, 40.0, 70.0]);
        let last = model.sections().last().unwrap();
        assert_eq!(last.cumulative_length_before + last.length, model.total_length());
        assert_eq!(model.total_length(), 100.0);
    }

    #[test]
    fn zero_length_lines_are_dropped() {
        let p = Vec2::new(5.0, 5.0);
        let curve = MultiCurve::new(vec![
            vec![Line::new(p, p)],
            vec![Line::new(p, Vec2::new(5.0, 15.0)), Line::new(Vec2::new(5.0, 15.0), Vec2::new(5.0, 15.0))],
        ]);
        let model = SectionModel::new(&curve, false);
        assert_eq!(model.len(), 1);
        assert_eq!(model.total_length(), 10.0);
    }

    #[test]
    fn samples_outside_the_playfield_allowance_are_dropped() {
        let curve = MultiCurve::from_points(&[
            Vec2::new(100.0, 100.0),
            Vec2::new(5000.0, 100.0),
            Vec2::new(100.0, 200.0),
        ]);
        let model = SectionModel::within(&curve, false, &playfield_allowance(false));
        assert_eq!(model.len(), 1);
        assert_eq!(model.total_length(), 100.0);
        assert_eq!(model.bbox().x, [100.0, 100.0]);

        assert_eq!(SectionModel::new(&curve, false).len(), 2);
    }

    #[test]
    fn distortions_widen_the_allowance() {
        let point = Vec2::new(-1200.0, 900.0);
        assert!(!playfield_allowance(false).contains(point));
        assert!(playfield_allowance(true).contains(point));
    }

    #[test]
    fn degenerate_curve_gives_empty_model() {
        let p = Vec2::new(1.0, 2.0);
        let model = SectionModel::new(&MultiCurve::from_points(&[p, p, p]), false);
        assert!(model.is_empty());
        assert_eq!(model.total_length(), 0.0);
        assert_eq!(model.point_at_length(10.0), Vec2::ZERO);
    }

    #[test]
    fn mirror_applies_before_bounds() {
        let curve = MultiCurve::from_points(&[Vec2::new(0.0, 10.0), Vec2::new(20.0, 30.0)]);
        let model = SectionModel::new(&curve, true);
        let bbox = model.bbox();
        assert!((bbox.y[0] - 354.0).abs() < 1e-9, "bbox={bbox:?}");
        assert!((bbox.y[1] - 374.0).abs() < 1e-9, "bbox={bbox:?}");
        assert!((model.start_point().y - 374.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_at_section_boundaries() {
        let model = three_section_model();
        assert_eq!(model.section_index_at(0.0), 0);
        assert_eq!(model.section_index_at(39.999), 0);
        assert_eq!(model.section_index_at(40.0), 1);
        assert_eq!(model.section_index_at(50.0), 1);
        assert_eq!(model.section_index_at(70.0), 2);
        assert_eq!(model.section_index_at(100.0), 2);
    }

    #[test]
    fn lookup_is_unique_for_random_lengths() {
        let model = three_section_model();
        for _ in 0..1000 {
            let length = rand::random::<f64>() * model.total_length();
            let i = model.section_index_at(length);
            let s = &model.sections()[i];
            assert!(
                s.cumulative_length_before <= length && length < s.end_length(),
                "length={length} index={i}"
            );
        }
    }

    #[test]
    fn point_at_length_interpolates_within_section() {
        let model = three_section_model();
        let p = model.point_at_length(55.0);
        assert!((p.x - 40.0).abs() < 1e-9 && (p.y - 15.0).abs() < 1e-9, "p={p}");
        assert_eq!(model.point_at_length(1000.0), model.end_point());
        assert_eq!(model.point_at_length(-5.0), model.start_point());
    }
}
