use std::ops::Range;

use crate::{
    config::SnakeRounding,
    mesh::{
        builder::{SliderMeshes, full_ribbon},
        types::{CapInstance, RibbonInstance},
    },
    slider::sections::SectionModel,
};

/// Turns two progress fractions into an ordered pair of absolute lengths.
///
/// `pixel_length` is the path length covered by one cache target pixel; live rounding snaps
/// the head up and the tail down to it so sub-pixel motion does not trigger a redraw.
pub fn resolve_lengths(
    head_progress: f64,
    tail_progress: f64,
    total_length: f64,
    rounding: SnakeRounding,
    pixel_length: f64,
) -> (f64, f64) {
    let to_length = |progress: f64| {
        if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0) * total_length
        }
    };

    let mut head = to_length(head_progress);
    let mut tail = to_length(tail_progress);
    if head > tail {
        std::mem::swap(&mut head, &mut tail);
    }

    if rounding == SnakeRounding::Live && pixel_length > 0.0 {
        head = ((head / pixel_length).ceil() * pixel_length).min(total_length);
        // A tail at the very end must stay there so the last frame shows the whole path.
        if tail < total_length {
            tail = (tail / pixel_length).floor() * pixel_length;
        }
        if head > tail {
            head = tail;
        }
    }

    (head, tail)
}

/// What was rasterized last time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterState {
    pub head_length: f64,
    pub tail_length: f64,
    pub head_section: usize,
    pub tail_section: usize,
    pub scale: f64,
}

/// Slices of the static meshes that make up the visible part of the path.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRange {
    /// Ribbon instances, head section through tail section inclusive.
    pub ribbons: Range<u32>,
    /// Joint mesh index elements.
    pub joints: Range<u32>,
    /// The visible area shrank, so stale color must be cleared before drawing.
    pub clear_color: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ProgressUpdater {
    last: Option<RasterState>,
    // The cached image no longer matches `last`.
    stale: bool,
}

impl ProgressUpdater {
    pub fn new() -> Self {
        ProgressUpdater {
            last: None,
            stale: false,
        }
    }

    pub fn last(&self) -> Option<&RasterState> {
        self.last.as_ref()
    }

    /// Makes the next update draw, with a color clear, even for unchanged lengths.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Patches the boundary sections for the new lengths.
    /// Returns `None` when nothing changed since the last raster.
    pub fn update(
        &mut self,
        model: &SectionModel,
        meshes: &mut SliderMeshes,
        head_length: f64,
        tail_length: f64,
        scale: f64,
    ) -> Option<DrawRange> {
        if model.is_empty() {
            return None;
        }

        if let Some(last) = self.last.as_ref().filter(|_| !self.stale) {
            if last.head_length == head_length
                && last.tail_length == tail_length
                && last.scale == scale
            {
                return None;
            }
        }

        let sections = model.sections();
        let head_section = model.section_index_at(head_length);
        let tail_section = model.section_index_at(tail_length);

        // Sections patched last time that are no longer at the boundary go back to full length.
        if let Some(last) = &self.last {
            for previous in [last.head_section, last.tail_section] {
                if previous != head_section && previous != tail_section {
                    meshes.ribbons.set(previous, full_ribbon(&sections[previous]));
                }
            }
        }

        if head_section == tail_section {
            let section = &sections[head_section];
            meshes.ribbons.set(
                head_section,
                RibbonInstance {
                    start: section.point_at(head_length).to_f32(),
                    direction: section.direction().to_f32(),
                    length: (tail_length - head_length) as f32,
                },
            );
        } else {
            let head = &sections[head_section];
            meshes.ribbons.set(
                head_section,
                RibbonInstance {
                    start: head.point_at(head_length).to_f32(),
                    direction: head.direction().to_f32(),
                    length: (head.end_length() - head_length) as f32,
                },
            );

            let tail = &sections[tail_section];
            meshes.ribbons.set(
                tail_section,
                RibbonInstance {
                    start: tail.point1.to_f32(),
                    direction: tail.direction().to_f32(),
                    length: (tail_length - tail.cumulative_length_before) as f32,
                },
            );
        }

        meshes.caps.set(
            0,
            CapInstance {
                center: model.point_at_length(head_length).to_f32(),
            },
        );
        meshes.caps.set(
            1,
            CapInstance {
                center: model.point_at_length(tail_length).to_f32(),
            },
        );

        let clear_color = self.stale
            || self.last.is_some_and(|last| {
                head_length > last.head_length || tail_length < last.tail_length || scale < last.scale
            });
        self.stale = false;

        self.last = Some(RasterState {
            head_length,
            tail_length,
            head_section,
            tail_section,
            scale,
        });

        Some(DrawRange {
            ribbons: head_section as u32..tail_section as u32 + 1,
            joints: sections[head_section].mesh_range_start..sections[tail_section].mesh_range_start,
            clear_color,
        })
    }
}
