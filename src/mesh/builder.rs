use std::ops::Range;

use crate::{
    mesh::{
        tessellation::{joint_wedge, unit_circle, unit_ribbon},
        types::{CapInstance, JointVertex, MeshVertex, RibbonInstance},
    },
    slider::sections::{Section, SectionModel},
};

/// Fixed-capacity records addressed by index, with dirty tracking for partial uploads.
#[derive(Clone, Debug)]
pub struct InstanceArena<T> {
    records: Vec<T>,
    dirty: Vec<Range<usize>>,
}

impl<T: Copy + PartialEq> InstanceArena<T> {
    pub fn new(records: Vec<T>) -> Self {
        InstanceArena {
            records,
            dirty: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> T {
        self.records[index]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.records
    }

    /// Stores `value`; returns whether the record actually changed.
    pub fn set(&mut self, index: usize, value: T) -> bool {
        if self.records[index] == value {
            return false;
        }
        self.records[index] = value;
        self.mark_dirty(index);
        true
    }

    fn mark_dirty(&mut self, index: usize) {
        if self.dirty.iter().any(|r| r.contains(&index)) {
            return;
        }
        match self.dirty.iter_mut().find(|r| r.end == index || r.start == index + 1) {
            Some(range) => {
                range.start = range.start.min(index);
                range.end = range.end.max(index + 1);
            }
            None => self.dirty.push(index..index + 1),
        }
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Sorted, non-overlapping ranges patched since the last call.
    pub fn take_dirty(&mut self) -> Vec<Range<usize>> {
        let mut ranges = std::mem::take(&mut self.dirty);
        ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if last.end >= range.start => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }
}

/// Geometry that is built once per path and never rebuilt.
#[derive(Clone, Debug)]
pub struct StaticMeshes {
    pub ribbon_vertices: Vec<MeshVertex>,
    pub ribbon_indices: Vec<u16>,
    pub joint_vertices: Vec<JointVertex>,
    pub joint_indices: Vec<u32>,
    pub cap_vertices: Vec<MeshVertex>,
    pub cap_indices: Vec<u16>,
}

#[derive(Clone, Debug)]
pub struct SliderMeshes {
    pub static_meshes: StaticMeshes,
    pub ribbons: InstanceArena<RibbonInstance>,
    pub caps: InstanceArena<CapInstance>,
}

pub fn full_ribbon(section: &Section) -> RibbonInstance {
    RibbonInstance {
        start: section.point1.to_f32(),
        direction: section.direction().to_f32(),
        length: section.length as f32,
    }
}

impl SliderMeshes {
    /// Builds all meshes and writes each section's joint offset into the model.
    pub fn build(model: &mut SectionModel, lod: u32) -> Self {
        let sections = model.sections();

        let mut joint_vertices: Vec<JointVertex> = Vec::new();
        let mut joint_indices: Vec<u32> = Vec::new();
        let mut range_starts = Vec::with_capacity(sections.len());

        for (i, section) in sections.iter().enumerate() {
            range_starts.push(joint_indices.len() as u32);
            let Some(next) = sections.get(i + 1) else {
                continue;
            };
            let wedge = joint_wedge(section.point2, section.direction(), next.direction(), lod);
            let base = joint_vertices.len() as u32;
            joint_indices.extend(wedge.indices.iter().map(|index| base + index));
            joint_vertices.extend(wedge.vertices);
        }

        let ribbons = sections.iter().map(full_ribbon).collect();
        let caps = vec![
            CapInstance {
                center: model.start_point().to_f32(),
            },
            CapInstance {
                center: model.end_point().to_f32(),
            },
        ];

        let (ribbon_vertices, ribbon_indices) = unit_ribbon();
        let (cap_vertices, cap_indices) = unit_circle(lod);

        model.set_mesh_range_starts(&range_starts);

        SliderMeshes {
            static_meshes: StaticMeshes {
                ribbon_vertices,
                ribbon_indices,
                joint_vertices,
                joint_indices,
                cap_vertices,
                cap_indices,
            },
            ribbons: InstanceArena::new(ribbons),
            caps: InstanceArena::new(caps),
        }
    }
}
