use std::ops::Range;

use anyhow::bail;

use crate::{
    geometry::mat4::Mat4,
    mesh::{
        builder::SliderMeshes,
        types::{CapInstance, RibbonInstance, SliderUniforms},
    },
};

pub mod compose;
pub mod software;
pub mod wgpu_backend;

/// One rasterization of the visible part of a path into a cache target.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawPass {
    /// Path space to target clip space.
    pub projection: Mat4,
    /// Applied after `projection`; identity unless distortions are on.
    pub distort: Mat4,
    pub radius: f64,
    /// Ribbon instances to draw.
    pub ribbons: Range<u32>,
    /// Joint mesh index elements to draw.
    pub joints: Range<u32>,
    /// Clear color as well as depth before drawing.
    pub clear_color: bool,
}

impl DrawPass {
    pub fn uniforms(&self) -> SliderUniforms {
        SliderUniforms {
            projection: self.projection.to_cols_f32(),
            distort: self.distort.to_cols_f32(),
            radius: self.radius as f32,
            _pad: [0.0; 3],
        }
    }

    /// Path space straight to target clip space.
    pub fn clip_transform(&self) -> Mat4 {
        self.distort * self.projection
    }

    /// Both ranges must be ordered and lie within the uploaded meshes.
    pub fn check_ranges(&self, ribbon_count: usize, joint_index_count: usize) -> anyhow::Result<()> {
        if self.ribbons.start > self.ribbons.end || self.ribbons.end as usize > ribbon_count {
            bail!(
                "ribbon range {:?} is invalid for {ribbon_count} instances",
                self.ribbons
            );
        }
        if self.joints.start > self.joints.end || self.joints.end as usize > joint_index_count {
            bail!(
                "joint range {:?} is invalid for {joint_index_count} indices",
                self.joints
            );
        }
        Ok(())
    }
}

/// Owns the device-side copies of the slider meshes and the cache targets.
///
/// Depth is cleared to 1.0 before every draw and tested with "less", so where the body
/// overlaps itself the fragment nearest to the centre line wins. Color writes have no
/// blending: the red channel holds the winning depth and alpha marks coverage.
pub trait RenderBackend {
    type Meshes;
    type Target;

    fn create_meshes(&mut self, meshes: &SliderMeshes) -> anyhow::Result<Self::Meshes>;

    /// Overwrites `instances.len()` ribbon records starting at `first`.
    fn write_ribbon_instances(
        &mut self,
        meshes: &mut Self::Meshes,
        first: usize,
        instances: &[RibbonInstance],
    );

    fn write_cap_instances(
        &mut self,
        meshes: &mut Self::Meshes,
        first: usize,
        instances: &[CapInstance],
    );

    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<Self::Target>;

    /// Fails without drawing when the pass ranges do not fit the meshes.
    fn draw(
        &mut self,
        target: &mut Self::Target,
        meshes: &Self::Meshes,
        pass: &DrawPass,
    ) -> anyhow::Result<()>;

    fn release_meshes(&mut self, meshes: Self::Meshes);

    fn release_target(&mut self, target: Self::Target);
}

/// Uploads every record patched since the last flush; returns the number of writes issued.
pub fn flush_instances<B: RenderBackend>(
    backend: &mut B,
    device_meshes: &mut B::Meshes,
    meshes: &mut SliderMeshes,
) -> usize {
    let mut writes = 0;

    for range in meshes.ribbons.take_dirty() {
        let first = range.start;
        backend.write_ribbon_instances(device_meshes, first, &meshes.ribbons.as_slice()[range]);
        writes += 1;
    }

    for range in meshes.caps.take_dirty() {
        let first = range.start;
        backend.write_cap_instances(device_meshes, first, &meshes.caps.as_slice()[range]);
        writes += 1;
    }

    writes
}
