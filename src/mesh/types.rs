use bytemuck::{Pod, Zeroable};

// Layouts below are mirrored by the vertex inputs in render/shaders/slider_pass.wgsl.

/// Shared unit mesh vertex. `position.z` is the depth: 0 on the centre line, 1 at the edge.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
}

/// One instance per section.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct RibbonInstance {
    // All positions are in path coordinates (osu!pixels).
    pub start: [f32; 2],
    // (cos, sin) of the section's tangent angle.
    pub direction: [f32; 2],
    pub length: f32,
}

/// Joint wedge vertex; the world position is `origin + offset.xy * radius`.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct JointVertex {
    pub origin: [f32; 2],
    // (unit x, unit y, depth)
    pub offset: [f32; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct CapInstance {
    pub center: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SliderUniforms {
    pub projection: [[f32; 4]; 4],
    pub distort: [[f32; 4]; 4],
    pub radius: f32,
    pub _pad: [f32; 3],
}
