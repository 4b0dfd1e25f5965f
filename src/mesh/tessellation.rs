use std::f64::consts::{FRAC_PI_2, TAU};

use crate::{
    geometry::vec2::{Vec2, wrap_angle},
    mesh::types::{JointVertex, MeshVertex},
};

/// Unit ribbon: x in [0, 1] along the section, y in [-1, 1] across it.
/// Depth is 0 on the centre line and 1 on both edges.
pub fn unit_ribbon() -> (Vec<MeshVertex>, Vec<u16>) {
    let vertices = [
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
    ]
    .map(|position| MeshVertex { position })
    .to_vec();

    let indices = vec![2, 0, 1, 1, 3, 2, 4, 2, 3, 3, 5, 4];

    (vertices, indices)
}

/// Unit circle fan with `segments` triangles, centre first.
pub fn unit_circle(segments: u32) -> (Vec<MeshVertex>, Vec<u16>) {
    let segments = segments.max(3);

    let mut vertices = Vec::with_capacity(segments as usize + 1);
    vertices.push(MeshVertex {
        position: [0.0, 0.0, 0.0],
    });
    for i in 0..segments {
        let p = Vec2::from_angle(i as f64 / segments as f64 * TAU);
        vertices.push(MeshVertex {
            position: [p.x as f32, p.y as f32, 1.0],
        });
    }

    let mut indices = Vec::with_capacity(segments as usize * 3);
    for i in 0..segments {
        let next = if i == segments - 1 { 1 } else { i + 2 };
        indices.extend_from_slice(&[0, (i + 1) as u16, next as u16]);
    }

    (vertices, indices)
}

/// Fan covering the turn between two consecutive sections.
#[derive(Clone, Debug, Default)]
pub struct JointWedge {
    pub vertices: Vec<JointVertex>,
    /// Local indices into `vertices`.
    pub indices: Vec<u32>,
    pub start_angle: f64,
    /// Signed sweep; positive is counter-clockwise.
    pub sweep: f64,
}

impl JointWedge {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// `lod` is the triangle count of a full 360 degree turn.
pub fn joint_wedge(origin: Vec2, incoming: Vec2, outgoing: Vec2, lod: u32) -> JointWedge {
    let turn = wrap_angle(outgoing.arg() - incoming.arg()).abs();
    let step = TAU / lod.max(1) as f64;
    let triangles = (turn / step).ceil() as usize;
    if triangles == 0 {
        return JointWedge::default();
    }

    // The gap opens on the side opposite to the turn direction.
    let sign = if incoming.cross(outgoing) >= 0.0 { 1.0 } else { -1.0 };
    let start_angle = incoming.arg() - sign * FRAC_PI_2;
    let sweep = sign * turn;

    let origin = origin.to_f32();
    let mut vertices = Vec::with_capacity(triangles + 2);
    vertices.push(JointVertex {
        origin,
        offset: [0.0, 0.0, 0.0],
    });
    for k in 0..=triangles {
        let rim = Vec2::from_angle(start_angle + sweep * k as f64 / triangles as f64);
        vertices.push(JointVertex {
            origin,
            offset: [rim.x as f32, rim.y as f32, 1.0],
        });
    }

    let mut indices = Vec::with_capacity(triangles * 3);
    for k in 0..triangles as u32 {
        indices.extend_from_slice(&[0, k + 1, k + 2]);
    }

    JointWedge {
        vertices,
        indices,
        start_angle,
        sweep,
    }
}
