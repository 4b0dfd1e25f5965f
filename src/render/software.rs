use anyhow::bail;
use image::{Rgba, RgbaImage};

use crate::{
    geometry::{mat4::Mat4, vec2::Vec2},
    mesh::{
        builder::{SliderMeshes, StaticMeshes},
        types::{CapInstance, RibbonInstance},
    },
    render::{DrawPass, RenderBackend},
};

/// Reference rasterizer running on the CPU. Samples pixel centres, same as the GPU path.
#[derive(Debug, Default)]
pub struct SoftwareBackend;

#[derive(Clone, Debug)]
pub struct SoftwareMeshes {
    static_meshes: StaticMeshes,
    ribbons: Vec<RibbonInstance>,
    caps: Vec<CapInstance>,
}

/// Color has the layout of an `Rgba8Unorm` texture: depth in red, coverage in alpha.
#[derive(Clone, Debug)]
pub struct SoftwareTarget {
    pub color: RgbaImage,
    depth: Vec<f32>,
}

impl SoftwareTarget {
    pub fn width(&self) -> u32 {
        self.color.width()
    }

    pub fn height(&self) -> u32 {
        self.color.height()
    }

    /// Depth stored by the last draw, 1.0 where nothing was drawn.
    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[(y * self.width() + x) as usize]
    }

    fn clear_depth(&mut self) {
        self.depth.fill(1.0);
    }

    fn clear_color(&mut self) {
        for pixel in self.color.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    fn write_fragment(&mut self, x: u32, y: u32, depth: f64) {
        let depth = depth.clamp(0.0, 1.0) as f32;
        let i = (y * self.width() + x) as usize;
        if depth >= self.depth[i] {
            return;
        }
        self.depth[i] = depth;
        let red = (depth * 255.0).round() as u8;
        self.color.put_pixel(x, y, Rgba([red, 0, 0, 255]));
    }

    /// Vertices are in target pixels, row 0 at the top.
    fn fill_triangle(&mut self, v: [(Vec2, f64); 3]) {
        let [(a, da), (b, db), (c, dc)] = v;
        let area = edge(a, b, c);
        if area.abs() < 1e-12 {
            return;
        }

        let width = self.width() as f64;
        let height = self.height() as f64;
        let x0 = a.x.min(b.x).min(c.x).floor().clamp(0.0, width) as u32;
        let x1 = a.x.max(b.x).max(c.x).ceil().clamp(0.0, width) as u32;
        let y0 = a.y.min(b.y).min(c.y).floor().clamp(0.0, height) as u32;
        let y1 = a.y.max(b.y).max(c.y).ceil().clamp(0.0, height) as u32;

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f64 + 0.5, y as f64 + 0.5);
                let wa = edge(b, c, p) / area;
                let wb = edge(c, a, p) / area;
                let wc = edge(a, b, p) / area;
                if wa < -EDGE_EPSILON || wb < -EDGE_EPSILON || wc < -EDGE_EPSILON {
                    continue;
                }
                self.write_fragment(x, y, wa * da + wb * db + wc * dc);
            }
        }
    }
}

// Shared edges through a pixel centre must not leave a hole in either triangle.
const EDGE_EPSILON: f64 = 1e-9;

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f64 {
    (b - a).cross(p - a)
}

struct PixelMapper {
    clip: Mat4,
    width: f64,
    height: f64,
}

impl PixelMapper {
    fn map(&self, world: Vec2, depth: f32) -> (Vec2, f64) {
        let ndc = self.clip.project(world);
        (
            Vec2::new(
                (ndc.x + 1.0) / 2.0 * self.width,
                (1.0 - ndc.y) / 2.0 * self.height,
            ),
            depth as f64,
        )
    }
}

fn vec2(v: [f32; 2]) -> Vec2 {
    Vec2::new(v[0] as f64, v[1] as f64)
}

impl RenderBackend for SoftwareBackend {
    type Meshes = SoftwareMeshes;
    type Target = SoftwareTarget;

    fn create_meshes(&mut self, meshes: &SliderMeshes) -> anyhow::Result<SoftwareMeshes> {
        Ok(SoftwareMeshes {
            static_meshes: meshes.static_meshes.clone(),
            ribbons: meshes.ribbons.as_slice().to_vec(),
            caps: meshes.caps.as_slice().to_vec(),
        })
    }

    fn write_ribbon_instances(
        &mut self,
        meshes: &mut SoftwareMeshes,
        first: usize,
        instances: &[RibbonInstance],
    ) {
        meshes.ribbons[first..first + instances.len()].copy_from_slice(instances);
    }

    fn write_cap_instances(
        &mut self,
        meshes: &mut SoftwareMeshes,
        first: usize,
        instances: &[CapInstance],
    ) {
        meshes.caps[first..first + instances.len()].copy_from_slice(instances);
    }

    fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<SoftwareTarget> {
        if width == 0 || height == 0 {
            bail!("cache target must not be empty, got {width}x{height}");
        }
        Ok(SoftwareTarget {
            color: RgbaImage::new(width, height),
            depth: vec![1.0; (width * height) as usize],
        })
    }

    fn draw(
        &mut self,
        target: &mut SoftwareTarget,
        meshes: &SoftwareMeshes,
        pass: &DrawPass,
    ) -> anyhow::Result<()> {
        let statics = &meshes.static_meshes;
        pass.check_ranges(meshes.ribbons.len(), statics.joint_indices.len())?;

        target.clear_depth();
        if pass.clear_color {
            target.clear_color();
        }

        let mapper = PixelMapper {
            clip: pass.clip_transform(),
            width: target.width() as f64,
            height: target.height() as f64,
        };
        let radius = pass.radius;

        for instance in &meshes.ribbons[pass.ribbons.start as usize..pass.ribbons.end as usize] {
            let start = vec2(instance.start);
            let direction = vec2(instance.direction);
            let normal = Vec2::new(-direction.y, direction.x);
            let length = instance.length as f64;

            for tri in statics.ribbon_indices.chunks_exact(3) {
                target.fill_triangle([0, 1, 2].map(|k| {
                    let [x, y, depth] = statics.ribbon_vertices[tri[k] as usize].position;
                    let world =
                        start + direction * (x as f64 * length) + normal * (y as f64 * radius);
                    mapper.map(world, depth)
                }));
            }
        }

        let joints = &statics.joint_indices[pass.joints.start as usize..pass.joints.end as usize];
        for tri in joints.chunks_exact(3) {
            target.fill_triangle([0, 1, 2].map(|k| {
                let vertex = &statics.joint_vertices[tri[k] as usize];
                let offset = Vec2::new(vertex.offset[0] as f64, vertex.offset[1] as f64);
                mapper.map(vec2(vertex.origin) + offset * radius, vertex.offset[2])
            }));
        }

        for cap in &meshes.caps {
            let center = vec2(cap.center);
            for tri in statics.cap_indices.chunks_exact(3) {
                target.fill_triangle([0, 1, 2].map(|k| {
                    let [x, y, depth] = statics.cap_vertices[tri[k] as usize].position;
                    mapper.map(center + Vec2::new(x as f64, y as f64) * radius, depth)
                }));
            }
        }

        Ok(())
    }

    fn release_meshes(&mut self, _meshes: SoftwareMeshes) {}

    fn release_target(&mut self, _target: SoftwareTarget) {}
}
