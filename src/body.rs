use anyhow::Context;

use crate::{
    config::SliderRenderConfig,
    geometry::{mat4::Mat4, vec2::Vec2},
    mesh::builder::SliderMeshes,
    render::{DrawPass, RenderBackend, flush_instances},
    slider::{
        curve::MultiCurve,
        progress::{ProgressUpdater, RasterState, resolve_lengths},
        sections::{SectionModel, playfield_allowance},
    },
    viewport::{Camera, CacheLayout, distortion_transform, fit_cache_target},
};

/// Per-frame inputs besides progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameParams {
    pub camera: Camera,
    /// External radius multiplier, 1.0 when idle.
    pub pulse: f64,
    /// Size in pixels of the fixed secondary viewport, when distortions are on.
    pub distortion_viewport: Option<Vec2>,
}

enum CacheState<T> {
    /// Nothing drawn yet.
    Unfitted,
    /// The path was off screen on the first draw; stays this way.
    OffScreen,
    Ready {
        target: T,
        layout: CacheLayout,
        distort: Mat4,
    },
}

/// The cached body texture and where to place it.
pub struct CachedBody<'a, T> {
    pub target: &'a T,
    /// Path-space centre of the quad.
    pub center: Vec2,
    /// Path-space size of the quad.
    pub world_size: Vec2,
    /// Target size in pixels.
    pub pixel_size: [u32; 2],
}

/// A slider body that snakes in and out by patching a handful of instances per frame.
pub struct SliderBody<B: RenderBackend> {
    model: SectionModel,
    meshes: SliderMeshes,
    updater: ProgressUpdater,
    radius: f64,
    config: SliderRenderConfig,
    device_meshes: Option<B::Meshes>,
    cache: CacheState<B::Target>,
    disposed: bool,
}

impl<B: RenderBackend> SliderBody<B> {
    /// A curve with no drawable length yields a body that never draws.
    ///
    /// Curve samples outside the playfield allowance are dropped here, so
    /// `config.distortions.enabled` is fixed for the life of the body. The distortion
    /// viewport itself comes with every frame.
    pub fn new(
        backend: &mut B,
        curve: &MultiCurve,
        mirror_vertically: bool,
        radius: f64,
        config: &SliderRenderConfig,
    ) -> anyhow::Result<Self> {
        let allowance = playfield_allowance(config.distortions.enabled);
        let mut model = SectionModel::within(curve, mirror_vertically, &allowance);
        let meshes = SliderMeshes::build(&mut model, config.slider_lod);

        let device_meshes = if model.is_empty() {
            log!("Slider body has no drawable sections, it will not be rendered.");
            None
        } else {
            Some(
                backend
                    .create_meshes(&meshes)
                    .context("failed to upload slider meshes")?,
            )
        };

        Ok(SliderBody {
            model,
            meshes,
            updater: ProgressUpdater::new(),
            radius,
            config: config.clone(),
            device_meshes,
            cache: CacheState::Unfitted,
            disposed: false,
        })
    }

    pub fn model(&self) -> &SectionModel {
        &self.model
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Takes effect on the next draw, which then always rasterizes.
    pub fn set_radius(&mut self, radius: f64) {
        self.radius = radius;
    }

    pub fn last_raster(&self) -> Option<&RasterState> {
        self.updater.last()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Rasterizes the body between the two progress fractions into the cache target.
    /// Returns `Ok(false)` when nothing had to be drawn.
    pub fn draw_base(
        &mut self,
        backend: &mut B,
        head_progress: f64,
        tail_progress: f64,
        frame: &FrameParams,
    ) -> anyhow::Result<bool> {
        if self.disposed || self.device_meshes.is_none() {
            return Ok(false);
        }

        let stroke = self.radius * frame.pulse;

        if let CacheState::Unfitted = self.cache {
            self.cache = self.fit(backend, frame, stroke)?;
        }

        let CacheState::Ready {
            target,
            layout,
            distort,
        } = &mut self.cache
        else {
            return Ok(false);
        };
        let Some(device_meshes) = self.device_meshes.as_mut() else {
            return Ok(false);
        };

        let current_distort = match frame.distortion_viewport {
            Some(viewport) => {
                distortion_transform(&frame.camera, &self.model.bbox(), stroke, viewport)
            }
            None => Mat4::IDENTITY,
        };
        if *distort != current_distort {
            *distort = current_distort;
            self.updater.invalidate();
        }

        let (head, tail) = resolve_lengths(
            head_progress,
            tail_progress,
            self.model.total_length(),
            self.config.snake_rounding,
            layout.pixel_length(),
        );

        let Some(range) = self
            .updater
            .update(&self.model, &mut self.meshes, head, tail, stroke)
        else {
            return Ok(false);
        };

        flush_instances(backend, device_meshes, &mut self.meshes);

        let pass = DrawPass {
            projection: layout.projection,
            distort: *distort,
            radius: stroke,
            ribbons: range.ribbons,
            joints: range.joints,
            clear_color: range.clear_color,
        };
        backend
            .draw(target, device_meshes, &pass)
            .context("failed to rasterize slider body")?;

        Ok(true)
    }

    fn fit(
        &self,
        backend: &mut B,
        frame: &FrameParams,
        stroke: f64,
    ) -> anyhow::Result<CacheState<B::Target>> {
        let bbox = self.model.bbox();
        let overdraw = self.config.mandala.needs_overdraw();

        let Some(layout) = fit_cache_target(&frame.camera, &bbox, stroke, overdraw)? else {
            log!("Slider body is outside the camera, skipping its cache.");
            return Ok(CacheState::OffScreen);
        };

        let target = backend
            .create_target(layout.width, layout.height)
            .with_context(|| {
                format!(
                    "failed to create {}x{} slider cache target",
                    layout.width, layout.height
                )
            })?;
        log!(
            "Created slider cache target {}x{} (pixel length {:.4}).",
            layout.width,
            layout.height,
            layout.pixel_length()
        );

        Ok(CacheState::Ready {
            target,
            layout,
            distort: Mat4::IDENTITY,
        })
    }

    /// `None` until the first successful fit, and for bodies that are off screen or disposed.
    pub fn cached(&self) -> Option<CachedBody<'_, B::Target>> {
        let CacheState::Ready { target, layout, .. } = &self.cache else {
            return None;
        };
        Some(CachedBody {
            target,
            center: layout.region.center(),
            world_size: Vec2::new(layout.region.width(), layout.region.height()),
            pixel_size: [layout.width, layout.height],
        })
    }

    /// Releases device resources. Safe to call more than once.
    pub fn dispose(&mut self, backend: &mut B) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(device_meshes) = self.device_meshes.take() {
            backend.release_meshes(device_meshes);
        }
        if let CacheState::Ready { target, .. } =
            std::mem::replace(&mut self.cache, CacheState::OffScreen)
        {
            backend.release_target(target);
        }
        log!("Disposed slider body.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::SnakeRounding,
        mesh::types::{CapInstance, RibbonInstance},
        render::software::SoftwareBackend,
    };

    #[derive(Default)]
    struct RecordingBackend {
        meshes_created: usize,
        writes: usize,
        draws: usize,
        targets: Vec<(u32, u32)>,
        meshes_released: usize,
        targets_released: usize,
        passes: Vec<DrawPass>,
    }

    impl RenderBackend for RecordingBackend {
        type Meshes = ();
        type Target = (u32, u32);

        fn create_meshes(&mut self, _meshes: &SliderMeshes) -> anyhow::Result<()> {
            self.meshes_created += 1;
            Ok(())
        }

        fn write_ribbon_instances(&mut self, _: &mut (), _: usize, _: &[RibbonInstance]) {
            self.writes += 1;
        }

        fn write_cap_instances(&mut self, _: &mut (), _: usize, _: &[CapInstance]) {
            self.writes += 1;
        }

        fn create_target(&mut self, width: u32, height: u32) -> anyhow::Result<(u32, u32)> {
            self.targets.push((width, height));
            Ok((width, height))
        }

        fn draw(&mut self, _: &mut (u32, u32), _: &(), pass: &DrawPass) -> anyhow::Result<()> {
            self.draws += 1;
            self.passes.push(pass.clone());
            Ok(())
        }

        fn release_meshes(&mut self, _: ()) {
            self.meshes_released += 1;
        }

        fn release_target(&mut self, _: (u32, u32)) {
            self.targets_released += 1;
        }
    }

    fn frame() -> FrameParams {
        FrameParams {
            camera: Camera::playfield(Vec2::new(1280.0, 720.0), 1.0),
            pulse: 1.0,
            distortion_viewport: None,
        }
    }

    // Sections of length 40, 30, 30 in the middle of the playfield.
    fn curve() -> MultiCurve {
        MultiCurve::from_points(&[
            Vec2::new(200.0, 150.0),
            Vec2::new(240.0, 150.0),
            Vec2::new(240.0, 180.0),
            Vec2::new(210.0, 180.0),
        ])
    }

    fn exact_config() -> SliderRenderConfig {
        SliderRenderConfig {
            snake_rounding: SnakeRounding::Exact,
            ..SliderRenderConfig::default()
        }
    }

    fn body(backend: &mut RecordingBackend) -> SliderBody<RecordingBackend> {
        SliderBody::new(backend, &curve(), false, 20.0, &exact_config()).expect("body")
    }

    #[test]
    fn repeated_progress_issues_no_work() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);

        assert!(body.draw_base(&mut backend, 0.0, 0.5, &frame()).unwrap());
        let (writes, draws) = (backend.writes, backend.draws);
        assert_eq!(draws, 1);

        assert!(!body.draw_base(&mut backend, 0.0, 0.5, &frame()).unwrap());
        assert_eq!((backend.writes, backend.draws), (writes, draws));
    }

    #[test]
    fn snake_in_patches_boundaries_only() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);

        body.draw_base(&mut backend, 0.0, 0.5, &frame()).unwrap();
        // One ribbon range (second section) and one cap range (tail cap).
        assert_eq!(backend.writes, 2);
        assert_eq!(backend.passes[0].ribbons, 0..2);

        body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap();
        assert_eq!(backend.writes, 4);
        assert_eq!(backend.passes[1].ribbons, 0..3);
        assert!(!backend.passes[1].clear_color);
    }

    #[test]
    fn pulse_redraws_but_keeps_target_size() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);

        body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap();
        let mut pulsing = frame();
        pulsing.pulse = 1.2;
        assert!(body.draw_base(&mut backend, 0.0, 1.0, &pulsing).unwrap());

        assert_eq!(backend.targets.len(), 1);
        assert_eq!(body.cached().unwrap().target, &backend.targets[0]);
        assert!((backend.passes[1].radius - 24.0).abs() < 1e-9);
    }

    #[test]
    fn radius_change_forces_redraw() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);

        body.draw_base(&mut backend, 0.2, 0.8, &frame()).unwrap();
        body.set_radius(10.0);
        assert!(body.draw_base(&mut backend, 0.2, 0.8, &frame()).unwrap());
        assert!(backend.passes[1].clear_color);
    }

    #[test]
    fn distortion_viewport_is_read_every_frame() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);

        body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap();
        assert_eq!(backend.passes[0].distort, Mat4::IDENTITY);

        // 80x70 osu!pixels of body overflow a 200x200 viewport once expanded.
        let mut distorted = frame();
        distorted.distortion_viewport = Some(Vec2::new(200.0, 200.0));
        assert!(body.draw_base(&mut backend, 0.0, 1.0, &distorted).unwrap());
        assert_ne!(backend.passes[1].distort, Mat4::IDENTITY);
        assert!(backend.passes[1].clear_color);
        assert_eq!(backend.targets.len(), 1);

        assert!(!body.draw_base(&mut backend, 0.0, 1.0, &distorted).unwrap());
        assert!(body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap());
        assert_eq!(backend.passes[2].distort, Mat4::IDENTITY);
    }

    #[test]
    fn samples_far_outside_the_playfield_are_ignored() {
        let mut backend = RecordingBackend::default();
        let curve = MultiCurve::from_points(&[
            Vec2::new(200.0, 150.0),
            Vec2::new(240.0, 150.0),
            Vec2::new(90000.0, 150.0),
        ]);
        let body = SliderBody::new(&mut backend, &curve, false, 20.0, &exact_config()).unwrap();
        assert_eq!(body.model().len(), 1);
        assert_eq!(body.model().bbox().x, [200.0, 240.0]);
    }

    #[test]
    fn degenerate_curve_never_draws() {
        let mut backend = RecordingBackend::default();
        let curve = MultiCurve::from_points(&[Vec2::new(10.0, 10.0), Vec2::new(10.0, 10.0)]);
        let mut body =
            SliderBody::new(&mut backend, &curve, false, 20.0, &exact_config()).unwrap();

        assert!(!body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap());
        assert_eq!(backend.meshes_created, 0);
        assert!(backend.targets.is_empty());
        assert!(body.cached().is_none());
        body.dispose(&mut backend);
        assert_eq!(backend.meshes_released, 0);
    }

    #[test]
    fn off_screen_body_stays_uncached() {
        let mut backend = RecordingBackend::default();
        // Inside the playfield allowance but right of the visible area.
        let far = MultiCurve::from_points(&[Vec2::new(900.0, 500.0), Vec2::new(1000.0, 500.0)]);
        let mut body = SliderBody::new(&mut backend, &far, false, 20.0, &exact_config()).unwrap();

        assert!(!body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap());
        assert!(!body.draw_base(&mut backend, 0.0, 0.5, &frame()).unwrap());
        assert!(backend.targets.is_empty());
        assert_eq!(backend.draws, 0);
    }

    #[test]
    fn dispose_twice_releases_once() {
        let mut backend = RecordingBackend::default();
        let mut body = body(&mut backend);
        body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap();

        body.dispose(&mut backend);
        body.dispose(&mut backend);
        assert_eq!(backend.meshes_released, 1);
        assert_eq!(backend.targets_released, 1);
        assert!(body.is_disposed());

        assert!(!body.draw_base(&mut backend, 0.0, 0.5, &frame()).unwrap());
        assert_eq!(backend.draws, 1);
        assert!(body.cached().is_none());
    }

    #[test]
    fn software_body_fills_its_cache() {
        let mut backend = SoftwareBackend;
        let mut body = SliderBody::new(
            &mut backend,
            &curve(),
            false,
            20.0,
            &SliderRenderConfig::default(),
        )
        .unwrap();

        assert!(body.draw_base(&mut backend, 0.0, 1.0, &frame()).unwrap());
        let cached = body.cached().expect("cache target");
        assert_eq!(cached.pixel_size, [cached.target.width(), cached.target.height()]);
        // 80x70 osu!pixels of body at 1.5 px each.
        assert_eq!(cached.pixel_size, [120, 105]);
        assert!((cached.center.x - 220.0).abs() < 1e-9 && (cached.center.y - 165.0).abs() < 1e-9);

        let covered = cached.target.color.pixels().filter(|p| p[3] == 255).count();
        assert!(covered > 120 * 105 / 3, "covered={covered}");

        let tail = body.last_raster().unwrap().tail_length;
        assert_eq!(tail, body.model().total_length());
    }
}
