use anyhow::anyhow;

use crate::geometry::{
    bbox::BBox,
    mat4::Mat4,
    vec2::Vec2,
    vec2_transform::{PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH},
};

/// Larger allowable area: distorted sliders are meant to be seen "fully".
pub const DISTORTION_EXTENT_MULTIPLIER: f64 = 3.0;

/// Share of the screen height taken by the playfield at scale 1.
const PLAYFIELD_SCREEN_SHARE: f64 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// Path space to clip space.
    pub projection_view: Mat4,
    /// Screen size in pixels.
    pub screen_size: Vec2,
}

impl Camera {
    /// Centres the 512x384 playfield on screen, y pointing down.
    pub fn playfield(screen_size: Vec2, scale: f64) -> Self {
        let units_to_px = screen_size.y * PLAYFIELD_SCREEN_SHARE / PLAYFIELD_HEIGHT * scale;
        let offset = Vec2::new(
            (screen_size.x - PLAYFIELD_WIDTH * units_to_px) / 2.0,
            (screen_size.y - PLAYFIELD_HEIGHT * units_to_px) / 2.0,
        );
        let projection = Mat4::ortho(0.0, screen_size.x, screen_size.y, 0.0, 1.0, -1.0);
        Camera {
            projection_view: projection
                * Mat4::translate(offset.x, offset.y, 0.0)
                * Mat4::scale(units_to_px, units_to_px, 1.0),
            screen_size,
        }
    }

    /// Copy of this camera rotated around the playfield centre (one mandala arm).
    pub fn rotated(&self, angle: f64) -> Self {
        let cx = PLAYFIELD_WIDTH / 2.0;
        let cy = PLAYFIELD_HEIGHT / 2.0;
        Camera {
            projection_view: self.projection_view
                * Mat4::translate(cx, cy, 0.0)
                * Mat4::rotation_z(angle)
                * Mat4::translate(-cx, -cy, 0.0),
            screen_size: self.screen_size,
        }
    }

    /// Path point to screen pixels, row 0 at the top.
    pub fn to_screen(&self, p: Vec2) -> Vec2 {
        let ndc = self.projection_view.project(p);
        Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.screen_size.x,
            (1.0 - ndc.y) / 2.0 * self.screen_size.y,
        )
    }

    /// Screen pixels per path unit along each path axis.
    pub fn pixels_per_unit(&self) -> Vec2 {
        let origin = self.to_screen(Vec2::ZERO);
        Vec2::new(
            (self.to_screen(Vec2::new(1.0, 0.0)) - origin).len(),
            (self.to_screen(Vec2::new(0.0, 1.0)) - origin).len(),
        )
    }
}

/// Per-axis clip-space extents that keep content visible for every rotated copy of a
/// camera with the given aspect ratio.
pub fn overdraw_multipliers(aspect: f64) -> (f64, f64) {
    let mut multiplier_x = 1.0;
    let mut multiplier_y = 1.0;

    if aspect > 1.0 {
        multiplier_y = 1.0 / aspect;
    } else {
        multiplier_x = aspect;
    }

    let overdraw = (multiplier_x * multiplier_x + multiplier_y * multiplier_y).sqrt();

    (overdraw / multiplier_x, overdraw / multiplier_y)
}

/// Where the cache target sits in path space and how to render into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheLayout {
    pub width: u32,
    pub height: u32,
    /// Path-space region covered by the target.
    pub region: BBox,
    /// Path space to target clip space; row 0 of the target is `region.y[0]`.
    pub projection: Mat4,
}

impl CacheLayout {
    /// Path length covered by one target pixel.
    pub fn pixel_length(&self) -> f64 {
        (self.region.width() / self.width as f64).max(self.region.height() / self.height as f64)
    }
}

/// Smallest target that holds the visible part of the path.
/// `Ok(None)` when the path is entirely off screen.
pub fn fit_cache_target(
    camera: &Camera,
    path_bbox: &BBox,
    stroke: f64,
    overdraw: bool,
) -> anyhow::Result<Option<CacheLayout>> {
    let inv_projection_view = camera
        .projection_view
        .inverse()
        .ok_or_else(|| anyhow!("camera projection is not invertible"))?;

    let (mx, my) = if overdraw {
        overdraw_multipliers(camera.screen_size.x / camera.screen_size.y)
    } else {
        (1.0, 1.0)
    };

    let visible = BBox::from_points(
        [(-mx, my), (mx, my), (mx, -my), (-mx, -my)]
            .map(|(x, y)| inv_projection_view.project(Vec2::new(x, y))),
    );

    let Some(region) = visible.intersect(&path_bbox.expand(stroke)) else {
        return Ok(None);
    };

    let px = camera.pixels_per_unit();
    let width = whole_pixels(region.width() * px.x);
    let height = whole_pixels(region.height() * px.y);

    Ok(Some(CacheLayout {
        width,
        height,
        region,
        projection: Mat4::ortho(region.x[0], region.x[1], region.y[1], region.y[0], 1.0, -1.0),
    }))
}

// Matrix round trips leave ~1e-13 noise that must not add a whole pixel.
fn whole_pixels(extent: f64) -> u32 {
    (extent - 1e-6).ceil().max(1.0) as u32
}

/// Squeezes the path into a fixed-size secondary viewport, only along overflowing axes.
pub fn distortion_transform(
    camera: &Camera,
    path_bbox: &BBox,
    stroke: f64,
    viewport: Vec2,
) -> Mat4 {
    let px = camera.pixels_per_unit();
    let extent = path_bbox.expand(stroke);
    let width = extent.width() * px.x * DISTORTION_EXTENT_MULTIPLIER;
    let height = extent.height() * px.y * DISTORTION_EXTENT_MULTIPLIER;

    let scale_x = if width > viewport.x { viewport.x / width } else { 1.0 };
    let scale_y = if height > viewport.y { viewport.y / height } else { 1.0 };

    if scale_x == 1.0 && scale_y == 1.0 {
        return Mat4::IDENTITY;
    }

    // Keeps the top-left clip corner fixed.
    Mat4::translate(-1.0, 1.0, 0.0) * Mat4::scale(scale_x, scale_y, 1.0) * Mat4::translate(1.0, -1.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::playfield(Vec2::new(1280.0, 720.0), 1.0)
    }

    fn bbox(x0: f64, y0: f64, x1: f64, y1: f64) -> BBox {
        BBox {
            x: [x0, x1],
            y: [y0, y1],
        }
    }

    #[test]
    fn overdraw_for_wide_screen() {
        let aspect = 16.0 / 9.0;
        let (mx, my) = overdraw_multipliers(aspect);
        let expected = (1.0 + 1.0 / (aspect * aspect)).sqrt();
        assert!((mx - expected).abs() < 1e-12, "mx={mx}");
        assert!((my - expected * aspect).abs() < 1e-12, "my={my}");
    }

    #[test]
    fn square_screen_overdraw_is_diagonal() {
        let (mx, my) = overdraw_multipliers(1.0);
        assert!((mx - 2f64.sqrt()).abs() < 1e-12 && (my - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn rotated_camera_pivots_on_playfield_centre() {
        let cam = camera();
        let rotated = cam.rotated(std::f64::consts::FRAC_PI_2);
        let centre = cam.to_screen(Vec2::new(256.0, 192.0));
        assert!(rotated.to_screen(Vec2::new(256.0, 192.0)).distance(centre) < 1e-9);

        let p = rotated.to_screen(Vec2::new(356.0, 192.0));
        assert!((p.x - centre.x).abs() < 1e-6, "p={p}");
        assert!(((p.y - centre.y).abs() - 150.0).abs() < 1e-6, "p={p}");
    }

    #[test]
    fn target_covers_expanded_path_box() {
        let cam = camera();
        let path = bbox(100.0, 100.0, 200.0, 150.0);
        let layout = fit_cache_target(&cam, &path, 10.0, false)
            .expect("invertible camera")
            .expect("path on screen");

        assert_eq!(layout.region, bbox(90.0, 90.0, 210.0, 160.0));
        // 720 * 0.8 / 384 = 1.5 px per osu!pixel.
        assert_eq!((layout.width, layout.height), (180, 105));
        assert!((layout.pixel_length() - 120.0 / 180.0).abs() < 1e-9);

        let top_left = layout.projection.project(Vec2::new(90.0, 90.0));
        assert!((top_left.x + 1.0).abs() < 1e-9 && (top_left.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn target_is_clipped_to_camera() {
        let cam = camera();
        let path = bbox(-2000.0, 0.0, 100.0, 50.0);
        let layout = fit_cache_target(&cam, &path, 0.0, false).unwrap().unwrap();
        let left_edge = cam.to_screen(Vec2::new(layout.region.x[0], 0.0));
        assert!(left_edge.x.abs() < 1e-6, "left edge at {left_edge}");
    }

    #[test]
    fn overdraw_widens_the_visible_area() {
        let cam = camera();
        let path = bbox(-2000.0, -2000.0, 2000.0, 2000.0);
        let plain = fit_cache_target(&cam, &path, 0.0, false).unwrap().unwrap();
        let wide = fit_cache_target(&cam, &path, 0.0, true).unwrap().unwrap();
        assert!(wide.region.width() > plain.region.width());
        assert!(wide.region.height() > plain.region.height());
    }

    #[test]
    fn off_screen_path_has_no_target() {
        let path = bbox(5000.0, 5000.0, 5100.0, 5100.0);
        assert!(fit_cache_target(&camera(), &path, 5.0, false).unwrap().is_none());
    }

    #[test]
    fn singular_camera_is_an_error() {
        let cam = Camera {
            projection_view: Mat4::scale(0.0, 1.0, 1.0),
            screen_size: Vec2::new(100.0, 100.0),
        };
        assert!(fit_cache_target(&cam, &bbox(0.0, 0.0, 1.0, 1.0), 0.0, false).is_err());
    }

    #[test]
    fn distortion_only_scales_overflowing_axis() {
        let cam = camera();
        // 600 wide, 10 tall in path units -> 2700 x 45 px after the multiplier.
        let path = bbox(0.0, 0.0, 600.0, 10.0);
        let distort = distortion_transform(&cam, &path, 0.0, Vec2::new(2000.0, 2000.0));

        let scale_x = distort.m[0][0];
        let scale_y = distort.m[1][1];
        assert!(scale_x < 1.0, "scale_x={scale_x}");
        assert!((scale_x - 2000.0 / 2700.0).abs() < 1e-9, "scale_x={scale_x}");
        assert_eq!(scale_y, 1.0);

        let anchored = distort.project(Vec2::new(-1.0, 1.0));
        assert!((anchored.x + 1.0).abs() < 1e-12 && (anchored.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn small_path_is_not_distorted() {
        let distort =
            distortion_transform(&camera(), &bbox(0.0, 0.0, 50.0, 50.0), 5.0, Vec2::new(8192.0, 8192.0));
        assert_eq!(distort, Mat4::IDENTITY);
    }
}
