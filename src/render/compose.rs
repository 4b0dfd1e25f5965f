use image::{Rgba, RgbaImage};

use crate::config::PreviewColorsConfig;

/// Straight-alpha colors in 0..1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyColors {
    pub border_inner: [f32; 4],
    pub border_outer: [f32; 4],
    pub body_inner: [f32; 4],
    pub body_outer: [f32; 4],
    /// Share of the radius taken by the border, measured from the edge.
    pub border_width: f32,
}

fn normalize(rgba: [f64; 4]) -> [f32; 4] {
    [
        (rgba[0] / 255.0) as f32,
        (rgba[1] / 255.0) as f32,
        (rgba[2] / 255.0) as f32,
        rgba[3] as f32,
    ]
}

impl From<&PreviewColorsConfig> for BodyColors {
    fn from(config: &PreviewColorsConfig) -> Self {
        BodyColors {
            border_inner: normalize(config.border_inner_rgba),
            border_outer: normalize(config.border_outer_rgba),
            body_inner: normalize(config.body_inner_rgba),
            body_outer: normalize(config.body_outer_rgba),
            border_width: config.border_width.clamp(0.0, 1.0) as f32,
        }
    }
}

fn mix(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut out = [0.0; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        *channel = a[i] + (b[i] - a[i]) * t;
    }
    out
}

impl BodyColors {
    /// Color for a fragment `depth` away from the centre line (0 centre, 1 edge).
    pub fn shade(&self, depth: f32) -> [f32; 4] {
        let inner_extent = 1.0 - self.border_width;
        if depth > inner_extent {
            let t = ((depth - inner_extent) / self.border_width).min(1.0);
            return mix(self.border_inner, self.border_outer, t);
        }

        let t = if inner_extent > 0.0 { depth / inner_extent } else { 1.0 };
        mix(self.body_inner, self.body_outer, t)
    }
}

/// Turns a rasterized depth image (depth in red, coverage in alpha) into body colors,
/// scaled by an overall `alpha`.
pub fn colorize(depth_image: &RgbaImage, colors: &BodyColors, alpha: f32) -> RgbaImage {
    let mut out = RgbaImage::new(depth_image.width(), depth_image.height());
    for (x, y, pixel) in depth_image.enumerate_pixels() {
        if pixel[3] == 0 {
            continue;
        }
        let mut shaded = colors.shade(pixel[0] as f32 / 255.0);
        shaded[3] *= alpha;
        out.put_pixel(x, y, Rgba(shaded.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)));
    }
    out
}

/// Source-over blend of `layer` onto `canvas` with its top-left corner at (`x`, `y`).
/// Parts falling outside the canvas are dropped.
pub fn blend_onto(canvas: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    for (lx, ly, src) in layer.enumerate_pixels() {
        let cx = x + lx as i64;
        let cy = y + ly as i64;
        if cx < 0 || cy < 0 || cx >= canvas.width() as i64 || cy >= canvas.height() as i64 {
            continue;
        }
        if src[3] == 0 {
            continue;
        }

        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        let sa = src[3] as f32 / 255.0;
        let da = dst[3] as f32 / 255.0;
        let out_a = sa + da * (1.0 - sa);
        for i in 0..3 {
            let s = src[i] as f32 / 255.0;
            let d = dst[i] as f32 / 255.0;
            let c = (s * sa + d * da * (1.0 - sa)) / out_a;
            dst[i] = (c * 255.0).round() as u8;
        }
        dst[3] = (out_a * 255.0).round() as u8;
    }
}
