use serde::{Deserialize, Serialize};

use crate::geometry::vec2::Vec2;

// no default values and no aliases, everything is required.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    pub slider: SliderRenderConfig,
    pub preview: PreviewConfig,
}

/// How snake lengths are snapped before rasterizing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SnakeRounding {
    /// Head rounds up and tail rounds down to whole cache pixels.
    #[default]
    Live,
    /// Deterministic frame recording: no rounding at all.
    Exact,
}

// no default values and no aliases, everything is required.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SliderRenderConfig {
    /// Triangles used for a full 360 degree arc (joints and caps).
    pub slider_lod: u32,
    pub snake_rounding: SnakeRounding,
    pub distortions: DistortionsConfig,
    pub mandala: MandalaConfig,
}

impl Default for SliderRenderConfig {
    fn default() -> Self {
        SliderRenderConfig {
            slider_lod: 30,
            snake_rounding: SnakeRounding::Live,
            distortions: DistortionsConfig::default(),
            mandala: MandalaConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DistortionsConfig {
    pub enabled: bool,
    /// Size in pixels of the fixed secondary viewport.
    pub viewport_size: [u32; 2],
}

impl DistortionsConfig {
    pub fn viewport(&self) -> Option<Vec2> {
        if !self.enabled || self.viewport_size[0] == 0 || self.viewport_size[1] == 0 {
            return None;
        }
        Some(Vec2::new(
            self.viewport_size[0] as f64,
            self.viewport_size[1] as f64,
        ))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MandalaConfig {
    pub enabled: bool,
    /// Number of rotated camera copies composited into one scene.
    pub copies: u32,
}

impl Default for MandalaConfig {
    fn default() -> Self {
        MandalaConfig {
            enabled: false,
            copies: 1,
        }
    }
}

impl MandalaConfig {
    pub fn needs_overdraw(&self) -> bool {
        self.enabled && self.copies > 1
    }
}

// no default values and no aliases, everything is required.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PreviewConfig {
    pub screen_size: [u32; 2],
    pub output_dir: String,
    pub frames: u32,
    pub radius: f64,
    pub mirror_vertically: bool,
    /// Path points in osu!pixels; an empty list draws a built-in demo path.
    pub points: Vec<[f64; 2]>,
    pub colors: PreviewColorsConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        PreviewConfig {
            screen_size: [1280, 720],
            output_dir: "preview".to_string(),
            frames: 24,
            radius: 36.0,
            mirror_vertically: false,
            points: Vec::new(),
            colors: PreviewColorsConfig::default(),
        }
    }
}

// Colors are 0-255 for rgb and 0-1 for alpha, same as the editor config.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PreviewColorsConfig {
    /// Border color where it meets the body.
    pub border_inner_rgba: [f64; 4],
    /// Border color at the outer edge.
    pub border_outer_rgba: [f64; 4],
    pub body_inner_rgba: [f64; 4],
    pub body_outer_rgba: [f64; 4],
    pub border_width: f64,
}

impl Default for PreviewColorsConfig {
    fn default() -> Self {
        PreviewColorsConfig {
            border_inner_rgba: [255.0, 255.0, 255.0, 1.0],
            border_outer_rgba: [200.0, 200.0, 200.0, 1.0],
            body_inner_rgba: [40.0, 40.0, 40.0, 0.8],
            body_outer_rgba: [10.0, 10.0, 10.0, 0.8],
            border_width: 0.128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_json() {
        let json = serde_json::to_string_pretty(&Config::default()).expect("serialize");
        let parsed: Config = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.slider.slider_lod, 30);
        assert_eq!(parsed.slider.snake_rounding, SnakeRounding::Live);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let parsed = serde_json::from_str::<SliderRenderConfig>(r#"{ "slider_lod": 12 }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn disabled_distortions_have_no_viewport() {
        let mut distortions = DistortionsConfig {
            enabled: false,
            viewport_size: [8192, 8192],
        };
        assert!(distortions.viewport().is_none());
        distortions.enabled = true;
        assert_eq!(distortions.viewport(), Some(Vec2::new(8192.0, 8192.0)));
    }
}
