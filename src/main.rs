use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use slider_renderer::{
    body::{FrameParams, SliderBody},
    config::Config,
    files::{get_config, save_png, write_default_config},
    geometry::vec2::Vec2,
    log,
    render::{
        compose::{BodyColors, blend_onto, colorize},
        software::SoftwareBackend,
    },
    slider::curve::MultiCurve,
    viewport::Camera,
};

const PREVIEW_VERSION: &str = "0.0.1";
const CONFIG_PATH: &str = "config.json";

fn main() {
    log!();
    log!("slider-preview {PREVIEW_VERSION}");

    let config = match get_config(Path::new(CONFIG_PATH)) {
        Some(config) => config,
        None => {
            println!("Using the default config, writing it to {CONFIG_PATH}.");
            if let Err(err) = write_default_config(Path::new(CONFIG_PATH)) {
                println!("{err:?}");
            }
            Config::default()
        }
    };

    if let Err(err) = run(&config) {
        println!("Preview failed: {err:?}");
        log!("Preview failed: {err:?}");
    }
}

/// A figure eight, so the body overlaps itself in the middle.
fn demo_points() -> Vec<Vec2> {
    const STEPS: usize = 96;
    (0..=STEPS)
        .map(|i| {
            let t = i as f64 / STEPS as f64 * std::f64::consts::TAU * 0.9;
            Vec2::new(256.0 + 170.0 * t.sin(), 192.0 + 110.0 * t.sin() * t.cos())
        })
        .collect()
}

/// Snake in over the first half, snake out over the second.
fn progress_at(frame: u32, frames: u32) -> (f64, f64) {
    let t = if frames > 1 {
        frame as f64 / (frames - 1) as f64
    } else {
        1.0
    };
    if t <= 0.5 {
        (0.0, t * 2.0)
    } else {
        ((t - 0.5) * 2.0, 1.0)
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let preview = &config.preview;

    let points: Vec<Vec2> = if preview.points.len() >= 2 {
        preview.points.iter().map(|p| Vec2::new(p[0], p[1])).collect()
    } else {
        demo_points()
    };

    let screen = Vec2::new(preview.screen_size[0] as f64, preview.screen_size[1] as f64);
    let frame = FrameParams {
        camera: Camera::playfield(screen, 1.0),
        pulse: 1.0,
        distortion_viewport: config.slider.distortions.viewport(),
    };
    let colors = BodyColors::from(&preview.colors);
    let output_dir = PathBuf::from(&preview.output_dir);

    let mut backend = SoftwareBackend;
    let mut body = SliderBody::new(
        &mut backend,
        &MultiCurve::from_points(&points),
        preview.mirror_vertically,
        preview.radius,
        &config.slider,
    )?;
    log!(
        "Preview slider: {} sections, length {:.2}.",
        body.model().len(),
        body.model().total_length()
    );

    let mut drawn = 0;
    for i in 0..preview.frames {
        let (head, tail) = progress_at(i, preview.frames);
        if body.draw_base(&mut backend, head, tail, &frame)? {
            drawn += 1;
        }

        let mut canvas = RgbaImage::from_pixel(
            preview.screen_size[0].max(1),
            preview.screen_size[1].max(1),
            Rgba([0, 0, 0, 255]),
        );
        if let Some(cached) = body.cached() {
            let top_left = frame
                .camera
                .to_screen(cached.center - cached.world_size * 0.5);
            let layer = colorize(&cached.target.color, &colors, 1.0);
            blend_onto(
                &mut canvas,
                &layer,
                top_left.x.round() as i64,
                top_left.y.round() as i64,
            );
        }

        save_png(&canvas, &output_dir.join(format!("frame_{i:04}.png")))?;
    }

    body.dispose(&mut backend);

    println!(
        "Wrote {} frames to {} ({} rasterized).",
        preview.frames,
        output_dir.display(),
        drawn
    );
    log!("Wrote {} frames, {} rasterized.", preview.frames, drawn);
    Ok(())
}
