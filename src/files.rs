use std::{fs, path::Path};

use anyhow::Context;
use image::RgbaImage;

use crate::config::Config;

pub fn get_config(config_path: &Path) -> Option<Config> {
    let config_json = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(err) => {
            println!("Failed to read {}: {}", config_path.display(), err);
            return None;
        }
    };
    return match serde_json::from_str::<Config>(&config_json) {
        Ok(config) => Some(config),
        Err(err) => {
            println!("Failed to parse {}: {}", config_path.display(), err);
            None
        }
    };
}

/// Writes the default config so it can be edited; all fields are required on load.
pub fn write_default_config(config_path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&Config::default())?;
    write_bytes_to_file(config_path, json.as_bytes())
        .with_context(|| format!("failed to write {}", config_path.display()))
}

pub fn write_bytes_to_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)
}

pub fn save_png(image: &RgbaImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to save {}", path.display()))
}
