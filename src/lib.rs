#[macro_use]
pub mod logging;

pub mod body;
pub mod config;
pub mod files;
pub mod geometry;
pub mod mesh;
pub mod render;
pub mod slider;
pub mod viewport;
