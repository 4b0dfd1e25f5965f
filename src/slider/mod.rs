pub mod curve;
pub mod progress;
pub mod sections;
