pub mod builder;
pub mod tessellation;
pub mod types;
