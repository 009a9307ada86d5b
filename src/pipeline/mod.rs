pub mod bucket;
pub mod downsample;
pub mod strategy;
pub mod window;
