pub mod dng_pipeline;
pub mod logger;
