pub mod diurnal;
pub mod pdf;
pub mod temporal_upsampler;
