pub mod clearness_index;
pub mod diffuse_fraction;
pub mod plane_projection;
pub mod sun_geometry;
