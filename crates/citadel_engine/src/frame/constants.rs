//! Constant-buffer record layouts.
//!
//! All records are `#[repr(C)]` and match the std140 layout of the shader
//! blocks; matrices are uploaded transposed (see `foundation::math::to_upload`).

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{to_upload, Mat4};

/// Size of the fixed light array in `PassConstants`.
pub const MAX_LIGHTS: usize = 16;

/// One light. Directional lights use `direction` + `strength`; point lights
/// use `position`, `strength`, and the falloff interval.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub strength: [f32; 3],
    pub falloff_start: f32,
    pub direction: [f32; 3],
    pub falloff_end: f32,
    pub position: [f32; 3],
    pub spot_power: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            strength: [0.0; 3],
            falloff_start: 1.0,
            direction: [0.0, -1.0, 0.0],
            falloff_end: 10.0,
            position: [0.0; 3],
            spot_power: 64.0,
        }
    }
}

impl Light {
    pub fn directional(direction: [f32; 3], strength: [f32; 3]) -> Self {
        Self {
            direction,
            strength,
            ..Self::default()
        }
    }

    pub fn point(position: [f32; 3], strength: [f32; 3], falloff_start: f32, falloff_end: f32) -> Self {
        Self {
            position,
            strength,
            falloff_start,
            falloff_end,
            ..Self::default()
        }
    }
}

/// Per-object constants, one array element per render item.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: [[f32; 4]; 4],
    pub tex_transform: [[f32; 4]; 4],
}

impl ObjectConstants {
    pub fn new(world: &Mat4, tex_transform: &Mat4) -> Self {
        Self {
            world: to_upload(world),
            tex_transform: to_upload(tex_transform),
        }
    }
}

/// Per-material constants, one array element per material.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
    pub mat_transform: [[f32; 4]; 4],
}

/// Per-pass constants: one record per frame, shared by every draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub inv_proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub eye_pos: [f32; 3],
    pub _pad0: f32,
    pub render_target_size: [f32; 2],
    pub inv_render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: [f32; 4],
    pub fog_color: [f32; 4],
    pub fog_start: f32,
    pub fog_range: f32,
    pub _pad1: [f32; 2],
    pub lights: [Light; MAX_LIGHTS],
}

impl Default for PassConstants {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_record_sizes_match_std140() {
        assert_eq!(size_of::<Light>(), 48);
        assert_eq!(size_of::<ObjectConstants>(), 128);
        assert_eq!(size_of::<MaterialConstants>(), 96);
        // 6 mat4 + 6 vec4-sized scalar/vector groups + light array
        assert_eq!(
            size_of::<PassConstants>(),
            6 * 64 + 6 * 16 + MAX_LIGHTS * 48
        );
    }
}
