//! Materials: shading parameters plus the bookkeeping that ties them to the
//! frame resource ring (stable constant index, dirty counter, texture slot).

use crate::foundation::math::Mat4;
use crate::frame::ring::FRAME_RING_DEPTH;

/// Stable identifier of a registered material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

impl MaterialId {
    /// Dense index into the registry's material array. Doubles as the offset
    /// index into every ring slot's material-constant buffer.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Shading parameters supplied at registration time.
#[derive(Debug, Clone, Copy)]
pub struct MaterialParams {
    pub diffuse_albedo: [f32; 4],
    pub fresnel_r0: [f32; 3],
    pub roughness: f32,
}

/// A registered material.
///
/// The constant index is assigned once and never recompacted; every ring
/// slot's material-constant array is addressed with it directly.
#[derive(Debug)]
pub struct Material {
    pub name: String,
    pub params: MaterialParams,
    pub mat_transform: Mat4,
    /// Fixed slot in the shader-visible texture heap.
    pub texture_slot: usize,
    pub(crate) index: usize,
    pub(crate) frames_dirty: usize,
}

impl Material {
    pub(crate) fn new(name: String, params: MaterialParams, texture_slot: usize, index: usize) -> Self {
        Self {
            name,
            params,
            mat_transform: Mat4::identity(),
            texture_slot,
            index,
            // Fresh materials must reach every ring slot.
            frames_dirty: FRAME_RING_DEPTH,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn frames_dirty(&self) -> usize {
        self.frames_dirty
    }

    /// Flag the material so every ring slot observes the mutation.
    pub fn mark_dirty(&mut self) {
        self.frames_dirty = FRAME_RING_DEPTH;
    }
}
