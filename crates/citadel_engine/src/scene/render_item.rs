//! Render items: one drawable instance each, bucketed into fixed layers.

use crate::foundation::math::Mat4;
use crate::frame::ring::FRAME_RING_DEPTH;
use crate::scene::geometry::GeometryId;
use crate::scene::material::MaterialId;

/// Pipeline bucket a render item is drawn with. Assigned at registration,
/// immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    AlphaTested,
    AlphaTestedBillboards,
    Transparent,
}

impl RenderLayer {
    /// Fixed submission order. Transparent geometry must composite over
    /// everything already resolved, and the no-cull rasterizer state of the
    /// alpha-tested layers must not leak into opaque drawing.
    pub const DRAW_ORDER: [RenderLayer; 4] = [
        RenderLayer::Opaque,
        RenderLayer::AlphaTested,
        RenderLayer::AlphaTestedBillboards,
        RenderLayer::Transparent,
    ];

    pub fn index(self) -> usize {
        match self {
            RenderLayer::Opaque => 0,
            RenderLayer::AlphaTested => 1,
            RenderLayer::AlphaTestedBillboards => 2,
            RenderLayer::Transparent => 3,
        }
    }
}

/// Primitive topology for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    PointList,
}

/// Handle into the scene registry's render-item arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderItemHandle(pub(crate) usize);

/// One drawable instance.
#[derive(Debug)]
pub struct RenderItem {
    world: Mat4,
    tex_transform: Mat4,
    /// Ring slots that still need this item's latest constants.
    frames_dirty: usize,
    /// Permanent index into every ring slot's object-constant array.
    pub(crate) object_index: usize,
    pub material: MaterialId,
    pub geometry: GeometryId,
    pub topology: Topology,
    pub layer: RenderLayer,
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

impl RenderItem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        object_index: usize,
        world: Mat4,
        tex_transform: Mat4,
        material: MaterialId,
        geometry: GeometryId,
        topology: Topology,
        layer: RenderLayer,
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    ) -> Self {
        Self {
            world,
            tex_transform,
            frames_dirty: FRAME_RING_DEPTH,
            object_index,
            material,
            geometry,
            topology,
            layer,
            index_count,
            start_index,
            base_vertex,
        }
    }

    pub fn object_index(&self) -> usize {
        self.object_index
    }

    pub fn world(&self) -> &Mat4 {
        &self.world
    }

    pub fn tex_transform(&self) -> &Mat4 {
        &self.tex_transform
    }

    pub fn frames_dirty(&self) -> usize {
        self.frames_dirty
    }

    /// Replace the world transform and flag the item dirty for the full ring
    /// depth so every slot eventually observes the change.
    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
        self.frames_dirty = FRAME_RING_DEPTH;
    }

    /// Replace the texture transform; same dirty-propagation rule.
    pub fn set_tex_transform(&mut self, tex_transform: Mat4) {
        self.tex_transform = tex_transform;
        self.frames_dirty = FRAME_RING_DEPTH;
    }

    pub(crate) fn clear_one_dirty_frame(&mut self) {
        debug_assert!(self.frames_dirty > 0);
        self.frames_dirty -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_order_is_fixed() {
        let order = RenderLayer::DRAW_ORDER;
        assert_eq!(
            order,
            [
                RenderLayer::Opaque,
                RenderLayer::AlphaTested,
                RenderLayer::AlphaTestedBillboards,
                RenderLayer::Transparent,
            ]
        );
        // Layer indices are dense and match their order position.
        for (position, layer) in order.iter().enumerate() {
            assert_eq!(layer.index(), position);
        }
    }
}
