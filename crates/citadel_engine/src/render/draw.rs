//! Draw-list construction: flattens the scene registry into backend-neutral
//! draw commands, bucketed by layer in the fixed submission order.
//!
//! Constant addressing is resolved here: each command carries the byte
//! offsets of its object and material records, computed from the owners'
//! permanent indices and the upload strides. The backend binds them as
//! dynamic uniform offsets without any per-draw lookup.

use crate::scene::geometry::{GeometryId, VertexSource};
use crate::scene::render_item::{RenderLayer, Topology};
use crate::scene::SceneRegistry;

/// One backend-neutral draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub geometry: GeometryId,
    pub vertex_source: VertexSource,
    pub topology: Topology,
    /// Texture heap slot of the draw's material.
    pub texture_slot: usize,
    /// Byte offset of the object-constant record in the slot's buffer.
    pub object_offset: u32,
    /// Byte offset of the material-constant record in the slot's buffer.
    pub material_offset: u32,
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

/// Commands of one layer, in registration order.
#[derive(Debug, Default)]
pub struct LayerDraws {
    pub commands: Vec<DrawCommand>,
}

/// All draws of one frame, layer-bucketed. Iteration order is the fixed
/// [`RenderLayer::DRAW_ORDER`].
#[derive(Debug)]
pub struct DrawList {
    layers: [LayerDraws; 4],
}

impl DrawList {
    /// Flatten the scene. `object_stride` and `material_stride` are the
    /// element strides of the ring slots' constant buffers.
    pub fn build(scene: &SceneRegistry, object_stride: usize, material_stride: usize) -> Self {
        let mut layers: [LayerDraws; 4] = Default::default();

        for layer in RenderLayer::DRAW_ORDER {
            let commands = &mut layers[layer.index()].commands;
            for &handle in scene.layer_items(layer) {
                let item = scene.item(handle);
                let material = scene.material(item.material);
                let geometry = scene.geometry(item.geometry);
                commands.push(DrawCommand {
                    geometry: item.geometry,
                    vertex_source: geometry.vertex_source,
                    topology: item.topology,
                    texture_slot: material.texture_slot,
                    object_offset: (item.object_index() * object_stride) as u32,
                    material_offset: (material.index() * material_stride) as u32,
                    index_count: item.index_count,
                    start_index: item.start_index,
                    base_vertex: item.base_vertex,
                });
            }
        }
        Self { layers }
    }

    /// Layers in submission order.
    pub fn layers(&self) -> impl Iterator<Item = (RenderLayer, &[DrawCommand])> {
        RenderLayer::DRAW_ORDER
            .into_iter()
            .map(|layer| (layer, self.layers[layer.index()].commands.as_slice()))
    }

    pub fn layer(&self, layer: RenderLayer) -> &[DrawCommand] {
        &self.layers[layer.index()].commands
    }

    pub fn command_count(&self) -> usize {
        self.layers.iter().map(|l| l.commands.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::frame::upload::CONSTANT_ALIGNMENT;
    use crate::scene::geometry::{Geometry, MeshVertex, VertexData};
    use crate::scene::{MaterialParams, RenderItemDesc};

    fn params() -> MaterialParams {
        MaterialParams {
            diffuse_albedo: [1.0; 4],
            fresnel_r0: [0.02; 3],
            roughness: 0.1,
        }
    }

    fn build_scene() -> SceneRegistry {
        let mut scene = SceneRegistry::new();
        scene
            .register_geometry(
                Geometry::new(
                    "shapes",
                    VertexData::Standard(vec![
                        MeshVertex {
                            position: [0.0; 3],
                            normal: [0.0, 1.0, 0.0],
                            texc: [0.0; 2],
                        };
                        8
                    ]),
                    (0..12).collect(),
                )
                .with_full_range_submesh("all"),
            )
            .unwrap();
        scene.register_material("stone", params(), 2).unwrap();
        scene.register_material("glass", params(), 5).unwrap();

        // Register out of draw order on purpose.
        let order = [
            ("glass", RenderLayer::Transparent),
            ("stone", RenderLayer::Opaque),
            ("stone", RenderLayer::AlphaTestedBillboards),
            ("stone", RenderLayer::Opaque),
            ("glass", RenderLayer::AlphaTested),
        ];
        for (material, layer) in order {
            scene
                .add_render_item(RenderItemDesc {
                    geometry: "shapes",
                    submesh: "all",
                    material,
                    world: Mat4::identity(),
                    tex_transform: Mat4::identity(),
                    topology: Topology::TriangleList,
                    layer,
                })
                .unwrap();
        }
        scene
    }

    #[test]
    fn test_layers_come_out_in_submission_order() {
        let scene = build_scene();
        let list = DrawList::build(&scene, CONSTANT_ALIGNMENT, CONSTANT_ALIGNMENT);

        let layer_order: Vec<RenderLayer> = list.layers().map(|(layer, _)| layer).collect();
        assert_eq!(layer_order, RenderLayer::DRAW_ORDER.to_vec());
        assert_eq!(list.command_count(), 5);
        assert_eq!(list.layer(RenderLayer::Opaque).len(), 2);
        assert_eq!(list.layer(RenderLayer::AlphaTested).len(), 1);
        assert_eq!(list.layer(RenderLayer::AlphaTestedBillboards).len(), 1);
        assert_eq!(list.layer(RenderLayer::Transparent).len(), 1);
    }

    #[test]
    fn test_offsets_follow_stable_indices() {
        let scene = build_scene();
        let list = DrawList::build(&scene, CONSTANT_ALIGNMENT, CONSTANT_ALIGNMENT);

        // Items 1 and 3 went into the opaque layer, in registration order.
        let opaque = list.layer(RenderLayer::Opaque);
        assert_eq!(opaque[0].object_offset, 1 * CONSTANT_ALIGNMENT as u32);
        assert_eq!(opaque[1].object_offset, 3 * CONSTANT_ALIGNMENT as u32);

        // Material offsets follow the material's permanent index, not the
        // draw position.
        let glass_index = scene.material_id("glass").unwrap().index();
        let transparent = list.layer(RenderLayer::Transparent);
        assert_eq!(
            transparent[0].material_offset,
            (glass_index * CONSTANT_ALIGNMENT) as u32
        );
        assert_eq!(transparent[0].texture_slot, 5);
    }

    #[test]
    fn test_commands_carry_submesh_ranges() {
        let scene = build_scene();
        let list = DrawList::build(&scene, CONSTANT_ALIGNMENT, CONSTANT_ALIGNMENT);
        for (_, commands) in list.layers() {
            for command in commands {
                assert_eq!(command.index_count, 12);
                assert_eq!(command.start_index, 0);
                assert_eq!(command.base_vertex, 0);
                assert_eq!(command.vertex_source, VertexSource::Static);
            }
        }
    }
}
