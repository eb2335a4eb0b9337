//! Per-frame update phase: material animation, wave simulation, and the
//! dirty-tracked constant flush into the current ring slot.
//!
//! Every writer here follows the same rule: a mutation flags its owner dirty
//! for the full ring depth, and each frame writes at most one slot's copy and
//! decrements the counter. After `FRAME_RING_DEPTH` clean frames all slots
//! agree and the writers go quiescent.

use crate::foundation::math::{translation, Mat4, Vec2, Vec3};
use crate::foundation::rng::XorShiftRng;
use crate::frame::constants::{Light, MaterialConstants, ObjectConstants, PassConstants};
use crate::frame::ring::{FenceWaitError, FrameResourceRing, FrameResourceSlot, GpuTimeline};
use crate::scene::geometry::{MeshVertex, VertexSource};
use crate::scene::{GeometryId, MaterialId, SceneRegistry};
use crate::sim::Waves;

/// Seconds between random wave disturbances.
const DISTURB_INTERVAL: f32 = 0.25;

/// Texture scroll velocity of the water surface, in UV units per second.
const WATER_SCROLL_U: f32 = 0.1;
const WATER_SCROLL_V: f32 = 0.02;

/// Copy every render item whose constants changed into the current slot's
/// object-constant array, one ring slot per call.
pub fn update_object_constants(scene: &mut SceneRegistry, slot: &mut FrameResourceSlot) {
    for item in scene.items_mut() {
        if item.frames_dirty() == 0 {
            continue;
        }
        let constants = ObjectConstants::new(item.world(), item.tex_transform());
        slot.object_constants.copy_data(item.object_index(), &constants);
        item.clear_one_dirty_frame();
    }
}

/// Same dirty-counter flush for materials.
pub fn update_material_constants(scene: &mut SceneRegistry, slot: &mut FrameResourceSlot) {
    for material in scene.materials_mut() {
        if material.frames_dirty() == 0 {
            continue;
        }
        let constants = MaterialConstants {
            diffuse_albedo: material.params.diffuse_albedo,
            fresnel_r0: material.params.fresnel_r0,
            roughness: material.params.roughness,
            mat_transform: crate::foundation::math::to_upload(&material.mat_transform),
        };
        slot.material_constants.copy_data(material.index(), &constants);
        material.frames_dirty -= 1;
    }
}

/// View-dependent and environment inputs to the per-pass constants. Rebuilt
/// every frame by the application from its camera and clock.
pub struct PassInputs {
    pub view: Mat4,
    pub proj: Mat4,
    pub eye_pos: Vec3,
    pub render_target_size: [f32; 2],
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: [f32; 4],
    pub fog_color: [f32; 4],
    pub fog_start: f32,
    pub fog_range: f32,
    pub lights: Vec<Light>,
}

/// Build and write the single per-pass record. Pass constants are rewritten
/// unconditionally; the camera moves almost every frame so dirty tracking
/// would buy nothing.
pub fn update_pass_constants(inputs: &PassInputs, slot: &mut FrameResourceSlot) {
    use crate::foundation::math::to_upload;

    let view_proj = inputs.proj * inputs.view;
    let inv_view = inputs.view.try_inverse().unwrap_or_else(Mat4::identity);
    let inv_proj = inputs.proj.try_inverse().unwrap_or_else(Mat4::identity);
    let inv_view_proj = view_proj.try_inverse().unwrap_or_else(Mat4::identity);

    let mut constants = PassConstants {
        view: to_upload(&inputs.view),
        inv_view: to_upload(&inv_view),
        proj: to_upload(&inputs.proj),
        inv_proj: to_upload(&inv_proj),
        view_proj: to_upload(&view_proj),
        inv_view_proj: to_upload(&inv_view_proj),
        eye_pos: inputs.eye_pos.into(),
        render_target_size: inputs.render_target_size,
        inv_render_target_size: [
            1.0 / inputs.render_target_size[0],
            1.0 / inputs.render_target_size[1],
        ],
        near_z: inputs.near_z,
        far_z: inputs.far_z,
        total_time: inputs.total_time,
        delta_time: inputs.delta_time,
        ambient_light: inputs.ambient_light,
        fog_color: inputs.fog_color,
        fog_start: inputs.fog_start,
        fog_range: inputs.fog_range,
        ..PassConstants::default()
    };
    for (dst, src) in constants.lights.iter_mut().zip(&inputs.lights) {
        *dst = *src;
    }
    slot.pass_constants.copy_data(0, &constants);
}

/// Dynamic water surface: wave solver, periodic random disturbances, the
/// per-frame vertex rewrite, and the scrolling texture transform of the water
/// material.
pub struct WaterSim {
    waves: Waves,
    geometry: GeometryId,
    material: MaterialId,
    rng: XorShiftRng,
    disturb_accumulated: f32,
    tex_offset: Vec2,
}

impl WaterSim {
    pub fn new(waves: Waves, geometry: GeometryId, material: MaterialId, seed: u64) -> Self {
        Self {
            waves,
            geometry,
            material,
            rng: XorShiftRng::new(seed),
            disturb_accumulated: 0.0,
            tex_offset: Vec2::zeros(),
        }
    }

    pub fn waves(&self) -> &Waves {
        &self.waves
    }

    /// Run one frame of water work against the current slot.
    ///
    /// Disturbances land on interior cells well away from the boundary, the
    /// solver advances on its own fixed timestep, and the refreshed vertices
    /// go into this slot's dynamic vertex buffer. The water geometry is then
    /// repointed at that buffer so draws recorded this frame read this
    /// frame's surface.
    pub fn update(
        &mut self,
        scene: &mut SceneRegistry,
        slot: &mut FrameResourceSlot,
        slot_index: usize,
        dt: f32,
    ) {
        self.disturb_accumulated += dt;
        if self.disturb_accumulated >= DISTURB_INTERVAL {
            self.disturb_accumulated -= DISTURB_INTERVAL;

            let i = self.rng.int_in_range(4, self.waves.row_count() as i32 - 5) as usize;
            let j = self.rng.int_in_range(4, self.waves.column_count() as i32 - 5) as usize;
            let magnitude = self.rng.float_in_range(0.2, 0.5);
            self.waves.disturb(i, j, magnitude);
        }

        self.waves.update(dt);

        let width = self.waves.width();
        let depth = self.waves.depth();
        for v in 0..self.waves.vertex_count() {
            let position = self.waves.position(v);
            let vertex = MeshVertex {
                position: position.into(),
                normal: self.waves.normal(v).into(),
                texc: [0.5 + position.x / width, 0.5 - position.z / depth],
            };
            slot.dynamic_vertices.copy_data(v, &vertex);
        }
        scene.geometry_mut(self.geometry).vertex_source = VertexSource::FrameSlot(slot_index);

        self.scroll_material(scene, dt);
    }

    /// Advance the water texture offset and wrap it into [0, 1) so the
    /// translation never grows without bound.
    fn scroll_material(&mut self, scene: &mut SceneRegistry, dt: f32) {
        self.tex_offset.x += WATER_SCROLL_U * dt;
        self.tex_offset.y += WATER_SCROLL_V * dt;
        self.tex_offset.x -= self.tex_offset.x.floor();
        self.tex_offset.y -= self.tex_offset.y.floor();

        let material = scene.material_mut(self.material);
        material.mat_transform = translation(self.tex_offset.x, self.tex_offset.y, 0.0);
        material.mark_dirty();
    }
}

/// Drives one frame through its fixed phases: acquire the next ring slot,
/// wait out the GPU if it still owns that slot, run the simulation and
/// constant updates, then stamp the slot with the fence value the GPU will
/// signal for this frame's submission.
pub struct FramePipeline {
    ring: FrameResourceRing,
    next_fence_value: u64,
}

impl FramePipeline {
    pub fn new(object_count: usize, material_count: usize, dynamic_vertex_count: usize) -> Self {
        Self {
            ring: FrameResourceRing::new(object_count, material_count, dynamic_vertex_count),
            next_fence_value: 0,
        }
    }

    pub fn ring(&self) -> &FrameResourceRing {
        &self.ring
    }

    pub fn ring_mut(&mut self) -> &mut FrameResourceRing {
        &mut self.ring
    }

    /// Advance to the next slot and block until the GPU has released it.
    /// Returns the slot index now current.
    pub fn begin_frame(&mut self, timeline: &impl GpuTimeline) -> Result<usize, FenceWaitError> {
        let index = self.ring.advance();
        self.ring.wait_until_ready(timeline)?;
        Ok(index)
    }

    /// Run the update phase against the current slot.
    pub fn update(
        &mut self,
        scene: &mut SceneRegistry,
        water: Option<&mut WaterSim>,
        inputs: &PassInputs,
    ) {
        let slot_index = self.ring.current_index();
        let slot = self.ring.current_mut();

        if let Some(water) = water {
            water.update(scene, slot, slot_index, inputs.delta_time);
        }
        update_object_constants(scene, slot);
        update_material_constants(scene, slot);
        update_pass_constants(inputs, slot);
    }

    /// Stamp the current slot with this frame's fence value and hand the
    /// value back for the GPU submission to signal.
    pub fn end_frame(&mut self) -> u64 {
        self.next_fence_value += 1;
        self.ring.retire_current(self.next_fence_value);
        self.next_fence_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{scaling, translation};
    use crate::frame::ring::FRAME_RING_DEPTH;
    use crate::scene::geometry::{Geometry, VertexData};
    use crate::scene::{MaterialParams, RenderItemDesc, RenderLayer, Topology};
    use std::cell::Cell;

    struct InstantTimeline {
        completed: Cell<u64>,
    }

    impl GpuTimeline for InstantTimeline {
        fn completed_value(&self) -> u64 {
            self.completed.get()
        }

        fn wait_for(&self, value: u64) -> Result<(), FenceWaitError> {
            self.completed.set(value);
            Ok(())
        }
    }

    fn flat_params() -> MaterialParams {
        MaterialParams {
            diffuse_albedo: [1.0, 0.5, 0.25, 1.0],
            fresnel_r0: [0.05; 3],
            roughness: 0.3,
        }
    }

    fn quad(name: &str) -> Geometry {
        Geometry::new(
            name,
            VertexData::Standard(vec![
                MeshVertex {
                    position: [0.0; 3],
                    normal: [0.0, 1.0, 0.0],
                    texc: [0.0; 2],
                };
                4
            ]),
            vec![0, 1, 2, 0, 2, 3],
        )
        .with_full_range_submesh("all")
    }

    fn pass_inputs(dt: f32) -> PassInputs {
        PassInputs {
            view: Mat4::identity(),
            proj: Mat4::identity(),
            eye_pos: Vec3::new(0.0, 15.0, -80.0),
            render_target_size: [800.0, 600.0],
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: dt,
            ambient_light: [1.25, 0.5, 0.35, 1.0],
            fog_color: [0.0, 1.0, 1.0, 0.5],
            fog_start: 15.0,
            fog_range: 175.0,
            lights: vec![Light::directional([0.57735, -0.57735, 0.57735], [0.6; 3])],
        }
    }

    fn small_scene() -> SceneRegistry {
        let mut scene = SceneRegistry::new();
        scene.register_geometry(quad("wall")).unwrap();
        scene.register_material("brick", flat_params(), 0).unwrap();
        scene.register_material("marble", flat_params(), 1).unwrap();
        for layer in [RenderLayer::Opaque, RenderLayer::Transparent] {
            scene
                .add_render_item(RenderItemDesc {
                    geometry: "wall",
                    submesh: "all",
                    material: "brick",
                    world: translation(1.0, 2.0, 3.0),
                    tex_transform: Mat4::identity(),
                    topology: Topology::TriangleList,
                    layer,
                })
                .unwrap();
        }
        scene
    }

    #[test]
    fn test_mutation_reaches_every_slot_then_goes_quiescent() {
        let mut scene = small_scene();
        let mut pipeline = FramePipeline::new(scene.object_count(), scene.material_count(), 4);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        // Settle the initial registrations.
        for _ in 0..FRAME_RING_DEPTH {
            pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, None, &pass_inputs(0.016));
            pipeline.end_frame();
        }

        let handle = scene.layer_items(RenderLayer::Opaque)[0];
        let moved = translation(10.0, 0.0, 0.0) * scaling(2.0, 2.0, 2.0);
        scene.item_mut(handle).set_world(moved);
        assert_eq!(scene.item(handle).frames_dirty(), FRAME_RING_DEPTH);

        for _ in 0..FRAME_RING_DEPTH {
            pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, None, &pass_inputs(0.016));
            pipeline.end_frame();
        }

        // Counter exhausted and all three slots carry the new constants.
        assert_eq!(scene.item(handle).frames_dirty(), 0);
        let expected = ObjectConstants::new(&moved, &Mat4::identity());
        let object_index = scene.item(handle).object_index();
        for slot_index in 0..FRAME_RING_DEPTH {
            let written = pipeline.ring().slot(slot_index).object_constants.read(object_index);
            assert_eq!(written, expected);
        }
    }

    #[test]
    fn test_clean_frame_writes_nothing() {
        let mut scene = small_scene();
        let mut pipeline = FramePipeline::new(scene.object_count(), scene.material_count(), 4);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        for _ in 0..FRAME_RING_DEPTH + 2 {
            pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, None, &pass_inputs(0.016));
            pipeline.end_frame();
        }

        for item in scene.items() {
            assert_eq!(item.frames_dirty(), 0);
        }
        let brick = scene.material_id("brick").unwrap();
        assert_eq!(scene.material(brick).frames_dirty(), 0);
    }

    #[test]
    fn test_material_constants_land_at_stable_index() {
        let mut scene = small_scene();
        let mut pipeline = FramePipeline::new(scene.object_count(), scene.material_count(), 4);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        let marble = scene.material_id("marble").unwrap();
        scene.material_mut(marble).params.roughness = 0.9;
        scene.material_mut(marble).mark_dirty();

        for _ in 0..FRAME_RING_DEPTH {
            pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, None, &pass_inputs(0.016));
            pipeline.end_frame();
        }

        let index = scene.material(marble).index();
        for slot_index in 0..FRAME_RING_DEPTH {
            let written = pipeline.ring().slot(slot_index).material_constants.read(index);
            assert_eq!(written.roughness, 0.9);
        }
    }

    #[test]
    fn test_fence_values_increase_and_stamp_current_slot() {
        let mut scene = small_scene();
        let mut pipeline = FramePipeline::new(scene.object_count(), scene.material_count(), 4);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        let mut stamped = Vec::new();
        for _ in 0..2 * FRAME_RING_DEPTH {
            let slot = pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, None, &pass_inputs(0.016));
            let value = pipeline.end_frame();
            assert_eq!(pipeline.ring().slot(slot).fence_value, value);
            stamped.push(value);
        }
        assert_eq!(stamped, vec![1, 2, 3, 4, 5, 6]);
    }

    fn water_scene() -> (SceneRegistry, GeometryId, MaterialId) {
        let mut scene = SceneRegistry::new();
        let waves = Waves::new(16, 16, 1.0, 0.03, 4.0, 0.2);
        let geometry = scene
            .register_geometry(
                Geometry::new(
                    "water",
                    VertexData::Dynamic {
                        vertex_count: waves.vertex_count(),
                    },
                    vec![0, 1, 2],
                )
                .with_full_range_submesh("all"),
            )
            .unwrap();
        let material = scene.register_material("water", flat_params(), 1).unwrap();
        scene
            .add_render_item(RenderItemDesc {
                geometry: "water",
                submesh: "all",
                material: "water",
                world: Mat4::identity(),
                tex_transform: scaling(5.0, 5.0, 1.0),
                topology: Topology::TriangleList,
                layer: RenderLayer::Transparent,
            })
            .unwrap();
        (scene, geometry, material)
    }

    #[test]
    fn test_water_repoints_geometry_at_current_slot() {
        let (mut scene, geometry, material) = water_scene();
        let waves = Waves::new(16, 16, 1.0, 0.03, 4.0, 0.2);
        let mut water = WaterSim::new(waves, geometry, material, 11);
        let mut pipeline =
            FramePipeline::new(scene.object_count(), scene.material_count(), 16 * 16);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        for _ in 0..4 {
            let slot = pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, Some(&mut water), &pass_inputs(0.016));
            pipeline.end_frame();
            assert_eq!(
                scene.geometry(geometry).vertex_source,
                VertexSource::FrameSlot(slot)
            );
        }
    }

    #[test]
    fn test_water_scroll_wraps_and_redirties_material() {
        let (mut scene, geometry, material) = water_scene();
        let waves = Waves::new(16, 16, 1.0, 0.03, 4.0, 0.2);
        let mut water = WaterSim::new(waves, geometry, material, 11);
        let mut pipeline =
            FramePipeline::new(scene.object_count(), scene.material_count(), 16 * 16);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        // 12 seconds of scrolling at 0.1/s wraps u past 1.0.
        for _ in 0..120 {
            pipeline.begin_frame(&timeline).unwrap();
            pipeline.update(&mut scene, Some(&mut water), &pass_inputs(0.1));
            pipeline.end_frame();
        }

        let transform = scene.material(material).mat_transform;
        let u = transform[(0, 3)];
        let v = transform[(1, 3)];
        assert!((0.0..1.0).contains(&u), "u offset {u} not wrapped");
        assert!((0.0..1.0).contains(&v), "v offset {v} not wrapped");

        // The scroll marks the material dirty each frame, so the flush just
        // performed leaves the counter one short of the full depth.
        assert_eq!(scene.material(material).frames_dirty(), FRAME_RING_DEPTH - 1);
    }

    #[test]
    fn test_pass_constants_record_environment() {
        let mut scene = small_scene();
        let mut pipeline = FramePipeline::new(scene.object_count(), scene.material_count(), 4);
        let timeline = InstantTimeline { completed: Cell::new(0) };

        pipeline.begin_frame(&timeline).unwrap();
        pipeline.update(&mut scene, None, &pass_inputs(0.016));
        let written = pipeline.ring().current().pass_constants.read(0);
        assert_eq!(written.ambient_light, [1.25, 0.5, 0.35, 1.0]);
        assert_eq!(written.fog_color, [0.0, 1.0, 1.0, 0.5]);
        assert_eq!(written.fog_start, 15.0);
        assert_eq!(written.fog_range, 175.0);
        assert_eq!(written.lights[0].strength, [0.6; 3]);
        assert_eq!(written.inv_render_target_size, [1.0 / 800.0, 1.0 / 600.0]);
    }
}
