//! Citadel: an interactive castle-and-maze scene with simulated water.
//!
//! Frame loop structure: input, wait on the frame resource ring, update the
//! current slot's constants and water vertices, build the draw list, render.

mod scene_build;

use citadel_engine::frame::Light;
use citadel_engine::prelude::*;
use glfw::{Action, Key, MouseButton, WindowEvent};

use scene_build::{
    AMBIENT_LIGHT, FOG_COLOR, FOG_RANGE, FOG_START, WAVE_COLS, WAVE_DAMPING, WAVE_ROWS,
    WAVE_SPATIAL_STEP, WAVE_SPEED, WAVE_TIME_STEP,
};

struct App {
    window: Window,
    renderer: VulkanRenderer,
    scene: SceneRegistry,
    pipeline: FramePipeline,
    water: WaterSim,
    camera: Camera,
    controller: FirstPersonController,
    timer: Timer,
    lights: Vec<Light>,
    last_cursor: Option<(f64, f64)>,
    framebuffer_resized: bool,
}

impl App {
    fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
        )?;

        let mut scene = SceneRegistry::new();
        let handles = scene_build::build_scene(&mut scene)?;

        let waves = Waves::new(
            WAVE_ROWS,
            WAVE_COLS,
            WAVE_SPATIAL_STEP,
            WAVE_TIME_STEP,
            WAVE_SPEED,
            WAVE_DAMPING,
        );
        let pipeline = FramePipeline::new(
            scene.object_count(),
            scene.material_count(),
            waves.vertex_count(),
        );
        let water = WaterSim::new(waves, handles.water_geometry, handles.water_material, 1);

        let mut renderer = VulkanRenderer::new(
            &mut window,
            &config.window.title,
            &config.paths.shader_dir,
            pipeline.ring(),
            FOG_COLOR,
        )?;
        renderer.upload_geometry(&scene)?;
        renderer.load_textures(&scene_build::texture_descs(&config.paths.texture_dir))?;

        let mut camera = Camera::new();
        let [x, y, z] = config.camera.position;
        camera.look_at(Vec3::new(x, y, z), Vec3::zeros(), Vec3::y());
        let (width, height) = window.get_framebuffer_size();
        camera.set_lens(
            config.camera.fov_y_degrees.to_radians(),
            width as f32 / height as f32,
            config.camera.near_z,
            config.camera.far_z,
        );
        let controller = FirstPersonController::new(
            config.camera.move_speed,
            config.camera.degrees_per_pixel,
        );

        Ok(Self {
            window,
            renderer,
            scene,
            pipeline,
            water,
            camera,
            controller,
            timer: Timer::new(),
            lights: scene_build::light_rig(),
            last_cursor: None,
            framebuffer_resized: false,
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Entering main loop");
        while !self.window.should_close() {
            self.window.poll_events();
            let events: Vec<WindowEvent> =
                self.window.flush_events().map(|(_, event)| event).collect();
            for event in events {
                self.handle_event(event);
            }

            if self.framebuffer_resized {
                self.framebuffer_resized = false;
                let (width, height) = self.window.get_framebuffer_size();
                if width == 0 || height == 0 {
                    continue;
                }
                self.renderer.recreate_swapchain(&self.window)?;
                continue;
            }

            self.timer.tick();
            self.process_held_input();
            self.render_one_frame()?;
        }

        log::info!(
            "Exiting after {} frames, {:.1} fps average",
            self.timer.frame_count(),
            self.timer.average_fps()
        );
        Ok(())
    }

    fn handle_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Key(Key::Escape, _, Action::Press, _) => {
                self.window.set_should_close(true);
            }
            WindowEvent::Key(Key::Num1, _, Action::Press, _) => {
                self.controller.free_look = false;
                log::info!("Camera mode: level flight");
            }
            WindowEvent::Key(Key::Num2, _, Action::Press, _) => {
                self.controller.free_look = true;
                log::info!("Camera mode: free look");
            }
            WindowEvent::FramebufferSize(width, height) => {
                if width > 0 && height > 0 {
                    self.camera.set_lens(
                        self.camera.fov_y(),
                        width as f32 / height as f32,
                        self.camera.near_z(),
                        self.camera.far_z(),
                    );
                }
                self.framebuffer_resized = true;
            }
            _ => {}
        }
    }

    fn process_held_input(&mut self) {
        let axis = |pos, neg| (pos as i32 - neg as i32) as f32;
        let forward = axis(self.window.key_held(Key::W), self.window.key_held(Key::S));
        let sideways = axis(self.window.key_held(Key::D), self.window.key_held(Key::A));
        self.controller.apply_movement(
            &mut self.camera,
            forward,
            sideways,
            self.timer.delta_time(),
        );

        if self.window.mouse_button_held(MouseButton::Button1) {
            let cursor = self.window.cursor_pos();
            if let Some((last_x, last_y)) = self.last_cursor {
                let dx = (cursor.0 - last_x) as f32;
                let dy = (cursor.1 - last_y) as f32;
                self.controller.apply_mouse_delta(&mut self.camera, dx, dy);
            }
            self.last_cursor = Some(cursor);
        } else {
            self.last_cursor = None;
        }
    }

    fn render_one_frame(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let slot_index = self.pipeline.begin_frame(self.renderer.timeline())?;

        let (width, height) = self.renderer.extent();
        let inputs = PassInputs {
            view: self.camera.view(),
            proj: self.camera.proj(),
            eye_pos: self.camera.position(),
            render_target_size: [width as f32, height as f32],
            near_z: self.camera.near_z(),
            far_z: self.camera.far_z(),
            total_time: self.timer.total_time(),
            delta_time: self.timer.delta_time(),
            ambient_light: AMBIENT_LIGHT,
            fog_color: FOG_COLOR,
            fog_start: FOG_START,
            fog_range: FOG_RANGE,
            lights: self.lights.clone(),
        };
        self.pipeline
            .update(&mut self.scene, Some(&mut self.water), &inputs);

        let slot = self.pipeline.ring().current();
        let draws = DrawList::build(
            &self.scene,
            slot.object_constants.element_stride(),
            slot.material_constants.element_stride(),
        );

        let fence_value = self.pipeline.end_frame();
        let slot = self.pipeline.ring().slot(slot_index);
        let presented = self
            .renderer
            .render_frame(slot_index, slot, &draws, fence_value)?;
        if !presented {
            self.framebuffer_resized = true;
        }
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AppConfig::load(std::path::Path::new("config.toml"))?;
    log::info!(
        "Starting {} ({}x{})",
        config.window.title,
        config.window.width,
        config.window.height
    );

    let mut app = App::new(&config)?;
    app.run()
}
