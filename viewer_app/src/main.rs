//! Frame engine viewer
//!
//! Opens a window and drives the frame scheduler: the swapchain render pass
//! clears every frame, the global uniform block follows an arcball camera and
//! each scene object gets its own material descriptor set.
//!
//! ```text
//! viewer [--config engine.toml]
//! viewer --headless [--frames N] [--config engine.toml]
//! ```
//!
//! Headless mode runs the same loop on the simulated device with a scripted
//! surface that resizes and minimizes along the way, then prints the frame
//! counters.

use std::sync::Arc;

use ash::vk;
use clap::Parser;
use frame_engine::config::DescriptorConfig;
use frame_engine::foundation::logging;
use frame_engine::prelude::*;
use frame_engine::render::backends::headless::ScriptedResult;
use frame_engine::render::{FrameStats, GlobalFrameResources, GlobalUbo, MaterialUbo, UniformBuffer};
use frame_engine::scene::{ArcballController, ObjectId};

const FIELD_OF_VIEW_DEGREES: f32 = 50.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;
const DEFAULT_HEADLESS_FRAMES: u64 = 120;

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Command line options
#[derive(Debug, Parser)]
#[command(name = "viewer", about = "Drives the frame scheduler in a window or on the simulated device")]
struct Options {
    /// Engine configuration file (.toml or .ron)
    #[arg(long = "config", value_name = "FILE")]
    config_path: Option<String>,

    /// Run on the simulated device with a scripted surface
    #[arg(long)]
    headless: bool,

    /// Number of headless ticks to run
    #[arg(long, value_name = "COUNT", requires = "headless")]
    frames: Option<u64>,
}

/// One uniform buffer and descriptor set per scene object
struct MaterialSets {
    sets: Vec<(ObjectId, vk::DescriptorSet)>,
    pool: DescriptorPool,
    _buffers: Vec<UniformBuffer<MaterialUbo>>,
    _layout: DescriptorSetLayout,
}

impl MaterialSets {
    fn new(engine: &EngineRef, scene: &Scene, config: &DescriptorConfig) -> RenderResult<Self> {
        let layout = DescriptorSetLayoutBuilder::new(engine.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::FRAGMENT)
            .build()?;
        let mut pool = DescriptorPoolBuilder::new(engine.clone())
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, config.material_sets)
            .set_max_sets(config.material_sets)
            .build()?;

        let mut sets = Vec::with_capacity(scene.len());
        let mut buffers = Vec::with_capacity(scene.len());
        for object in scene.iter() {
            let buffer = UniformBuffer::new(engine.clone())?;
            buffer.write(&object.material.to_ubo())?;
            let Some(set) = DescriptorWriter::new(&layout, &mut pool)
                .write_buffer(0, buffer.descriptor_info())
                .build()
            else {
                log::warn!(
                    "Material pool full after {} sets; remaining objects use no material",
                    sets.len()
                );
                break;
            };
            sets.push((object.id(), set));
            buffers.push(buffer);
        }
        log::info!("Allocated {} material descriptor sets", sets.len());

        Ok(Self {
            sets,
            pool,
            _buffers: buffers,
            _layout: layout,
        })
    }

    fn len(&self) -> usize {
        self.sets.len()
    }

    fn set_for(&self, id: ObjectId) -> Option<vk::DescriptorSet> {
        self.sets
            .iter()
            .find_map(|&(object, set)| (object == id).then_some(set))
    }
}

/// Records one draw per object that has a material set
///
/// Only registered on the headless engine, where draws need no pipeline.
struct ObjectProbeSystem {
    materials: usize,
}

impl RenderSystem for ObjectProbeSystem {
    fn render(
        &mut self,
        engine: &dyn PresentationEngine,
        frame: &FrameContext<'_>,
    ) -> RenderResult<()> {
        let instances = u32::try_from(frame.scene.len().min(self.materials)).unwrap_or(u32::MAX);
        if instances > 0 {
            engine.cmd_draw(frame.command_buffer, 36, instances, 0, 0);
        }
        Ok(())
    }
}

/// Everything one frame loop needs
///
/// Field order matters: the scheduler drains the device on drop, before the
/// per-frame and material resources are released.
struct Viewer {
    scheduler: FrameScheduler,
    globals: GlobalFrameResources,
    materials: MaterialSets,
    systems: Vec<Box<dyn RenderSystem>>,
    engine: EngineRef,
    camera: Camera,
    controller: CameraController,
    scene: Scene,
}

impl Viewer {
    fn new(
        engine: EngineRef,
        surface: &mut dyn SurfaceProvider,
        config: &EngineConfig,
    ) -> AppResult<Self> {
        let scheduler = FrameScheduler::new(engine.clone(), surface, &config.renderer)?;
        let globals = GlobalFrameResources::new(
            engine.clone(),
            scheduler.frames_in_flight(),
            &config.descriptors,
        )?;

        let scene = demo_scene();
        let materials = MaterialSets::new(&engine, &scene, &config.descriptors)?;

        let camera = Camera::looking_at(Vec3::new(0.0, -1.5, -4.0), Vec3::zeros());
        let controller = CameraController::Arcball(ArcballController::new(Vec3::zeros()));

        Ok(Self {
            scheduler,
            globals,
            materials,
            systems: Vec::new(),
            engine,
            camera,
            controller,
            scene,
        })
    }

    /// Run one tick; returns whether a frame was presented
    fn frame(
        &mut self,
        surface: &mut dyn SurfaceProvider,
        input: &InputState,
        dt: f32,
    ) -> RenderResult<bool> {
        self.controller.update(&mut self.camera, input, dt);
        self.camera.set_perspective_projection(
            FIELD_OF_VIEW_DEGREES.to_radians(),
            self.scheduler.aspect_ratio(),
            NEAR_PLANE,
            FAR_PLANE,
        );

        let Some(command_buffer) = self.scheduler.begin_frame(surface)? else {
            return Ok(false);
        };
        let frame_index = self.scheduler.frame_index();
        self.globals
            .update(frame_index, &GlobalUbo::from_camera(&self.camera))?;

        let context = FrameContext {
            frame_index,
            frame_time: dt,
            command_buffer,
            global_descriptor_set: self.globals.descriptor_set(frame_index),
            camera: &self.camera,
            scene: &self.scene,
        };
        self.scheduler.begin_swapchain_render_pass(command_buffer);
        for system in &mut self.systems {
            system.render(self.engine.as_ref(), &context)?;
        }
        self.scheduler.end_swapchain_render_pass(command_buffer);
        self.scheduler.end_frame(surface)?;
        Ok(true)
    }

    fn shutdown(&self) -> RenderResult<FrameStats> {
        self.scheduler.wait_idle()?;
        let unmaterialized = self
            .scene
            .iter()
            .filter(|object| self.materials.set_for(object.id()).is_none())
            .count();
        log::debug!(
            "Material pool: {} of {} sets live, {unmaterialized} objects without a set",
            self.materials.pool.live_sets(),
            self.materials.pool.max_sets()
        );
        Ok(self.scheduler.stats())
    }
}

/// A small ring of objects with varied materials
fn demo_scene() -> Scene {
    let mut scene = Scene::new();
    for i in 0..8u8 {
        let angle = f32::from(i) * std::f32::consts::TAU / 8.0;
        let object = scene.spawn();
        object.transform.translation = Vec3::new(angle.cos() * 1.5, 0.0, angle.sin() * 1.5);
        object.transform.scale = Vec3::new(0.25, 0.25, 0.25);
        object.transform.rotation.y = angle;
        object.color = Vec3::new(0.8, 0.7, 0.5);
        object.material.albedo = Vec3::new(0.8, 0.7, 0.5);
        object.material.metallic = f32::from(i) / 7.0;
        object.material.roughness = 1.0 - f32::from(i) / 7.0;
    }
    scene
}

fn load_config(options: &Options) -> AppResult<EngineConfig> {
    let config = match &options.config_path {
        Some(path) => {
            log::info!("Loading configuration from {path}");
            EngineConfig::load_validated(path)?
        }
        None => {
            let config = EngineConfig::default();
            config.validate()?;
            config
        }
    };
    Ok(config)
}

fn run_windowed(config: &EngineConfig) -> AppResult<()> {
    let mut window = Window::new(&config.window)?;
    let engine: EngineRef = Arc::new(VulkanEngine::new(&mut window, &config.renderer)?);
    let mut viewer = Viewer::new(engine, &mut window, config)?;

    let mut timer = FrameTimer::new();
    while !window.should_close() {
        window.poll_events();
        let dt = timer.tick();
        let input = window.input().clone();
        viewer.frame(&mut window, &input, dt)?;
        window.end_input_frame();
    }

    let stats = viewer.shutdown()?;
    log::info!(
        "Presented {} frames over {:.1}s ({:.1} fps), {} rebuilds",
        stats.frames_submitted,
        timer.total_time(),
        timer.average_fps(),
        stats.rebuilds
    );
    Ok(())
}

fn run_headless(config: &EngineConfig, frames: u64) -> AppResult<FrameStats> {
    let headless = Arc::new(HeadlessEngine::with_frames_in_flight(
        config.renderer.frames_in_flight,
    ));
    let engine: EngineRef = headless.clone();
    let mut surface = ScriptedSurface::new(config.window.width, config.window.height);
    let mut viewer = Viewer::new(engine, &mut surface, config)?;
    viewer.systems.push(Box::new(ObjectProbeSystem {
        materials: viewer.materials.len(),
    }));

    let dt = 1.0 / 60.0;
    let mut input = InputState::new(config.window.width as f32, config.window.height as f32);
    input.left_button = true;

    for tick in 0..frames {
        match tick % 60 {
            20 => {
                let width = config.window.width / 2 + 1;
                let height = config.window.height / 2 + 1;
                surface.resize(width, height);
                input.viewport = [width as f32, height as f32];
            }
            35 => {
                // Minimize, then restore at the configured size
                surface.resize(0, 0);
                surface.push_extent_on_wait(0, 0);
                surface.push_extent_on_wait(config.window.width, config.window.height);
                input.viewport = [config.window.width as f32, config.window.height as f32];
            }
            45 => headless.push_acquire_result(ScriptedResult::OutOfDate),
            50 => headless.push_present_result(ScriptedResult::Suboptimal),
            _ => {}
        }
        input.mouse_delta = [2.0, if tick % 120 < 60 { 0.5 } else { -0.5 }];
        viewer.frame(&mut surface, &input, dt)?;
    }

    let stats = viewer.shutdown()?;
    let violations = headless.violations();
    if !violations.is_empty() {
        return Err(format!("Frame protocol violations: {violations:?}").into());
    }
    Ok(stats)
}

fn run(options: &Options) -> AppResult<()> {
    let config = load_config(options)?;
    if options.headless {
        let frames = options.frames.unwrap_or(DEFAULT_HEADLESS_FRAMES);
        log::info!("Running {frames} headless frames");
        let stats = run_headless(&config, frames)?;
        println!(
            "frames begun: {}, submitted: {}, skipped ticks: {}, rebuilds: {}",
            stats.frames_begun, stats.frames_submitted, stats.skipped_ticks, stats.rebuilds
        );
        Ok(())
    } else {
        run_windowed(&config)
    }
}

fn main() {
    logging::init();

    let options = Options::parse();
    if let Err(e) = run(&options) {
        log::error!("Viewer failed: {e}");
        std::process::exit(1);
    }
    log::info!("Viewer exited cleanly");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_options() {
        let options =
            Options::try_parse_from(["viewer", "--headless", "--frames", "5", "--config", "a.toml"])
                .unwrap();
        assert!(options.headless);
        assert_eq!(options.frames, Some(5));
        assert_eq!(options.config_path.as_deref(), Some("a.toml"));
    }

    #[test]
    fn test_frames_requires_headless() {
        assert!(Options::try_parse_from(["viewer", "--frames", "5"]).is_err());
        assert!(Options::try_parse_from(["viewer", "--headless", "--frames", "many"]).is_err());
    }

    #[test]
    fn test_headless_run_with_three_frames_in_flight() {
        let mut config = EngineConfig::default();
        config.renderer.frames_in_flight = 3;
        config.validate().unwrap();

        let stats = run_headless(&config, 120).unwrap();
        assert!(stats.frames_submitted > 100);
        assert!(stats.rebuilds >= 2);
    }
}
