//! End-to-end frame loop scenarios on the headless engine

use std::sync::Arc;

use ash::vk;
use frame_engine::config::RendererConfig;
use frame_engine::platform::SurfaceProvider;
use frame_engine::render::backends::headless::{
    EngineEvent, HeadlessEngine, ObjectKind, RecordedCommand, ScriptedResult, ScriptedSurface,
};
use frame_engine::render::{
    AcquireOutcome, EngineRef, FrameContext, FrameScheduler, PresentationEngine, Rebuild,
    RenderError, RenderResult, RenderSystem, MAX_FRAMES_IN_FLIGHT,
};
use frame_engine::scene::{Camera, Scene};

fn setup(width: u32, height: u32) -> (Arc<HeadlessEngine>, ScriptedSurface, FrameScheduler) {
    frame_engine::foundation::logging::init_for_tests();
    let headless = Arc::new(HeadlessEngine::new());
    let mut surface = ScriptedSurface::new(width, height);
    let engine: EngineRef = headless.clone();
    let scheduler = FrameScheduler::new(engine, &mut surface, &RendererConfig::default())
        .expect("scheduler");
    (headless, surface, scheduler)
}

/// One application tick: clear, draw a triangle, present. Returns the slot
/// used, or `None` when the tick was skipped.
fn tick(scheduler: &mut FrameScheduler, surface: &mut ScriptedSurface) -> Option<usize> {
    let command_buffer = scheduler.begin_frame(surface).expect("begin_frame")?;
    let slot = scheduler.frame_index();
    scheduler.begin_swapchain_render_pass(command_buffer);
    scheduler.engine().cmd_draw(command_buffer, 3, 1, 0, 0);
    scheduler.end_swapchain_render_pass(command_buffer);
    scheduler.end_frame(surface).expect("end_frame");
    Some(slot)
}

fn submits(events: &[EngineEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Submit { .. }))
        .count()
}

#[test]
fn test_ten_frames_cycle_slots() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);

    let slots: Vec<usize> = (0..10)
        .map(|_| tick(&mut scheduler, &mut surface).expect("frame"))
        .collect();
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);

    // Every fence wait leaves at most one other frame in flight
    for event in headless.events() {
        if let EngineEvent::FenceWait { pending, .. } = event {
            assert!(pending < MAX_FRAMES_IN_FLIGHT);
        }
    }
    assert!(headless.pending_submissions() <= MAX_FRAMES_IN_FLIGHT);
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
    assert_eq!(scheduler.stats().frames_submitted, 10);
    assert_eq!(scheduler.stats().rebuilds, 0);
}

#[test]
fn test_three_frames_in_flight_cycle_without_violations() {
    let headless = Arc::new(HeadlessEngine::with_frames_in_flight(3));
    let mut surface = ScriptedSurface::new(800, 600);
    let engine: EngineRef = headless.clone();
    let config = RendererConfig {
        frames_in_flight: 3,
        ..RendererConfig::default()
    };
    let mut scheduler = FrameScheduler::new(engine, &mut surface, &config).expect("scheduler");
    assert_eq!(scheduler.frames_in_flight(), 3);

    let slots: Vec<usize> = (0..7)
        .map(|_| tick(&mut scheduler, &mut surface).expect("frame"))
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);

    let max_pending = headless
        .events()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Submit { pending, .. } => Some(*pending),
            _ => None,
        })
        .max();
    assert_eq!(max_pending, Some(3));
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_minimize_blocks_until_restored() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    for _ in 0..3 {
        tick(&mut scheduler, &mut surface).expect("frame");
    }

    let command_buffer = scheduler
        .begin_frame(&mut surface)
        .unwrap()
        .expect("frame");
    scheduler.engine().cmd_draw(command_buffer, 3, 1, 0, 0);
    surface.resize(0, 0);
    surface.push_extent_on_wait(0, 0);
    surface.push_extent_on_wait(0, 0);
    surface.push_extent_on_wait(640, 480);
    headless.clear_events();
    scheduler.end_frame(&mut surface).unwrap();

    // The in-progress frame is submitted, then nothing until the rebuild
    let events = headless.events();
    let rebuilt = events
        .iter()
        .position(|e| matches!(e, EngineEvent::SwapchainCreated { extent, .. } if extent.width == 640))
        .expect("rebuild at restored extent");
    assert_eq!(submits(&events[..rebuilt]), 1);
    assert_eq!(surface.wait_count(), 3);

    for _ in 0..4 {
        tick(&mut scheduler, &mut surface).expect("frame");
    }
    assert_eq!(
        scheduler.extent(),
        vk::Extent2D {
            width: 640,
            height: 480
        }
    );
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_closing_while_minimized_skips_ticks() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    tick(&mut scheduler, &mut surface).expect("frame");

    // Minimized with no further events: the surface gives up waiting
    surface.resize(0, 0);
    headless.push_acquire_result(ScriptedResult::OutOfDate);
    headless.clear_events();

    assert_eq!(tick(&mut scheduler, &mut surface), None);
    assert!(scheduler.is_rebuild_pending());
    assert_eq!(tick(&mut scheduler, &mut surface), None);
    assert_eq!(submits(&headless.events()), 0);
    assert_eq!(scheduler.stats().skipped_ticks, 2);

    // Restored before the close went through
    surface.set_closing(false);
    surface.resize(640, 480);
    assert!(tick(&mut scheduler, &mut surface).is_some());
    assert!(!scheduler.is_rebuild_pending());
    assert_eq!(scheduler.extent().width, 640);
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_out_of_date_on_fifth_tick() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);

    let mut drawn = Vec::new();
    for tick_number in 1..=10 {
        if tick_number == 5 {
            headless.push_acquire_result(ScriptedResult::OutOfDate);
            headless.clear_events();
        }
        let frame = tick(&mut scheduler, &mut surface);
        if tick_number == 5 {
            assert_eq!(frame, None);
            let events = headless.events();
            // Nothing recorded and nothing submitted on the stale tick
            assert!(!events
                .iter()
                .any(|e| matches!(e, EngineEvent::CommandBufferBegin { .. })));
            assert_eq!(submits(&events), 0);
            // The rebuild already happened before tick 6 acquires
            assert!(events
                .iter()
                .any(|e| matches!(e, EngineEvent::SwapchainCreated { .. })));
        }
        drawn.push(frame.is_some());
    }

    assert_eq!(drawn.iter().filter(|&&d| d).count(), 9);
    let stats = scheduler.stats();
    assert_eq!(stats.rebuilds, 1);
    assert_eq!(stats.skipped_ticks, 1);
    assert_eq!(stats.frames_submitted, 9);
    assert_eq!(scheduler.swapchains().generation(), 1);
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_every_out_of_date_is_followed_by_one_rebuild() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    headless.clear_events();

    for tick_number in 0..12 {
        if tick_number % 4 == 1 {
            headless.push_acquire_result(ScriptedResult::OutOfDate);
        }
        if tick_number == 6 {
            headless.push_acquire_result(ScriptedResult::OutOfDate);
            headless.push_acquire_result(ScriptedResult::OutOfDate);
        }
        tick(&mut scheduler, &mut surface);
    }

    let events = headless.events();
    let mut stale_acquires = 0;
    for (i, event) in events.iter().enumerate() {
        let EngineEvent::Acquire {
            outcome: AcquireOutcome::OutOfDate,
            ..
        } = event
        else {
            continue;
        };
        stale_acquires += 1;
        let next_acquire = events[i + 1..]
            .iter()
            .position(|e| matches!(e, EngineEvent::Acquire { .. }))
            .map_or(events.len(), |offset| i + 1 + offset);
        let rebuilds = events[i + 1..next_acquire]
            .iter()
            .filter(|e| matches!(e, EngineEvent::SwapchainCreated { .. }))
            .count();
        assert_eq!(rebuilds, 1, "after stale acquire at event {i}");
    }
    assert_eq!(stale_acquires, 5);
    assert_eq!(scheduler.stats().rebuilds, 5);
}

#[test]
fn test_no_dual_use_under_churn() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);

    for tick_number in 0..60u32 {
        match tick_number % 7 {
            2 => headless.push_acquire_result(ScriptedResult::Suboptimal),
            4 => headless.push_present_result(ScriptedResult::Suboptimal),
            5 => headless.push_acquire_result(ScriptedResult::OutOfDate),
            _ => {}
        }
        if tick_number % 11 == 3 {
            surface.resize(800 + tick_number, 600 - tick_number);
        }
        if tick_number == 30 {
            headless.set_image_count_range(3, 0);
        }
        tick(&mut scheduler, &mut surface);
        assert!(headless.pending_submissions() <= MAX_FRAMES_IN_FLIGHT);
    }

    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
    assert_eq!(headless.live_count(ObjectKind::Swapchain), 1);
    assert_eq!(
        headless.live_count(ObjectKind::CommandBuffer),
        MAX_FRAMES_IN_FLIGHT
    );
}

#[test]
fn test_rebuild_twice_with_same_extent() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    tick(&mut scheduler, &mut surface).expect("frame");

    for generation in 1..=2 {
        let rebuild = scheduler.recreate_swapchain(&mut surface).unwrap();
        assert_eq!(
            rebuild,
            Rebuild::Rebuilt {
                image_count_changed: false
            }
        );
        assert_eq!(scheduler.swapchains().generation(), generation);
        // Each chain acquires and presents on its own
        tick(&mut scheduler, &mut surface).expect("frame");
        tick(&mut scheduler, &mut surface).expect("frame");
    }

    assert_eq!(headless.live_count(ObjectKind::Swapchain), 1);
    assert_eq!(
        headless.live_count(ObjectKind::Framebuffer),
        scheduler.image_count()
    );
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_startup_waits_for_a_usable_extent() {
    frame_engine::foundation::logging::init_for_tests();
    let headless = Arc::new(HeadlessEngine::new());
    let mut surface = ScriptedSurface::new(0, 0);
    surface.push_extent_on_wait(1280, 720);

    let engine: EngineRef = headless.clone();
    let scheduler = FrameScheduler::new(engine, &mut surface, &RendererConfig::default()).unwrap();
    assert_eq!(surface.wait_count(), 1);
    assert_eq!(scheduler.extent().width, 1280);
    assert!(!surface.was_resized());
}

#[test]
fn test_startup_on_closed_minimized_surface_fails() {
    let headless = Arc::new(HeadlessEngine::new());
    let mut surface = ScriptedSurface::new(0, 0);

    let engine: EngineRef = headless.clone();
    let result = FrameScheduler::new(engine, &mut surface, &RendererConfig::default());
    assert!(matches!(result, Err(RenderError::InitializationFailed(_))));
    assert_eq!(headless.live_count(ObjectKind::Swapchain), 0);
}

#[test]
fn test_depth_format_change_is_caught_before_drawing() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    tick(&mut scheduler, &mut surface).expect("frame");
    let live_chain = scheduler.swapchains().swapchain().handle();

    headless.set_depth_formats(vec![vk::Format::D24_UNORM_S8_UINT]);
    headless.clear_events();

    let result = scheduler.recreate_swapchain(&mut surface);
    assert!(matches!(
        result,
        Err(RenderError::FormatMismatch {
            old_depth: vk::Format::D32_SFLOAT,
            new_depth: vk::Format::D24_UNORM_S8_UINT,
            ..
        })
    ));

    let events = headless.events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, EngineEvent::CommandBufferBegin { .. } | EngineEvent::Submit { .. })));
    assert_eq!(scheduler.swapchains().swapchain().handle(), live_chain);
    assert_eq!(headless.live_count(ObjectKind::Swapchain), 1);
}

#[test]
fn test_shutdown_releases_every_object() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    for _ in 0..5 {
        tick(&mut scheduler, &mut surface).expect("frame");
    }
    drop(scheduler);

    assert_eq!(headless.live_total(), 0);
    assert_eq!(headless.pending_submissions(), 0);
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

/// Draws one instance per scene object
struct InstancedSystem {
    frames_seen: Vec<usize>,
}

impl RenderSystem for InstancedSystem {
    fn render(
        &mut self,
        engine: &dyn PresentationEngine,
        frame: &FrameContext<'_>,
    ) -> RenderResult<()> {
        self.frames_seen.push(frame.frame_index);
        let instances = u32::try_from(frame.scene.len()).unwrap();
        engine.cmd_draw(frame.command_buffer, 3, instances, 0, 0);
        Ok(())
    }
}

#[test]
fn test_render_system_records_inside_the_pass() {
    let (headless, mut surface, mut scheduler) = setup(800, 600);
    let camera = Camera::new();
    let mut scene = Scene::new();
    for _ in 0..3 {
        scene.spawn();
    }
    let mut system = InstancedSystem {
        frames_seen: Vec::new(),
    };

    for _ in 0..3 {
        let command_buffer = scheduler.begin_frame(&mut surface).unwrap().unwrap();
        let frame = FrameContext {
            frame_index: scheduler.frame_index(),
            frame_time: 1.0 / 60.0,
            command_buffer,
            global_descriptor_set: vk::DescriptorSet::null(),
            camera: &camera,
            scene: &scene,
        };
        scheduler.begin_swapchain_render_pass(command_buffer);
        system.render(scheduler.engine().as_ref(), &frame).unwrap();
        scheduler.end_swapchain_render_pass(command_buffer);
        scheduler.end_frame(&mut surface).unwrap();

        let commands = headless.recorded_commands(command_buffer);
        assert!(matches!(commands.first(), Some(RecordedCommand::BeginRenderPass(_))));
        assert_eq!(commands.last(), Some(&RecordedCommand::EndRenderPass));
        assert!(commands.contains(&RecordedCommand::Draw {
            vertex_count: 3,
            instance_count: 3
        }));
    }
    assert_eq!(system.frames_seen, vec![0, 1, 0]);
}
