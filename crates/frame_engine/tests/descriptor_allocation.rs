//! Descriptor pools, layouts and writers against the headless engine

use std::sync::Arc;

use ash::vk;
use frame_engine::config::{DescriptorConfig, RendererConfig};
use frame_engine::render::backends::headless::{HeadlessEngine, ObjectKind, ScriptedSurface};
use frame_engine::render::descriptors::{
    DescriptorPoolBuilder, DescriptorSetLayoutBuilder, DescriptorWriter,
};
use frame_engine::render::engine::DescriptorResources;
use frame_engine::render::{
    EngineRef, FrameScheduler, GlobalFrameResources, GlobalUbo, MaterialUbo, UniformBuffer,
};

fn engine() -> (Arc<HeadlessEngine>, EngineRef) {
    frame_engine::foundation::logging::init_for_tests();
    let headless = Arc::new(HeadlessEngine::new());
    let engine: EngineRef = headless.clone();
    (headless, engine)
}

fn written_buffer(headless: &HeadlessEngine, set: vk::DescriptorSet) -> vk::Buffer {
    let writes = headless.descriptor_writes(set);
    assert_eq!(writes.len(), 1);
    match &writes[0].resources {
        DescriptorResources::Buffers(infos) => infos[0].buffer,
        DescriptorResources::Images(_) => panic!("expected a buffer write"),
    }
}

#[test]
fn test_fifth_set_fails_and_first_four_survive() {
    let (headless, engine) = engine();
    let layout = DescriptorSetLayoutBuilder::new(engine.clone())
        .add_uniform_buffer(0, vk::ShaderStageFlags::FRAGMENT)
        .build()
        .unwrap();
    let mut pool = DescriptorPoolBuilder::new(engine.clone())
        .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 8)
        .set_max_sets(4)
        .build()
        .unwrap();

    let buffers: Vec<UniformBuffer<MaterialUbo>> = (0..5)
        .map(|_| UniformBuffer::new(engine.clone()).unwrap())
        .collect();
    let sets: Vec<vk::DescriptorSet> = buffers[..4]
        .iter()
        .map(|buffer| {
            DescriptorWriter::new(&layout, &mut pool)
                .write_buffer(0, buffer.descriptor_info())
                .build()
                .expect("within capacity")
        })
        .collect();

    let fifth = DescriptorWriter::new(&layout, &mut pool)
        .write_buffer(0, buffers[4].descriptor_info())
        .build();
    assert!(fifth.is_none());
    assert_eq!(pool.live_sets(), 4);

    for (set, buffer) in sets.iter().zip(&buffers) {
        assert_eq!(written_buffer(&headless, *set), buffer.handle());
    }
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}

#[test]
fn test_capacity_holds_even_when_driver_would_allow_more() {
    let (headless, engine) = engine();
    headless.set_lenient_descriptor_pools(true);

    let layout = DescriptorSetLayoutBuilder::new(engine.clone())
        .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
        .add_combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT)
        .build()
        .unwrap();
    let mut pool = DescriptorPoolBuilder::new(engine)
        .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 10)
        .add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 2)
        .set_max_sets(10)
        .build()
        .unwrap();

    // The sampler quota runs out before the set count does
    assert!(pool.allocate(&layout).is_some());
    assert!(pool.allocate(&layout).is_some());
    assert!(pool.allocate(&layout).is_none());
    assert_eq!(pool.usage(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), 2);
    assert_eq!(pool.usage(vk::DescriptorType::UNIFORM_BUFFER), 2);
}

#[test]
fn test_reset_reclaims_whole_pool() {
    let (headless, engine) = engine();
    let layout = DescriptorSetLayoutBuilder::new(engine.clone())
        .add_uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
        .build()
        .unwrap();
    let mut pool = DescriptorPoolBuilder::new(engine)
        .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2)
        .set_max_sets(2)
        .build()
        .unwrap();

    assert!(pool.allocate(&layout).is_some());
    assert!(pool.allocate(&layout).is_some());
    assert!(pool.allocate(&layout).is_none());

    pool.reset().unwrap();
    assert_eq!(pool.live_sets(), 0);
    assert!(pool.allocate(&layout).is_some());

    drop(pool);
    drop(layout);
    assert_eq!(headless.live_count(ObjectKind::DescriptorPool), 0);
    assert_eq!(headless.live_count(ObjectKind::DescriptorSetLayout), 0);
}

#[test]
fn test_global_sets_follow_frame_slots() {
    let (headless, engine) = engine();
    let mut surface = ScriptedSurface::new(800, 600);
    let config = RendererConfig::default();
    let mut scheduler = FrameScheduler::new(engine.clone(), &mut surface, &config).unwrap();
    let globals = GlobalFrameResources::new(
        engine,
        scheduler.frames_in_flight(),
        &DescriptorConfig::default(),
    )
    .unwrap();
    assert_eq!(globals.pool().live_sets(), 2);

    let mut written = Vec::new();
    for tick in 0..4u8 {
        let command_buffer = scheduler.begin_frame(&mut surface).unwrap().unwrap();
        let index = scheduler.frame_index();
        let ubo = GlobalUbo {
            light_color: [f32::from(tick), 0.0, 0.0, 1.0],
            ..GlobalUbo::default()
        };
        globals.update(index, &ubo).unwrap();
        written.push((index, ubo));

        scheduler.begin_swapchain_render_pass(command_buffer);
        scheduler.end_swapchain_render_pass(command_buffer);
        scheduler.end_frame(&mut surface).unwrap();
    }

    // Each slot's buffer holds the last block written for that slot
    for (index, ubo) in &written[2..] {
        let buffer = globals.buffer(*index);
        assert_eq!(
            written_buffer(&headless, globals.descriptor_set(*index)),
            buffer.handle()
        );
        assert_eq!(
            headless.buffer_contents(buffer.memory()),
            bytemuck::bytes_of(ubo)
        );
    }
    assert_ne!(globals.descriptor_set(0), globals.descriptor_set(1));
    assert!(headless.violations().is_empty(), "{:?}", headless.violations());
}
