//! Host-visible uniform buffers

use std::marker::PhantomData;
use std::mem;

use ash::vk;
use bytemuck::Pod;

use crate::render::engine::EngineRef;
use crate::render::error::RenderResult;

/// Uniform buffer holding one `T`
///
/// Memory stays host-visible and coherent, so writes need no explicit flush.
pub struct UniformBuffer<T: Pod> {
    engine: EngineRef,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Allocate a buffer sized for `T`
    pub fn new(engine: EngineRef) -> RenderResult<Self> {
        let size = mem::size_of::<T>() as vk::DeviceSize;
        let (buffer, memory) = engine.create_buffer(size, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
        log::debug!("Created uniform buffer of {size} bytes");
        Ok(Self {
            engine,
            buffer,
            memory,
            _marker: PhantomData,
        })
    }

    /// Upload `value`
    pub fn write(&self, value: &T) -> RenderResult<()> {
        self.engine
            .write_buffer(self.memory, 0, bytemuck::bytes_of(value))
    }

    /// Descriptor covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: mem::size_of::<T>() as vk::DeviceSize,
        }
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the backing memory handle
    pub fn memory(&self) -> vk::DeviceMemory {
        self.memory
    }
}

impl<T: Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        self.engine.destroy_buffer(self.buffer, self.memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessEngine, ObjectKind};
    use crate::render::ubo::MaterialUbo;
    use std::sync::Arc;

    #[test]
    fn test_write_reaches_memory() {
        let headless = Arc::new(HeadlessEngine::new());
        let buffer = UniformBuffer::<MaterialUbo>::new(headless.clone()).unwrap();
        let material = MaterialUbo {
            metallic: 0.25,
            ..MaterialUbo::default()
        };
        buffer.write(&material).unwrap();

        let contents = headless.buffer_contents(buffer.memory());
        assert_eq!(contents, bytemuck::bytes_of(&material));
        assert_eq!(buffer.descriptor_info().range, 32);

        drop(buffer);
        assert_eq!(headless.live_count(ObjectKind::Buffer), 0);
    }
}
