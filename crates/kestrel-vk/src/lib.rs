pub mod allocator;
pub mod buffer;
pub mod command;
pub mod deletion;
pub mod descriptor;
pub mod device;
pub mod gpu;
pub mod image;
pub mod instance;
pub mod pipeline;
pub mod reflect;
pub mod sampler;
pub mod swapchain;
pub mod sync;

/// Unbounded fence waits: frame pacing is bounded by the present mode, and
/// device loss is surfaced by the driver, not by a timeout.
pub(crate) const FENCE_TIMEOUT_NS: u64 = u64::MAX;

#[macro_export]
macro_rules! acquire {
    ($lock:expr) => {
        $lock.lock().unwrap_or_else(|_| panic!("Failed to acquire lock"))
    };
}

pub use {
    crate::{
        allocator::Allocator,
        buffer::Buffer,
        command::{CommandBuffer, CommandPool},
        deletion::DeletionQueue,
        descriptor::{FrameDescriptors, FrameResources, ScratchBuffers, ShaderInput},
        device::{Device, QueueFamily},
        gpu::{DeviceConfig, Gpu, ImageWrite},
        image::{Image, ImageInfo, Texture},
        instance::Instance,
        pipeline::{PipelineCache, PipelineHandle, PipelineState, VertexLayout},
        reflect::{BindingInfo, ShaderLayout},
        sampler::{SamplerCache, SamplerDesc},
        swapchain::{AcquiredImage, ColorSpace, Surface, Swapchain, Vsync},
    },
    ash::vk,
    gpu_allocator::MemoryLocation,
};

#[cfg(feature = "gpu-tests")]
pub mod test {
    use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

    static TEST_GPU: LazyLock<Arc<Mutex<crate::gpu::Gpu>>> = LazyLock::new(|| {
        Arc::new(Mutex::new(
            crate::gpu::Gpu::headless(&crate::gpu::DeviceConfig::default())
                .expect("Error creating test GPU"),
        ))
    });

    pub fn test_gpu() -> MutexGuard<'static, crate::gpu::Gpu> {
        match TEST_GPU.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                eprintln!("Test GPU mutex was poisoned, recovering...");
                poisoned.into_inner()
            }
        }
    }
}
