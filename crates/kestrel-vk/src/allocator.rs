use {
    crate::{acquire, Device, Instance},
    anyhow::{anyhow, Result},
    ash::vk::{Buffer as VkBuffer, Image as VkImage, MemoryRequirements},
    derive_more::Debug,
    gpu_allocator::{
        vulkan::{
            Allocation, AllocationCreateDesc, AllocationScheme, Allocator as GpuAllocator,
            AllocatorCreateDesc,
        },
        AllocationSizes, AllocatorDebugSettings, MemoryLocation,
    },
    kestrel_core::Error,
    std::sync::Mutex,
};

/// Block allocator for GPU buffers and images.
#[derive(Debug)]
pub struct Allocator {
    #[debug(skip)]
    inner: Mutex<GpuAllocator>,
    device: Device,
}

impl Allocator {
    pub fn new(instance: &Instance, device: &Device) -> Result<Self> {
        let allocator = GpuAllocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            physical_device: device.physical_device(),
            device: device.handle().clone(),
            buffer_device_address: false,
            debug_settings: AllocatorDebugSettings::default(),
            allocation_sizes: AllocationSizes::default(),
        })?;

        Ok(Self {
            inner: Mutex::new(allocator),
            device: device.clone(),
        })
    }

    pub(crate) fn allocate_buffer(
        &self,
        buffer: VkBuffer,
        requirements: MemoryRequirements,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Allocation> {
        let allocation = acquire!(self.inner)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| anyhow!(Error::AllocFailed(format!("buffer {name:?}: {e}"))))?;

        unsafe {
            self.device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        }?;

        Ok(allocation)
    }

    pub(crate) fn allocate_image(
        &self,
        image: VkImage,
        requirements: MemoryRequirements,
        name: &str,
    ) -> Result<Allocation> {
        let allocation = acquire!(self.inner)
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| anyhow!(Error::AllocFailed(format!("image {name:?}: {e}"))))?;

        unsafe {
            self.device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        }?;

        Ok(allocation)
    }

    pub(crate) fn deallocate(&self, allocation: Allocation) {
        if let Err(e) = acquire!(self.inner).free(allocation) {
            log::error!("Failed to free allocation: {e}");
        }
    }
}
