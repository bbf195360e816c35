use {
    crate::{allocator::Allocator, DeletionQueue, Device},
    anyhow::{anyhow, Result},
    ash::vk::{self, Handle},
    bytemuck::Pod,
    derive_more::Debug,
    gpu_allocator::{vulkan::Allocation, MemoryLocation},
    kestrel_core::Error,
    std::sync::Arc,
};

/// GPU buffer whose destructor defers release until its in-flight frames
/// have completed.
#[derive(Debug)]
pub struct Buffer {
    name: String,
    #[debug("{:#x}", handle.as_raw())]
    handle: vk::Buffer,
    #[debug(skip)]
    allocation: Option<Allocation>,
    size: u64,
    usage: vk::BufferUsageFlags,
    location: MemoryLocation,
    #[debug(skip)]
    device: Device,
    #[debug(skip)]
    allocator: Arc<Allocator>,
    #[debug(skip)]
    deletion: Arc<DeletionQueue>,
}

impl Buffer {
    pub fn new(
        device: &Device,
        allocator: &Arc<Allocator>,
        deletion: &Arc<DeletionQueue>,
        size: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
        name: &str,
    ) -> Result<Self> {
        let create_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let handle = unsafe { device.handle().create_buffer(&create_info, None) }?;
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(handle) };
        let allocation = allocator.allocate_buffer(handle, requirements, location, name)?;

        let buffer = Self {
            name: name.to_string(),
            handle,
            allocation: Some(allocation),
            size,
            usage,
            location,
            device: device.clone(),
            allocator: Arc::clone(allocator),
            deletion: Arc::clone(deletion),
        };
        log::trace!("Created {buffer:?}");
        Ok(buffer)
    }

    pub fn handle(&self) -> vk::Buffer { self.handle }

    pub fn size(&self) -> u64 { self.size }

    pub fn usage(&self) -> vk::BufferUsageFlags { self.usage }

    pub fn name(&self) -> &str { &self.name }

    pub fn is_host_visible(&self) -> bool {
        matches!(self.location, MemoryLocation::CpuToGpu | MemoryLocation::GpuToCpu)
    }

    /// Copies `data` into a mapped (host-visible) buffer at a byte offset.
    pub fn write<T: Pod>(&self, offset: u64, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let end = offset + bytes.len() as u64;
        if end > self.size {
            return Err(anyhow!(Error::AllocFailed(format!(
                "write of {end} bytes overflows buffer {:?} ({} bytes)",
                self.name, self.size
            ))));
        }
        let allocation = self.allocation.as_ref().expect("buffer already released");
        let mapped = allocation
            .mapped_ptr()
            .ok_or_else(|| anyhow!(Error::AllocFailed(format!("buffer {:?} is not host visible", self.name))))?;

        unsafe {
            let dst = (mapped.as_ptr() as *mut u8).add(offset as usize);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }

        Ok(())
    }

    pub fn write_all<T: Pod>(&self, data: &[T]) -> Result<()> { self.write(0, data) }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let handle = self.handle;
        let allocation = self.allocation.take();
        let device = self.device.clone();
        let allocator = Arc::clone(&self.allocator);
        self.deletion.push(move || {
            unsafe { device.handle().destroy_buffer(handle, None) };
            if let Some(allocation) = allocation {
                allocator.deallocate(allocation);
            }
        });
    }
}
