use {
    crate::{allocator::Allocator, Buffer, DeletionQueue, Device, ShaderLayout},
    anyhow::{anyhow, Result},
    ash::vk,
    gpu_allocator::MemoryLocation,
    kestrel_core::Error,
    std::sync::Arc,
};

const POOL_MAX_SETS: u32 = 512;
const POOL_SIZES: [(vk::DescriptorType, u32); 4] = [
    (vk::DescriptorType::UNIFORM_BUFFER, 1024),
    (vk::DescriptorType::STORAGE_BUFFER, 256),
    (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1024),
    (vk::DescriptorType::STORAGE_IMAGE, 64),
];

/// Growable list of descriptor pools, recycled wholesale each frame.
pub struct FrameDescriptors {
    device: Device,
    pools: Vec<vk::DescriptorPool>,
}

impl FrameDescriptors {
    pub fn new(device: &Device) -> Result<Self> {
        let mut ret = Self {
            device: device.clone(),
            pools: Vec::new(),
        };
        ret.grow()?;
        Ok(ret)
    }

    fn grow(&mut self) -> Result<()> {
        let sizes: Vec<vk::DescriptorPoolSize> = POOL_SIZES
            .iter()
            .map(|(ty, count)| vk::DescriptorPoolSize {
                ty: *ty,
                descriptor_count: *count,
            })
            .collect();
        let info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&sizes)
            .max_sets(POOL_MAX_SETS);
        let pool = unsafe { self.device.handle().create_descriptor_pool(&info, None) }?;
        self.pools.push(pool);
        Ok(())
    }

    /// Allocates from the tail pool, growing when it is exhausted.
    pub fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        for attempt in 0..2 {
            let pool = *self.pools.last().expect("at least one pool");
            let info = vk::DescriptorSetAllocateInfo::default()
                .descriptor_pool(pool)
                .set_layouts(&layouts);
            match unsafe { self.device.handle().allocate_descriptor_sets(&info) } {
                Ok(sets) => return Ok(sets[0]),
                Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY)
                | Err(vk::Result::ERROR_FRAGMENTED_POOL)
                    if attempt == 0 =>
                {
                    self.grow()?;
                }
                Err(e) => {
                    return Err(anyhow!(Error::AllocFailed(format!(
                        "descriptor set allocation failed: {e}"
                    ))))
                }
            }
        }
        Err(anyhow!(Error::AllocFailed("descriptor pool exhausted after growth".into())))
    }

    /// Called at the start of the frame, once its fence has signaled.
    pub fn reset_all(&mut self) -> Result<()> {
        for pool in &self.pools {
            unsafe {
                self.device
                    .handle()
                    .reset_descriptor_pool(*pool, vk::DescriptorPoolResetFlags::empty())?
            };
        }
        Ok(())
    }

    /// Only valid at teardown after a full device wait.
    pub fn destroy(&mut self) {
        for pool in self.pools.drain(..) {
            unsafe { self.device.handle().destroy_descriptor_pool(pool, None) };
        }
    }
}

/// Host-visible scratch allocations, alive for exactly one frame.
pub struct ScratchBuffers {
    device: Device,
    allocator: Arc<Allocator>,
    deletion: Arc<DeletionQueue>,
    buffers: Vec<Buffer>,
}

impl ScratchBuffers {
    pub fn new(device: &Device, allocator: &Arc<Allocator>, deletion: &Arc<DeletionQueue>) -> Self {
        Self {
            device: device.clone(),
            allocator: Arc::clone(allocator),
            deletion: Arc::clone(deletion),
            buffers: Vec::new(),
        }
    }

    /// Returns a fresh host-visible buffer of at least `size` bytes.
    pub fn allocate(&mut self, size: u64, usage: vk::BufferUsageFlags) -> Result<&Buffer> {
        let buffer = Buffer::new(
            &self.device,
            &self.allocator,
            &self.deletion,
            size.max(16),
            usage,
            MemoryLocation::CpuToGpu,
            "scratch",
        )?;
        self.buffers.push(buffer);
        Ok(self.buffers.last().expect("just pushed"))
    }

    /// Cleared at frame start; the dropped buffers release through the
    /// deletion queue.
    pub fn reset(&mut self) { self.buffers.clear(); }
}

/// Per-frame descriptor + scratch state, one instance per in-flight frame.
pub struct FrameResources {
    pub descriptors: FrameDescriptors,
    pub scratch: ScratchBuffers,
}

impl FrameResources {
    pub fn new(device: &Device, allocator: &Arc<Allocator>, deletion: &Arc<DeletionQueue>) -> Result<Self> {
        Ok(Self {
            descriptors: FrameDescriptors::new(device)?,
            scratch: ScratchBuffers::new(device, allocator, deletion),
        })
    }

    pub fn reset(&mut self) -> Result<()> {
        self.descriptors.reset_all()?;
        self.scratch.reset();
        Ok(())
    }
}

/// Per-draw descriptor writer.
///
/// Owns one descriptor set per reflected set layout, allocated and written
/// lazily; `bind` binds only the sets that were written.
pub struct ShaderInput<'a> {
    device: Device,
    layout: &'a ShaderLayout,
    set_layouts: &'a [vk::DescriptorSetLayout],
    sets: Vec<Option<vk::DescriptorSet>>,
}

impl<'a> ShaderInput<'a> {
    pub fn new(
        device: &Device,
        layout: &'a ShaderLayout,
        set_layouts: &'a [vk::DescriptorSetLayout],
    ) -> Self {
        Self {
            device: device.clone(),
            layout,
            set_layouts,
            sets: vec![None; set_layouts.len()],
        }
    }

    fn set(&mut self, frame: &mut FrameResources, set: u32) -> Result<vk::DescriptorSet> {
        let slot = self
            .sets
            .get_mut(set as usize)
            .ok_or_else(|| anyhow!(Error::PipelineBuild(format!("shader has no set {set}"))))?;
        if let Some(existing) = slot {
            return Ok(*existing);
        }
        let allocated = frame.descriptors.allocate(self.set_layouts[set as usize])?;
        *slot = Some(allocated);
        Ok(allocated)
    }

    /// Copies `data` into a scratch buffer and points the binding at it.
    pub fn write(
        &mut self,
        frame: &mut FrameResources,
        set: u32,
        binding: u32,
        data: &[u8],
    ) -> Result<()> {
        let info = *self.layout.binding(set, binding).ok_or_else(|| {
            anyhow!(Error::PipelineBuild(format!("shader has no binding (set {set}, binding {binding})")))
        })?;
        let usage = match info.ty {
            vk::DescriptorType::UNIFORM_BUFFER => vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER => vk::BufferUsageFlags::STORAGE_BUFFER,
            other => {
                return Err(anyhow!(Error::PipelineBuild(format!(
                    "binding (set {set}, binding {binding}) is {other:?}, not a buffer"
                ))))
            }
        };
        let descriptor_set = self.set(frame, set)?;
        let buffer = frame.scratch.allocate(data.len() as u64, usage)?;
        buffer.write(0, data)?;

        let buffer_info = [vk::DescriptorBufferInfo::default()
            .buffer(buffer.handle())
            .offset(0)
            .range(data.len().max(16) as u64)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(binding)
            .descriptor_type(info.ty)
            .buffer_info(&buffer_info);
        unsafe { self.device.handle().update_descriptor_sets(&[write], &[]) };
        Ok(())
    }

    /// Writes a combined image sampler descriptor.
    pub fn update(
        &mut self,
        frame: &mut FrameResources,
        set: u32,
        binding: u32,
        view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Result<()> {
        let descriptor_set = self.set(frame, set)?;
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(view)
            .sampler(sampler)
            .image_layout(layout)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(descriptor_set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { self.device.handle().update_descriptor_sets(&[write], &[]) };
        Ok(())
    }

    /// Binds the sets that were written, leaving untouched set numbers alone.
    pub fn bind(&self, cmd: &crate::CommandBuffer, pipeline_layout: vk::PipelineLayout) {
        for (index, set) in self.sets.iter().enumerate() {
            if let Some(set) = set {
                cmd.bind_descriptor_sets(pipeline_layout, index as u32, &[*set]);
            }
        }
    }
}
