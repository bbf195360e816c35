use {
    crate::{
        allocator::Allocator, sync, Buffer, CommandBuffer, CommandPool, DeletionQueue, Device,
        Image, ImageInfo, Instance, SamplerCache, SamplerDesc, Surface, Vsync,
    },
    anyhow::{anyhow, Result},
    ash::vk,
    gpu_allocator::MemoryLocation,
    kestrel_core::Error,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::sync::Arc,
};

/// Frames that may be in flight at once; also the deletion ring size.
pub const IN_FLIGHT_FRAMES: usize = 2;

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub validation: bool,
    pub vsync: Vsync,
    pub color_space: crate::ColorSpace,
    pub anti_aliasing: vk::SampleCountFlags,
    pub shadow_map_resolution: vk::Extent2D,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            validation: false,
            vsync: Vsync::On,
            color_space: crate::ColorSpace::Srgb,
            anti_aliasing: vk::SampleCountFlags::TYPE_4,
            shadow_map_resolution: vk::Extent2D {
                width: 2048,
                height: 2048,
            },
        }
    }
}

/// Partial update of an existing image.
pub struct ImageWrite<'a> {
    pub data: &'a [u8],
    pub offset: vk::Offset2D,
    pub extent: vk::Extent2D,
}

/// Render device facade: instance + device + allocator + deletion queue +
/// sampler cache, plus the typed buffer/image operations everything above
/// the device layer goes through.
pub struct Gpu {
    instance: Instance,
    device: Device,
    allocator: Arc<Allocator>,
    deletion: Arc<DeletionQueue>,
    samplers: SamplerCache,
    setup_pool: CommandPool,
    setup_cmd: CommandBuffer,
}

impl Gpu {
    /// Device bound to a host window; returns the surface for swapchain
    /// creation.
    pub fn new(
        window: &(impl HasDisplayHandle + HasWindowHandle),
        config: &DeviceConfig,
    ) -> Result<(Self, Surface)> {
        let extensions =
            ash_window::enumerate_required_extensions(window.display_handle()?.into())?;
        let instance = Instance::new(config.validation, extensions)?;
        let surface = Surface::new(&instance, window)?;
        let gpu = Self::from_instance(instance, Some(&surface))?;
        Ok((gpu, surface))
    }

    /// Surface-less device for tooling and tests.
    pub fn headless(config: &DeviceConfig) -> Result<Self> {
        let instance = Instance::new(config.validation, &[])?;
        Self::from_instance(instance, None)
    }

    fn from_instance(instance: Instance, surface: Option<&Surface>) -> Result<Self> {
        let device = Device::new(&instance, surface)?;
        let allocator = Arc::new(Allocator::new(&instance, &device)?);
        let deletion = Arc::new(DeletionQueue::new(IN_FLIGHT_FRAMES));
        let samplers = SamplerCache::new(&device);
        let setup_pool = CommandPool::new(&device, "setup")?;
        let setup_cmd = setup_pool.create_command_buffer("setup")?;

        Ok(Self {
            instance,
            device,
            allocator,
            deletion,
            samplers,
            setup_pool,
            setup_cmd,
        })
    }

    pub fn instance(&self) -> &Instance { &self.instance }

    pub fn device(&self) -> &Device { &self.device }

    pub fn allocator(&self) -> &Arc<Allocator> { &self.allocator }

    pub fn deletion(&self) -> &Arc<DeletionQueue> { &self.deletion }

    pub fn sampler(&self, desc: SamplerDesc) -> Result<vk::Sampler> { self.samplers.get(desc) }

    pub fn make_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        size: u64,
        host_visible: bool,
        name: &str,
    ) -> Result<Buffer> {
        let location = if host_visible {
            MemoryLocation::CpuToGpu
        } else {
            MemoryLocation::GpuOnly
        };
        Buffer::new(&self.device, &self.allocator, &self.deletion, size, usage, location, name)
    }

    pub fn make_image(&self, info: &ImageInfo) -> Result<Image> {
        Image::new(&self.device, &self.allocator, &self.deletion, info)
    }

    /// Uploads `layers` (concatenated into one staging buffer) into `dst`,
    /// transitions it for sampling, and generates the remaining mip chain by
    /// successive blits when `dst.mip_levels() > 1`.
    ///
    /// The copy is synchronous with respect to barriers but asynchronous
    /// with respect to the host; the caller fences or relies on the deletion
    /// queue before reuse.
    pub fn copy_to_image(&self, cmd: &CommandBuffer, dst: &Image, layers: &[&[u8]]) -> Result<()> {
        if dst.mip_levels() > 1 && !self.device.supports_linear_blit(dst.format()) {
            return Err(anyhow!(Error::Unsupported(format!(
                "format {:?} cannot blit; request mip_levels = 1",
                dst.format()
            ))));
        }

        let total: usize = layers.iter().map(|layer| layer.len()).sum();
        let staging = self.make_buffer(vk::BufferUsageFlags::TRANSFER_SRC, total as u64, true, "staging")?;
        let mut offset = 0u64;
        let mut regions = Vec::with_capacity(layers.len());
        for layer in layers {
            staging.write(offset, layer)?;
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(dst.aspect())
                            .layer_count(1),
                    )
                    .image_extent(vk::Extent3D {
                        width: dst.extent().width,
                        height: dst.extent().height,
                        depth: 1,
                    }),
            );
            offset += layer.len() as u64;
        }

        cmd.pipeline_barrier(&[sync::image_memory_barrier(
            dst.handle(),
            dst.aspect(),
            dst.mip_levels(),
            vk::PipelineStageFlags2::NONE,
            vk::AccessFlags2::NONE,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )]);
        cmd.copy_buffer_to_image(staging.handle(), dst.handle(), &regions);

        if dst.mip_levels() > 1 {
            self.generate_mips(cmd, dst);
        } else {
            cmd.pipeline_barrier(&[sync::image_memory_barrier(
                dst.handle(),
                dst.aspect(),
                1,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )]);
        }

        // Referenced by the submitted transfer; the deletion queue keeps it
        // alive past the frame fence.
        drop(staging);
        Ok(())
    }

    fn generate_mips(&self, cmd: &CommandBuffer, image: &Image) {
        let mip_barrier = |mip, src_stage, src_access, dst_stage, dst_access, old, new| {
            vk::ImageMemoryBarrier2::default()
                .image(image.handle())
                .src_stage_mask(src_stage)
                .src_access_mask(src_access)
                .dst_stage_mask(dst_stage)
                .dst_access_mask(dst_access)
                .old_layout(old)
                .new_layout(new)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(image.aspect())
                        .base_mip_level(mip)
                        .level_count(1)
                        .layer_count(1),
                )
        };
        let mip_extent = |mip: u32| vk::Extent2D {
            width: (image.extent().width >> mip).max(1),
            height: (image.extent().height >> mip).max(1),
        };

        for mip in 1..image.mip_levels() {
            cmd.pipeline_barrier(&[mip_barrier(
                mip - 1,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_WRITE,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_READ,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            )]);
            cmd.blit(
                image.handle(),
                mip - 1,
                mip_extent(mip - 1),
                image.handle(),
                mip,
                mip_extent(mip),
            );
            cmd.pipeline_barrier(&[mip_barrier(
                mip - 1,
                vk::PipelineStageFlags2::TRANSFER,
                vk::AccessFlags2::TRANSFER_READ,
                vk::PipelineStageFlags2::FRAGMENT_SHADER,
                vk::AccessFlags2::SHADER_READ,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )]);
        }
        cmd.pipeline_barrier(&[mip_barrier(
            image.mip_levels() - 1,
            vk::PipelineStageFlags2::TRANSFER,
            vk::AccessFlags2::TRANSFER_WRITE,
            vk::PipelineStageFlags2::FRAGMENT_SHADER,
            vk::AccessFlags2::SHADER_READ,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )]);
    }

    /// Partial region updates of an already-sampled image.
    pub fn write_images(&self, cmd: &CommandBuffer, dst: &Image, writes: &[ImageWrite]) -> Result<()> {
        let total: usize = writes.iter().map(|write| write.data.len()).sum();
        let staging = self.make_buffer(vk::BufferUsageFlags::TRANSFER_SRC, total as u64, true, "staging")?;
        let mut offset = 0u64;
        let mut regions = Vec::with_capacity(writes.len());
        for write in writes {
            staging.write(offset, write.data)?;
            regions.push(
                vk::BufferImageCopy::default()
                    .buffer_offset(offset)
                    .image_subresource(
                        vk::ImageSubresourceLayers::default()
                            .aspect_mask(dst.aspect())
                            .layer_count(1),
                    )
                    .image_offset(vk::Offset3D {
                        x: write.offset.x,
                        y: write.offset.y,
                        z: 0,
                    })
                    .image_extent(vk::Extent3D {
                        width: write.extent.width,
                        height: write.extent.height,
                        depth: 1,
                    }),
            );
            offset += write.data.len() as u64;
        }

        cmd.pipeline_barrier(&[sync::transition(
            dst.handle(),
            dst.aspect(),
            dst.mip_levels(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )]);
        cmd.copy_buffer_to_image(staging.handle(), dst.handle(), &regions);
        cmd.pipeline_barrier(&[sync::transition(
            dst.handle(),
            dst.aspect(),
            dst.mip_levels(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )]);
        drop(staging);
        Ok(())
    }

    /// Image-to-image copy with layout transitions on both ends.
    pub fn copy_image(&self, cmd: &CommandBuffer, src: &Image, dst: &Image, extent: vk::Extent2D) {
        cmd.pipeline_barrier(&[
            sync::transition(
                src.handle(),
                src.aspect(),
                src.mip_levels(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            ),
            sync::transition(
                dst.handle(),
                dst.aspect(),
                dst.mip_levels(),
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            ),
        ]);
        cmd.copy_image(src.handle(), dst.handle(), src.aspect(), extent);
        cmd.pipeline_barrier(&[
            sync::transition(
                src.handle(),
                src.aspect(),
                src.mip_levels(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
            sync::transition(
                dst.handle(),
                dst.aspect(),
                dst.mip_levels(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            ),
        ]);
    }

    /// Records and submits a one-shot command buffer, waiting for idle.
    /// Upload-time only; per-frame work goes through the renderer's frames.
    pub fn execute(&self, record: impl FnOnce(&CommandBuffer) -> Result<()>) -> Result<()> {
        self.setup_cmd.reset()?;
        self.setup_cmd.begin()?;
        record(&self.setup_cmd)?;
        self.setup_cmd.end()?;

        let cmd_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(self.setup_cmd.handle())];
        let submit = [vk::SubmitInfo2::default().command_buffer_infos(&cmd_infos)];
        self.device.submit(&submit, vk::Fence::null())?;
        self.device.wait_idle();
        Ok(())
    }

    /// Full teardown: waits for idle, then releases every deferred object.
    pub fn destroy(&mut self) {
        self.device.wait_idle();
        self.deletion.clear();
        self.samplers.destroy();
        self.setup_pool.destroy();
    }
}
