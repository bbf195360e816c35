use {
    crate::{Buffer, Device},
    anyhow::Result,
    ash::vk::{self, Handle},
    derive_more::Debug,
};

#[derive(Clone, Debug)]
pub struct CommandPool {
    name: String,
    #[debug("{:#x}", handle.as_raw())]
    handle: vk::CommandPool,
    #[debug(skip)]
    device: Device,
}

impl CommandPool {
    pub fn new(device: &Device, name: &str) -> Result<Self> {
        let info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.queue_family().index);
        let handle = unsafe { device.handle().create_command_pool(&info, None) }?;

        let pool = Self {
            name: name.to_string(),
            handle,
            device: device.clone(),
        };
        log::trace!("Created {pool:?}");
        Ok(pool)
    }

    pub fn handle(&self) -> vk::CommandPool { self.handle }

    pub fn create_command_buffer(&self, name: &str) -> Result<CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.handle)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let handle = unsafe { self.device.handle().allocate_command_buffers(&info) }?[0];

        Ok(CommandBuffer {
            name: name.to_string(),
            handle,
            device: self.device.clone(),
        })
    }

    /// Only valid at teardown after a full device wait.
    pub fn destroy(&self) {
        unsafe { self.device.handle().destroy_command_pool(self.handle, None) };
    }
}

#[derive(Clone, Debug)]
pub struct CommandBuffer {
    name: String,
    #[debug("{:#x}", handle.as_raw())]
    pub(crate) handle: vk::CommandBuffer,
    #[debug(skip)]
    pub(crate) device: Device,
}

impl CommandBuffer {
    pub fn handle(&self) -> vk::CommandBuffer { self.handle }

    pub fn name(&self) -> &str { &self.name }

    pub fn reset(&self) -> Result<()> {
        Ok(unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())?
        })
    }

    pub fn begin(&self) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        Ok(unsafe { self.device.handle().begin_command_buffer(self.handle, &info)? })
    }

    pub fn end(&self) -> Result<()> {
        Ok(unsafe { self.device.handle().end_command_buffer(self.handle)? })
    }

    pub fn pipeline_barrier(&self, image_barriers: &[vk::ImageMemoryBarrier2]) {
        let info = vk::DependencyInfo::default().image_memory_barriers(image_barriers);
        unsafe { self.device.handle().cmd_pipeline_barrier2(self.handle, &info) };
    }

    pub fn begin_rendering(
        &self,
        color_attachments: &[vk::RenderingAttachmentInfo],
        depth_attachment: Option<&vk::RenderingAttachmentInfo>,
        extent: vk::Extent2D,
    ) {
        let mut info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(color_attachments);
        if let Some(depth_attachment) = depth_attachment {
            info = info.depth_attachment(depth_attachment);
        }
        unsafe { self.device.handle().cmd_begin_rendering(self.handle, &info) };
    }

    pub fn end_rendering(&self) {
        unsafe { self.device.handle().cmd_end_rendering(self.handle) };
    }

    pub fn set_viewport(&self, extent: vk::Extent2D) {
        // Flipped Y so world space stays right handed with +Y up.
        let viewport = vk::Viewport::default()
            .x(0.0)
            .y(extent.height as f32)
            .width(extent.width as f32)
            .height(-(extent.height as f32))
            .min_depth(0.0)
            .max_depth(1.0);
        unsafe { self.device.handle().cmd_set_viewport(self.handle, 0, &[viewport]) };
    }

    pub fn set_scissor(&self, extent: vk::Extent2D) {
        let scissor = vk::Rect2D::default().extent(extent);
        unsafe { self.device.handle().cmd_set_scissor(self.handle, 0, &[scissor]) };
    }

    pub fn set_line_width(&self, width: f32) {
        unsafe { self.device.handle().cmd_set_line_width(self.handle, width) };
    }

    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.handle().cmd_bind_pipeline(
                self.handle,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            )
        };
    }

    pub fn bind_vertex_buffers(&self, first_binding: u32, buffers: &[vk::Buffer], offsets: &[u64]) {
        unsafe {
            self.device
                .handle()
                .cmd_bind_vertex_buffers(self.handle, first_binding, buffers, offsets)
        };
    }

    pub fn bind_index_buffer(&self, buffer: &Buffer, offset: u64) {
        unsafe {
            self.device.handle().cmd_bind_index_buffer(
                self.handle,
                buffer.handle(),
                offset,
                vk::IndexType::UINT32,
            )
        };
    }

    pub fn bind_descriptor_sets(
        &self,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device.handle().cmd_bind_descriptor_sets(
                self.handle,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                first_set,
                sets,
                &[],
            )
        };
    }

    pub fn draw(&self, vertex_count: u32, instance_count: u32) {
        unsafe { self.device.handle().cmd_draw(self.handle, vertex_count, instance_count, 0, 0) };
    }

    pub fn draw_indexed(&self, index_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw_indexed(self.handle, index_count, instance_count, 0, 0, 0)
        };
    }

    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, size: u64) {
        let copy = vk::BufferCopy::default().size(size);
        unsafe {
            self.device
                .handle()
                .cmd_copy_buffer(self.handle, src.handle(), dst.handle(), &[copy])
        };
    }

    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.handle().cmd_copy_buffer_to_image(
                self.handle,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                regions,
            )
        };
    }

    pub fn copy_image(
        &self,
        src: vk::Image,
        dst: vk::Image,
        aspect: vk::ImageAspectFlags,
        extent: vk::Extent2D,
    ) {
        let subresource = vk::ImageSubresourceLayers::default().aspect_mask(aspect).layer_count(1);
        let region = vk::ImageCopy::default()
            .src_subresource(subresource)
            .dst_subresource(subresource)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        unsafe {
            self.device.handle().cmd_copy_image(
                self.handle,
                src,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }

    pub fn blit(
        &self,
        src: vk::Image,
        src_mip: u32,
        src_extent: vk::Extent2D,
        dst: vk::Image,
        dst_mip: u32,
        dst_extent: vk::Extent2D,
    ) {
        let subresource = |mip| {
            vk::ImageSubresourceLayers::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .mip_level(mip)
                .layer_count(1)
        };
        let offsets = |extent: vk::Extent2D| {
            [
                vk::Offset3D::default(),
                vk::Offset3D {
                    x: extent.width.max(1) as i32,
                    y: extent.height.max(1) as i32,
                    z: 1,
                },
            ]
        };
        let region = vk::ImageBlit2::default()
            .src_subresource(subresource(src_mip))
            .dst_subresource(subresource(dst_mip))
            .src_offsets(offsets(src_extent))
            .dst_offsets(offsets(dst_extent));
        let regions = [region];
        let info = vk::BlitImageInfo2::default()
            .src_image(src)
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(dst)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .filter(vk::Filter::LINEAR)
            .regions(&regions);
        unsafe { self.device.handle().cmd_blit_image2(self.handle, &info) };
    }
}
