use {
    crate::{allocator::Allocator, DeletionQueue, Device, SamplerDesc},
    anyhow::Result,
    ash::vk::{self, Handle},
    derive_more::Debug,
    gpu_allocator::vulkan::Allocation,
    std::sync::Arc,
};

#[derive(Clone, Debug)]
pub struct ImageInfo {
    pub name: String,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
    pub mip_levels: u32,
    pub samples: vk::SampleCountFlags,
    pub view_type: vk::ImageViewType,
}

impl ImageInfo {
    pub fn color_2d(name: &str, extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            name: name.to_string(),
            extent,
            format,
            usage: vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            view_type: vk::ImageViewType::TYPE_2D,
        }
    }
}

/// Mip chain length covering the full extent.
pub fn mip_level_count(extent: vk::Extent2D) -> u32 {
    32 - extent.width.max(extent.height).max(1).leading_zeros()
}

/// Allocated image + its view. Every non-void image carries a valid view.
/// Destruction is deferred through the deletion queue.
#[derive(Debug)]
pub struct Image {
    name: String,
    #[debug("{:#x}", handle.as_raw())]
    handle: vk::Image,
    #[debug("{:#x}", view.as_raw())]
    view: vk::ImageView,
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
    samples: vk::SampleCountFlags,
    #[debug(skip)]
    allocation: Option<Allocation>,
    #[debug(skip)]
    device: Device,
    #[debug(skip)]
    allocator: Arc<Allocator>,
    #[debug(skip)]
    deletion: Arc<DeletionQueue>,
}

impl Image {
    pub fn new(
        device: &Device,
        allocator: &Arc<Allocator>,
        deletion: &Arc<DeletionQueue>,
        info: &ImageInfo,
    ) -> Result<Self> {
        let create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(info.format)
            .extent(vk::Extent3D {
                width: info.extent.width,
                height: info.extent.height,
                depth: 1,
            })
            .mip_levels(info.mip_levels)
            .array_layers(1)
            .samples(info.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(info.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let handle = unsafe { device.handle().create_image(&create_info, None) }?;
        let requirements = unsafe { device.handle().get_image_memory_requirements(handle) };
        let allocation = allocator.allocate_image(handle, requirements, &info.name)?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(handle)
            .view_type(info.view_type)
            .format(info.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(info.aspect)
                    .base_mip_level(0)
                    .level_count(info.mip_levels)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { device.handle().create_image_view(&view_info, None) }?;

        let image = Self {
            name: info.name.clone(),
            handle,
            view,
            extent: info.extent,
            format: info.format,
            usage: info.usage,
            aspect: info.aspect,
            mip_levels: info.mip_levels,
            samples: info.samples,
            allocation: Some(allocation),
            device: device.clone(),
            allocator: Arc::clone(allocator),
            deletion: Arc::clone(deletion),
        };
        log::trace!("Created {image:?}");
        Ok(image)
    }

    pub fn handle(&self) -> vk::Image { self.handle }

    pub fn view(&self) -> vk::ImageView { self.view }

    pub fn extent(&self) -> vk::Extent2D { self.extent }

    pub fn format(&self) -> vk::Format { self.format }

    pub fn usage(&self) -> vk::ImageUsageFlags { self.usage }

    pub fn aspect(&self) -> vk::ImageAspectFlags { self.aspect }

    pub fn mip_levels(&self) -> u32 { self.mip_levels }

    pub fn samples(&self) -> vk::SampleCountFlags { self.samples }

    pub fn name(&self) -> &str { &self.name }
}

impl Drop for Image {
    fn drop(&mut self) {
        let handle = self.handle;
        let view = self.view;
        let allocation = self.allocation.take();
        let device = self.device.clone();
        let allocator = Arc::clone(&self.allocator);
        self.deletion.push(move || {
            unsafe {
                device.handle().destroy_image_view(view, None);
                device.handle().destroy_image(handle, None);
            }
            if let Some(allocation) = allocation {
                allocator.deallocate(allocation);
            }
        });
    }
}

/// Sampled image: GPU image + view + the sampler it is bound with.
#[derive(Debug)]
pub struct Texture {
    pub image: Image,
    pub sampler: vk::Sampler,
    pub sampler_desc: SamplerDesc,
}

impl Texture {
    pub fn view(&self) -> vk::ImageView { self.image.view() }

    pub fn format(&self) -> vk::Format { self.image.format() }

    pub fn extent(&self) -> vk::Extent2D { self.image.extent() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_matches_log2() {
        let extent = |width, height| vk::Extent2D { width, height };
        assert_eq!(mip_level_count(extent(1, 1)), 1);
        assert_eq!(mip_level_count(extent(2, 2)), 2);
        assert_eq!(mip_level_count(extent(1024, 512)), 11);
        assert_eq!(mip_level_count(extent(1000, 600)), 10);
    }
}
