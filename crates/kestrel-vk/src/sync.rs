use ash::vk;

/// Image memory barrier covering every mip level of a single-layer image.
#[allow(clippy::too_many_arguments)]
pub fn image_memory_barrier(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
    src_stage: vk::PipelineStageFlags2,
    src_access: vk::AccessFlags2,
    dst_stage: vk::PipelineStageFlags2,
    dst_access: vk::AccessFlags2,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> vk::ImageMemoryBarrier2<'static> {
    vk::ImageMemoryBarrier2::default()
        .image(image)
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(mip_levels)
                .base_array_layer(0)
                .layer_count(1),
        )
}

/// Heavy-handed transition used outside the hot paths (uploads, teardown).
pub fn transition(
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    mip_levels: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> vk::ImageMemoryBarrier2<'static> {
    image_memory_barrier(
        image,
        aspect,
        mip_levels,
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::MEMORY_WRITE,
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::MEMORY_WRITE | vk::AccessFlags2::MEMORY_READ,
        old_layout,
        new_layout,
    )
}
