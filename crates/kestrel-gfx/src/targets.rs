use {
    anyhow::Result,
    kestrel_vk::{vk, Gpu, Image, ImageInfo},
};

pub const COLOR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Off-screen 3D targets: MSAA color + depth, and a single-sample resolve
/// image when multisampling, which the UI pass samples.
pub struct RenderTargets {
    pub color: Image,
    pub depth: Image,
    pub resolve: Option<Image>,
    pub extent: vk::Extent2D,
    pub samples: vk::SampleCountFlags,
}

impl RenderTargets {
    pub fn new(gpu: &Gpu, extent: vk::Extent2D, samples: vk::SampleCountFlags) -> Result<Self> {
        let multisampled = samples != vk::SampleCountFlags::TYPE_1;
        let color = gpu.make_image(&ImageInfo {
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | if multisampled {
                    vk::ImageUsageFlags::empty()
                } else {
                    vk::ImageUsageFlags::SAMPLED
                },
            samples,
            ..ImageInfo::color_2d("scene_color", extent, COLOR_FORMAT)
        })?;
        let depth = gpu.make_image(&ImageInfo {
            name: "scene_depth".into(),
            extent,
            format: DEPTH_FORMAT,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
            mip_levels: 1,
            samples,
            view_type: vk::ImageViewType::TYPE_2D,
        })?;
        let resolve = multisampled
            .then(|| {
                gpu.make_image(&ImageInfo {
                    usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                    ..ImageInfo::color_2d("scene_resolve", extent, COLOR_FORMAT)
                })
            })
            .transpose()?;

        log::debug!(
            "Render targets: {}x{} {samples:?}{}",
            extent.width,
            extent.height,
            if multisampled { " + resolve" } else { "" },
        );
        Ok(Self {
            color,
            depth,
            resolve,
            extent,
            samples,
        })
    }

    /// The single-sample image the UI pass samples from.
    pub fn output(&self) -> &Image { self.resolve.as_ref().unwrap_or(&self.color) }

    pub fn matches(&self, extent: vk::Extent2D, samples: vk::SampleCountFlags) -> bool {
        self.extent == extent && self.samples == samples
    }
}

/// Fixed-resolution depth target sampled by the 3D pass.
pub struct ShadowTarget {
    pub depth: Image,
    pub extent: vk::Extent2D,
}

impl ShadowTarget {
    pub fn new(gpu: &Gpu, extent: vk::Extent2D) -> Result<Self> {
        let depth = gpu.make_image(&ImageInfo {
            name: "shadow_depth".into(),
            extent,
            format: DEPTH_FORMAT,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            aspect: vk::ImageAspectFlags::DEPTH,
            mip_levels: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            view_type: vk::ImageViewType::TYPE_2D,
        })?;
        Ok(Self { depth, extent })
    }
}
