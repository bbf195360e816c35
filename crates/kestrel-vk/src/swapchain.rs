use {
    crate::{DeletionQueue, Device, Instance},
    anyhow::{anyhow, Result},
    ash::{
        khr,
        vk::{self, Handle},
    },
    derive_more::Debug,
    kestrel_core::Error,
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    std::sync::Arc,
};

#[derive(Clone, Debug)]
pub struct Surface {
    #[debug("{:#x}", inner.as_raw())]
    pub(crate) inner: vk::SurfaceKHR,
    #[debug(skip)]
    pub(crate) loader: khr::surface::Instance,
}

impl Surface {
    pub fn new(
        instance: &Instance,
        window: &(impl HasDisplayHandle + HasWindowHandle),
    ) -> Result<Self> {
        let inner = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.handle,
                window.display_handle()?.into(),
                window.window_handle()?.into(),
                None,
            )?
        };
        let loader = khr::surface::Instance::new(&instance.entry, &instance.handle);
        Ok(Self { inner, loader })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Vsync {
    #[default]
    On,
    Off,
    Adaptive,
    Mailbox,
}

impl Vsync {
    fn present_mode(self) -> vk::PresentModeKHR {
        match self {
            Vsync::On => vk::PresentModeKHR::FIFO,
            Vsync::Off => vk::PresentModeKHR::IMMEDIATE,
            Vsync::Adaptive => vk::PresentModeKHR::FIFO_RELAXED,
            Vsync::Mailbox => vk::PresentModeKHR::MAILBOX,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

pub struct AcquiredImage {
    pub index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

/// Swapchain wrapper. Old swapchains and their views retire through the
/// deletion queue on refresh.
pub struct Swapchain {
    device: Device,
    surface: Surface,
    loader: khr::swapchain::Device,
    deletion: Arc<DeletionQueue>,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    vsync: Vsync,
    min_image_count: u32,
    stale: bool,
}

impl Swapchain {
    pub fn new(
        instance: &Instance,
        device: &Device,
        surface: Surface,
        deletion: &Arc<DeletionQueue>,
        extent: vk::Extent2D,
        vsync: Vsync,
        color_space: ColorSpace,
        min_image_count: u32,
    ) -> Result<Self> {
        let loader = khr::swapchain::Device::new(&instance.handle, device.handle());
        let (format, native_color_space) = Self::pick_format(device, &surface, color_space)?;

        let mut swapchain = Self {
            device: device.clone(),
            surface,
            loader,
            deletion: Arc::clone(deletion),
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            format,
            color_space: native_color_space,
            extent,
            vsync,
            min_image_count,
            stale: false,
        };
        swapchain.refresh(extent, None)?;
        Ok(swapchain)
    }

    fn pick_format(
        device: &Device,
        surface: &Surface,
        preference: ColorSpace,
    ) -> Result<(vk::Format, vk::ColorSpaceKHR)> {
        let formats = unsafe {
            surface
                .loader
                .get_physical_device_surface_formats(device.physical_device(), surface.inner)
        }?;
        let wanted = match preference {
            ColorSpace::Srgb => vk::Format::B8G8R8A8_SRGB,
            ColorSpace::Linear => vk::Format::B8G8R8A8_UNORM,
        };
        let chosen = formats
            .iter()
            .find(|f| f.format == wanted)
            .or_else(|| formats.first())
            .ok_or_else(|| anyhow!(Error::Unsupported("surface reports no formats".into())))?;
        Ok((chosen.format, chosen.color_space))
    }

    fn pick_present_mode(&self, wanted: Vsync) -> vk::PresentModeKHR {
        let supported = unsafe {
            self.surface.loader.get_physical_device_surface_present_modes(
                self.device.physical_device(),
                self.surface.inner,
            )
        }
        .unwrap_or_default();
        let mode = wanted.present_mode();
        if supported.contains(&mode) {
            mode
        } else {
            log::warn!("Present mode {mode:?} unsupported, falling back to FIFO");
            vk::PresentModeKHR::FIFO
        }
    }

    /// Recreates the swapchain at the requested extent; the retiring handle
    /// and views are deferred.
    pub fn refresh(&mut self, extent: vk::Extent2D, vsync: Option<Vsync>) -> Result<()> {
        if let Some(vsync) = vsync {
            self.vsync = vsync;
        }
        let capabilities = unsafe {
            self.surface.loader.get_physical_device_surface_capabilities(
                self.device.physical_device(),
                self.surface.inner,
            )
        }?;
        let extent = match capabilities.current_extent.width {
            u32::MAX => extent,
            _ => capabilities.current_extent,
        };

        let indices = [self.device.queue_family().index];
        let mut info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.inner)
            .min_image_count(self.min_image_count.max(capabilities.min_image_count))
            .image_format(self.format)
            .image_color_space(self.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .queue_family_indices(&indices)
            .pre_transform(vk::SurfaceTransformFlagsKHR::IDENTITY)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.pick_present_mode(self.vsync))
            .clipped(true);
        if self.handle != vk::SwapchainKHR::null() {
            info = info.old_swapchain(self.handle);
        }

        let new_handle = unsafe { self.loader.create_swapchain(&info, None) }
            .map_err(|e| anyhow!(Error::SwapchainLost).context(e))?;

        let old_handle = std::mem::replace(&mut self.handle, new_handle);
        let old_views = std::mem::take(&mut self.views);
        if old_handle != vk::SwapchainKHR::null() {
            let device = self.device.clone();
            let loader = self.loader.clone();
            self.deletion.push(move || unsafe {
                for view in old_views {
                    device.handle().destroy_image_view(view, None);
                }
                loader.destroy_swapchain(old_handle, None);
            });
        }

        self.images = unsafe { self.loader.get_swapchain_images(self.handle) }?;
        self.views = self
            .images
            .iter()
            .map(|image| {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(*image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(self.format)
                    .subresource_range(
                        vk::ImageSubresourceRange::default()
                            .aspect_mask(vk::ImageAspectFlags::COLOR)
                            .level_count(1)
                            .layer_count(1),
                    );
                Ok(unsafe { self.device.handle().create_image_view(&view_info, None) }?)
            })
            .collect::<Result<Vec<_>>>()?;
        self.extent = extent;
        self.stale = false;

        log::info!(
            "Swapchain: {}x{} {:?} {:?} ({} images)",
            extent.width,
            extent.height,
            self.format,
            self.vsync,
            self.images.len(),
        );
        Ok(())
    }

    /// Next image, or `None` when a refresh consumed this frame. Retries
    /// once after recreating on OutOfDate/Suboptimal.
    pub fn acquire(
        &mut self,
        extent: vk::Extent2D,
        semaphore: vk::Semaphore,
    ) -> Result<Option<AcquiredImage>> {
        if self.stale {
            self.refresh(extent, None)?;
        }
        for attempt in 0..2 {
            match unsafe {
                self.loader
                    .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
            } {
                Ok((index, suboptimal)) => {
                    if suboptimal {
                        self.stale = true;
                    }
                    return Ok(Some(AcquiredImage {
                        index,
                        image: self.images[index as usize],
                        view: self.views[index as usize],
                        extent: self.extent,
                    }));
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) if attempt == 0 => {
                    self.refresh(extent, None)?;
                }
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => return Ok(None),
                Err(vk::Result::ERROR_SURFACE_LOST_KHR) => {
                    return Err(anyhow!(Error::FatalDevice("surface lost".into())))
                }
                Err(vk::Result::ERROR_DEVICE_LOST) => {
                    return Err(anyhow!(Error::FatalDevice("device lost on acquire".into())))
                }
                Err(e) => return Err(anyhow!(Error::SwapchainLost).context(e)),
            }
        }
        Ok(None)
    }

    /// Presents; marks the swapchain stale for the next frame when the
    /// driver asks for a recreate.
    pub fn present(&mut self, index: u32, wait_semaphore: vk::Semaphore) -> Result<bool> {
        let swapchains = [self.handle];
        let indices = [index];
        let wait = [wait_semaphore];
        let info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        let needs_refresh = self.device.present(&self.loader, &info)?;
        if needs_refresh {
            self.stale = true;
        }
        Ok(!needs_refresh)
    }

    pub fn format(&self) -> vk::Format { self.format }

    pub fn extent(&self) -> vk::Extent2D { self.extent }

    pub fn vsync(&self) -> Vsync { self.vsync }

    pub fn image_count(&self) -> usize { self.images.len() }

    /// Only valid at teardown after a full device wait.
    pub fn destroy(&mut self) {
        unsafe {
            for view in self.views.drain(..) {
                self.device.handle().destroy_image_view(view, None);
            }
            if self.handle != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(self.handle, None);
            }
            self.surface.loader.destroy_surface(self.surface.inner, None);
        }
        self.handle = vk::SwapchainKHR::null();
    }
}
