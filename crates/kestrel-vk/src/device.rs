use {
    crate::{acquire, swapchain::Surface, Instance, FENCE_TIMEOUT_NS},
    anyhow::{anyhow, Result},
    ash::{
        khr,
        vk::{self, Handle},
    },
    derive_more::Debug,
    kestrel_core::Error,
    std::sync::{Arc, Mutex},
};

#[derive(Clone, Copy, Debug)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

#[derive(Debug)]
struct DeviceInner {
    #[debug("{:#x}", handle.handle().as_raw())]
    handle: ash::Device,
    #[debug(skip)]
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    #[debug(skip)]
    properties: vk::PhysicalDeviceProperties,
    queue_family: QueueFamily,
    #[debug(skip)]
    queue: Mutex<vk::Queue>,
}

/// Logical device plus its single graphics/present queue.
///
/// The queue is guarded by a mutex: submits and presents from any thread
/// serialize through it.
#[derive(Clone, Debug)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

const DEVICE_EXTENSIONS: [&std::ffi::CStr; 1] = [khr::swapchain::NAME];

impl Device {
    pub fn new(instance: &Instance, surface: Option<&Surface>) -> Result<Self> {
        let (physical_device, queue_family) = Self::pick_physical_device(instance, surface)?;
        let properties = unsafe {
            instance
                .handle
                .get_physical_device_properties(physical_device)
        };

        let extensions: Vec<*const i8> = DEVICE_EXTENSIONS.iter().map(|n| n.as_ptr()).collect();
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family.index)
            .queue_priorities(&priorities)];

        let features = vk::PhysicalDeviceFeatures::default()
            .fill_mode_non_solid(true)
            .wide_lines(true)
            .sampler_anisotropy(true);
        let mut features13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut features2 = vk::PhysicalDeviceFeatures2::default()
            .features(features)
            .push_next(&mut features13);

        let device_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .push_next(&mut features2);

        let handle = unsafe {
            instance
                .handle
                .create_device(physical_device, &device_info, None)
        }
        .map_err(|e| anyhow!(Error::FatalDevice(format!("device creation failed: {e}"))))?;
        let queue = unsafe { handle.get_device_queue(queue_family.index, 0) };

        log::info!(
            "Created device: {:?} (queue family {})",
            unsafe { std::ffi::CStr::from_ptr(properties.device_name.as_ptr()) },
            queue_family.index,
        );

        Ok(Self {
            inner: Arc::new(DeviceInner {
                handle,
                instance: instance.handle.clone(),
                physical_device,
                properties,
                queue_family,
                queue: Mutex::new(queue),
            }),
        })
    }

    fn pick_physical_device(
        instance: &Instance,
        surface: Option<&Surface>,
    ) -> Result<(vk::PhysicalDevice, QueueFamily)> {
        let devices = unsafe { instance.handle.enumerate_physical_devices() }?;
        let mut candidates = Vec::new();

        for device in devices {
            let families =
                unsafe { instance.handle.get_physical_device_queue_family_properties(device) };
            for (index, properties) in families.iter().enumerate() {
                if !properties.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                    continue;
                }
                if let Some(surface) = surface {
                    let supported = unsafe {
                        surface.loader.get_physical_device_surface_support(
                            device,
                            index as u32,
                            surface.inner,
                        )
                    }?;
                    if !supported {
                        continue;
                    }
                }
                let device_type =
                    unsafe { instance.handle.get_physical_device_properties(device) }.device_type;
                let score = match device_type {
                    vk::PhysicalDeviceType::DISCRETE_GPU => 2,
                    vk::PhysicalDeviceType::INTEGRATED_GPU => 1,
                    _ => 0,
                };
                candidates.push((
                    score,
                    device,
                    QueueFamily {
                        index: index as u32,
                        properties: *properties,
                    },
                ));
                break;
            }
        }

        candidates
            .into_iter()
            .max_by_key(|(score, ..)| *score)
            .map(|(_, device, family)| (device, family))
            .ok_or_else(|| anyhow!(Error::FatalDevice("no suitable GPU found".into())))
    }

    pub fn handle(&self) -> &ash::Device { &self.inner.handle }

    pub fn instance(&self) -> &ash::Instance { &self.inner.instance }

    pub fn physical_device(&self) -> vk::PhysicalDevice { self.inner.physical_device }

    pub fn limits(&self) -> vk::PhysicalDeviceLimits { self.inner.properties.limits }

    pub fn queue_family(&self) -> QueueFamily { self.inner.queue_family }

    /// One batched submission; the queue mutex is held for its duration.
    pub fn submit(&self, submits: &[vk::SubmitInfo2], fence: vk::Fence) -> Result<()> {
        let queue = acquire!(self.inner.queue);
        unsafe { self.inner.handle.queue_submit2(*queue, submits, fence) }
            .map_err(|e| anyhow!(Error::FatalDevice(format!("queue submit failed: {e}"))))
    }

    /// Present through the mutexed queue. `Ok(true)` means the swapchain
    /// needs to be refreshed.
    pub fn present(
        &self,
        loader: &khr::swapchain::Device,
        info: &vk::PresentInfoKHR,
    ) -> Result<bool> {
        let queue = acquire!(self.inner.queue);
        match unsafe { loader.queue_present(*queue, info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(true),
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                Err(anyhow!(Error::FatalDevice("device lost on present".into())))
            }
            Err(e) => Err(anyhow!(Error::SwapchainLost).context(e)),
        }
    }

    pub fn wait_idle(&self) {
        let _queue = acquire!(self.inner.queue);
        unsafe { self.inner.handle.device_wait_idle() }.ok();
    }

    pub fn create_fence(&self, signaled: bool) -> Result<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        Ok(unsafe {
            self.inner
                .handle
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)?
        })
    }

    pub fn create_semaphore(&self) -> Result<vk::Semaphore> {
        Ok(unsafe {
            self.inner
                .handle
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        })
    }

    pub fn wait_for_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe {
            self.inner
                .handle
                .wait_for_fences(&[fence], true, FENCE_TIMEOUT_NS)
        }
        .map_err(|e| anyhow!(Error::FatalDevice(format!("fence wait failed: {e}"))))
    }

    pub fn reset_fence(&self, fence: vk::Fence) -> Result<()> {
        Ok(unsafe { self.inner.handle.reset_fences(&[fence])? })
    }

    /// Whether the format supports linear-filtered blits, required for mip
    /// generation.
    pub fn supports_linear_blit(&self, format: vk::Format) -> bool {
        let properties = unsafe {
            self.inner
                .instance
                .get_physical_device_format_properties(self.inner.physical_device, format)
        };
        properties
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR | vk::FormatFeatureFlags::BLIT_DST)
    }
}
