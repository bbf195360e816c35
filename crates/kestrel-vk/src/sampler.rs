use {
    crate::{acquire, Device},
    anyhow::Result,
    ash::vk,
    std::{collections::HashMap, sync::Mutex},
};

/// Immutable sampler parameters. Hash/Eq so equal descriptions share one
/// sampler object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub min_filter: vk::Filter,
    pub mag_filter: vk::Filter,
    pub wrap_s: vk::SamplerAddressMode,
    pub wrap_t: vk::SamplerAddressMode,
    pub border: vk::BorderColor,
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            min_filter: vk::Filter::LINEAR,
            mag_filter: vk::Filter::LINEAR,
            wrap_s: vk::SamplerAddressMode::REPEAT,
            wrap_t: vk::SamplerAddressMode::REPEAT,
            border: vk::BorderColor::FLOAT_OPAQUE_BLACK,
        }
    }
}

impl SamplerDesc {
    /// Shadow maps sample outside the light frustum as fully lit.
    pub fn shadow() -> Self {
        Self {
            wrap_s: vk::SamplerAddressMode::CLAMP_TO_BORDER,
            wrap_t: vk::SamplerAddressMode::CLAMP_TO_BORDER,
            border: vk::BorderColor::FLOAT_OPAQUE_WHITE,
            ..Self::default()
        }
    }
}

pub struct SamplerCache {
    device: Device,
    samplers: Mutex<HashMap<SamplerDesc, vk::Sampler>>,
    max_anisotropy: f32,
}

impl SamplerCache {
    pub fn new(device: &Device) -> Self {
        Self {
            device: device.clone(),
            samplers: Mutex::new(HashMap::new()),
            max_anisotropy: device.limits().max_sampler_anisotropy,
        }
    }

    pub fn get(&self, desc: SamplerDesc) -> Result<vk::Sampler> {
        if let Some(sampler) = acquire!(self.samplers).get(&desc) {
            return Ok(*sampler);
        }

        let info = vk::SamplerCreateInfo::default()
            .min_filter(desc.min_filter)
            .mag_filter(desc.mag_filter)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(desc.wrap_s)
            .address_mode_v(desc.wrap_t)
            .address_mode_w(desc.wrap_t)
            .border_color(desc.border)
            .anisotropy_enable(self.max_anisotropy > 1.0)
            .max_anisotropy(self.max_anisotropy)
            .max_lod(vk::LOD_CLAMP_NONE);
        let sampler = unsafe { self.device.handle().create_sampler(&info, None) }?;
        acquire!(self.samplers).insert(desc, sampler);
        log::trace!("Created sampler {desc:?}");
        Ok(sampler)
    }

    /// Only valid at device teardown, after a full wait.
    pub fn destroy(&self) {
        for (_, sampler) in acquire!(self.samplers).drain() {
            unsafe { self.device.handle().destroy_sampler(sampler, None) };
        }
    }
}
