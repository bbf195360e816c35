use {
    crate::{
        json::{ColourSpace, TextureDoc},
        provider::{AssetLoader, Payload, Provider},
        source::DataSource,
    },
    anyhow::Result,
    kestrel_vk::{vk, Gpu, ImageInfo, SamplerDesc, Texture},
    kestrel_core::Uri,
    std::sync::Arc,
};

/// Uri every renderer falls back to when a texture is missing or corrupt.
pub const FALLBACK_TEXTURE: &str = "textures/__fallback";

/// Uri of the built-in white texture bound to unassigned material slots.
pub const WHITE_TEXTURE: &str = "textures/__white";

pub type TextureProvider = Provider<TextureLoader>;

pub struct TextureLoader {
    gpu: Arc<Gpu>,
    source: Arc<dyn DataSource>,
}

impl TextureLoader {
    pub fn new(gpu: Arc<Gpu>, source: Arc<dyn DataSource>) -> Self { Self { gpu, source } }

    /// Uploads decoded RGBA8 pixels, generating the full mip chain when the
    /// format supports blits (otherwise downgrading to a single level).
    pub fn upload(
        gpu: &Gpu,
        name: &str,
        extent: vk::Extent2D,
        format: vk::Format,
        pixels: &[u8],
    ) -> Result<Texture> {
        let mut mip_levels = kestrel_vk::image::mip_level_count(extent);
        if mip_levels > 1 && !gpu.device().supports_linear_blit(format) {
            log::warn!("Format {format:?} cannot generate mips; {name} gets a single level");
            mip_levels = 1;
        }
        let usage = vk::ImageUsageFlags::SAMPLED
            | vk::ImageUsageFlags::TRANSFER_DST
            | if mip_levels > 1 {
                vk::ImageUsageFlags::TRANSFER_SRC
            } else {
                vk::ImageUsageFlags::empty()
            };
        let image = gpu.make_image(&ImageInfo {
            mip_levels,
            usage,
            ..ImageInfo::color_2d(name, extent, format)
        })?;
        gpu.execute(|cmd| gpu.copy_to_image(cmd, &image, &[pixels]))?;

        let sampler_desc = SamplerDesc::default();
        Ok(Texture {
            image,
            sampler: gpu.sampler(sampler_desc)?,
            sampler_desc,
        })
    }

    /// 8x8 white texture for unassigned material slots.
    pub fn white(gpu: &Gpu) -> Result<Texture> {
        let pixels = vec![0xffu8; 8 * 8 * 4];
        Self::upload(
            gpu,
            "white",
            vk::Extent2D {
                width: 8,
                height: 8,
            },
            vk::Format::R8G8B8A8_SRGB,
            &pixels,
        )
    }

    /// 8x8 magenta placeholder bound wherever a texture failed to load.
    pub fn magenta(gpu: &Gpu) -> Result<Texture> {
        let pixels: Vec<u8> = std::iter::repeat([0xff, 0x00, 0xff, 0xff])
            .take(64)
            .flatten()
            .collect();
        Self::upload(
            gpu,
            "fallback",
            vk::Extent2D {
                width: 8,
                height: 8,
            },
            vk::Format::R8G8B8A8_SRGB,
            &pixels,
        )
    }

    fn decode(&self, uri: &Uri) -> Result<(vk::Extent2D, Vec<u8>)> {
        let bytes = self.source.read(uri)?;
        let decoded = image::load_from_memory(&bytes)?.to_rgba8();
        let extent = vk::Extent2D {
            width: decoded.width(),
            height: decoded.height(),
        };
        Ok((extent, decoded.into_raw()))
    }
}

impl AssetLoader for TextureLoader {
    type Asset = Texture;

    fn load_payload(&mut self, uri: &Uri) -> Payload<Texture> {
        // A .json uri is a manifest declaring the image and its color space;
        // anything else is an image file, sRGB by convention.
        let (image_uri, colour_space, mut dependencies) = if uri.extension() == Some("json") {
            let doc: TextureDoc = match self
                .source
                .read(uri)
                .and_then(|bytes| Ok(serde_json::from_slice(&bytes)?))
            {
                Ok(doc) => doc,
                Err(e) => {
                    log::warn!("Failed to load texture manifest {uri}: {e}");
                    return Payload::missing(uri);
                }
            };
            let image_uri = uri.parent().join(doc.image.as_str());
            (image_uri.clone(), doc.colour_space, vec![uri.clone(), image_uri])
        } else {
            (uri.clone(), ColourSpace::Srgb, vec![uri.clone()])
        };

        let format = match colour_space {
            ColourSpace::Srgb => vk::Format::R8G8B8A8_SRGB,
            ColourSpace::Linear => vk::Format::R8G8B8A8_UNORM,
        };
        let texture = self
            .decode(&image_uri)
            .and_then(|(extent, pixels)| {
                Self::upload(&self.gpu, uri.as_str(), extent, format, &pixels)
            });
        match texture {
            Ok(texture) => {
                log::debug!(
                    "Loaded texture {uri}: {}x{} {format:?}",
                    texture.extent().width,
                    texture.extent().height,
                );
                Payload {
                    asset: Some(texture),
                    dependencies,
                }
            }
            Err(e) => {
                log::warn!("Failed to load texture {uri}: {e}");
                dependencies.dedup();
                Payload {
                    asset: None,
                    dependencies,
                }
            }
        }
    }
}
