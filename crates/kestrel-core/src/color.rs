use {
    crate::error::{Error, Result},
    glam::{Vec3, Vec4},
    serde::{Deserialize, Serialize},
};

/// 8-bit RGBA color, sRGB encoded by convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba {
    pub channels: [u8; 4],
}

impl Default for Rgba {
    fn default() -> Self { Self::WHITE }
}

impl Rgba {
    pub const WHITE: Self = Self {
        channels: [0xff; 4],
    };
    pub const BLACK: Self = Self {
        channels: [0x00, 0x00, 0x00, 0xff],
    };
    pub const MAGENTA: Self = Self {
        channels: [0xff, 0x00, 0xff, 0xff],
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            channels: [r, g, b, a],
        }
    }

    /// Parses `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 8 {
            return Err(Error::CorruptAsset(format!("invalid hex color: {hex:?}")));
        }
        let mut channels = [0u8; 4];
        for (index, channel) in channels.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16)
                .map_err(|_| Error::CorruptAsset(format!("invalid hex color: {hex:?}")))?;
        }
        Ok(Self { channels })
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.channels;
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }

    /// sRGB decode to linear floats, alpha passed through.
    pub fn to_linear(self) -> Vec4 {
        let linear = |channel: u8| {
            let value = channel as f32 / 255.0;
            if value <= 0.04045 {
                value / 12.92
            } else {
                ((value + 0.055) / 1.055).powf(2.4)
            }
        };
        let [r, g, b, a] = self.channels;
        Vec4::new(linear(r), linear(g), linear(b), a as f32 / 255.0)
    }

    pub fn from_linear(linear: Vec4) -> Self {
        let encode = |value: f32| {
            let value = value.clamp(0.0, 1.0);
            let value = if value <= 0.003_130_8 {
                value * 12.92
            } else {
                1.055 * value.powf(1.0 / 2.4) - 0.055
            };
            (value * 255.0).round() as u8
        };
        Self {
            channels: [
                encode(linear.x),
                encode(linear.y),
                encode(linear.z),
                (linear.w.clamp(0.0, 1.0) * 255.0).round() as u8,
            ],
        }
    }
}

impl TryFrom<String> for Rgba {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> { Self::from_hex(&value) }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self { value.to_hex() }
}

/// [Rgba] with an intensity scalar for HDR lighting values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HdrRgba {
    pub hex: Rgba,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
}

fn default_intensity() -> f32 { 1.0 }

impl Default for HdrRgba {
    fn default() -> Self {
        Self {
            hex: Rgba::WHITE,
            intensity: 1.0,
        }
    }
}

impl HdrRgba {
    pub fn new(rgba: Rgba, intensity: f32) -> Self {
        Self {
            hex: rgba,
            intensity,
        }
    }

    /// Linear RGB scaled by intensity; alpha unscaled.
    pub fn to_linear(self) -> Vec4 {
        let linear = self.hex.to_linear();
        (linear.truncate() * self.intensity).extend(linear.w)
    }

    pub fn rgb(self) -> Vec3 { self.to_linear().truncate() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let rgba = Rgba::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(rgba.to_hex(), "#12345678");
        assert_eq!(Rgba::from_hex("#12345678").unwrap(), rgba);
        assert_eq!(Rgba::from_hex("12345678").unwrap(), rgba);
        assert!(Rgba::from_hex("#123").is_err());
        assert!(Rgba::from_hex("#zz345678").is_err());
    }

    #[test]
    fn linear_preserves_extremes() {
        assert_eq!(Rgba::WHITE.to_linear(), Vec4::ONE);
        assert_eq!(Rgba::from_linear(Vec4::ONE), Rgba::WHITE);
        let black = Rgba::BLACK.to_linear();
        assert_eq!(black.truncate(), Vec3::ZERO);
        assert_eq!(black.w, 1.0);
    }

    #[test]
    fn intensity_scales_rgb_only() {
        let hdr = HdrRgba::new(Rgba::WHITE, 3.0);
        let linear = hdr.to_linear();
        assert_eq!(linear.truncate(), Vec3::splat(3.0));
        assert_eq!(linear.w, 1.0);
    }
}
