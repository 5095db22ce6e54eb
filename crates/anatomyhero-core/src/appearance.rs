//! Per-part visual style and the fixed levels interaction states derive from

use serde::{Deserialize, Serialize};

/// Linear RGB triple in the 0.0-1.0 range
pub type Rgb = [f32; 3];

/// Convert a packed 0xRRGGBB value into an RGB triple
pub const fn rgb_from_hex(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Visual style of a part. A plain value: every derived state is a copy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub base_color: Rgb,
    pub opacity: f32,
    pub emissive: Rgb,
    pub emissive_intensity: f32,
    /// Whether the renderer should alpha-blend this part
    pub transparent: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8],
            opacity: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            transparent: false,
        }
    }
}

impl Appearance {
    pub fn with_color(base_color: Rgb) -> Self {
        Self {
            base_color,
            ..Default::default()
        }
    }

    /// Copy with opacity replaced; anything below 1.0 turns blending on
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        if self.opacity < 1.0 {
            self.transparent = true;
        }
        self
    }

    /// Emissive colour premultiplied by its intensity
    pub fn emissive_linear(&self) -> Rgb {
        [
            self.emissive[0] * self.emissive_intensity,
            self.emissive[1] * self.emissive_intensity,
            self.emissive[2] * self.emissive_intensity,
        ]
    }
}

/// Fixed levels used by hover, select and fade states
#[derive(Debug, Clone, PartialEq)]
pub struct AppearanceLevels {
    /// Opacity of parts at rest
    pub resting_opacity: f32,
    /// Opacity of non-selected parts while fade is on
    pub faded_opacity: f32,
    pub hover_emissive: Rgb,
    pub select_emissive: Rgb,
    pub select_emissive_intensity: f32,
}

impl Default for AppearanceLevels {
    fn default() -> Self {
        Self {
            resting_opacity: 0.8,
            faded_opacity: 0.3,
            hover_emissive: rgb_from_hex(0x555555),
            select_emissive: rgb_from_hex(0x3399ff),
            select_emissive_intensity: 0.5,
        }
    }
}
