use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::error::FaceSwapError;

/// Capture resolutions offered to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "640x480")]
    Vga,
    #[serde(rename = "1280x720")]
    Hd,
    #[serde(rename = "1920x1080")]
    FullHd,
}

impl Resolution {
    pub const ALL: &[Resolution] = &[Resolution::Vga, Resolution::Hd, Resolution::FullHd];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Vga => (640, 480),
            Resolution::Hd => (1280, 720),
            Resolution::FullHd => (1920, 1080),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        write!(f, "{w}x{h}")
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .iter()
            .copied()
            .find(|r| r.to_string() == s.trim())
            .ok_or_else(|| {
                let options: Vec<String> = Resolution::ALL.iter().map(|r| r.to_string()).collect();
                format!("unsupported resolution '{s}', expected one of {}", options.join(", "))
            })
    }
}

/// Swap quality, 1 (fastest, softest blend) to 100 (sharpest, full blend).
///
/// Only constructible through validation, so the swap model never sees an
/// out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quality(u8);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Result<Self, FaceSwapError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(FaceSwapError::InvalidQuality(value))
        }
    }

    pub fn value(self) -> u32 {
        self.0 as u32
    }

    /// `value / 100` as a fraction in `(0, 1]`.
    pub fn fraction(self) -> f64 {
        self.0 as f64 / Self::MAX as f64
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

impl TryFrom<u32> for Quality {
    type Error = FaceSwapError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub resolution: Resolution,
    pub detection_enabled: bool,
    pub quality: Quality,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: Resolution::Vga,
            detection_enabled: true,
            quality: Quality::default(),
        }
    }
}
