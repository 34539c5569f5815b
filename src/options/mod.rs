use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const FPS_RANGE: (u32, u32) = (5, 30);
pub const WIDTH_RANGE: (u32, u32) = (100, 1920);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionsError {
    #[error("{field} out of range: {value} is not within [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("invalid quality preset: {value} (expected low, medium or high)")]
    InvalidEnum { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// Dither algorithm passed to ffmpeg's paletteuse filter.
    pub fn dither_algo(&self) -> &'static str {
        match self {
            Quality::Low => "none",
            Quality::Medium => "bayer:bayer_scale=3",
            Quality::High => "sierra2_4a",
        }
    }

    /// Palette size for palettegen.
    pub fn max_colors(&self) -> u32 {
        match self {
            Quality::Low => 64,
            Quality::Medium => 128,
            Quality::High => 256,
        }
    }

    pub const ALL: [Quality; 3] = [Quality::Low, Quality::Medium, Quality::High];
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Low => write!(f, "low"),
            Quality::Medium => write!(f, "medium"),
            Quality::High => write!(f, "high"),
        }
    }
}

impl FromStr for Quality {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(OptionsError::InvalidEnum {
                value: other.to_string(),
            }),
        }
    }
}

/// Validated encoding parameters for one job. Immutable once constructed;
/// `validate` is the only public constructor path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    fps: u32,
    width: u32,
    quality: Quality,
}

impl ConversionOptions {
    pub fn validate(fps: u32, width: u32, quality: Quality) -> Result<Self, OptionsError> {
        if fps < FPS_RANGE.0 || fps > FPS_RANGE.1 {
            return Err(OptionsError::OutOfRange {
                field: "fps",
                value: fps,
                min: FPS_RANGE.0,
                max: FPS_RANGE.1,
            });
        }

        if width < WIDTH_RANGE.0 || width > WIDTH_RANGE.1 {
            return Err(OptionsError::OutOfRange {
                field: "width",
                value: width,
                min: WIDTH_RANGE.0,
                max: WIDTH_RANGE.1,
            });
        }

        Ok(Self {
            fps,
            width,
            quality,
        })
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            fps: 15,
            width: 480,
            quality: Quality::High,
        }
    }
}
