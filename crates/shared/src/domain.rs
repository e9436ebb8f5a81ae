use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{ParseFormatError, ParseMimeError};

pub const BRIGHTNESS_RANGE: (f32, f32) = (0.0, 2.0);
pub const CONTRAST_RANGE: (f32, f32) = (0.0, 2.0);
pub const MAX_ROTATION_DEGREES: u16 = 360;

/// Format requested from the transform call for the intermediate preview,
/// independent of the format later chosen for export.
pub const PREVIEW_FORMAT: OutputFormat = OutputFormat::Jpeg;

/// Opaque locator of a file held by the processing service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reference(pub String);

impl Reference {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub brightness: f32,
    pub contrast: f32,
    pub rotation_degrees: u16,
}

impl Default for Adjustment {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            rotation_degrees: 0,
        }
    }
}

impl Adjustment {
    pub fn new(brightness: f32, contrast: f32, rotation_degrees: u16) -> Self {
        Self {
            brightness,
            contrast,
            rotation_degrees,
        }
    }

    /// Copy with every parameter forced into its slider range.
    ///
    /// Rotation is clamped, not wrapped: 0 and 360 stay distinct values.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        Self {
            brightness: clamp_multiplier(self.brightness, BRIGHTNESS_RANGE, defaults.brightness),
            contrast: clamp_multiplier(self.contrast, CONTRAST_RANGE, defaults.contrast),
            rotation_degrees: self.rotation_degrees.min(MAX_ROTATION_DEGREES),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp_multiplier(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// Name of the locally saved export, e.g. `processed.png`.
    pub fn export_file_name(self) -> String {
        format!("processed.{}", self.extension())
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            _ => Err(ParseFormatError::new(s)),
        }
    }
}

/// Media types accepted by the upload call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMime {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageMime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageMime {
    type Err = ParseMimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" => Ok(Self::Jpeg),
            _ => Err(ParseMimeError::new(s)),
        }
    }
}
