// SPDX-License-Identifier: GPL-3.0-only
// Shared types for capture-source backends

//! Shared types for capture sources and the frames flowing through the
//! pipeline

use serde::{Deserialize, Serialize};

/// Sample layout of a raw frame as delivered by the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PixelEncoding {
    /// Two 12-bit samples packed into three bytes
    ///
    /// Byte 0 holds sample A bits 11..4, byte 1 holds sample B bits 11..4,
    /// byte 2 holds the low nibbles (B in the high half, A in the low half).
    #[default]
    Mono12Packed,
    /// One 16-bit little-endian sample per pixel
    Mono16,
    /// One 32-bit little-endian sample per pixel
    Mono32,
}

impl PixelEncoding {
    /// Unpadded byte length of one row at the given width
    pub fn bytes_per_row(&self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::Mono12Packed => (width * 3).div_ceil(2),
            Self::Mono16 => width * 2,
            Self::Mono32 => width * 4,
        }
    }

    /// Largest sample value this encoding can carry, for ramp generators and
    /// range checks
    pub fn sample_mask(&self) -> u16 {
        match self {
            Self::Mono12Packed => 0x0fff,
            Self::Mono16 | Self::Mono32 => 0xffff,
        }
    }

    /// Device feature string for this encoding
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mono12Packed => "Mono12Packed",
            Self::Mono16 => "Mono16",
            Self::Mono32 => "Mono32",
        }
    }

    /// Parse an encoding from its device feature string
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Mono12Packed" => Some(Self::Mono12Packed),
            "Mono16" => Some(Self::Mono16),
            "Mono32" => Some(Self::Mono32),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub width: u32,
    pub height: u32,
}

impl FrameShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of samples in one frame
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl std::fmt::Display for FrameShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Geometry and sample layout of raw frames, reported by the capture source
///
/// `stride` is the padded byte length of one row in the raw buffer and is
/// always at least `encoding.bytes_per_row(shape.width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub shape: FrameShape,
    pub stride: usize,
    pub encoding: PixelEncoding,
}

impl FrameLayout {
    /// Layout with no row padding
    pub fn packed(shape: FrameShape, encoding: PixelEncoding) -> Self {
        Self {
            shape,
            stride: encoding.bytes_per_row(shape.width),
            encoding,
        }
    }

    /// Byte length of the image region of one raw frame
    pub fn image_bytes(&self) -> usize {
        self.stride * self.shape.height as usize
    }
}

/// Per-frame metadata embedded in the raw buffer by the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Dimensions the source reports for this specific frame
    pub shape: FrameShape,
    /// Device clock ticks at exposure end
    pub timestamp: u64,
}

/// Unconverted frame as delivered by the capture source.
///
/// Owned by exactly one stage at a time; ownership moves through the
/// conversion channel and the buffer is dropped by the converter.
#[derive(Debug)]
pub struct RawFrame {
    pub data: Vec<u8>,
    /// Extracted at acquisition time when the source embeds metadata
    pub metadata: Option<FrameMetadata>,
}

/// Converted frame: unpadded 16-bit samples ready for the sink.
///
/// Same single-owner discipline as [`RawFrame`]; dropped by the writer once
/// appended.
#[derive(Debug)]
pub struct SampleFrame {
    pub shape: FrameShape,
    pub samples: Vec<u16>,
}

/// Item carried by the inter-stage channels.
///
/// `Shutdown` carries no data; it exists solely to unblock a consumer parked
/// on an empty channel while the pipeline drains. Consumers discard it and
/// re-check their loop condition.
#[derive(Debug)]
pub enum Handoff<T> {
    Frame(T),
    Shutdown,
}

/// Result type for capture-source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors reported by a capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No frame arrived within the wait deadline
    Timeout,
    /// Device or driver call failed with a status code
    Fault(i32),
    /// Named feature does not exist on this device
    UnknownFeature(String),
    /// Feature exists but the requested value or type is not supported
    Unsupported(String),
    /// Session has been closed
    Closed,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Timeout => write!(f, "wait for frame timed out"),
            SourceError::Fault(code) => write!(f, "device fault (code {})", code),
            SourceError::UnknownFeature(name) => write!(f, "unknown feature: {}", name),
            SourceError::Unsupported(what) => write!(f, "unsupported: {}", what),
            SourceError::Closed => write!(f, "capture session is closed"),
        }
    }
}

impl std::error::Error for SourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mono12_row_length_rounds_up_for_odd_widths() {
        assert_eq!(PixelEncoding::Mono12Packed.bytes_per_row(4), 6);
        assert_eq!(PixelEncoding::Mono12Packed.bytes_per_row(5), 8);
    }

    #[test]
    fn encoding_names_round_trip() {
        for encoding in [
            PixelEncoding::Mono12Packed,
            PixelEncoding::Mono16,
            PixelEncoding::Mono32,
        ] {
            assert_eq!(PixelEncoding::from_name(encoding.name()), Some(encoding));
        }
        assert_eq!(PixelEncoding::from_name("Rgb8"), None);
    }

    #[test]
    fn packed_layout_has_no_padding() {
        let layout = FrameLayout::packed(FrameShape::new(8, 4), PixelEncoding::Mono16);
        assert_eq!(layout.stride, 16);
        assert_eq!(layout.image_bytes(), 64);
    }
}
