// SPDX-License-Identifier: GPL-3.0-only
// Capture backend with trait-based abstraction for future multi-device support

//! Capture-source abstraction
//!
//! This module defines the boundary between the streaming pipeline and the
//! device layer. The pipeline drives any [`CaptureSource`]; the crate ships
//! a deterministic [`SimulatedCamera`] and real device backends implement the
//! same trait out of tree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   CapturePipeline    │  ← stages, stop/drain protocol, monitoring
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │  CaptureSource trait │  ← session, frame I/O, named features
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ┌───────────┐
//!      │ Simulated │  ← deterministic frames, scriptable faults
//!      └───────────┘
//! ```

pub mod format_converters;
pub mod simulated;
pub mod types;

pub use simulated::{SimProbe, SimulatedCamera, SimulatedCameraConfig};
pub use types::*;

use crate::constants::features;
use std::time::Duration;

/// Complete capture-source trait
///
/// A source is opened by its constructor and remains usable until `close`.
/// All device state is exposed through named features; the typed query
/// helpers (`frame_rate`, `frame_size_bytes`, `layout`) are conveniences
/// over the feature layer.
pub trait CaptureSource: Send {
    // ===== Acquisition =====

    /// Begin continuous acquisition.
    ///
    /// Frames complete into buffers previously handed over via `submit`.
    fn start(&mut self) -> SourceResult<()>;

    /// Stop acquisition. Submitted buffers stay queued until `flush`.
    fn stop(&mut self) -> SourceResult<()>;

    /// Discard all submitted buffers.
    ///
    /// Also serves as a cheap connectivity probe: a source that cannot flush
    /// is not usable, and callers treat a failure here as fatal.
    fn flush(&mut self) -> SourceResult<()>;

    /// Hand a buffer to the source for the next exposure.
    ///
    /// The buffer must be at least `frame_size_bytes` long. Ownership
    /// transfers to the source until the buffer comes back out of
    /// `await_frame`.
    fn submit(&mut self, buffer: Vec<u8>) -> SourceResult<()>;

    /// Block until the oldest submitted buffer has been filled, up to
    /// `timeout`.
    ///
    /// # Returns
    /// * `Ok(buffer)` - the filled buffer, ownership returned to the caller
    /// * `Err(SourceError::Timeout)` - no frame completed within the deadline
    /// * `Err(_)` - device fault; the buffer is reclaimed by the next `flush`
    fn await_frame(&mut self, timeout: Duration) -> SourceResult<Vec<u8>>;

    // ===== Named features =====

    fn get_int(&self, feature: &str) -> SourceResult<i64>;
    fn set_int(&mut self, feature: &str, value: i64) -> SourceResult<()>;
    fn get_float(&self, feature: &str) -> SourceResult<f64>;
    fn set_float(&mut self, feature: &str, value: f64) -> SourceResult<()>;
    fn get_bool(&self, feature: &str) -> SourceResult<bool>;
    fn set_bool(&mut self, feature: &str, value: bool) -> SourceResult<()>;
    fn get_enum(&self, feature: &str) -> SourceResult<String>;
    fn set_enum(&mut self, feature: &str, value: &str) -> SourceResult<()>;

    // ===== Metadata =====

    /// Extract embedded per-frame metadata from a filled buffer.
    ///
    /// Returns `None` when the source does not embed metadata or the buffer
    /// carries none.
    fn frame_metadata(&self, frame: &[u8]) -> Option<FrameMetadata>;

    // ===== Session =====

    /// Close the session. Further calls return `SourceError::Closed`.
    fn close(&mut self) -> SourceResult<()>;

    // ===== Typed queries over the feature layer =====

    /// Nominal acquisition rate in frames per second
    fn frame_rate(&self) -> SourceResult<f64> {
        self.get_float(features::FRAME_RATE)
    }

    /// Byte length of one raw frame buffer, embedded metadata included
    fn frame_size_bytes(&self) -> SourceResult<usize> {
        Ok(self.get_int(features::IMAGE_SIZE_BYTES)? as usize)
    }

    /// Geometry and sample layout of raw frames
    fn layout(&self) -> SourceResult<FrameLayout> {
        let width = self.get_int(features::AOI_WIDTH)? as u32;
        let height = self.get_int(features::AOI_HEIGHT)? as u32;
        let stride = self.get_int(features::AOI_STRIDE)? as usize;
        let name = self.get_enum(features::PIXEL_ENCODING)?;
        let encoding = PixelEncoding::from_name(&name)
            .ok_or_else(|| SourceError::Unsupported(format!("pixel encoding {name}")))?;
        Ok(FrameLayout {
            shape: FrameShape::new(width, height),
            stride,
            encoding,
        })
    }
}
