// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Lower bound on the per-frame wait deadline.
///
/// The acquirer derives its wait timeout from the source's nominal frame
/// rate; very fast frame rates would otherwise produce deadlines so short
/// that ordinary scheduling jitter reads as a stall.
pub const WAIT_TIMEOUT_FLOOR: Duration = Duration::from_millis(500);

/// Wait deadline as a multiple of the nominal frame period.
///
/// Two periods: one full exposure in flight plus one of slack.
pub const WAIT_TIMEOUT_PERIODS: f64 = 2.0;

/// Default sampling interval for the monitor stage
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Names of the device features the pipeline reads and writes.
///
/// Capture sources expose configuration as named scalar, boolean and
/// enumerated parameters; these are the ones the pipeline itself touches.
pub mod features {
    /// Nominal acquisition rate in frames per second (float)
    pub const FRAME_RATE: &str = "FrameRate";
    /// Byte length of one raw frame buffer, metadata included (int)
    pub const IMAGE_SIZE_BYTES: &str = "ImageSizeBytes";
    /// Active sensor region width in pixels (int)
    pub const AOI_WIDTH: &str = "AOIWidth";
    /// Active sensor region height in pixels (int)
    pub const AOI_HEIGHT: &str = "AOIHeight";
    /// Padded byte length of one raw row (int)
    pub const AOI_STRIDE: &str = "AOIStride";
    /// Acquisition cycle mode (enum, see [`super::cycle_mode`])
    pub const CYCLE_MODE: &str = "CycleMode";
    /// Raw sample layout (enum, parsed by `PixelEncoding::from_name`)
    pub const PIXEL_ENCODING: &str = "PixelEncoding";
    /// Master switch for embedded per-frame metadata (bool)
    pub const METADATA_ENABLE: &str = "MetadataEnable";
    /// Include frame geometry in embedded metadata (bool)
    pub const METADATA_FRAME_INFO: &str = "MetadataFrameInfo";
    /// Include a device-clock timestamp in embedded metadata (bool)
    pub const METADATA_TIMESTAMP: &str = "MetadataTimestamp";
    /// Sensor temperature in degrees Celsius (float, read-only)
    pub const SENSOR_TEMPERATURE: &str = "SensorTemperature";
    /// Exposure time in seconds (float)
    pub const EXPOSURE_TIME: &str = "ExposureTime";
    /// Trigger source (enum)
    pub const TRIGGER_MODE: &str = "TriggerMode";
}

/// Values of the acquisition cycle mode enum
pub mod cycle_mode {
    /// Capture frames until explicitly stopped
    pub const CONTINUOUS: &str = "Continuous";
    /// Capture a fixed-length burst
    pub const FIXED: &str = "Fixed";
}
