// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic in-memory capture source
//!
//! Serves synthetic ramp frames at a configurable nominal rate, embeds the
//! same metadata trailer a hardware source would, and lets tests script
//! transient faults into the wait-for-frame path. The frame content for any
//! sequence number is reproducible via [`SimulatedCamera::expected_frame`],
//! so sink contents can be checked sample-for-sample.

use super::CaptureSource;
use super::types::{
    FrameLayout, FrameMetadata, FrameShape, PixelEncoding, SourceError, SourceResult,
};
use crate::constants::{cycle_mode, features};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Byte length of the embedded metadata trailer
const METADATA_TRAILER_BYTES: usize = 20;
/// Marker identifying a valid metadata trailer
const METADATA_MAGIC: u32 = 0x4652_4D44;

/// Fault code for a wait with no submitted buffer
const FAULT_NO_BUFFER: i32 = 3;
/// Fault code for acquisition calls before `start`
const FAULT_NOT_ACQUIRING: i32 = 4;
/// Fault code for a submitted buffer shorter than one frame
const FAULT_SHORT_BUFFER: i32 = 5;

/// Construction settings for [`SimulatedCamera`]
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCameraConfig {
    pub shape: FrameShape,
    pub encoding: PixelEncoding,
    /// Nominal acquisition rate in frames per second
    pub frame_rate: f64,
    /// Extra padding bytes appended to every raw row
    pub row_padding: usize,
    /// Whether frames initially carry the metadata trailer
    pub embed_metadata: bool,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            shape: FrameShape::new(640, 480),
            encoding: PixelEncoding::Mono12Packed,
            frame_rate: 120.0,
            row_padding: 0,
            embed_metadata: false,
        }
    }
}

#[derive(Default)]
struct SimStats {
    frames_filled: AtomicU64,
    starts: AtomicU64,
    flushes: AtomicU64,
}

/// Shared observer handle onto a [`SimulatedCamera`]'s internal counters.
///
/// Stays valid after the camera itself has been moved into a pipeline, which
/// is how tests assert on restart behaviour.
#[derive(Clone)]
pub struct SimProbe {
    stats: Arc<SimStats>,
}

impl SimProbe {
    /// Frames filled into submitted buffers so far
    pub fn frames_filled(&self) -> u64 {
        self.stats.frames_filled.load(Ordering::SeqCst)
    }

    /// Times acquisition has been started (initial start plus restarts)
    pub fn starts(&self) -> u64 {
        self.stats.starts.load(Ordering::SeqCst)
    }

    /// Times the submission queue has been flushed
    pub fn flushes(&self) -> u64 {
        self.stats.flushes.load(Ordering::SeqCst)
    }
}

/// Deterministic capture source for tests and offline runs
pub struct SimulatedCamera {
    shape: FrameShape,
    encoding: PixelEncoding,
    frame_rate: f64,
    row_padding: usize,
    embed_metadata: bool,
    metadata_frame_info: bool,
    metadata_timestamp: bool,
    exposure_time: f64,
    sensor_temperature: f64,
    cycle: String,
    trigger: String,
    acquiring: bool,
    closed: bool,
    pending: VecDeque<Vec<u8>>,
    faults: VecDeque<SourceError>,
    stats: Arc<SimStats>,
}

impl SimulatedCamera {
    pub fn new(config: SimulatedCameraConfig) -> Self {
        Self {
            shape: config.shape,
            encoding: config.encoding,
            frame_rate: config.frame_rate,
            row_padding: config.row_padding,
            embed_metadata: config.embed_metadata,
            metadata_frame_info: true,
            metadata_timestamp: true,
            exposure_time: 1.0 / config.frame_rate,
            sensor_temperature: -25.0,
            cycle: cycle_mode::FIXED.to_string(),
            trigger: "Internal".to_string(),
            acquiring: false,
            closed: false,
            pending: VecDeque::new(),
            faults: VecDeque::new(),
            stats: Arc::new(SimStats::default()),
        }
    }

    /// Observer handle that outlives hand-over to a pipeline
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            stats: Arc::clone(&self.stats),
        }
    }

    /// Script a transient fault for an upcoming wait-for-frame call.
    ///
    /// Faults are consumed in injection order, one per wait, before any
    /// frame is served.
    pub fn inject_wait_fault(&mut self, fault: SourceError) {
        self.faults.push_back(fault);
    }

    /// Samples of the frame with the given sequence number, as the converted
    /// stage will see them
    pub fn expected_frame(config: &SimulatedCameraConfig, sequence: u64) -> Vec<u16> {
        ramp_samples(config.shape, config.encoding, sequence)
    }

    fn current_layout(&self) -> FrameLayout {
        FrameLayout {
            shape: self.shape,
            stride: self.encoding.bytes_per_row(self.shape.width) + self.row_padding,
            encoding: self.encoding,
        }
    }

    fn current_frame_size(&self) -> usize {
        let image = self.current_layout().image_bytes();
        if self.embed_metadata {
            image + METADATA_TRAILER_BYTES
        } else {
            image
        }
    }

    fn ensure_open(&self) -> SourceResult<()> {
        if self.closed {
            Err(SourceError::Closed)
        } else {
            Ok(())
        }
    }

    /// Device clock ticks for the frame with this sequence number
    fn timestamp_ticks(&self, sequence: u64) -> u64 {
        sequence.saturating_mul((1_000_000_000.0 / self.frame_rate) as u64)
    }

    fn fill(&self, buffer: &mut Vec<u8>, sequence: u64) {
        let layout = self.current_layout();
        let row_bytes = layout.encoding.bytes_per_row(layout.shape.width);
        let width = layout.shape.width as usize;

        buffer.clear();
        buffer.resize(self.current_frame_size(), 0);

        let samples = ramp_samples(layout.shape, layout.encoding, sequence);
        for row in 0..layout.shape.height as usize {
            let row_samples = &samples[row * width..(row + 1) * width];
            let out = &mut buffer[row * layout.stride..row * layout.stride + row_bytes];
            match layout.encoding {
                PixelEncoding::Mono12Packed => pack_mono12_row(row_samples, out),
                PixelEncoding::Mono16 => {
                    for (i, sample) in row_samples.iter().enumerate() {
                        out[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
                    }
                }
                PixelEncoding::Mono32 => {
                    for (i, sample) in row_samples.iter().enumerate() {
                        out[i * 4..i * 4 + 4].copy_from_slice(&(*sample as u32).to_le_bytes());
                    }
                }
            }
        }

        if self.embed_metadata {
            let trailer = &mut buffer[layout.image_bytes()..];
            trailer[0..4].copy_from_slice(&METADATA_MAGIC.to_le_bytes());
            trailer[4..8].copy_from_slice(&layout.shape.width.to_le_bytes());
            trailer[8..12].copy_from_slice(&layout.shape.height.to_le_bytes());
            trailer[12..20].copy_from_slice(&self.timestamp_ticks(sequence).to_le_bytes());
        }
    }
}

impl CaptureSource for SimulatedCamera {
    fn start(&mut self) -> SourceResult<()> {
        self.ensure_open()?;
        self.acquiring = true;
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> SourceResult<()> {
        self.ensure_open()?;
        self.acquiring = false;
        Ok(())
    }

    fn flush(&mut self) -> SourceResult<()> {
        self.ensure_open()?;
        self.pending.clear();
        self.stats.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn submit(&mut self, buffer: Vec<u8>) -> SourceResult<()> {
        self.ensure_open()?;
        if buffer.len() < self.current_frame_size() {
            return Err(SourceError::Fault(FAULT_SHORT_BUFFER));
        }
        self.pending.push_back(buffer);
        Ok(())
    }

    fn await_frame(&mut self, timeout: Duration) -> SourceResult<Vec<u8>> {
        self.ensure_open()?;
        if !self.acquiring {
            return Err(SourceError::Fault(FAULT_NOT_ACQUIRING));
        }
        if let Some(fault) = self.faults.pop_front() {
            return Err(fault);
        }

        let period = Duration::from_secs_f64(1.0 / self.frame_rate);
        if period > timeout {
            // Nominal pacing is slower than the caller's deadline.
            thread::sleep(timeout);
            return Err(SourceError::Timeout);
        }
        thread::sleep(period);

        let mut buffer = self
            .pending
            .pop_front()
            .ok_or(SourceError::Fault(FAULT_NO_BUFFER))?;
        let sequence = self.stats.frames_filled.fetch_add(1, Ordering::SeqCst);
        self.fill(&mut buffer, sequence);
        Ok(buffer)
    }

    fn get_int(&self, feature: &str) -> SourceResult<i64> {
        self.ensure_open()?;
        match feature {
            features::IMAGE_SIZE_BYTES => Ok(self.current_frame_size() as i64),
            features::AOI_WIDTH => Ok(self.shape.width as i64),
            features::AOI_HEIGHT => Ok(self.shape.height as i64),
            features::AOI_STRIDE => Ok(self.current_layout().stride as i64),
            _ => Err(unknown_or_mistyped(feature, "integer")),
        }
    }

    fn set_int(&mut self, feature: &str, value: i64) -> SourceResult<()> {
        self.ensure_open()?;
        match feature {
            features::AOI_WIDTH => {
                self.shape.width = value as u32;
                Ok(())
            }
            features::AOI_HEIGHT => {
                self.shape.height = value as u32;
                Ok(())
            }
            features::IMAGE_SIZE_BYTES | features::AOI_STRIDE => {
                Err(SourceError::Unsupported(format!("{feature} is read-only")))
            }
            _ => Err(unknown_or_mistyped(feature, "integer")),
        }
    }

    fn get_float(&self, feature: &str) -> SourceResult<f64> {
        self.ensure_open()?;
        match feature {
            features::FRAME_RATE => Ok(self.frame_rate),
            features::EXPOSURE_TIME => Ok(self.exposure_time),
            features::SENSOR_TEMPERATURE => Ok(self.sensor_temperature),
            _ => Err(unknown_or_mistyped(feature, "float")),
        }
    }

    fn set_float(&mut self, feature: &str, value: f64) -> SourceResult<()> {
        self.ensure_open()?;
        match feature {
            features::FRAME_RATE => {
                if value <= 0.0 {
                    return Err(SourceError::Unsupported(format!(
                        "{} = {value}",
                        features::FRAME_RATE
                    )));
                }
                self.frame_rate = value;
                Ok(())
            }
            features::EXPOSURE_TIME => {
                self.exposure_time = value;
                Ok(())
            }
            features::SENSOR_TEMPERATURE => {
                Err(SourceError::Unsupported(format!("{feature} is read-only")))
            }
            _ => Err(unknown_or_mistyped(feature, "float")),
        }
    }

    fn get_bool(&self, feature: &str) -> SourceResult<bool> {
        self.ensure_open()?;
        match feature {
            features::METADATA_ENABLE => Ok(self.embed_metadata),
            features::METADATA_FRAME_INFO => Ok(self.metadata_frame_info),
            features::METADATA_TIMESTAMP => Ok(self.metadata_timestamp),
            _ => Err(unknown_or_mistyped(feature, "boolean")),
        }
    }

    fn set_bool(&mut self, feature: &str, value: bool) -> SourceResult<()> {
        self.ensure_open()?;
        match feature {
            features::METADATA_ENABLE => {
                self.embed_metadata = value;
                Ok(())
            }
            features::METADATA_FRAME_INFO => {
                self.metadata_frame_info = value;
                Ok(())
            }
            features::METADATA_TIMESTAMP => {
                self.metadata_timestamp = value;
                Ok(())
            }
            _ => Err(unknown_or_mistyped(feature, "boolean")),
        }
    }

    fn get_enum(&self, feature: &str) -> SourceResult<String> {
        self.ensure_open()?;
        match feature {
            features::CYCLE_MODE => Ok(self.cycle.clone()),
            features::TRIGGER_MODE => Ok(self.trigger.clone()),
            features::PIXEL_ENCODING => Ok(self.encoding.name().to_string()),
            _ => Err(unknown_or_mistyped(feature, "enumerated")),
        }
    }

    fn set_enum(&mut self, feature: &str, value: &str) -> SourceResult<()> {
        self.ensure_open()?;
        match feature {
            features::CYCLE_MODE => match value {
                cycle_mode::CONTINUOUS | cycle_mode::FIXED => {
                    self.cycle = value.to_string();
                    Ok(())
                }
                _ => Err(SourceError::Unsupported(format!(
                    "{} = {value}",
                    features::CYCLE_MODE
                ))),
            },
            features::TRIGGER_MODE => {
                self.trigger = value.to_string();
                Ok(())
            }
            features::PIXEL_ENCODING => match PixelEncoding::from_name(value) {
                Some(encoding) => {
                    self.encoding = encoding;
                    Ok(())
                }
                None => Err(SourceError::Unsupported(format!(
                    "{} = {value}",
                    features::PIXEL_ENCODING
                ))),
            },
            _ => Err(unknown_or_mistyped(feature, "enumerated")),
        }
    }

    fn frame_metadata(&self, frame: &[u8]) -> Option<FrameMetadata> {
        let offset = self.current_layout().image_bytes();
        let trailer = frame.get(offset..offset + METADATA_TRAILER_BYTES)?;
        let magic = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        if magic != METADATA_MAGIC {
            return None;
        }
        let width = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);
        let height = u32::from_le_bytes([trailer[8], trailer[9], trailer[10], trailer[11]]);
        let mut ticks = [0u8; 8];
        ticks.copy_from_slice(&trailer[12..20]);
        Some(FrameMetadata {
            shape: FrameShape::new(width, height),
            timestamp: u64::from_le_bytes(ticks),
        })
    }

    fn close(&mut self) -> SourceResult<()> {
        self.ensure_open()?;
        self.acquiring = false;
        self.pending.clear();
        self.closed = true;
        Ok(())
    }
}

/// The simulated device only reports the features it actually has, so any
/// other name is unknown rather than mistyped.
fn unknown_or_mistyped(feature: &str, kind: &str) -> SourceError {
    match feature {
        features::FRAME_RATE
        | features::IMAGE_SIZE_BYTES
        | features::AOI_WIDTH
        | features::AOI_HEIGHT
        | features::AOI_STRIDE
        | features::CYCLE_MODE
        | features::PIXEL_ENCODING
        | features::METADATA_ENABLE
        | features::METADATA_FRAME_INFO
        | features::METADATA_TIMESTAMP
        | features::SENSOR_TEMPERATURE
        | features::EXPOSURE_TIME
        | features::TRIGGER_MODE => {
            SourceError::Unsupported(format!("{feature} is not a {kind} feature"))
        }
        _ => SourceError::UnknownFeature(feature.to_string()),
    }
}

/// Deterministic per-frame sample ramp.
///
/// Sample `i` of frame `n` is `(n * 17 + i) & mask`, so consecutive frames
/// differ everywhere and any frame can be regenerated from its sequence
/// number alone.
fn ramp_samples(shape: FrameShape, encoding: PixelEncoding, sequence: u64) -> Vec<u16> {
    let mask = encoding.sample_mask() as u64;
    (0..shape.pixel_count() as u64)
        .map(|i| ((sequence.wrapping_mul(17).wrapping_add(i)) & mask) as u16)
        .collect()
}

fn pack_mono12_row(samples: &[u16], out: &mut [u8]) {
    let mut offset = 0;
    let mut pairs = samples.chunks_exact(2);
    for pair in &mut pairs {
        let a = pair[0] & 0x0fff;
        let b = pair[1] & 0x0fff;
        out[offset] = (a >> 4) as u8;
        out[offset + 1] = (b >> 4) as u8;
        out[offset + 2] = (((b & 0x0f) << 4) | (a & 0x0f)) as u8;
        offset += 3;
    }
    if let [last] = pairs.remainder() {
        let a = last & 0x0fff;
        out[offset] = (a >> 4) as u8;
        out[offset + 1] = (a & 0x0f) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::format_converters::convert_frame;

    fn fast_config() -> SimulatedCameraConfig {
        SimulatedCameraConfig {
            shape: FrameShape::new(8, 4),
            encoding: PixelEncoding::Mono12Packed,
            frame_rate: 2000.0,
            row_padding: 0,
            embed_metadata: false,
        }
    }

    fn serve_one(camera: &mut SimulatedCamera) -> Vec<u8> {
        let size = camera.frame_size_bytes().unwrap();
        camera.submit(vec![0u8; size]).unwrap();
        camera.await_frame(Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn served_frames_match_expected_samples() {
        let config = fast_config();
        let mut camera = SimulatedCamera::new(config.clone());
        camera.start().unwrap();

        for sequence in 0..3 {
            let raw = serve_one(&mut camera);
            let frame = convert_frame(&raw, &camera.current_layout()).unwrap();
            assert_eq!(frame.samples, SimulatedCamera::expected_frame(&config, sequence));
        }
    }

    #[test]
    fn metadata_trailer_round_trips() {
        let mut config = fast_config();
        config.embed_metadata = true;
        let mut camera = SimulatedCamera::new(config);
        camera.start().unwrap();

        let raw = serve_one(&mut camera);
        let metadata = camera.frame_metadata(&raw).unwrap();
        assert_eq!(metadata.shape, FrameShape::new(8, 4));
        assert_eq!(metadata.timestamp, 0);

        let raw = serve_one(&mut camera);
        let metadata = camera.frame_metadata(&raw).unwrap();
        assert!(metadata.timestamp > 0);
    }

    #[test]
    fn frames_without_trailer_have_no_metadata() {
        let mut camera = SimulatedCamera::new(fast_config());
        camera.start().unwrap();
        let raw = serve_one(&mut camera);
        assert!(camera.frame_metadata(&raw).is_none());
    }

    #[test]
    fn injected_faults_are_served_in_order_before_frames() {
        let mut camera = SimulatedCamera::new(fast_config());
        camera.start().unwrap();
        camera.inject_wait_fault(SourceError::Timeout);
        camera.inject_wait_fault(SourceError::Fault(7));

        let size = camera.frame_size_bytes().unwrap();
        camera.submit(vec![0u8; size]).unwrap();

        let timeout = Duration::from_millis(500);
        assert_eq!(camera.await_frame(timeout), Err(SourceError::Timeout));
        assert_eq!(camera.await_frame(timeout), Err(SourceError::Fault(7)));
        assert!(camera.await_frame(timeout).is_ok());
    }

    #[test]
    fn wait_without_submit_is_a_fault() {
        let mut camera = SimulatedCamera::new(fast_config());
        camera.start().unwrap();
        assert_eq!(
            camera.await_frame(Duration::from_millis(500)),
            Err(SourceError::Fault(FAULT_NO_BUFFER))
        );
    }

    #[test]
    fn slow_pacing_times_out_against_a_short_deadline() {
        let mut config = fast_config();
        config.frame_rate = 10.0; // 100 ms period
        let mut camera = SimulatedCamera::new(config);
        camera.start().unwrap();
        let size = camera.frame_size_bytes().unwrap();
        camera.submit(vec![0u8; size]).unwrap();
        assert_eq!(
            camera.await_frame(Duration::from_millis(10)),
            Err(SourceError::Timeout)
        );
    }

    #[test]
    fn features_report_layout_and_reject_unknown_names() {
        let mut camera = SimulatedCamera::new(fast_config());
        assert_eq!(camera.get_int(features::AOI_WIDTH).unwrap(), 8);
        assert_eq!(camera.get_int(features::AOI_HEIGHT).unwrap(), 4);
        assert_eq!(
            camera.get_enum(features::PIXEL_ENCODING).unwrap(),
            "Mono12Packed"
        );

        camera
            .set_enum(features::CYCLE_MODE, cycle_mode::CONTINUOUS)
            .unwrap();
        assert_eq!(camera.get_enum(features::CYCLE_MODE).unwrap(), "Continuous");

        assert_eq!(
            camera.get_int("NoSuchFeature"),
            Err(SourceError::UnknownFeature("NoSuchFeature".to_string()))
        );
        assert!(matches!(
            camera.get_int(features::FRAME_RATE),
            Err(SourceError::Unsupported(_))
        ));
    }

    #[test]
    fn closed_session_rejects_everything() {
        let mut camera = SimulatedCamera::new(fast_config());
        camera.close().unwrap();
        assert_eq!(camera.start(), Err(SourceError::Closed));
        assert_eq!(camera.flush(), Err(SourceError::Closed));
        assert_eq!(camera.get_int(features::AOI_WIDTH), Err(SourceError::Closed));
    }
}
