// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for capture operations
//!
//! This module provides command-line functionality for:
//! - Running a capture session against the simulated camera
//! - Inspecting the simulated device's reported parameters

use chrono::Local;
use framepipe::backends::camera::{CaptureSource, FrameShape, PixelEncoding};
use framepipe::constants::features;
use framepipe::{
    CapturePipeline, GeometrySource, PipelineConfig, SimulatedCamera, SimulatedCameraConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Options for the `run` subcommand
pub struct RunOptions {
    pub output: Option<PathBuf>,
    pub frames: Option<u64>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub encoding: String,
    pub metadata_geometry: bool,
}

/// Capture frames into a raw sample file until Ctrl-C or the frame limit
pub fn run_capture(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let encoding = PixelEncoding::from_name(&options.encoding)
        .ok_or_else(|| format!("unknown encoding: {}", options.encoding))?;
    let output = options.output.unwrap_or_else(default_output_path);

    // The sink contract: the caller removes any pre-existing file before the
    // pipeline opens its destination.
    if let Err(err) = std::fs::remove_file(&output)
        && err.kind() != std::io::ErrorKind::NotFound
    {
        return Err(format!("cannot replace {}: {err}", output.display()).into());
    }

    let camera = SimulatedCamera::new(SimulatedCameraConfig {
        shape: FrameShape::new(options.width, options.height),
        encoding,
        frame_rate: options.fps,
        ..SimulatedCameraConfig::default()
    });

    let config = PipelineConfig {
        output_path: output.clone(),
        frame_limit: options.frames,
        geometry_source: if options.metadata_geometry {
            GeometrySource::Metadata
        } else {
            GeometrySource::Fixed
        },
        ..PipelineConfig::default()
    };

    let mut pipeline = CapturePipeline::new(Box::new(camera), config)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))?;
    }

    pipeline.start()?;
    match options.frames {
        Some(limit) => println!(
            "Capturing {limit} frames to {} (Ctrl-C to stop early)...",
            output.display()
        ),
        None => println!("Capturing to {} (Ctrl-C to stop)...", output.display()),
    }

    loop {
        if interrupted.load(Ordering::SeqCst) {
            break;
        }
        if let Some(limit) = options.frames {
            if pipeline.wait_for_written(limit, Duration::from_millis(200)) {
                break;
            }
        } else {
            thread::sleep(Duration::from_millis(200));
        }
    }

    pipeline.stop()?;
    println!("Total frames written: {}", pipeline.frames_written());
    Ok(())
}

/// Print the simulated device's reported parameters
pub fn show_info() -> Result<(), Box<dyn std::error::Error>> {
    let camera = SimulatedCamera::new(SimulatedCameraConfig::default());
    let layout = camera.layout()?;

    println!("Simulated camera:");
    println!("  Frame rate:    {} Hz", camera.frame_rate()?);
    println!("  Geometry:      {}", layout.shape);
    println!("  Row stride:    {} bytes", layout.stride);
    println!("  Encoding:      {}", layout.encoding);
    println!("  Frame size:    {} bytes", camera.frame_size_bytes()?);
    println!(
        "  Exposure time: {} s",
        camera.get_float(features::EXPOSURE_TIME)?
    );
    println!(
        "  Temperature:   {} \u{00b0}C",
        camera.get_float(features::SENSOR_TEMPERATURE)?
    );
    println!(
        "  Trigger mode:  {}",
        camera.get_enum(features::TRIGGER_MODE)?
    );
    Ok(())
}

fn default_output_path() -> PathBuf {
    PathBuf::from(format!(
        "capture_{}.raw",
        Local::now().format("%Y-%m-%d_%H-%M-%S")
    ))
}
