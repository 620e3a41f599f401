// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests for the streaming capture pipeline

use framepipe::backends::camera::{FrameShape, PixelEncoding, SourceError};
use framepipe::{
    CapturePipeline, GeometrySource, PipelineConfig, PipelineError, SimulatedCamera,
    SimulatedCameraConfig,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn test_camera_config() -> SimulatedCameraConfig {
    SimulatedCameraConfig {
        shape: FrameShape::new(16, 8),
        encoding: PixelEncoding::Mono12Packed,
        frame_rate: 2000.0,
        row_padding: 0,
        embed_metadata: false,
    }
}

fn test_pipeline_config(output: PathBuf, frame_limit: u64) -> PipelineConfig {
    PipelineConfig {
        output_path: output,
        frame_limit: Some(frame_limit),
        geometry_source: GeometrySource::Fixed,
        monitor_interval_ms: 50,
    }
}

/// Read the sink back as the native-endian samples the writer appended
fn read_samples(path: &Path) -> Vec<u16> {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(bytes.len() % 2, 0, "sink holds whole samples");
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

fn assert_frames(
    samples: &[u16],
    camera_config: &SimulatedCameraConfig,
    sequences: std::ops::Range<u64>,
) {
    let frame_len = camera_config.shape.pixel_count();
    let frame_count = (sequences.end - sequences.start) as usize;
    assert_eq!(
        samples.len(),
        frame_len * frame_count,
        "sink holds exactly the expected frames"
    );
    for (index, sequence) in sequences.enumerate() {
        assert_eq!(
            &samples[index * frame_len..(index + 1) * frame_len],
            SimulatedCamera::expected_frame(camera_config, sequence).as_slice(),
            "frame {index} out of order or corrupt"
        );
    }
}

#[test]
fn five_frames_reach_the_sink_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.raw");

    let camera_config = test_camera_config();
    let camera = SimulatedCamera::new(camera_config.clone());
    let mut pipeline = CapturePipeline::new(
        Box::new(camera),
        test_pipeline_config(output.clone(), 5),
    )
    .unwrap();

    pipeline.start().unwrap();
    assert!(pipeline.is_running());
    assert!(pipeline.wait_for_written(5, Duration::from_secs(10)));
    pipeline.stop().unwrap();

    assert_eq!(pipeline.frames_written(), 5);
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.acquired, 5);
    assert_eq!(snapshot.converted, 5);
    assert_eq!(snapshot.written, 5);

    assert_frames(&read_samples(&output), &camera_config, 0..5);
}

#[test]
fn transient_wait_faults_are_recovered_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.raw");

    let camera_config = test_camera_config();
    let mut camera = SimulatedCamera::new(camera_config.clone());
    camera.inject_wait_fault(SourceError::Timeout);
    camera.inject_wait_fault(SourceError::Fault(13));
    let probe = camera.probe();

    // A long monitor interval keeps the fault log undrained while the test
    // inspects it.
    let mut config = test_pipeline_config(output.clone(), 3);
    config.monitor_interval_ms = 2_000;
    let mut pipeline = CapturePipeline::new(Box::new(camera), config).unwrap();

    pipeline.start().unwrap();

    // Both faults accumulate in the log before the monitor's first drain.
    let deadline = Instant::now() + Duration::from_secs(1);
    while pipeline.snapshot().fault_backlog < 2 {
        assert!(Instant::now() < deadline, "faults never recorded");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(pipeline.snapshot().fault_backlog, 2);

    assert!(pipeline.wait_for_written(3, Duration::from_secs(10)));
    pipeline.stop().unwrap();

    // Each fault triggered a stop/flush/restart of the source.
    assert_eq!(probe.starts(), 3);
    // The monitor reported and cleared the log on its way out.
    assert_eq!(pipeline.snapshot().fault_backlog, 0);

    // Acquisition recovered: three clean frames, no partial buffer between
    // them.
    assert_frames(&read_samples(&output), &camera_config, 0..3);
}

#[test]
fn stop_freezes_counters_and_restart_begins_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.raw");

    let camera_config = test_camera_config();
    let camera = SimulatedCamera::new(camera_config.clone());
    let mut pipeline = CapturePipeline::new(
        Box::new(camera),
        test_pipeline_config(output.clone(), 4),
    )
    .unwrap();

    pipeline.start().unwrap();
    assert!(matches!(
        pipeline.start(),
        Err(PipelineError::AlreadyRunning)
    ));
    assert!(pipeline.wait_for_written(4, Duration::from_secs(10)));
    pipeline.stop().unwrap();

    assert!(!pipeline.is_running());
    assert!(matches!(pipeline.stop(), Err(PipelineError::NotRunning)));
    assert_eq!(pipeline.frames_written(), 4);
    assert_frames(&read_samples(&output), &camera_config, 0..4);

    // Restart: counters reset to zero and the sink starts over. The source
    // keeps counting frames, so the second run serves sequences 4..8.
    pipeline.start().unwrap();
    assert!(pipeline.wait_for_written(4, Duration::from_secs(10)));
    pipeline.stop().unwrap();

    assert_eq!(pipeline.frames_written(), 4);
    let snapshot = pipeline.snapshot();
    assert_eq!(snapshot.acquired, 4);
    assert_frames(&read_samples(&output), &camera_config, 4..8);
}

#[test]
fn queued_frames_all_drain_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.raw");

    let mut camera_config = test_camera_config();
    camera_config.frame_rate = 5000.0;
    let camera = SimulatedCamera::new(camera_config.clone());
    let mut pipeline = CapturePipeline::new(
        Box::new(camera),
        test_pipeline_config(output.clone(), 100),
    )
    .unwrap();

    pipeline.start().unwrap();

    // Stop as soon as acquisition finishes, while frames may still be
    // queued between the stages.
    let deadline = Instant::now() + Duration::from_secs(10);
    while pipeline.snapshot().acquired < 100 {
        assert!(Instant::now() < deadline, "acquisition never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
    pipeline.stop().unwrap();

    assert_eq!(pipeline.frames_written(), 100);
    assert_frames(&read_samples(&output), &camera_config, 0..100);
}

#[test]
fn metadata_geometry_produces_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("capture.raw");

    let mut camera_config = test_camera_config();
    camera_config.shape = FrameShape::new(12, 6);
    let camera = SimulatedCamera::new(camera_config.clone());

    let mut config = test_pipeline_config(output.clone(), 2);
    config.geometry_source = GeometrySource::Metadata;
    let mut pipeline = CapturePipeline::new(Box::new(camera), config).unwrap();

    pipeline.start().unwrap();
    assert!(pipeline.wait_for_written(2, Duration::from_secs(10)));
    pipeline.stop().unwrap();

    assert_frames(&read_samples(&output), &camera_config, 0..2);
}

#[test]
fn closed_source_fails_construction() {
    use framepipe::CaptureSource;

    let mut camera = SimulatedCamera::new(test_camera_config());
    camera.close().unwrap();

    let result = CapturePipeline::new(
        Box::new(camera),
        test_pipeline_config(PathBuf::from("unused.raw"), 1),
    );
    assert!(matches!(
        result,
        Err(PipelineError::Source(SourceError::Closed))
    ));
}

#[test]
fn unwritable_sink_fails_start_and_leaves_the_pipeline_idle() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no_such_dir").join("capture.raw");

    let camera = SimulatedCamera::new(test_camera_config());
    let mut pipeline =
        CapturePipeline::new(Box::new(camera), test_pipeline_config(output, 1)).unwrap();

    assert!(matches!(pipeline.start(), Err(PipelineError::Sink(_))));
    assert!(!pipeline.is_running());
    assert!(matches!(pipeline.stop(), Err(PipelineError::NotRunning)));
}
