// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition stage: drives the capture source and owns fault recovery

use super::Shared;
use crate::backends::camera::{CaptureSource, Handoff, RawFrame, SourceError};
use crate::constants::{cycle_mode, features};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-run parameters fixed by the controller before launch
pub(crate) struct AcquireParams {
    /// Deadline for a single wait-for-frame call
    pub wait_timeout: Duration,
    /// Stop acquiring after this many successful frames
    pub frame_limit: Option<u64>,
}

/// Body of the acquisition thread.
///
/// Configures the source for continuous capture with embedded metadata,
/// then submits and awaits one buffer per iteration until the run flag
/// clears or the frame limit is reached. A failed submit or wait is
/// recovered in place with a stop/flush/restart of the source; the partial
/// buffer is never forwarded.
///
/// Returns the source so the controller can reuse it for the next run.
pub(crate) fn run(
    mut source: Box<dyn CaptureSource>,
    shared: Arc<Shared>,
    params: AcquireParams,
) -> Box<dyn CaptureSource> {
    debug!("acquire thread started");

    if let Err(err) = configure(source.as_mut()) {
        shared.record_fault(format!("acquisition setup failed: {err}"));
        return source;
    }

    // Buffer size can depend on the metadata switches set above, so it is
    // queried only now.
    let frame_size = match source.frame_size_bytes() {
        Ok(size) => size,
        Err(err) => {
            shared.record_fault(format!("frame size query failed: {err}"));
            return source;
        }
    };

    if let Err(err) = source.start() {
        shared.record_fault(format!("acquisition start failed: {err}"));
        return source;
    }

    while shared.is_running() && params.frame_limit.is_none_or(|limit| shared.acquired() < limit) {
        let buffer = vec![0u8; frame_size];
        let waited = source
            .submit(buffer)
            .and_then(|_| source.await_frame(params.wait_timeout));

        match waited {
            Ok(data) => {
                let metadata = source.frame_metadata(&data);
                shared.convert_queue.push(Handoff::Frame(RawFrame { data, metadata }));
                shared.note_acquired();
            }
            Err(err) => {
                // The buffer involved is reclaimed by the flush below and
                // never reaches the conversion channel.
                let message = match err {
                    SourceError::Timeout => format!(
                        "acquisition timed out after {:?}, restarting acquisition",
                        params.wait_timeout
                    ),
                    other => format!("acquisition fault ({other}), restarting acquisition"),
                };
                shared.record_fault(message);

                let _ = source.stop();
                let _ = source.flush();
                if let Err(err) = source.start() {
                    shared.record_fault(format!("acquisition restart failed: {err}"));
                }
            }
        }
    }

    // Leave the source stopped with no buffers in flight.
    let _ = source.stop();
    let _ = source.flush();

    info!(frames = shared.acquired(), "acquire thread exiting");
    source
}

/// Continuous capture with embedded per-frame metadata
fn configure(source: &mut dyn CaptureSource) -> Result<(), SourceError> {
    source.set_bool(features::METADATA_ENABLE, true)?;
    source.set_bool(features::METADATA_FRAME_INFO, true)?;
    source.set_bool(features::METADATA_TIMESTAMP, true)?;
    source.set_enum(features::CYCLE_MODE, cycle_mode::CONTINUOUS)?;
    Ok(())
}
