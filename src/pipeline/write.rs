// SPDX-License-Identifier: GPL-3.0-only

//! Persistence stage: appends converted frames to the sink in arrival order

use super::Shared;
use crate::backends::camera::Handoff;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use tracing::{debug, info};

/// Body of the writer thread.
///
/// Same drain discipline as the converter: consume while the pipeline runs
/// or frames remain queued, skipping shutdown markers. Frames are appended
/// strictly in pop order as raw little-endian samples, no header or framing.
pub(crate) fn run(shared: Arc<Shared>, mut sink: BufWriter<File>) {
    debug!("write thread started");

    while shared.is_running() || shared.write_queue.has_waiting() {
        let frame = match shared.write_queue.pop() {
            Handoff::Frame(frame) => frame,
            Handoff::Shutdown => continue,
        };

        match sink.write_all(bytemuck::cast_slice(&frame.samples)) {
            Ok(()) => shared.note_written(),
            Err(err) => shared.record_fault(format!("sink append failed: {err}")),
        }
        // The sample buffer is released here, after the append.
    }

    if let Err(err) = sink.flush() {
        shared.record_fault(format!("sink flush failed: {err}"));
    }

    info!(frames = shared.written(), "write thread exiting");
}
