// SPDX-License-Identifier: GPL-3.0-only

//! Conversion stage: one sample frame out per raw frame in, order preserved

use super::Shared;
use crate::backends::camera::format_converters::convert_frame;
use crate::backends::camera::{FrameLayout, Handoff};
use crate::config::GeometrySource;
use std::sync::Arc;
use tracing::{debug, info};

/// Body of the conversion thread.
///
/// Keeps consuming while the pipeline runs or frames remain queued, so
/// everything in flight is converted even after acquisition has stopped.
/// Shutdown markers are discarded; they only exist to unwedge a pop on an
/// empty channel during the drain.
pub(crate) fn run(shared: Arc<Shared>, geometry_source: GeometrySource, fixed_layout: FrameLayout) {
    debug!("convert thread started");

    while shared.is_running() || shared.convert_queue.has_waiting() {
        let raw = match shared.convert_queue.pop() {
            Handoff::Frame(raw) => raw,
            Handoff::Shutdown => continue,
        };

        let layout = match geometry_source {
            GeometrySource::Fixed => fixed_layout,
            GeometrySource::Metadata => raw
                .metadata
                .map(|metadata| {
                    if metadata.shape == fixed_layout.shape {
                        // Same shape keeps the configured row stride.
                        fixed_layout
                    } else {
                        FrameLayout::packed(metadata.shape, fixed_layout.encoding)
                    }
                })
                .unwrap_or(fixed_layout),
        };

        match convert_frame(&raw.data, &layout) {
            Ok(frame) => {
                shared.write_queue.push(Handoff::Frame(frame));
                shared.note_converted();
            }
            Err(err) => shared.record_fault(format!("frame conversion failed: {err}")),
        }
        // The raw buffer is released here, after conversion.
    }

    info!(frames = shared.converted(), "convert thread exiting");
}
