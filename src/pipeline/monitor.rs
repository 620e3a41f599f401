// SPDX-License-Identifier: GPL-3.0-only

//! Monitor stage: periodic throughput and queue-depth reporting

use super::Shared;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Body of the monitor thread.
///
/// Samples the other stages' counters on a fixed interval and reports
/// incremental rates plus queue depths while the pipeline runs, or the
/// remaining depths once it is draining. Never touches frame data. Runs
/// until the `monitoring` flag clears, which the controller does only after
/// the data stages have fully drained, so the last samples cover the drain.
pub(crate) fn run(shared: Arc<Shared>, interval: Duration) {
    debug!("monitor thread started");

    let mut last_sample = Instant::now();
    let mut last_acquired = 0u64;
    let mut last_converted = 0u64;
    let mut last_written = 0u64;

    thread::sleep(interval);

    while shared.is_monitoring() {
        let now = Instant::now();
        let elapsed = now.duration_since(last_sample).as_secs_f64();

        if shared.is_running() {
            let acquired = shared.acquired();
            let converted = shared.converted();
            let written = shared.written();

            if elapsed > 0.0 {
                let acquire_rate = (acquired - last_acquired) as f64 / elapsed;
                let convert_rate = (converted - last_converted) as f64 / elapsed;
                let write_rate = (written - last_written) as f64 / elapsed;
                shared.store_rates(acquire_rate, convert_rate, write_rate);

                info!(
                    acquire_hz = acquire_rate,
                    convert_hz = convert_rate,
                    write_hz = write_rate,
                    conversion_depth = shared.convert_queue.len(),
                    persistence_depth = shared.write_queue.len(),
                    "pipeline throughput"
                );
            }

            last_acquired = acquired;
            last_converted = converted;
            last_written = written;
            last_sample = now;
        } else {
            info!(
                to_convert = shared.convert_queue.len(),
                to_write = shared.write_queue.len(),
                "draining"
            );
        }

        for fault in shared.drain_faults() {
            warn!(%fault, "recovered fault");
        }

        thread::sleep(interval);
    }

    // Anything recorded after the last interval tick still gets reported.
    for fault in shared.drain_faults() {
        warn!(%fault, "recovered fault");
    }

    info!(total_written = shared.written(), "capture complete");
}
