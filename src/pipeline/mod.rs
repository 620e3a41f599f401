// SPDX-License-Identifier: GPL-3.0-only

//! Streaming capture pipeline
//!
//! Four stages run on dedicated OS threads for the lifetime of a capture
//! run, connected by two FIFO hand-off channels:
//!
//! ```text
//! ┌──────────┐  raw frames   ┌───────────┐  sample frames  ┌────────┐
//! │ Acquirer ├──────────────►│ Converter ├────────────────►│ Writer │
//! └──────────┘               └───────────┘                 └────────┘
//!       ▲                          ▲                            ▲
//!       └──────────── counters sampled by the Monitor ──────────┘
//! ```
//!
//! The acquirer drives the capture source and recovers transient faults in
//! place. The converter and writer keep consuming after `running` clears
//! until their queue is empty, so every frame in flight reaches the sink
//! before the threads exit. The monitor reports throughput and queue depth
//! without ever touching frame data. A slow sink shows up as a growing
//! persistence-queue depth; the channels themselves are unbounded.

mod acquire;
mod convert;
mod monitor;
mod write;

use crate::backends::camera::{CaptureSource, Handoff, RawFrame, SampleFrame, SourceError};
use crate::config::PipelineConfig;
use crate::constants::{WAIT_TIMEOUT_FLOOR, WAIT_TIMEOUT_PERIODS};
use crate::errors::{PipelineError, PipelineResult};
use crate::sync::Channel;
use std::fs::File;
use std::io::BufWriter;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// State shared between the controller and the four stage threads
pub(crate) struct Shared {
    running: AtomicBool,
    monitoring: AtomicBool,
    acquired: AtomicU64,
    converted: AtomicU64,
    written: AtomicU64,
    // Per-stage rates in Hz, stored as f64 bit patterns; written by the
    // monitor, read by snapshots.
    acquire_rate: AtomicU64,
    convert_rate: AtomicU64,
    write_rate: AtomicU64,
    faults: Mutex<Vec<String>>,
    pub(crate) convert_queue: Channel<Handoff<RawFrame>>,
    pub(crate) write_queue: Channel<Handoff<SampleFrame>>,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            monitoring: AtomicBool::new(false),
            acquired: AtomicU64::new(0),
            converted: AtomicU64::new(0),
            written: AtomicU64::new(0),
            acquire_rate: AtomicU64::new(0),
            convert_rate: AtomicU64::new(0),
            write_rate: AtomicU64::new(0),
            faults: Mutex::new(Vec::new()),
            convert_queue: Channel::new(),
            write_queue: Channel::new(),
        }
    }

    /// Zero all per-run state. Only valid while no stage thread is live.
    fn reset(&self) {
        self.acquired.store(0, Ordering::SeqCst);
        self.converted.store(0, Ordering::SeqCst);
        self.written.store(0, Ordering::SeqCst);
        self.store_rates(0.0, 0.0, 0.0);
        self.faults.lock().unwrap().clear();
        self.convert_queue.clear();
        self.write_queue.clear();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::SeqCst);
    }

    pub(crate) fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    fn set_monitoring(&self, value: bool) {
        self.monitoring.store(value, Ordering::SeqCst);
    }

    pub(crate) fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::SeqCst)
    }

    pub(crate) fn converted(&self) -> u64 {
        self.converted.load(Ordering::SeqCst)
    }

    pub(crate) fn written(&self) -> u64 {
        self.written.load(Ordering::SeqCst)
    }

    pub(crate) fn note_acquired(&self) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn note_converted(&self) {
        self.converted.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn note_written(&self) {
        self.written.fetch_add(1, Ordering::SeqCst);
    }

    /// Append a recovered-fault message for the monitor to report
    pub(crate) fn record_fault(&self, message: String) {
        debug!(%message, "fault recorded");
        self.faults.lock().unwrap().push(message);
    }

    /// Take all pending fault messages, oldest first
    pub(crate) fn drain_faults(&self) -> Vec<String> {
        std::mem::take(&mut *self.faults.lock().unwrap())
    }

    /// Fault messages recorded but not yet drained by the monitor
    pub(crate) fn fault_backlog(&self) -> usize {
        self.faults.lock().unwrap().len()
    }

    pub(crate) fn store_rates(&self, acquire: f64, convert: f64, write: f64) {
        self.acquire_rate.store(acquire.to_bits(), Ordering::SeqCst);
        self.convert_rate.store(convert.to_bits(), Ordering::SeqCst);
        self.write_rate.store(write.to_bits(), Ordering::SeqCst);
    }

    fn rates(&self) -> (f64, f64, f64) {
        (
            f64::from_bits(self.acquire_rate.load(Ordering::SeqCst)),
            f64::from_bits(self.convert_rate.load(Ordering::SeqCst)),
            f64::from_bits(self.write_rate.load(Ordering::SeqCst)),
        )
    }
}

/// Point-in-time view of the pipeline for status displays
#[derive(Debug, Clone)]
pub struct PipelineSnapshot {
    pub running: bool,
    pub acquired: u64,
    pub converted: u64,
    pub written: u64,
    /// Per-stage throughput in frames per second, from the last monitor sample
    pub acquire_rate: f64,
    pub convert_rate: f64,
    pub write_rate: f64,
    /// Frames queued between acquirer and converter
    pub conversion_depth: usize,
    /// Frames queued between converter and writer
    pub persistence_depth: usize,
    /// Recovered-fault messages not yet reported by the monitor
    pub fault_backlog: usize,
}

struct StageThreads {
    acquire: JoinHandle<Box<dyn CaptureSource>>,
    convert: JoinHandle<()>,
    write: JoinHandle<()>,
    monitor: JoinHandle<()>,
}

/// Controller for one capture source and its four stage threads.
///
/// A pipeline cycles Idle → Running → Draining → Idle; `start` and `stop`
/// drive the transitions and a fresh `start` after `stop` begins from zeroed
/// counters and empty channels.
pub struct CapturePipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    /// Present while idle; moved into the acquire thread for the run
    source: Option<Box<dyn CaptureSource>>,
    threads: Option<StageThreads>,
}

impl CapturePipeline {
    /// Wrap a capture source, probing it once for connectivity.
    ///
    /// A source that cannot flush is unusable and fails construction.
    pub fn new(
        mut source: Box<dyn CaptureSource>,
        config: PipelineConfig,
    ) -> PipelineResult<Self> {
        source.flush().map_err(PipelineError::Source)?;
        Ok(Self {
            config,
            shared: Arc::new(Shared::new()),
            source: Some(source),
            threads: None,
        })
    }

    /// Launch the four stage threads.
    ///
    /// Writer and converter come up before the acquirer so frames never
    /// accumulate against consumers that are not live yet. Startup failures
    /// (source queries, sink open) leave the pipeline idle and reusable.
    pub fn start(&mut self) -> PipelineResult<()> {
        if self.threads.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let source = self
            .source
            .take()
            .ok_or(PipelineError::Source(SourceError::Closed))?;

        // Fresh run state: counters, fault log and both channels.
        self.shared.reset();

        // Run parameters, queried while the controller still owns the source.
        let frame_rate = match source.frame_rate() {
            Ok(rate) if rate > 0.0 => rate,
            Ok(rate) => {
                self.source = Some(source);
                return Err(PipelineError::Source(SourceError::Unsupported(format!(
                    "frame rate {rate}"
                ))));
            }
            Err(err) => {
                self.source = Some(source);
                return Err(err.into());
            }
        };
        let fixed_layout = match source.layout() {
            Ok(layout) => layout,
            Err(err) => {
                self.source = Some(source);
                return Err(err.into());
            }
        };

        // Bound a single wait on the source by twice the nominal frame
        // period, but never below the floor.
        let wait_timeout =
            Duration::from_secs_f64(WAIT_TIMEOUT_PERIODS / frame_rate).max(WAIT_TIMEOUT_FLOOR);

        let sink = match File::create(&self.config.output_path) {
            Ok(file) => BufWriter::new(file),
            Err(err) => {
                self.source = Some(source);
                return Err(PipelineError::Sink(format!(
                    "{}: {err}",
                    self.config.output_path.display()
                )));
            }
        };

        info!(
            output = %self.config.output_path.display(),
            frame_rate,
            ?wait_timeout,
            layout = %fixed_layout.shape,
            "starting capture pipeline"
        );

        self.shared.set_running(true);
        self.shared.set_monitoring(true);

        let write = thread::spawn({
            let shared = Arc::clone(&self.shared);
            move || write::run(shared, sink)
        });
        let convert = thread::spawn({
            let shared = Arc::clone(&self.shared);
            let geometry_source = self.config.geometry_source;
            move || convert::run(shared, geometry_source, fixed_layout)
        });
        let acquire = thread::spawn({
            let shared = Arc::clone(&self.shared);
            let params = acquire::AcquireParams {
                wait_timeout,
                frame_limit: self.config.frame_limit,
            };
            move || acquire::run(source, shared, params)
        });
        let monitor = thread::spawn({
            let shared = Arc::clone(&self.shared);
            let interval = self.config.monitor_interval();
            move || monitor::run(shared, interval)
        });

        self.threads = Some(StageThreads {
            acquire,
            convert,
            write,
            monitor,
        });
        Ok(())
    }

    /// Stop acquisition, drain both channels, and join all stage threads.
    ///
    /// Stages are joined strictly upstream-first, so no thread is joined
    /// while an upstream stage could still push to its channel. Each drain
    /// is unblocked by a single shutdown marker in case the consumer is
    /// parked on an empty channel.
    pub fn stop(&mut self) -> PipelineResult<()> {
        let threads = self.threads.take().ok_or(PipelineError::NotRunning)?;

        self.shared.set_running(false);

        match threads.acquire.join() {
            Ok(source) => self.source = Some(source),
            Err(_) => warn!("acquire thread panicked; capture source lost"),
        }

        self.shared.convert_queue.push(Handoff::Shutdown);
        if threads.convert.join().is_err() {
            warn!("convert thread panicked");
        }

        self.shared.write_queue.push(Handoff::Shutdown);
        if threads.write.join().is_err() {
            warn!("write thread panicked");
        }

        self.shared.set_monitoring(false);
        if threads.monitor.join().is_err() {
            warn!("monitor thread panicked");
        }

        info!(frames = self.shared.written(), "capture pipeline stopped");
        Ok(())
    }

    /// Whether a capture run is active (including the post-limit tail before
    /// `stop`)
    pub fn is_running(&self) -> bool {
        self.threads.is_some()
    }

    /// Cumulative frames appended to the sink this run
    pub fn frames_written(&self) -> u64 {
        self.shared.written()
    }

    /// Current counters, rates, and queue depths
    pub fn snapshot(&self) -> PipelineSnapshot {
        let (acquire_rate, convert_rate, write_rate) = self.shared.rates();
        PipelineSnapshot {
            running: self.shared.is_running(),
            acquired: self.shared.acquired(),
            converted: self.shared.converted(),
            written: self.shared.written(),
            acquire_rate,
            convert_rate,
            write_rate,
            conversion_depth: self.shared.convert_queue.len(),
            persistence_depth: self.shared.write_queue.len(),
            fault_backlog: self.shared.fault_backlog(),
        }
    }

    /// The configuration this pipeline was built with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Block until at least `count` frames have been written, up to `timeout`.
    ///
    /// Returns whether the count was reached. Useful with a frame limit to
    /// learn when a bounded run has finished its drain.
    pub fn wait_for_written(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.shared.written() < count {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if self.threads.is_some() {
            debug!("pipeline dropped while running; stopping");
            let _ = self.stop();
        }
    }
}
