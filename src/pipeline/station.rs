//! Station abstraction and threaded runner for the recognition pipeline.

use crate::error::{Result, SignflowError};
use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// A processing station in the recognition pipeline.
///
/// Each station owns its state, runs on its own thread, and talks to its
/// neighbours only through bounded channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output (e.g. window not ready)
    /// - `Err(StationError)` - Processing failed
    fn process(
        &mut self,
        input: Self::Input,
    ) -> std::result::Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once when the input channel closes or a fatal error occurs.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
    processed: Arc<AtomicU64>,
    emitted: Arc<AtomicU64>,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns `station` on a thread named after it.
    ///
    /// The thread exits when `input_rx` disconnects, when every receiver of
    /// `output_tx` is gone, or after a fatal error.
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        let station_name = station.name();
        let processed = Arc::new(AtomicU64::new(0));
        let emitted = Arc::new(AtomicU64::new(0));
        let counters = Counters {
            processed: Arc::clone(&processed),
            emitted: Arc::clone(&emitted),
        };

        let handle = thread::Builder::new()
            .name(format!("signflow-{station_name}"))
            .spawn(move || {
                Self::run_station(&mut station, input_rx, output_tx, error_reporter, &counters);
            })
            .map_err(|e| SignflowError::Spawn {
                message: format!("station '{station_name}': {e}"),
            })?;

        Ok(Self {
            handle: Some(handle),
            station_name,
            processed,
            emitted,
            _phantom: PhantomData,
        })
    }

    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
        counters: &Counters,
    ) {
        let station_name = station.name();

        while let Ok(input) = input_rx.recv() {
            let keep_running = match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_ok() {
                        counters.emitted.fetch_add(1, Ordering::SeqCst);
                        true
                    } else {
                        tracing::debug!(station = station_name, "downstream closed, stopping");
                        false
                    }
                }
                Ok(None) => true,
                Err(error @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &error);
                    true
                }
                Err(error @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &error);
                    false
                }
            };
            counters.processed.fetch_add(1, Ordering::SeqCst);
            if !keep_running {
                break;
            }
        }

        station.shutdown();
        tracing::debug!(station = station_name, "station stopped");
    }

    /// Waits for the station thread to complete.
    pub fn join(mut self) -> std::result::Result<(), String> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name)),
            None => Ok(()),
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }

    /// Inputs fully handled so far, including failed ones.
    ///
    /// An input counts once its output (if any) has been handed downstream.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// Outputs handed downstream so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }
}

struct Counters {
    processed: Arc<AtomicU64>,
    emitted: Arc<AtomicU64>,
}
