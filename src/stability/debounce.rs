//! Replace-latest debouncer on a dedicated worker thread.

use crate::error::{Result, SignflowError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum Command<T> {
    Schedule(T),
    Cancel,
    Shutdown,
}

/// Cloneable handle for scheduling onto a [`Debouncer`].
pub struct DebounceHandle<T> {
    tx: Sender<Command<T>>,
}

impl<T> Clone for DebounceHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> DebounceHandle<T> {
    /// Schedule `item`, replacing any pending one and restarting the delay.
    pub fn schedule(&self, item: T) {
        if self.tx.send(Command::Schedule(item)).is_err() {
            tracing::debug!("debouncer stopped, dropping scheduled item");
        }
    }

    /// Drop the pending item, if any.
    pub fn cancel(&self) {
        if self.tx.send(Command::Cancel).is_err() {
            tracing::debug!("debouncer stopped, nothing to cancel");
        }
    }
}

/// Delivers only the latest scheduled item, once it has been pending for
/// the configured delay.
pub struct Debouncer<T> {
    handle: DebounceHandle<T>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(delay: Duration, mut deliver: F) -> Result<Self>
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("debounce".to_string())
            .spawn(move || run(rx, delay, &mut deliver))
            .map_err(|e| SignflowError::Spawn {
                message: format!("debounce worker: {e}"),
            })?;
        Ok(Self {
            handle: DebounceHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> DebounceHandle<T> {
        self.handle.clone()
    }

    pub fn schedule(&self, item: T) {
        self.handle.schedule(item);
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Cancel anything pending and join the worker.
    pub fn shutdown(mut self) {
        self.stop();
    }
}

impl<T> Debouncer<T> {
    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if self.handle.tx.send(Command::Shutdown).is_err() {
            tracing::debug!("debounce worker already stopped");
        }
        if thread.join().is_err() {
            tracing::error!("debounce worker panicked");
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<T>(rx: Receiver<Command<T>>, delay: Duration, deliver: &mut dyn FnMut(T)) {
    let mut pending: Option<(T, Instant)> = None;
    loop {
        let deadline = pending.as_ref().map(|(_, deadline)| *deadline);
        let command = match deadline {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some((item, _)) = pending.take() {
                            deliver(item);
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match rx.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
        };

        match command {
            Command::Schedule(item) => pending = Some((item, Instant::now() + delay)),
            Command::Cancel => pending = None,
            Command::Shutdown => return,
        }
    }
}
