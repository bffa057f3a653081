use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::info;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::monitor::Monitor;
use crate::source::SampleSource;

/// Nominal acquisition cadence (~200 Hz).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Handle to the background sampling thread. Stopping (or dropping) the
/// handle cancels the loop and joins the thread.
pub struct Acquisition {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<u64>>,
}

impl Acquisition {
    pub fn spawn<S>(monitor: Arc<Monitor>, source: S, interval: Duration) -> std::io::Result<Self>
    where
        S: SampleSource + 'static,
    {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = std::thread::Builder::new()
            .name("ecg-acquisition".into())
            .spawn(move || run_loop(&monitor, source, interval, stop_rx))?;
        info!("acquisition started ({:?} interval)", interval);
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the loop and wait for it; returns how many samples it stored.
    pub fn stop(mut self) -> u64 {
        self.shutdown().unwrap_or(0)
    }

    fn shutdown(&mut self) -> Option<u64> {
        let handle = self.handle.take()?;
        let _ = self.stop_tx.try_send(());
        let stored = handle.join().unwrap_or(0);
        info!("acquisition stopped after storing {} samples", stored);
        Some(stored)
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One loop iteration: read and store a sample if monitoring is on.
/// Returns whether a sample was stored.
pub fn run_cycle<S: SampleSource + ?Sized>(monitor: &Monitor, source: &mut S) -> bool {
    // The session lock is released before the buffer is touched.
    if !monitor.is_monitoring() {
        return false;
    }
    match source.read() {
        Some(sample) => {
            monitor.buffer().append(sample);
            true
        }
        None => false,
    }
}

fn run_loop<S: SampleSource>(
    monitor: &Monitor,
    mut source: S,
    interval: Duration,
    stop_rx: Receiver<()>,
) -> u64 {
    let mut stored = 0;
    loop {
        if run_cycle(monitor, &mut source) {
            stored += 1;
        }
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    stored
}
