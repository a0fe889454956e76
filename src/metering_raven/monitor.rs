use super::transport::Connection;
use super::ConnectionError;
use crate::config::RavenConfig;
use crate::models::Reading;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

type History = Arc<Mutex<VecDeque<Reading>>>;

fn lock(history: &History) -> MutexGuard<'_, VecDeque<Reading>> {
    history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Collects readings from a gateway on a background thread.
///
/// The connection is moved into the thread. Fragments that fail to decode
/// are logged and skipped, the thread ends on the first connection error
/// or once [`RavenMonitor::stop`] was called. The stop flag is checked
/// between reads, so stopping takes at most one read timeout.
pub struct RavenMonitor {
    history: History,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Option<ConnectionError>>>,
}

impl RavenMonitor {
    pub fn start<P>(connection: Connection<P>, history_size: usize) -> Result<Self, ConnectionError>
    where
        P: Read + Write + Send + 'static,
    {
        let capacity = history_size.max(1);
        let history: History = Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024))));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_history = history.clone();
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("raven-monitor".to_string())
            .spawn(move || run(connection, thread_history, thread_stop, capacity))?;

        info!("Started RAVEn monitor keeping {} readings", capacity);
        Ok(RavenMonitor {
            history,
            stop,
            handle: Some(handle),
        })
    }

    pub fn from_config(config: &RavenConfig) -> Result<Self, ConnectionError> {
        let connection = Connection::from_config(config)?;
        RavenMonitor::start(connection, config.history_size)
    }

    /// Snapshot of the collected readings, oldest first
    pub fn readings(&self) -> Vec<Reading> {
        lock(&self.history).iter().cloned().collect()
    }

    pub fn latest(&self, response_type: &str) -> Option<Reading> {
        lock(&self.history)
            .iter()
            .rev()
            .find(|reading| reading.response_type() == response_type)
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.history).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.history).is_empty()
    }

    pub fn clear(&self) {
        lock(&self.history).clear();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    /// Stops the thread and returns the connection error that ended it, if any
    pub fn stop(mut self) -> Option<ConnectionError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<ConnectionError> {
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.handle.take()?;

        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!("RAVEn monitor thread panicked");
                None
            }
        }
    }
}

impl Drop for RavenMonitor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!("Stopping RAVEn monitor on drop");
            let _ = self.shutdown();
        }
    }
}

fn run<P: Read + Write>(
    mut connection: Connection<P>,
    history: History,
    stop: Arc<AtomicBool>,
    capacity: usize,
) -> Option<ConnectionError> {
    while !stop.load(Ordering::SeqCst) {
        let fragment = match connection.poll_fragment() {
            Ok(Some(fragment)) => fragment,
            Ok(None) => continue,
            Err(e) => {
                error!("RAVEn connection ended: {}", e);
                return Some(e);
            }
        };

        match fragment.decode() {
            Ok(reading) => {
                debug!("Received {}", reading.response_type());
                let mut history = lock(&history);
                while history.len() >= capacity {
                    history.pop_front();
                }
                history.push_back(reading);
            }
            Err(e) => warn!("Skipping {} fragment: {}", fragment.tag, e),
        }
    }

    info!("RAVEn monitor stopped");
    None
}
