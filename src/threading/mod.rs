//! Thread management for the performer's workers
//!
//! Every long-lived activity (producer, idle motions, gaze, audio device) runs
//! on its own named OS thread. They share one [`RunFlag`]: clearing it is the
//! only shutdown signal, and every sleep in a worker is a [`RunFlag::wait_timeout`]
//! so that clearing the flag interrupts the sleep instead of waiting it out.
//!
//! The render loop stays on the thread that built the stage and joins the
//! workers with a bounded wait ([`Worker::join_timeout`]).

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Error type for threading operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// Thread spawn failed
    #[error("Thread spawn failed: {0}")]
    SpawnFailed(String),
    /// The thread panicked before returning
    #[error("Thread '{0}' panicked")]
    Panicked(String),
    /// The thread did not exit within the join bound
    #[error("Thread '{name}' did not exit within {timeout:?}")]
    JoinTimeout { name: String, timeout: Duration },
    /// Handle already consumed
    #[error("Thread '{0}' already joined")]
    AlreadyJoined(String),
}

pub type Result<T> = std::result::Result<T, ThreadError>;

/// Poll interval used while waiting for a worker to finish
const JOIN_POLL: Duration = Duration::from_millis(10);

// ============================================================================
// Worker
// ============================================================================

/// Handle to a named worker thread
pub struct Worker<T> {
    handle: Option<JoinHandle<T>>,
    name: String,
}

impl<T> Worker<T> {
    /// Spawn a named thread running `f`
    ///
    /// # Errors
    /// Returns `ThreadError::SpawnFailed` if the OS refuses the thread
    pub fn spawn<F>(name: &str, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(f)
            .map_err(|e| ThreadError::SpawnFailed(format!("{}: {}", name, e)))?;

        log::debug!("spawned worker '{}'", name);
        Ok(Self {
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        match &self.handle {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }

    /// Wait for the thread to finish and return its result
    pub fn join(mut self) -> Result<T> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ThreadError::AlreadyJoined(self.name.clone()))?;
        handle
            .join()
            .map_err(|_| ThreadError::Panicked(self.name.clone()))
    }

    /// Wait at most `timeout` for the thread to finish
    ///
    /// On timeout the handle is kept, so the caller may try again or drop it
    /// (which detaches the thread).
    pub fn join_timeout(&mut self, timeout: Duration) -> Result<T> {
        let deadline = Instant::now() + timeout;
        loop {
            let finished = match &self.handle {
                Some(handle) => handle.is_finished(),
                None => return Err(ThreadError::AlreadyJoined(self.name.clone())),
            };
            if finished {
                break;
            }
            if Instant::now() >= deadline {
                return Err(ThreadError::JoinTimeout {
                    name: self.name.clone(),
                    timeout,
                });
            }
            thread::sleep(JOIN_POLL);
        }

        let handle = self
            .handle
            .take()
            .ok_or_else(|| ThreadError::AlreadyJoined(self.name.clone()))?;
        handle
            .join()
            .map_err(|_| ThreadError::Panicked(self.name.clone()))
    }
}

// ============================================================================
// Run flag
// ============================================================================

struct RunState {
    running: Mutex<bool>,
    changed: Condvar,
}

/// Shared "keep going" flag with an interruptible sleep
///
/// Cloning yields another handle to the same flag. Once stopped it never
/// restarts.
#[derive(Clone)]
pub struct RunFlag {
    inner: Arc<RunState>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RunState {
                running: Mutex::new(true),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.lock()
    }

    /// Clear the flag and wake every sleeper
    pub fn stop(&self) {
        let mut running = self.inner.running.lock();
        if *running {
            *running = false;
            log::debug!("run flag cleared");
        }
        self.inner.changed.notify_all();
    }

    /// Sleep for `duration` unless the flag is cleared first
    ///
    /// Returns `true` if the flag is still set when the call returns.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut running = self.inner.running.lock();
        while *running {
            if self
                .inner
                .changed
                .wait_until(&mut running, deadline)
                .timed_out()
            {
                break;
            }
        }
        *running
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RunFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunFlag")
            .field("running", &self.is_running())
            .finish()
    }
}
