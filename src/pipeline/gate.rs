use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{PipelineError, Result};

struct GateState {
    busy: bool,
    completions: u64,
    released: bool,
}

/// Busy flag plus completion signal between the render thread and the
/// producer
///
/// Only the render thread changes `busy`; the producer only waits.
pub struct PlaybackGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

/// How [`PlaybackGate::wait_until_free`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateWait {
    /// Nothing was playing or pending
    Free,
    /// A playback completed while waiting
    Completed,
    /// The bound expired with the gate still busy
    TimedOut,
    /// Shutdown released every waiter
    Released,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                busy: false,
                completions: 0,
                released: false,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    /// Number of playbacks that ran to completion
    pub fn completions(&self) -> u64 {
        self.state.lock().completions
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Take the next item if nothing is playing, marking the gate busy
    ///
    /// `take` runs under the gate lock, so the emptiness check and the busy
    /// transition are one step as seen by the producer.
    pub fn claim<T>(&self, take: impl FnOnce() -> Option<T>) -> Option<T> {
        let mut state = self.state.lock();
        if state.busy {
            return None;
        }
        let item = take()?;
        state.busy = true;
        Some(item)
    }

    /// Undo a claim whose playback never started
    pub fn abandon(&self) {
        let mut state = self.state.lock();
        state.busy = false;
        self.changed.notify_all();
    }

    /// Playback ended naturally; wake the producer
    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.busy = false;
        state.completions += 1;
        self.changed.notify_all();
    }

    /// Wake every waiter for good
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.released = true;
        self.changed.notify_all();
    }

    /// Block while audio is busy or `pending` reports undelivered work, for
    /// at most `timeout`
    pub fn wait_until_free(&self, timeout: Duration, pending: impl Fn() -> bool) -> GateWait {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let start = state.completions;

        loop {
            if state.released {
                return GateWait::Released;
            }
            if !state.busy && !pending() {
                return if state.completions == start {
                    GateWait::Free
                } else {
                    GateWait::Completed
                };
            }
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                if state.released {
                    return GateWait::Released;
                }
                if !state.busy && !pending() {
                    return GateWait::Completed;
                }
                return GateWait::TimedOut;
            }
        }
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The one well-known audio artifact shared by producer and consumer
///
/// Replacement happens only through [`commit`](Self::commit), which renames a
/// fully written file into place under the lock. Readers hold the same lock,
/// so they see the previous file or the new one, never a partial write.
pub struct AudioResource {
    location: PathBuf,
    lock: Mutex<()>,
}

impl AudioResource {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Replace the artifact with `staged`
    pub fn commit(&self, staged: &Path) -> Result<PathBuf> {
        let _guard = self.lock.lock();

        match std::fs::remove_file(&self.location) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("could not remove {}: {}", self.location.display(), e),
        }

        std::fs::rename(staged, &self.location).map_err(|source| PipelineError::Commit {
            staged: staged.to_path_buf(),
            location: self.location.clone(),
            source,
        })?;
        Ok(self.location.clone())
    }

    /// Run `f` with the artifact locked against replacement
    pub fn with_locked<R>(&self, f: impl FnOnce(&Path) -> R) -> R {
        let _guard = self.lock.lock();
        f(&self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_claim_marks_busy() {
        let gate = PlaybackGate::new();
        assert_eq!(gate.claim(|| Some(1)), Some(1));
        assert!(gate.is_busy());
        // second claim refused without consulting the source
        assert_eq!(gate.claim(|| -> Option<i32> { panic!("must not be called") }), None);
    }

    #[test]
    fn test_claim_empty_leaves_free() {
        let gate = PlaybackGate::new();
        assert_eq!(gate.claim(|| None::<i32>), None);
        assert!(!gate.is_busy());
    }

    #[test]
    fn test_abandon_and_complete() {
        let gate = PlaybackGate::new();
        gate.claim(|| Some(()));
        gate.abandon();
        assert!(!gate.is_busy());
        assert_eq!(gate.completions(), 0);

        gate.claim(|| Some(()));
        gate.complete();
        assert!(!gate.is_busy());
        assert_eq!(gate.completions(), 1);
    }

    #[test]
    fn test_wait_free_returns_immediately() {
        let gate = PlaybackGate::new();
        let start = Instant::now();
        assert_eq!(gate.wait_until_free(Duration::from_secs(10), || false), GateWait::Free);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_times_out_when_never_completed() {
        let gate = PlaybackGate::new();
        gate.claim(|| Some(()));
        let start = Instant::now();
        assert_eq!(
            gate.wait_until_free(Duration::from_millis(80), || false),
            GateWait::TimedOut
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(80));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_wait_wakes_on_complete() {
        let gate = Arc::new(PlaybackGate::new());
        gate.claim(|| Some(()));

        let completer = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.complete();
        });

        let start = Instant::now();
        assert_eq!(
            gate.wait_until_free(Duration::from_secs(10), || false),
            GateWait::Completed
        );
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn test_pending_work_keeps_waiting() {
        let gate = PlaybackGate::new();
        assert_eq!(
            gate.wait_until_free(Duration::from_millis(30), || true),
            GateWait::TimedOut
        );
    }

    #[test]
    fn test_release_unblocks_waiter() {
        let gate = Arc::new(PlaybackGate::new());
        gate.claim(|| Some(()));

        let releaser = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            releaser.release();
        });

        assert_eq!(
            gate.wait_until_free(Duration::from_secs(10), || false),
            GateWait::Released
        );
        handle.join().unwrap();
        assert!(gate.is_released());
    }

    #[test]
    fn test_commit_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let resource = AudioResource::new(dir.path().join("speech.wav"));
        let staged = dir.path().join("speech_temp.wav");

        std::fs::write(&staged, b"first").unwrap();
        let location = resource.commit(&staged).unwrap();
        assert_eq!(std::fs::read(&location).unwrap(), b"first");
        assert!(!staged.exists());

        std::fs::write(&staged, b"second").unwrap();
        resource.commit(&staged).unwrap();
        assert_eq!(std::fs::read(resource.location()).unwrap(), b"second");
    }

    #[test]
    fn test_commit_missing_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let resource = AudioResource::new(dir.path().join("speech.wav"));
        assert!(matches!(
            resource.commit(&dir.path().join("never_written.wav")),
            Err(PipelineError::Commit { .. })
        ));
    }

    #[test]
    fn test_with_locked_passes_location() {
        let resource = AudioResource::new("out.wav");
        let seen = resource.with_locked(|p| p.to_path_buf());
        assert_eq!(seen, PathBuf::from("out.wav"));
    }
}
