use crossbeam::channel::{unbounded, Receiver, Sender};

use super::RenderEngine;

/// Engine mutation requested from a thread other than the render thread
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    StartMotion { group: String, priority: u32 },
    LookAt { x: f32, y: f32 },
}

/// Render-thread side of the engine command channel
pub struct CommandQueue {
    tx: Sender<EngineCommand>,
    rx: Receiver<EngineCommand>,
}

/// Cloneable sender handed to background workers
#[derive(Clone)]
pub struct EngineHandle {
    tx: Sender<EngineCommand>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Apply every queued command to `engine`, in send order
    ///
    /// Rejected commands are logged and skipped. Returns the number of
    /// commands taken off the queue.
    pub fn drain_into(&self, engine: &mut dyn RenderEngine) -> usize {
        let mut drained = 0;
        for command in self.rx.try_iter() {
            drained += 1;
            match command {
                EngineCommand::StartMotion { group, priority } => {
                    if let Err(e) = engine.start_motion(&group, priority) {
                        log::debug!("motion '{}' rejected: {}", group, e);
                    }
                }
                EngineCommand::LookAt { x, y } => engine.set_look_target(x, y),
            }
        }
        drained
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineHandle {
    /// Returns `false` once the render side is gone
    pub fn send(&self, command: EngineCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn start_motion(&self, group: &str, priority: u32) -> bool {
        self.send(EngineCommand::StartMotion {
            group: group.to_string(),
            priority,
        })
    }

    pub fn look_at(&self, x: f32, y: f32) -> bool {
        self.send(EngineCommand::LookAt { x, y })
    }
}
