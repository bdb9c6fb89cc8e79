//! Background behaviors: idle motions and gaze shifts
//!
//! Each runs on its own worker with its own cadence. They never call the
//! render engine directly; every choice becomes an [`EngineCommand`] that the
//! render thread applies on its next tick.
//!
//! [`EngineCommand`]: crate::engine::EngineCommand

mod gaze;
mod idle;

pub use gaze::{GazeDirection, GazeSelector};
pub use idle::IdleMotionSelector;

use std::time::Duration;

use thiserror::Error;

use crate::engine::EngineHandle;
use crate::threading::{RunFlag, ThreadError, Worker};

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Invalid gaze weights: {0}")]
    Weights(String),
    #[error("Invalid idle interval: {0:?}..{1:?}")]
    Interval(Duration, Duration),
    #[error(transparent)]
    Thread(#[from] ThreadError),
}

/// Start the idle-motion worker
pub fn spawn_idle(
    mut selector: IdleMotionSelector,
    engine: EngineHandle,
    priority: u32,
    run: RunFlag,
) -> Result<Worker<()>, BehaviorError> {
    let worker = Worker::spawn("idle-motion", move || {
        if selector.is_empty() {
            log::info!("no motion groups, idle motions disabled");
            return;
        }
        while run.is_running() {
            if let Some(group) = selector.next_group() {
                log::debug!("idle motion: {}", group);
                if !engine.start_motion(group, priority) {
                    break;
                }
            }
            if !run.wait_timeout(selector.next_interval()) {
                break;
            }
        }
        log::debug!("idle-motion worker stopped");
    })?;
    Ok(worker)
}

/// Start the gaze worker
pub fn spawn_gaze(
    mut selector: GazeSelector,
    engine: EngineHandle,
    interval: Duration,
    run: RunFlag,
) -> Result<Worker<()>, BehaviorError> {
    let worker = Worker::spawn("gaze", move || {
        while run.is_running() {
            let direction = selector.next_direction();
            let (x, y) = selector.target(direction);
            log::debug!("gaze: {:?} ({:.0}, {:.0})", direction, x, y);
            if !engine.look_at(x, y) {
                break;
            }
            if !run.wait_timeout(interval) {
                break;
            }
        }
        log::debug!("gaze worker stopped");
    })?;
    Ok(worker)
}
