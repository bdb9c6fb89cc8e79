//! Render engine seam
//!
//! The animation engine is an external collaborator with single-thread
//! affinity: only the render thread may call into it. Other threads reach it
//! through [`EngineHandle`], whose commands the render thread drains once per
//! tick ([`CommandQueue::drain_into`]).

mod catalog;
mod command;
mod headless;
mod manifest;

pub use catalog::{catalog_name, Catalog, NEUTRAL_EXPRESSION};
pub use command::{CommandQueue, EngineCommand, EngineHandle};
pub use headless::HeadlessEngine;
pub use manifest::{ModelManifest, ParameterBlend};

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed model file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("No model loaded")]
    NotLoaded,
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("Unknown expression: {0}")]
    UnknownExpression(String),
    #[error("Unknown motion group: {0}")]
    UnknownMotion(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// One animation parameter as exposed by the loaded model
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub id: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParameterInfo {
    pub fn new(id: &str, min: f32, max: f32, default: f32) -> Self {
        Self {
            id: id.to_string(),
            min,
            max,
            default,
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Operations the coordination layer needs from an animation engine
///
/// Per frame the render thread calls `update`, then any number of
/// `add_parameter_delta`, then `draw`. Deltas are additive on top of the
/// engine's own animation and last until the next `update`.
pub trait RenderEngine {
    fn load_model(&mut self, manifest: &Path) -> Result<()>;

    fn list_parameters(&self) -> Vec<ParameterInfo>;

    fn apply_expression(&mut self, name: &str) -> Result<()>;

    fn add_parameter_delta(&mut self, id: &str, value: f32) -> Result<()>;

    /// Start a random motion from `group`; ignored if a higher-priority motion
    /// is already playing
    fn start_motion(&mut self, group: &str, priority: u32) -> Result<()>;

    /// Point the head and eyes at a screen position in pixels
    fn set_look_target(&mut self, x: f32, y: f32);

    fn update(&mut self, dt: Duration);

    fn draw(&mut self);

    /// The framebuffer produced by the last `draw`
    fn frame(&self) -> &RgbaImage;
}
