// Performer runtime library
// Producer/consumer coordination between content generation and a fixed-rate render loop.

pub mod audio;
pub mod behavior;
pub mod cli;
pub mod config;
pub mod engine;
pub mod generation;
pub mod lipsync;
pub mod logging;
pub mod pipeline;
pub mod stage;
pub mod stream;
pub mod threading;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
