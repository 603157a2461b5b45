/// Command-line parsing and command execution
pub mod cli;
/// Named constants and defaults
pub mod configuration;
/// Error types and constructors
pub mod error;
/// Progress checkpoints and cancellation
pub mod events;
/// Image file loading, saving and resizing
pub mod image;
/// Terminal progress bars
pub mod progress;
