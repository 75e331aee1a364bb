//! Animation error types

use thiserror::Error;

/// Errors surfaced by the animation engine.
///
/// None of these escape a tick: faults are contained by the animator that
/// raised them and only show up in logs and in the few `Result`-returning
/// builder calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// The target was dropped or detached before the work could begin
    #[error("animation target is no longer available")]
    InvalidTarget,

    /// Something went wrong while advancing an animation
    #[error("animation fault: {reason}")]
    Fault { reason: String },

    /// `play` was called on a sequence that is already playing
    #[error("sequence is already playing")]
    ReentrantPlay,

    /// A step was appended after the sequence was first played
    #[error("sequence steps are frozen once played")]
    SequenceFrozen,

    /// No preset is registered under the given name
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

impl AnimationError {
    pub(crate) fn fault(reason: impl Into<String>) -> Self {
        AnimationError::Fault {
            reason: reason.into(),
        }
    }
}

/// Errors raised while loading or validating [`crate::AnimationConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
