//! Platform audio session hooks.
//!
//! The recorder does not talk to a platform session service itself; it is
//! handed an [`AudioSession`] collaborator and calls it at the points the
//! platform cares about (construction, resuming after an interruption).
//! Tests substitute their own implementation to script denials.

use crate::error::SessionError;

/// An interruption notification from the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptionEvent {
    /// Another client took the audio hardware; recording must pause.
    Began,
    /// The hardware is available again; recording may resume.
    Ended,
}

/// The platform session the recorder records under.
pub trait AudioSession: Send {
    /// Claim the audio hardware for recording.
    fn activate(&mut self) -> Result<(), SessionError>;
}

/// A session that always grants activation, for platforms without a
/// session service.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSession;

impl AudioSession for DefaultSession {
    fn activate(&mut self) -> Result<(), SessionError> {
        Ok(())
    }
}
