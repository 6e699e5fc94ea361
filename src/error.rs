//! Demodulator error types

use thiserror::Error;

/// Caller misuse of the pipeline. Candidate frames that fail validation
/// are dropped silently as part of normal operation; they never surface
/// here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DemodError {
    /// The async worker is already running for this demodulator.
    #[error("demodulator worker already running")]
    WorkerRunning,

    /// Synchronous processing was requested while the async worker owns
    /// the pipeline state.
    #[error("pipeline is owned by the async worker; stop it first")]
    PipelineBusy,
}
