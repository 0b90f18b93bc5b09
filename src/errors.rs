//! Error types for engine construction and evaluation.
//!
//! Mirrors `rust-rule-engine`'s `errors.rs`: a `thiserror`-derived enum, one
//! variant per failure class, plus a crate-wide `Result` alias.

use thiserror::Error;

/// Errors raised by engine construction or evaluation.
///
/// User-rule errors (panics inside a condition/output/guard/failure-reason
/// function) are not represented here — per the spec, the engine does not
/// catch them; they unwind to the caller and abort the evaluation without
/// emitting `Completed`.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Raised at engine construction: an invalid configuration value or a
    /// malformed rule descriptor (e.g. zero `max_iterations`).
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what was invalid.
        message: String,
    },

    /// Raised by `Engine::evaluate` when the engine contains one or more
    /// async producers or validators.
    #[error("engine contains async rules; use async evaluation")]
    AsyncModeMismatch,

    /// Raised by the session driver when the iteration ceiling is crossed
    /// during a phase's fixpoint loop or the fallback-producer loop.
    #[error("iteration limit exceeded: {iterations} > {max_iterations}")]
    MaxIterationsExceeded {
        /// The iteration count at the moment of the crossing.
        iterations: u32,
        /// The configured ceiling.
        max_iterations: u32,
    },
}

/// Convenient `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
