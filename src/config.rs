//! Engine configuration, mirroring `rust-rule-engine`'s
//! `engine::engine::EngineConfig` shape (`max_cycles`/`debug_mode` there,
//! `max_iterations`/`enable_tracing` here).

/// Tunables for a compiled engine, set once at construction time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    /// Hard ceiling on the driver's iteration counter, crossed raises
    /// `EngineError::MaxIterationsExceeded`. Must be greater than zero.
    pub max_iterations: u32,
    /// Whether to record a `RuleActivation` per firing in `EngineResult.trace`.
    pub enable_tracing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_iterations: 1_000_000,
            enable_tracing: false,
        }
    }
}
