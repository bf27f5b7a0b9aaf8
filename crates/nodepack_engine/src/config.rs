//! Configuration for routing and pipelines.

/// Configuration for routers and pipelines.
///
/// Controls how strictly cached routes are checked and how much routing
/// detail is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Check every replayed step against the component type it was recorded
    /// for, and abort on a mismatch.
    pub validate_replay: bool,

    /// Log every routing decision at `trace` level.
    pub trace_routing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validate_replay: cfg!(debug_assertions),
            trace_routing: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration for development with every check and trace on.
    #[must_use]
    pub fn development() -> Self {
        Self {
            validate_replay: true,
            trace_routing: true,
        }
    }

    /// Creates a configuration with replay validation and tracing off.
    #[must_use]
    pub fn release() -> Self {
        Self {
            validate_replay: false,
            trace_routing: false,
        }
    }

    /// Builder method to set replay validation.
    #[must_use]
    pub fn with_validate_replay(mut self, validate: bool) -> Self {
        self.validate_replay = validate;
        self
    }

    /// Builder method to set routing traces.
    #[must_use]
    pub fn with_trace_routing(mut self, trace: bool) -> Self {
        self.trace_routing = trace;
        self
    }
}
