//! Engine configuration.

use stratalog_incremental::DEFAULT_ITERATION_LIMIT;

/// Tunables of an [`Engine`](crate::Engine).
///
/// ```rust
/// use stratalog_engine::EngineConfig;
///
/// let config = EngineConfig::new()
///     .iteration_limit(500)
///     .collect_inspect_diagnostics(false);
/// assert_eq!(config.iteration_limit, 500);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Rounds a stratum may run in one commit before the commit is aborted
    /// with `Error::Divergence`.
    pub iteration_limit: u32,
    /// Whether failed inspect callbacks are returned with each commit.
    /// They are logged either way.
    pub collect_inspect_diagnostics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            collect_inspect_diagnostics: true,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration limit.
    pub fn iteration_limit(mut self, limit: u32) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Sets whether inspect diagnostics are collected.
    pub fn collect_inspect_diagnostics(mut self, collect: bool) -> Self {
        self.collect_inspect_diagnostics = collect;
        self
    }
}
