//! Executor configuration

/// What the tree builder does with a plan node it has no operator for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsupportedNodePolicy {
    /// Leave the node out of the operator tree and record a gap
    #[default]
    Skip,
    /// Fail compilation before any operator runs
    Reject,
}

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Rows per base tile produced by table scans
    /// Default: 1024
    pub tile_size: usize,

    /// Handling of unsupported plan nodes
    /// Default: Skip
    pub unsupported_nodes: UnsupportedNodePolicy,

    /// Wrap view-producing roots in a materialization operator
    /// Default: true (turning it off exposes hidden base-tile rows)
    pub materialize_root: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            tile_size: 1024,
            unsupported_nodes: UnsupportedNodePolicy::Skip,
            materialize_root: true,
        }
    }
}

impl ExecutorConfig {
    /// Set the scan tile size (clamped to at least one row)
    #[must_use]
    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    #[must_use]
    pub fn with_unsupported_nodes(mut self, policy: UnsupportedNodePolicy) -> Self {
        self.unsupported_nodes = policy;
        self
    }

    #[must_use]
    pub fn with_materialize_root(mut self, enabled: bool) -> Self {
        self.materialize_root = enabled;
        self
    }

    /// Defaults overridden by `TILEXEC_TILE_SIZE` and `TILEXEC_STRICT_PLANS`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TILEXEC_TILE_SIZE") {
            match raw.parse::<usize>() {
                Ok(size) => config = config.with_tile_size(size),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring TILEXEC_TILE_SIZE"),
            }
        }

        if let Ok(raw) = std::env::var("TILEXEC_STRICT_PLANS") {
            match raw.as_str() {
                "1" | "true" | "yes" => {
                    config = config.with_unsupported_nodes(UnsupportedNodePolicy::Reject)
                }
                "0" | "false" | "no" => {
                    config = config.with_unsupported_nodes(UnsupportedNodePolicy::Skip)
                }
                _ => tracing::warn!(value = %raw, "ignoring TILEXEC_STRICT_PLANS"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.tile_size, 1024);
        assert_eq!(config.unsupported_nodes, UnsupportedNodePolicy::Skip);
        assert!(config.materialize_root);
    }

    #[test]
    fn test_builders() {
        let config = ExecutorConfig::default()
            .with_tile_size(0)
            .with_unsupported_nodes(UnsupportedNodePolicy::Reject)
            .with_materialize_root(false);
        assert_eq!(config.tile_size, 1);
        assert_eq!(config.unsupported_nodes, UnsupportedNodePolicy::Reject);
        assert!(!config.materialize_root);
    }
}
