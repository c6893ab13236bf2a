//! Runtime configuration surface: split strategy plus the fixed parameters
//! that are recorded once at construction time.

use crate::error::{RTreeError, Result};
use crate::metadata::{DEFAULT_LOADING_FACTOR, DEFAULT_MAX_NODE_REFERENCES};

/// Split strategy (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Guttman's quadratic split.
    Quadratic,
    /// Greene's linear-time split.
    Greene,
}

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::Quadratic
    }
}

/// Tunables that govern tree shape.
#[derive(Debug, Clone)]
pub struct RTreeConfig {
    /// `maxNodeReferences` (M). Validated `>= 1` at construction; not
    /// reconfigurable afterward since it is durably recorded in Metadata and
    /// changing it retroactively would violate invariant 3 for subtrees
    /// already built under the old ceiling.
    pub max_node_references: u32,
    /// Active split strategy, changeable via [`RTreeConfig::configure`].
    pub split_mode: SplitMode,
    /// Loading factor used by the bulk loader (constant 0.7 per §4.6).
    pub loading_factor: f64,
}

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            max_node_references: DEFAULT_MAX_NODE_REFERENCES,
            split_mode: SplitMode::default(),
            loading_factor: DEFAULT_LOADING_FACTOR,
        }
    }
}

impl RTreeConfig {
    /// Reject configurations that would violate invariants before a single
    /// node is ever created.
    pub fn validate(&self) -> Result<()> {
        if self.max_node_references < 1 {
            return Err(RTreeError::InvalidArgument(
                "maxNodeReferences must be >= 1".to_string(),
            ));
        }
        if self.loading_factor < 0.0 {
            return Err(RTreeError::InvalidArgument(
                "loadingFactor must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a single `configure({key: value})` directive. Unknown keys and
    /// unknown values for known keys both fail with `InvalidArgument`.
    pub fn configure(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "splitMode" => {
                self.split_mode = match value {
                    "quadratic" => SplitMode::Quadratic,
                    "greene" => SplitMode::Greene,
                    other => {
                        return Err(RTreeError::InvalidArgument(format!(
                            "unknown splitMode value: {other}"
                        )))
                    }
                };
                Ok(())
            }
            other => Err(RTreeError::InvalidArgument(format!(
                "unknown config key: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_accepts_known_modes() {
        let mut cfg = RTreeConfig::default();
        cfg.configure("splitMode", "greene").unwrap();
        assert_eq!(cfg.split_mode, SplitMode::Greene);
        cfg.configure("splitMode", "quadratic").unwrap();
        assert_eq!(cfg.split_mode, SplitMode::Quadratic);
    }

    #[test]
    fn configure_rejects_unknown_key() {
        let mut cfg = RTreeConfig::default();
        assert!(cfg.configure("bogusKey", "x").is_err());
    }

    #[test]
    fn configure_rejects_unknown_value() {
        let mut cfg = RTreeConfig::default();
        assert!(cfg.configure("splitMode", "rstar").is_err());
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let cfg = RTreeConfig {
            max_node_references: 0,
            ..RTreeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
