//! Per-generic-function dispatch options.
//!
//! ```toml
//! cache = true    # memoize effective methods per argument class
//! tiered = true   # use the cheapest composition tier that applies
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, DispatchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchOptions {
    /// Consult and populate the dispatch cache.
    pub cache: bool,
    /// Build fast-path tiers. When off, every effective method uses the
    /// general wrapped form.
    pub tiered: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            cache: true,
            tiered: true,
        }
    }
}

impl DispatchOptions {
    /// Options with both the cache and the tiers turned off.
    pub fn uncached() -> Self {
        Self {
            cache: false,
            tiered: false,
        }
    }

    /// Parse options from a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(source: &str) -> DispatchResult<Self> {
        toml::from_str(source).map_err(|e| DispatchError::InvalidOptions(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = DispatchOptions::default();
        assert!(options.cache);
        assert!(options.tiered);
        assert_eq!(DispatchOptions::from_toml_str("").unwrap(), options);
    }

    #[test]
    fn test_partial_toml() {
        let options = DispatchOptions::from_toml_str("cache = false").unwrap();
        assert_eq!(
            options,
            DispatchOptions {
                cache: false,
                tiered: true
            }
        );
    }

    #[test]
    fn test_invalid_toml() {
        let err = DispatchOptions::from_toml_str("cache = \"yes\"").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidOptions(_)));

        let err = DispatchOptions::from_toml_str("memoize = true").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidOptions(_)));
    }
}
