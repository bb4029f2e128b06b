//! Per-tree digest settings.

/// Laps a digest may take before giving up.
pub const DEFAULT_TTL: usize = 10;

/// Settings shared by every scope in one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestConfig {
    /// Maximum number of full-tree laps per digest. Values below 1 behave
    /// like 1.
    pub ttl: usize,
}

impl DigestConfig {
    pub fn with_ttl(ttl: usize) -> Self {
        Self { ttl }
    }

    pub(crate) fn lap_limit(&self) -> usize {
        self.ttl.max(1)
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_still_allows_one_lap() {
        assert_eq!(DigestConfig::default().lap_limit(), DEFAULT_TTL);
        assert_eq!(DigestConfig::with_ttl(0).lap_limit(), 1);
    }
}
