//! Errors surfaced by digest and apply.

use crate::scope::Phase;

pub type Result<T> = std::result::Result<T, ScopeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// A digest or apply was started while another one is running on the
    /// same tree. This is a reentrancy bug in the caller.
    #[error("Cannot start {requested}: {active} already in progress")]
    PhaseConflict { active: Phase, requested: Phase },

    /// The watch graph was still dirty after `ttl` laps.
    #[error("{ttl} digest iterations reached")]
    DigestNotConverging { ttl: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_phases() {
        let err = ScopeError::PhaseConflict {
            active: Phase::Digest,
            requested: Phase::Apply,
        };
        assert_eq!(err.to_string(), "Cannot start $apply: $digest already in progress");
        assert_eq!(
            ScopeError::DigestNotConverging { ttl: 10 }.to_string(),
            "10 digest iterations reached"
        );
    }
}
