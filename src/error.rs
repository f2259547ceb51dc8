// Copyright 2026 The Sysmem Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Error kinds shared by the freelist, dynamic allocator, and façade.
//!
//! Every mutating operation in this crate returns a [`Result`] rather than
//! logging and returning a bare `bool`/`null`. The logger remains a side
//! channel: callers that want the reason for a failure in machine-readable
//! form match on [`MemoryError`]; callers that only care about "did it work"
//! can treat any `Err` the same way the source treated `false`.

use thiserror::Error;

/// Result alias used throughout the memory core.
pub type Result<T> = core::result::Result<T, MemoryError>;

/// The four error kinds named by the error handling design.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// A null/zero required argument, zero size, zero alignment, or an
    /// invalid combination of two-phase construction arguments.
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),

    /// No free range large enough to satisfy a request, or a request whose
    /// reserved byte count would reach or exceed 4 GiB.
    #[error("capacity exceeded: requested {requested} bytes, {available} available")]
    CapacityExceeded {
        requested: u64,
        available: u64,
    },

    /// Double-free, out-of-range free, or façade accounting underflow.
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),

    /// The host OS refused to hand back memory, or mutex construction failed.
    #[error("environment failure: {0}")]
    EnvironmentFailure(&'static str),
}

impl MemoryError {
    /// The logging severity this error kind is emitted at, per §7 of the
    /// error handling design.
    pub fn level(&self) -> log::Level {
        match self {
            MemoryError::PreconditionViolation(_) => log::Level::Error,
            MemoryError::CapacityExceeded { .. } => log::Level::Warn,
            MemoryError::InvariantViolation(_) => log::Level::Error,
            MemoryError::EnvironmentFailure(_) => log::Level::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_violation_logs_at_error() {
        let err = MemoryError::PreconditionViolation("zero size");
        assert_eq!(err.level(), log::Level::Error);
    }

    #[test]
    fn capacity_exceeded_logs_at_warn() {
        let err = MemoryError::CapacityExceeded { requested: 64, available: 32 };
        assert_eq!(err.level(), log::Level::Warn);
    }

    #[test]
    fn display_embeds_the_concrete_numbers() {
        let err = MemoryError::CapacityExceeded { requested: 96, available: 32 };
        let rendered = err.to_string();
        assert!(rendered.contains("96"));
        assert!(rendered.contains("32"));
    }
}
