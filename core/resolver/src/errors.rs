use cil_ast::nodes::{Flavor, Location};
use thiserror::Error;

/// A resolution failure tied to the statement that caused it.
///
/// Only [`ResolveError::NotFound`] is recoverable, and only inside an
/// `optional`: the optional is disabled and resolution goes on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[must_use = "errors must not be silently ignored"]
pub enum ResolveError {
    #[error("{location}: failed to resolve {kind} `{name}`")]
    NotFound {
        kind: &'static str,
        name: String,
        location: Location,
    },

    #[error("{location}: {reason} (previous declaration at {previous})")]
    Conflict {
        reason: String,
        location: Location,
        previous: Location,
    },

    #[error("{location}: {kind} cycle found: {}", .chain.join(" -> "))]
    CycleDetected {
        kind: &'static str,
        chain: Vec<String>,
        location: Location,
    },

    #[error("{location}: {reason}{}", also_at(.others))]
    OrderConflict {
        reason: String,
        location: Location,
        others: Vec<Location>,
    },

    #[error("{location}: degenerate inheritance detected")]
    DegenerateInheritance { location: Location },

    #[error("{location}: {statement} is not allowed in {container}")]
    StructuralViolation {
        statement: Flavor,
        container: String,
        location: Location,
    },

    #[error("{location}: {reason}")]
    InvalidReference { reason: String, location: Location },

    #[error("{location}: {kind} `{name}` not in {order} statement")]
    Unordered {
        kind: Flavor,
        order: Flavor,
        name: String,
        location: Location,
    },
}

fn also_at(others: &[Location]) -> String {
    others.iter().map(|l| format!("; also at {l}")).collect()
}

impl ResolveError {
    /// Returns the source location associated with this error.
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            ResolveError::NotFound { location, .. }
            | ResolveError::Conflict { location, .. }
            | ResolveError::CycleDetected { location, .. }
            | ResolveError::OrderConflict { location, .. }
            | ResolveError::DegenerateInheritance { location }
            | ResolveError::StructuralViolation { location, .. }
            | ResolveError::InvalidReference { location, .. }
            | ResolveError::Unordered { location, .. } => location,
        }
    }

    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ResolveError::NotFound { .. })
    }

    pub(crate) fn invalid(reason: impl Into<String>, location: &Location) -> Self {
        ResolveError::InvalidReference {
            reason: reason.into(),
            location: location.clone(),
        }
    }
}

pub(crate) type ResolveResult<T> = Result<T, ResolveError>;
