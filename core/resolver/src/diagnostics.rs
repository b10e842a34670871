//! Diagnostics collected while resolving.
//!
//! Every entry is also emitted as a `tracing` event so that a subscriber sees
//! the same stream the caller can inspect afterwards.

use std::fmt::{self, Display, Formatter};

use cil_ast::nodes::Location;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{label}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Option<Location>,
    pub message: String,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{}: {location}: {}", self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Records a diagnostic and mirrors it to `tracing`.
    pub fn report(
        &mut self,
        severity: Severity,
        location: Option<&Location>,
        message: impl Into<String>,
    ) {
        let message = message.into();
        let at = location.map(ToString::to_string).unwrap_or_default();
        match severity {
            Severity::Info => tracing::info!(location = %at, "{message}"),
            Severity::Warning => tracing::warn!(location = %at, "{message}"),
            Severity::Error => tracing::error!(location = %at, "{message}"),
        }
        self.entries.push(Diagnostic {
            severity,
            location: location.cloned(),
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Entries of exactly `severity`, in reporting order.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
