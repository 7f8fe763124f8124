//! Diagnostics attached to every result.
//!
//! Warnings never abort a call; they are logged through `tracing` when they
//! are raised and also returned to the caller.

use serde::Serialize;
use tracing::{info, warn};

use tv_common::logging::redact_value;
use tv_model::SubjectId;

/// A diagnostic message raised while transforming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity level.
    pub level: DiagnosticLevel,

    /// Message text.
    pub message: String,

    /// Subject the message is about (if any).
    pub subject: Option<SubjectId>,

    /// Column the message is about (if any).
    pub column: Option<String>,
}

impl Diagnostic {
    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            subject: None,
            column: None,
        }
    }

    /// Create an info diagnostic.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            message: message.into(),
            subject: None,
            column: None,
        }
    }

    /// Add subject context.
    pub fn with_subject(mut self, subject: SubjectId) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Add column context.
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        self.level == DiagnosticLevel::Warning
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticLevel {
    /// Informational message.
    Info,
    /// Warning - the call succeeded but with caveats.
    Warning,
}

/// Collects diagnostics for one call and mirrors them to the log.
#[derive(Debug, Default)]
pub(crate) struct DiagnosticSink {
    entries: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub(crate) fn push(&mut self, diagnostic: Diagnostic) {
        let subject = diagnostic
            .subject
            .as_ref()
            .map(|id| redact_value(&id.to_string()).to_string());
        let column = diagnostic.column.as_deref().unwrap_or("");
        match diagnostic.level {
            DiagnosticLevel::Warning => warn!(
                subject = subject.as_deref().unwrap_or(""),
                column,
                "{}",
                diagnostic.message
            ),
            DiagnosticLevel::Info => info!(column, "{}", diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::warning(message));
    }

    pub(crate) fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// Helpers shared by every result type.
pub trait Diagnostics {
    /// All diagnostics, in the order they were raised.
    fn diagnostics(&self) -> &[Diagnostic];

    /// Warnings only.
    fn warnings(&self) -> Vec<&Diagnostic> {
        self.diagnostics().iter().filter(|d| d.is_warning()).collect()
    }

    /// Count warnings.
    fn warning_count(&self) -> usize {
        self.diagnostics().iter().filter(|d| d.is_warning()).count()
    }
}
