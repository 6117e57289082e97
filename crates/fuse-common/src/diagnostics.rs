//! Diagnostic Infrastructure
//!
//! Diagnostics are what the core hands to the logging collaborator. Each
//! module keeps its own list so module lifecycles can run concurrently
//! without a shared sink; the build session aggregates them afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable diagnostic codes.
pub mod codes {
    pub const MODULE_NOT_FOUND: u32 = 1001;
    pub const PARSE_FAILED: u32 = 1002;
    pub const EMPTY_MODULE: u32 = 1003;
    pub const GENERATE_FAILED: u32 = 1004;
    pub const MISSING_INSTALL: u32 = 1005;
}

// =============================================================================
// Diagnostic Severity
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Info = 3,
}

impl DiagnosticSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
            DiagnosticSeverity::Info => "info",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, DiagnosticSeverity::Error)
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

/// A diagnostic message attached to one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Public path of the file the diagnostic is about
    pub file_name: String,
    pub message: String,
    pub severity: DiagnosticSeverity,
    pub code: u32,
    /// Optional remediation hint shown with the message
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(
        file_name: impl Into<String>,
        severity: DiagnosticSeverity,
        code: u32,
        message: impl Into<String>,
    ) -> Self {
        Diagnostic {
            file_name: file_name.into(),
            message: message.into(),
            severity,
            code,
            hint: None,
        }
    }

    pub fn error(file_name: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::new(file_name, DiagnosticSeverity::Error, code, message)
    }

    pub fn warning(file_name: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Self::new(file_name, DiagnosticSeverity::Warning, code, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} FUSE{}: {}: {}",
            self.severity, self.code, self.file_name, self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_hint() {
        let diag = Diagnostic::warning("src/a.js", codes::MISSING_INSTALL, "missing file")
            .with_hint("run npm install");
        assert_eq!(
            diag.to_string(),
            "warning FUSE1005: src/a.js: missing file (run npm install)"
        );
        assert!(!diag.is_error());
    }

    #[test]
    fn test_hint_is_omitted_from_json_when_absent() {
        let diag = Diagnostic::error("a.js", codes::PARSE_FAILED, "bad token");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("hint"), "unexpected hint in {json}");
        assert!(json.contains("\"severity\":\"error\""));
    }
}
