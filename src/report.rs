//! Per-run result reporting. Warnings are typed values, never just log
//! output: every skipped or degraded document leaves a visible entry here.

use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WarningKind {
    /// No structured period and the text parser could not resolve one; the
    /// line item degraded to immediate recognition.
    AmbiguousPeriod,
    /// Document combination the assembler does not model; skipped for
    /// manual handling.
    UnsupportedShape,
    /// Document in a currency other than the run currency; skipped.
    ForeignCurrency,
    /// Document fully credited; processed, but worth operator review.
    FullyRefunded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    pub document: String,
    pub kind: WarningKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DocumentStatus {
    Processed,
    /// Processed, but with at least one degraded line item.
    Degraded,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub document: String,
    pub status: DocumentStatus,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<DocumentOutcome>,
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, document: &str, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{}: {}", document, message);
        self.warnings.push(RunWarning {
            document: document.to_string(),
            kind,
            message,
        });
    }

    pub fn record(&mut self, document: &str, status: DocumentStatus) {
        self.outcomes.push(DocumentOutcome {
            document: document.to_string(),
            status,
        });
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.count(DocumentStatus::Skipped)
    }

    pub fn degraded(&self) -> usize {
        self.count(DocumentStatus::Degraded)
    }

    fn count(&self, status: DocumentStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Human-readable per-run summary, one line per warning.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} document(s): {} processed, {} degraded, {} skipped",
            self.outcomes.len(),
            self.count(DocumentStatus::Processed),
            self.degraded(),
            self.skipped()
        )];
        for warning in &self.warnings {
            lines.push(format!("  {} -- {}", warning.document, warning.message));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_every_warning() {
        let mut report = RunReport::new();
        report.record("in_1", DocumentStatus::Processed);
        report.warn("in_2", WarningKind::AmbiguousPeriod, "unknown period for line item");
        report.record("in_2", DocumentStatus::Degraded);
        report.warn("ch_3", WarningKind::UnsupportedShape, "two credit notes");
        report.record("ch_3", DocumentStatus::Skipped);

        let summary = report.summary();
        assert!(summary.starts_with("3 document(s): 1 processed, 1 degraded, 1 skipped"));
        assert!(summary.contains("in_2 -- unknown period"));
        assert!(summary.contains("ch_3 -- two credit notes"));
        assert!(report.has_warnings());
        assert_eq!(report.skipped(), 1);
    }
}
