//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! reconciliation results to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::reconciler::ReconcileOutcome;
use crate::resource::ResourceState;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Operation row for table display.
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Operation")]
    operation: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a plan (check-mode) outcome for display.
    #[must_use]
    pub fn format_plan(&self, outcome: &ReconcileOutcome, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(outcome, detailed),
        }
    }

    fn format_plan_text(outcome: &ReconcileOutcome, detailed: bool) -> String {
        if !outcome.changed {
            return format!(
                "{} No changes required - device matches the desired state.\n",
                "OK".green()
            );
        }

        let mut output = String::new();
        let _ = writeln!(
            output,
            "Plan for {} ({} mode)\n",
            outcome.kind.bold(),
            outcome.mode
        );

        for warning in &outcome.warnings {
            let _ = writeln!(output, "{} {warning}", "warning:".yellow());
        }

        if detailed {
            let rows: Vec<OperationRow> = outcome
                .operations
                .iter()
                .enumerate()
                .map(|(i, op)| OperationRow {
                    index: i + 1,
                    operation: op.clone(),
                })
                .collect();
            if !rows.is_empty() {
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
            }
        }

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to delete ({} operations)",
            outcome.summary.creates.to_string().green(),
            outcome.summary.updates.to_string().yellow(),
            outcome.summary.deletes.to_string().red(),
            outcome.operations.len()
        );
        output
    }

    /// Formats an apply outcome for display.
    #[must_use]
    pub fn format_apply(&self, outcome: &ReconcileOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => Self::format_apply_text(outcome),
        }
    }

    fn format_apply_text(outcome: &ReconcileOutcome) -> String {
        let mut output = String::new();

        for warning in &outcome.warnings {
            let _ = writeln!(output, "{} {warning}", "warning:".yellow());
        }

        if !outcome.changed {
            let _ = writeln!(
                output,
                "{} Nothing to do - device matches the desired state.",
                "OK".green()
            );
        } else if outcome.check_mode {
            let _ = writeln!(
                output,
                "{} Check mode: {} operations computed, none sent.",
                "OK".green(),
                outcome.operations.len()
            );
        } else {
            for applied in &outcome.applied {
                let _ = writeln!(output, "  {} {applied}", "sent".green());
            }
            let _ = writeln!(
                output,
                "{} Applied {} operations (run {}).",
                "OK".green(),
                outcome.applied.len(),
                outcome.run_id
            );
        }

        let _ = writeln!(
            output,
            "State: {} -> {}",
            short_fingerprint(&outcome.before_fingerprint),
            short_fingerprint(&outcome.after_fingerprint)
        );
        output
    }

    /// Formats the exact operations an apply would send.
    #[must_use]
    pub fn format_operations(&self, outcome: &ReconcileOutcome) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&outcome.operations).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for op in &outcome.operations {
                    let _ = writeln!(output, "{op}");
                }
                output
            }
        }
    }

    /// Formats an observed state dump.
    #[must_use]
    pub fn format_state(&self, kind: &str, state: &ResourceState) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&state.to_json()).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(output, "{} ({} resources)", kind.bold(), state.len());
                for (key, fields) in state.iter() {
                    let _ = writeln!(output, "  {}", key.cyan());
                    for (field, value) in fields {
                        let _ = writeln!(output, "    {field}: {value}");
                    }
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        let mut output = String::new();

        if result.is_valid() {
            let _ = writeln!(output, "{} Configuration is valid.", "OK".green());
        } else {
            for error in &result.errors {
                let _ = writeln!(
                    output,
                    "{} {}: {}",
                    "error:".red(),
                    error.field.bold(),
                    error.message
                );
            }
            let _ = writeln!(output, "\n{} validation errors found.", result.errors.len());
        }

        if show_warnings {
            for warning in &result.warnings {
                let _ = writeln!(output, "{} {warning}", "warning:".yellow());
            }
        }
        output
    }
}

/// Abbreviates a fingerprint for display; short values pass through whole.
fn short_fingerprint(fingerprint: &str) -> &str {
    fingerprint.get(..8).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::StateMode;
    use crate::reconciler::ChangeSummary;
    use chrono::Utc;
    use uuid::Uuid;

    fn outcome(changed: bool) -> ReconcileOutcome {
        ReconcileOutcome {
            run_id: Uuid::nil(),
            kind: "vlans".into(),
            mode: StateMode::Merged,
            check_mode: true,
            changed,
            summary: ChangeSummary {
                creates: 1,
                updates: 0,
                deletes: 0,
            },
            operations: vec!["vlan 30".into(), "name thirty".into()],
            applied: Vec::new(),
            warnings: Vec::new(),
            before_fingerprint: "aaaaaaaaaaaaaaaa".into(),
            after_fingerprint: "bbbbbbbbbbbbbbbb".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_text_summarizes_changes() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_plan(&outcome(true), false);
        assert!(text.contains("1"));
        assert!(text.contains("2 operations"));
    }

    #[test]
    fn test_no_change_plan_says_so() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_plan(&outcome(false), false);
        assert!(text.contains("No changes required"));
    }

    #[test]
    fn test_json_output_is_parseable() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let text = formatter.format_plan(&outcome(true), true);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["kind"], "vlans");
    }

    #[test]
    fn test_apply_text_survives_short_fingerprints() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let mut short = outcome(false);
        short.before_fingerprint = "abc".into();
        short.after_fingerprint = "abc".into();
        let text = formatter.format_apply(&short);
        assert!(text.contains("State: abc -> abc"));
    }

    #[test]
    fn test_render_lists_operations_in_order() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let text = formatter.format_operations(&outcome(true));
        assert_eq!(text, "vlan 30\nname thirty\n");
    }
}
