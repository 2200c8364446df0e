//! Batch report printing

use crate::acquire::{AcquireReport, BatchStatus, SourceOutcome};
use crate::state::HealthTransition;

/// One-word label for a batch status
pub fn status_label(status: BatchStatus) -> &'static str {
    match status {
        BatchStatus::Complete => "complete",
        BatchStatus::Partial => "partial",
        BatchStatus::NoContent => "no content",
    }
}

fn transition_label(transition: &HealthTransition) -> String {
    match transition {
        HealthTransition::Healthy => "healthy".to_string(),
        HealthTransition::Degraded { error_count } => format!("degraded ({})", error_count),
        HealthTransition::Disabled { reason } => format!("DISABLED: {}", reason),
        HealthTransition::StillDisabled => "disabled".to_string(),
    }
}

/// Formats one source line of the report
pub fn format_outcome(outcome: &SourceOutcome) -> String {
    let result = match outcome.outcome.error_label() {
        None => format!("ok, {} articles", outcome.articles),
        Some(label) => label,
    };
    let mut line = format!(
        "{:<24} {:<16} {:>2} tries  {:<14} {}",
        outcome.source_name,
        outcome.priority.to_string(),
        outcome.outcome.attempts,
        transition_label(&outcome.transition),
        result
    );
    if let Some(served_by) = &outcome.served_by {
        if served_by != &outcome.url {
            line.push_str(&format!(" (via {})", served_by));
        }
    }
    line
}

/// Prints a batch report to stdout
pub fn print_report(report: &AcquireReport) {
    println!("=== Acquisition Report: {} ===\n", report.scope);

    println!(
        "Status: {} ({}/{} sources succeeded, {:.1}s)",
        status_label(report.status()),
        report.succeeded(),
        report.outcomes.len(),
        report.elapsed.as_secs_f64()
    );
    println!("Articles: {}", report.articles.len());
    println!();

    println!("Sources:");
    for outcome in &report.outcomes {
        println!("  {}", format_outcome(outcome));
    }

    let disabled: Vec<_> = report.disabled().collect();
    if !disabled.is_empty() {
        println!();
        println!("Disabled this batch ({}):", disabled.len());
        for outcome in disabled {
            println!("  - {} ({})", outcome.source_name, outcome.url);
        }
    }
}
