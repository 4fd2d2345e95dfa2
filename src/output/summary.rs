use std::fmt::Write;

use comfy_table::Cell;

use super::styling::heading;
use super::tables::{count_cell, create_table, header};
use crate::types::RunSummary;

/// Prints the outcome of a completed run to stdout.
pub fn print_summary(summary: &RunSummary) {
    println!("{}", render_summary(summary));
}

fn render_summary(summary: &RunSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{} {}", heading("📊"), heading("Summary"));

    let mut pipelines = create_table();
    pipelines.set_header(header(&["Pipelines", "Count"]));
    pipelines.add_row(vec![Cell::new("Listed"), Cell::new(summary.pipelines_listed)]);
    pipelines.add_row(vec![
        Cell::new("Already migrated"),
        Cell::new(summary.pipelines_skipped),
    ]);
    pipelines.add_row(vec![
        Cell::new("Migrated this run"),
        count_cell(summary.pipelines_migrated),
    ]);
    let _ = writeln!(output, "{pipelines}");

    let mut logs = create_table();
    logs.set_header(header(&["Log category", "Items copied"]));
    logs.add_row(vec![Cell::new("builds"), count_cell(summary.builds_copied)]);
    logs.add_row(vec![Cell::new("releases"), count_cell(summary.releases_copied)]);
    let _ = writeln!(output, "{logs}");

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_summary_lists_counts() {
        let summary = RunSummary {
            pipelines_listed: 12,
            pipelines_skipped: 4,
            pipelines_migrated: 8,
            builds_copied: 1234,
            releases_copied: 56,
        };

        let rendered = console::strip_ansi_codes(&render_summary(&summary)).to_string();
        assert!(rendered.contains("Summary"));
        assert!(rendered.contains("Migrated this run"));
        assert!(rendered.contains("12"));
        assert!(rendered.contains("1234"));
        assert!(rendered.contains("releases"));
    }
}
