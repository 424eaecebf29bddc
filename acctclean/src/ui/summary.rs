// acctclean/src/ui/summary.rs
//! Tables and JSON documents describing cleaning runs and rule sets.

use acctclean_core::{ActionKind, Condition, FileOutcome, MaskKind, RuleSpec, RunOutcome};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};

fn new_table(supports_color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    if supports_color {
        table.enforce_styling();
    } else {
        table.force_no_tty();
    }
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

fn status_cell(outcome: &RunOutcome, dry_run: bool) -> Cell {
    match outcome {
        RunOutcome::Success { .. } if dry_run => Cell::new("dry run").fg(Color::Cyan),
        RunOutcome::Success { backup: None, .. } => Cell::new("unchanged").fg(Color::Green),
        RunOutcome::Success { .. } => Cell::new("cleaned").fg(Color::Green),
        RunOutcome::Aborted { .. } => Cell::new("aborted").fg(Color::Yellow),
        RunOutcome::FatalIo { .. } => Cell::new("failed").fg(Color::Red),
    }
}

fn backup_text(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Success { backup: Some(b), .. } if b.retained => b.path.display().to_string(),
        RunOutcome::Success { backup: Some(_), .. } => "discarded".to_string(),
        RunOutcome::Aborted { error, .. } => error
            .backup_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string()),
        _ => "-".to_string(),
    }
}

/// One row per file, then the records decided by each rule across all files.
pub fn print_run_summary<W: Write>(
    outcomes: &[FileOutcome],
    dry_run: bool,
    writer: &mut W,
    supports_color: bool,
) -> io::Result<()> {
    let mut table = new_table(supports_color);
    table.set_header(header(&[
        "File", "Status", "Lines", "Kept", "Removed", "Anonymized", "Malformed", "Backup",
    ]));

    let mut hits: BTreeMap<&str, usize> = BTreeMap::new();
    for file in outcomes {
        let mut row = vec![
            Cell::new(file.path.display()),
            status_cell(&file.outcome, dry_run),
        ];
        match file.outcome.report() {
            Some(report) => {
                row.extend(
                    [
                        report.total_lines,
                        report.kept,
                        report.removed,
                        report.anonymized,
                        report.malformed,
                    ]
                    .into_iter()
                    .map(Cell::new),
                );
                for (rule, count) in &report.rule_hits {
                    *hits.entry(rule.as_str()).or_default() += count;
                }
            }
            None => row.extend((0..5).map(|_| Cell::new("-"))),
        }
        row.push(Cell::new(backup_text(&file.outcome)));
        table.add_row(row);
    }
    writeln!(writer, "{}", table)?;

    if !hits.is_empty() {
        let mut rules = new_table(supports_color);
        rules.set_header(header(&["Rule", "Records"]));
        for (rule, count) in hits {
            rules.add_row(vec![Cell::new(rule), Cell::new(count)]);
        }
        writeln!(writer, "{}", rules)?;
    }

    if dry_run {
        writeln!(writer, "[DRY RUN] No files were modified.")?;
    }
    Ok(())
}

pub fn outcomes_to_json(outcomes: &[FileOutcome], dry_run: bool) -> Value {
    let files: Vec<Value> = outcomes
        .iter()
        .map(|file| match &file.outcome {
            RunOutcome::Success { report, backup } => json!({
                "path": file.path,
                "status": "success",
                "report": report,
                "backup": backup.as_ref().filter(|b| b.retained).map(|b| &b.path),
            }),
            RunOutcome::Aborted { error, report } => json!({
                "path": file.path,
                "status": "aborted",
                "error": error.to_string(),
                "report": report,
                "backup": error.backup_path(),
            }),
            RunOutcome::FatalIo { error } => json!({
                "path": file.path,
                "status": "fatal_io",
                "error": error.to_string(),
            }),
        })
        .collect();
    json!({ "dry_run": dry_run, "files": files })
}

fn describe_condition(condition: &Condition) -> String {
    match condition {
        Condition::OlderThan {
            days,
            timestamp_field: None,
        } => format!("older than {} days", days),
        Condition::OlderThan {
            days,
            timestamp_field: Some(field),
        } => format!("{} older than {} days", field, days),
        Condition::AccountClosed => "account closed".to_string(),
        Condition::SupersededDuplicate => "superseded duplicate".to_string(),
        Condition::EventType { types } => format!("event type in [{}]", types.join(", ")),
        Condition::AttributeMatches { key, pattern } => format!("{} matches /{}/", key, pattern),
        Condition::AccountMatches { pattern } => format!("account matches /{}/", pattern),
        Condition::Always => "always".to_string(),
    }
}

fn describe_action(spec: &RuleSpec) -> String {
    match spec.action {
        ActionKind::Keep => "keep".to_string(),
        ActionKind::Remove => "remove".to_string(),
        ActionKind::Anonymize => {
            let mask = match spec.mask {
                MaskKind::Hash => "hash".to_string(),
                MaskKind::Redact => format!("redact as {}", spec.replace_with),
            };
            format!("anonymize {} ({})", spec.fields.join(", "), mask)
        }
    }
}

/// The active rules in evaluation order.
pub fn print_rules<W: Write>(specs: &[RuleSpec], writer: &mut W, supports_color: bool) -> io::Result<()> {
    if specs.is_empty() {
        writeln!(writer, "No active rules. Every record would be kept.")?;
        return Ok(());
    }
    let mut table = new_table(supports_color);
    table.set_header(header(&["#", "Rule", "When", "Action", "Description"]));
    for (idx, spec) in specs.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&spec.name),
            Cell::new(describe_condition(&spec.when)),
            Cell::new(describe_action(spec)),
            Cell::new(spec.description.as_deref().unwrap_or("")),
        ]);
    }
    writeln!(writer, "{}", table)
}
