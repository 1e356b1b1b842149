use std::path::Path;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use elr_cli::pipeline::ConvertOutcome;
use elr_model::{Issue, IssueScope, IssueSeverity};

pub fn print_summary(outcome: &ConvertOutcome, output: Option<&Path>) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Schema"),
        header_cell("Rows"),
        header_cell("Output"),
        header_cell("Errors"),
        header_cell("Warnings"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    let output_cell = match (&outcome.output, output) {
        (None, _) => dim_cell("-"),
        (Some(_), Some(path)) => Cell::new(path.display()),
        (Some(_), None) => Cell::new("stdout"),
    };
    table.add_row(vec![
        Cell::new(&outcome.schema)
            .fg(Color::Blue)
            .add_attribute(Attribute::Bold),
        Cell::new(outcome.rows),
        output_cell,
        count_cell(outcome.issues.error_count(), Color::Red),
        count_cell(outcome.issues.warning_count(), Color::Yellow),
    ]);
    eprintln!("{table}");
    print_issue_table(outcome.issues.issues());
}

fn print_issue_table(issues: &[Issue]) {
    if issues.is_empty() {
        return;
    }
    let mut ordered: Vec<&Issue> = issues.iter().collect();
    // Stable: issues of one severity keep read order.
    ordered.sort_by_key(|issue| std::cmp::Reverse(severity_rank(issue.severity)));
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Item"),
        header_cell("Tracking id"),
        header_cell("Message"),
    ]);
    apply_issue_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    align_column(&mut table, 1, CellAlignment::Right);
    for issue in ordered {
        let (item, tracking) = match &issue.scope {
            IssueScope::Report => (dim_cell("report"), dim_cell("-")),
            IssueScope::Item { index, tracking_id } => {
                (Cell::new(index), Cell::new(tracking_id))
            }
        };
        table.add_row(vec![
            severity_cell(issue.severity),
            item,
            tracking,
            Cell::new(issue.message()),
        ]);
    }
    eprintln!();
    eprintln!("Issues:");
    eprintln!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_issue_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(160);
    table.set_constraints(vec![
        ColumnConstraint::UpperBoundary(Width::Fixed(9)),
        ColumnConstraint::UpperBoundary(Width::Fixed(8)),
        ColumnConstraint::UpperBoundary(Width::Percentage(25)),
        ColumnConstraint::UpperBoundary(Width::Percentage(65)),
    ]);
}

pub fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn severity_cell(severity: IssueSeverity) -> Cell {
    match severity {
        IssueSeverity::Error => Cell::new("ERROR").fg(Color::Red),
        IssueSeverity::Warning => Cell::new("WARN").fg(Color::Yellow),
    }
}

fn severity_rank(severity: IssueSeverity) -> u8 {
    match severity {
        IssueSeverity::Error => 2,
        IssueSeverity::Warning => 1,
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

pub fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
