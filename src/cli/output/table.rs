//! Table output formatting for CLI commands
//!
//! Renders tasks, conflicts and gate offenders with comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{Conflict, Severity, Task, TaskStatus};

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format tasks in graph insertion order.
    pub fn format_tasks<'a>(&self, tasks: impl IntoIterator<Item = &'a Task>) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "ID", "Kind", "Title", "Status", "Priority", "Depends On", "Notes",
        ]));

        for task in tasks {
            let status_cell = if self.use_colors {
                Cell::new(task.status.as_str()).fg(status_color(task.status))
            } else {
                Cell::new(format!("{} {}", status_icon(task.status), task.status))
            };

            let deps = if task.depends_on.is_empty() {
                "-".to_string()
            } else {
                task.depends_on
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };

            let mut notes = Vec::new();
            if task.partial {
                notes.push("partial".to_string());
            }
            if task.reopen_count > 0 {
                notes.push(format!("reopened x{}", task.reopen_count));
            }
            if let Some(reason) = &task.failure {
                notes.push(truncate(reason, 40));
            }

            table.add_row(vec![
                Cell::new(task.id.as_str()),
                Cell::new(task.kind.as_str()),
                Cell::new(truncate(&task.title, 40)),
                status_cell,
                Cell::new(task.priority),
                Cell::new(truncate(&deps, 30)),
                Cell::new(if notes.is_empty() { "-".to_string() } else { notes.join("; ") }),
            ]);
        }

        table.to_string()
    }

    /// Format conflicts with their current resolution.
    pub fn format_conflicts<'a>(&self, conflicts: impl IntoIterator<Item = &'a Conflict>) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&[
            "ID", "Topic", "Facts", "Severity", "Adopted", "Basis", "Arbitration",
        ]));

        for conflict in conflicts {
            let severity = conflict.severity.to_string();
            let severity_cell = if self.use_colors {
                Cell::new(&severity).fg(severity_color(conflict.severity))
            } else {
                Cell::new(&severity)
            };

            let (adopted, basis) = match conflict.resolution() {
                Some(r) if r.forced => (r.adopted.to_string(), format!("{:?} (forced)", r.basis)),
                Some(r) => (r.adopted.to_string(), format!("{:?}", r.basis)),
                None => ("pending".to_string(), "-".to_string()),
            };

            table.add_row(vec![
                Cell::new(conflict.id.to_string()),
                Cell::new(truncate(&conflict.topic, 30)),
                Cell::new(format!("{} vs {}", conflict.fact_a, conflict.fact_b)),
                severity_cell,
                Cell::new(adopted),
                Cell::new(basis),
                Cell::new(
                    conflict
                        .arbitration_task
                        .as_ref()
                        .map_or_else(|| "-".to_string(), ToString::to_string),
                ),
            ]);
        }

        table.to_string()
    }

    /// Two-column key/value table.
    pub fn format_pairs(&self, rows: &[(&str, String)]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Field", "Value"]));
        for (key, value) in rows {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }
        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|n| Cell::new(n).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Completed => Color::Green,
        TaskStatus::InProgress => Color::Cyan,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Blocked => Color::Magenta,
        TaskStatus::Pending => Color::White,
    }
}

const fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✓",
        TaskStatus::InProgress => "⟳",
        TaskStatus::Failed => "✗",
        TaskStatus::Blocked => "⊗",
        TaskStatus::Pending => "○",
    }
}

const fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Low => Color::DarkGrey,
        Severity::Medium => Color::Yellow,
        Severity::High => Color::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskId;

    #[test]
    fn test_task_table_lists_failure_and_deps() {
        let mut task = Task::execute("E2", "Survey regulation");
        task.depends_on.insert(TaskId::new("E1"));
        task.status = TaskStatus::Failed;
        task.failure = Some("dependency E1 failed".to_string());

        let rendered = TableFormatter::with_config(false, Some(160)).format_tasks([&task]);
        assert!(rendered.contains("E2"));
        assert!(rendered.contains("E1"));
        assert!(rendered.contains("✗ failed"));
        assert!(rendered.contains("dependency E1 failed"));
    }
}
