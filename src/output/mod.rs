mod details;
mod exports;
mod progress;
mod styling;
mod tables;
mod tree;

pub use details::{
    print_merge_request_details, print_pipeline_details, print_project_details,
    print_schedule_details,
};
pub use exports::{
    groups_csv, groups_markdown, jobs_csv, merge_requests_csv, pipelines_csv, projects_csv,
    schedules_csv, to_json,
};
pub use progress::{fetch_spinner, finish_fetch};
pub use styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim};
pub use tables::{
    groups_table, jobs_table, merge_requests_table, pipelines_table, projects_table,
    schedules_table,
};
pub use tree::print_group_tree;

use clap::ValueEnum;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Tree,
    Json,
    Csv,
    Markdown,
}

/// Pick the effective output format: an explicit choice wins; otherwise
/// interactive terminals and piped contexts get different defaults.
pub fn resolve_format(
    requested: Option<OutputFormat>,
    interactive_default: OutputFormat,
    script_default: OutputFormat,
) -> OutputFormat {
    requested.unwrap_or_else(|| {
        if std::io::stdout().is_terminal() {
            interactive_default
        } else {
            script_default
        }
    })
}
