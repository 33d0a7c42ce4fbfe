use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::models::{Group, Job, MergeRequest, Pipeline, PipelineSchedule, Project};

/// Table and cell creation helpers
fn create_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|label| Cell::new(*label).fg(TableColor::Magenta))
                .collect::<Vec<_>>(),
        );
    table
}

fn status_cell(status: &str) -> Cell {
    match status {
        "success" => Cell::new(status).fg(TableColor::Green),
        "failed" => Cell::new(status).fg(TableColor::Red),
        "running" => Cell::new(status).fg(TableColor::Yellow),
        "pending" | "canceled" | "skipped" => Cell::new(status).fg(TableColor::DarkGrey),
        _ => Cell::new(status),
    }
}

fn mr_state_cell(state: &str) -> Cell {
    match state {
        "opened" => Cell::new(state).fg(TableColor::Green),
        "merged" => Cell::new(state).fg(TableColor::Blue),
        "closed" => Cell::new(state).fg(TableColor::Red),
        _ => Cell::new(state),
    }
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(8).collect()
}

fn tree_prefix(depth: usize) -> String {
    if depth == 0 {
        String::new()
    } else {
        format!("{}└─ ", "  ".repeat(depth))
    }
}

pub fn groups_table(groups: &[Group], show_members: bool) -> Table {
    if show_members {
        let mut table = create_table(&[
            "Group",
            "Username",
            "Name",
            "Role",
            "User Status",
            "Membership",
        ]);
        for group in groups {
            add_member_rows(&mut table, group, 0);
        }
        table
    } else {
        let mut table = create_table(&["Group Path", "Group ID"]);
        for group in groups {
            add_group_rows(&mut table, group, 0);
        }
        table
    }
}

fn add_member_rows(table: &mut Table, group: &Group, depth: usize) {
    let label = format!("{}{}", tree_prefix(depth), group.full_path);

    if group.members.is_empty() {
        table.add_row(vec![
            Cell::new(&label),
            Cell::new("No members").fg(TableColor::DarkGrey),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
        ]);
    } else {
        for (i, member) in group.members.iter().enumerate() {
            let group_col = if i == 0 { label.clone() } else { String::new() };
            table.add_row(vec![
                Cell::new(group_col),
                Cell::new(&member.username),
                Cell::new(&member.name),
                Cell::new(&member.access_level_description),
                Cell::new(&member.state),
                Cell::new(&member.membership_state),
            ]);
        }
    }

    for subgroup in &group.subgroups {
        add_member_rows(table, subgroup, depth + 1);
    }
}

fn add_group_rows(table: &mut Table, group: &Group, depth: usize) {
    table.add_row(vec![
        Cell::new(format!("{}{}", tree_prefix(depth), group.full_path)),
        Cell::new(group.id.to_string()).fg(TableColor::DarkGrey),
    ]);
    for subgroup in &group.subgroups {
        add_group_rows(table, subgroup, depth + 1);
    }
}

pub fn projects_table(projects: &[Project]) -> Table {
    let mut table = create_table(&["Path", "Visibility", "Stars", "Forks", "Description"]);
    for project in projects {
        table.add_row(vec![
            Cell::new(&project.path_with_namespace),
            Cell::new(project.visibility.to_string()),
            Cell::new(project.star_count.to_string()),
            Cell::new(project.forks_count.to_string()),
            Cell::new(project.description.as_deref().unwrap_or("")),
        ]);
    }
    table
}

pub fn merge_requests_table(mrs: &[MergeRequest]) -> Table {
    let mut table = create_table(&[
        "IID",
        "Title",
        "Author",
        "State",
        "Source → Target",
        "Draft",
    ]);
    for mr in mrs {
        table.add_row(vec![
            Cell::new(format!("!{}", mr.iid)),
            Cell::new(&mr.title),
            Cell::new(&mr.author),
            mr_state_cell(&mr.state),
            Cell::new(format!("{} → {}", mr.source_branch, mr.target_branch)),
            Cell::new(if mr.is_draft() { "✓" } else { "" }),
        ]);
    }
    table
}

pub fn pipelines_table(pipelines: &[Pipeline]) -> Table {
    let mut table = create_table(&["ID", "Status", "Ref", "SHA", "Duration", "Created"]);
    for pipeline in pipelines {
        let duration = pipeline
            .duration
            .map_or_else(|| "N/A".to_string(), |secs| format!("{secs}s"));
        table.add_row(vec![
            Cell::new(format!("#{}", pipeline.id)),
            status_cell(&pipeline.status),
            Cell::new(&pipeline.ref_),
            Cell::new(short_sha(&pipeline.sha)).fg(TableColor::DarkGrey),
            Cell::new(duration),
            Cell::new(&pipeline.created_at),
        ]);
    }
    table
}

pub fn jobs_table(jobs: &[Job]) -> Table {
    let mut table = create_table(&["Name", "Stage", "Status", "Duration", "Started"]);
    for job in jobs {
        let duration = job
            .duration
            .map_or_else(|| "N/A".to_string(), |secs| format!("{secs:.1}s"));
        table.add_row(vec![
            Cell::new(&job.name),
            Cell::new(&job.stage),
            status_cell(&job.status),
            Cell::new(duration),
            Cell::new(job.started_at.as_deref().unwrap_or("N/A")),
        ]);
    }
    table
}

pub fn schedules_table(schedules: &[PipelineSchedule]) -> Table {
    let mut table = create_table(&[
        "ID",
        "Description",
        "Ref",
        "Cron",
        "Timezone",
        "Next Run",
        "Active",
        "Owner",
        "Last Pipeline",
    ]);
    for schedule in schedules {
        let last_pipeline = schedule
            .last_pipeline
            .as_ref()
            .map(|p| status_cell(&p.status))
            .unwrap_or_else(|| Cell::new("-").fg(TableColor::DarkGrey));
        table.add_row(vec![
            Cell::new(schedule.id.to_string()),
            Cell::new(&schedule.description),
            Cell::new(&schedule.ref_),
            Cell::new(&schedule.cron),
            Cell::new(&schedule.cron_timezone),
            Cell::new(schedule.next_run_at.as_deref().unwrap_or("-")),
            Cell::new(if schedule.active { "Yes" } else { "No" }),
            Cell::new(&schedule.owner.username),
            last_pipeline,
        ]);
    }
    table
}
